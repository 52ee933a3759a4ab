use core::iter::FusedIterator;
use std::vec;

use crate::{filter::Filter, Entity, EntityPool, EntityRef};

/// Lazily yields the handles of the entities in a pool which match a
/// [`Filter`].
///
/// The set of candidate ids is captured when the iterator is created. The
/// filter is evaluated against the pool as each item is reached, so entities
/// destroyed or altered mid-iteration are skipped or yielded according to
/// their state at that point.
pub struct EntityIter<'a> {
    pool: &'a EntityPool,
    ids: vec::IntoIter<Entity>,
    filter: Filter,
}

impl<'a> EntityIter<'a> {
    pub(crate) fn new(pool: &'a EntityPool, ids: Vec<Entity>, filter: Filter) -> Self {
        Self {
            pool,
            ids: ids.into_iter(),
            filter,
        }
    }

    /// Returns the filter applied to each entity
    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

impl<'a> Iterator for EntityIter<'a> {
    type Item = EntityRef;

    fn next(&mut self) -> Option<Self::Item> {
        for id in self.ids.by_ref() {
            if !self
                .filter
                .matches(|key| self.pool.has_component(id, key))
            {
                continue;
            }

            let handle = self.pool.get_entity(id);
            if !handle.is_null() {
                return Some(handle);
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len()))
    }
}

impl FusedIterator for EntityIter<'_> {}

impl core::fmt::Debug for EntityIter<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityIter")
            .field("filter", &self.filter)
            .field("remaining", &self.ids.len())
            .finish()
    }
}
