mod iter;

use std::sync::Arc;

pub use iter::EntityIter;

use crate::{component::key, filter::Filter, ComponentKey, EntityPool};

/// Describes a [`Group`] by the component sets an entity must hold.
///
/// ```
/// use strata::{query::GroupBuilder, Component, EntityBuilder, EntityPool};
///
/// struct Position(f32);
/// impl Component for Position {}
/// struct Hidden;
/// impl Component for Hidden {}
///
/// let pool = EntityPool::new();
/// EntityBuilder::new().set(Position(1.0)).build(&pool);
/// EntityBuilder::new().set(Position(2.0)).set(Hidden).build(&pool);
///
/// let visible = GroupBuilder::new()
///     .with::<Position>()
///     .without::<Hidden>()
///     .build(pool.clone());
///
/// assert_eq!(visible.iter().count(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct GroupBuilder {
    filter: Filter,
}

impl GroupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the component `key`
    pub fn all(mut self, key: ComponentKey) -> Self {
        self.filter = self.filter.all(key);
        self
    }

    /// Require at least one of the keys added with this method
    pub fn one(mut self, key: ComponentKey) -> Self {
        self.filter = self.filter.one(key);
        self
    }

    /// Reject entities holding `key`
    pub fn exclude(mut self, key: ComponentKey) -> Self {
        self.filter = self.filter.exclude(key);
        self
    }

    /// Require `T`
    pub fn with<T: 'static>(self) -> Self {
        self.all(key::<T>())
    }

    /// Require `T` or any other component added through `any_of`
    pub fn any_of<T: 'static>(self) -> Self {
        self.one(key::<T>())
    }

    /// Reject entities holding `T`
    pub fn without<T: 'static>(self) -> Self {
        self.exclude(key::<T>())
    }

    /// Returns true if neither required nor optional components were given.
    ///
    /// Exclusions alone do not constitute a query.
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Binds the description to a pool
    pub fn build(self, pool: Arc<EntityPool>) -> Group {
        Group {
            pool,
            filter: self.filter,
        }
    }
}

/// A query bound to a pool.
///
/// Nothing is cached: every call to [`Group::iter`] reflects the pool at the
/// time of iteration.
#[derive(Debug, Clone)]
pub struct Group {
    pool: Arc<EntityPool>,
    filter: Filter,
}

impl Group {
    /// Iterates the matching entities
    pub fn iter(&self) -> EntityIter<'_> {
        self.pool.query(self.filter.clone())
    }

    pub fn pool(&self) -> &Arc<EntityPool> {
        &self.pool
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = crate::EntityRef;
    type IntoIter = EntityIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
