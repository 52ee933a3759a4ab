//! Standard components the storage layer itself understands.

use crate::{Component, Urn};

/// Marks an entity as the unique holder of a urn within its pool.
///
/// A pool refuses to commit a second entity claiming a urn which is already
/// held, see [`crate::EntityPool::insert_ref`]. The holder can be looked up with
/// [`crate::EntityPool::get_single_entity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SingleComponent {
    urn: Urn,
}

impl SingleComponent {
    pub fn new(urn: Urn) -> Self {
        Self { urn }
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }
}

impl Component for SingleComponent {}

impl From<Urn> for SingleComponent {
    fn from(urn: Urn) -> Self {
        Self::new(urn)
    }
}
