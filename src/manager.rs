use std::sync::Arc;

use itertools::Itertools;
use parking_lot::RwLock;

use crate::{
    entity::EntityStore, filter::Filter, pool::SharedStore, query::EntityIter, ComponentKey,
    Entity, EntityBuilder, EntityPool, EntityRef, Urn,
};

/// Owns a global pool and any number of additional pools which all allocate
/// from the same id arena.
///
/// Lookups by id or urn search every pool, the global pool first. Queries
/// run against the global pool.
pub struct EntityManager {
    store: SharedStore,
    global: Arc<EntityPool>,
    pools: RwLock<Vec<Arc<EntityPool>>>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-sizes the id arena and the global pool for `capacity` entities
    pub fn with_capacity(capacity: usize) -> Self {
        let store: SharedStore = Arc::new(RwLock::new(EntityStore::with_capacity(capacity)));
        let global = EntityPool::from_store(store.clone(), capacity);

        Self {
            store,
            global,
            pools: RwLock::new(Vec::new()),
        }
    }

    /// Returns the pool used for queries and new entities
    pub fn global_pool(&self) -> &Arc<EntityPool> {
        &self.global
    }

    /// Creates an additional pool sharing the id arena
    pub fn new_pool(&self) -> Arc<EntityPool> {
        let pool = EntityPool::from_store(self.store.clone(), 0);
        self.pools.write().push(pool.clone());
        pool
    }

    /// Returns every pool, the global pool first
    pub fn pools(&self) -> Vec<Arc<EntityPool>> {
        let mut pools = vec![self.global.clone()];
        pools.extend(self.pools.read().iter().cloned());
        pools
    }

    /// Commits a builder into the global pool
    pub fn build(&self, builder: &mut EntityBuilder) -> EntityRef {
        builder.build(&self.global)
    }

    /// Allocates an id loaded in the global pool
    pub fn create_entity(&self) -> Entity {
        self.global.create_entity()
    }

    /// Returns the pool `id` is committed to
    pub fn pool_of(&self, id: Entity) -> Option<Arc<EntityPool>> {
        self.pools().into_iter().find(|pool| pool.contains(id))
    }

    /// Returns the handle of `id` from whichever pool holds it
    pub fn get_entity(&self, id: Entity) -> EntityRef {
        if id.is_null() {
            return EntityRef::null();
        }

        self.pools()
            .iter()
            .map(|pool| pool.get_entity(id))
            .find(|handle| !handle.is_null())
            .unwrap_or_else(EntityRef::null)
    }

    /// Destroys `id` in whichever pool holds it
    pub fn destroy(&self, id: Entity) -> bool {
        self.pools().iter().any(|pool| pool.destroy(id))
    }

    /// Returns the entity claiming `urn` in any pool
    pub fn get_single_entity(&self, urn: &Urn) -> EntityRef {
        self.pools()
            .iter()
            .map(|pool| pool.get_single_entity(urn))
            .find(|handle| !handle.is_null())
            .unwrap_or_else(EntityRef::null)
    }

    /// Relocates an entity, keeping its id, handle and component instances.
    ///
    /// If `target` rejects the entity, it is restored into its source pool
    /// and false is returned.
    pub fn move_to_pool(&self, handle: &EntityRef, target: &Arc<EntityPool>) -> bool {
        let id = handle.id();
        let Some(source) = handle.pool().filter(|_| handle.is_active()) else {
            return false;
        };

        if Arc::ptr_eq(&source, target) {
            return true;
        }

        if !source.shares_store(target) {
            tracing::warn!(%id, "target pool allocates from a different id arena");
            return false;
        }

        let components = source.copy_components(id);
        let detached = source.detach(id);
        if detached.is_null() {
            return false;
        }

        target.load(id);
        match target.insert_ref(detached.clone(), components.values().cloned()) {
            Ok(()) => {
                tracing::debug!(%id, "moved entity to another pool");
                true
            }
            Err(err) => {
                tracing::warn!(%id, %err, "target pool rejected entity, restoring");
                target.unload(id);
                source.load(id);
                if let Err(err) = source.insert_ref(detached, components.into_values()) {
                    tracing::error!(%id, %err, "failed to restore entity into its source pool");
                }

                false
            }
        }
    }

    /// Returns the number of committed entities across all pools
    pub fn len(&self) -> usize {
        self.pools().iter().map(|pool| pool.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every allocated id, including ids which are loaded in a pool
    /// but not yet committed
    pub fn allocated_ids(&self) -> Vec<Entity> {
        self.store.read().iter().collect_vec()
    }

    /// Returns the number of allocated ids
    pub fn num_allocated(&self) -> usize {
        self.store.read().len()
    }

    pub fn query(&self, filter: Filter) -> EntityIter<'_> {
        self.global.query(filter)
    }

    pub fn iter(&self) -> EntityIter<'_> {
        self.global.iter()
    }

    pub fn entities_with_all(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.global.entities_with_all(all)
    }

    pub fn entities_with_one(
        &self,
        one: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.global.entities_with_one(one)
    }

    pub fn entities_with_all_and_exclude(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
        exclude: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.global.entities_with_all_and_exclude(all, exclude)
    }

    pub fn entities_with_one_and_exclude(
        &self,
        one: impl IntoIterator<Item = ComponentKey>,
        exclude: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.global.entities_with_one_and_exclude(one, exclude)
    }

    pub fn entities_with_one_or_all(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
        one: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.global.entities_with_one_or_all(all, one)
    }

    pub fn entities_with_one_or_all_and_exclude(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
        one: impl IntoIterator<Item = ComponentKey>,
        exclude: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.global
            .entities_with_one_or_all_and_exclude(all, one, exclude)
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityManager")
            .field("global", &self.global)
            .field("pools", &self.pools.read().len())
            .finish()
    }
}
