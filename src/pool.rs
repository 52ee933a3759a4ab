use std::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};

use itertools::Itertools;
use parking_lot::RwLock;

use crate::{
    component::boxed,
    components::SingleComponent,
    entity::EntityStore,
    error::Result,
    events::{EntityEvent, EventSubscriber},
    filter::Filter,
    query::EntityIter,
    table::ComponentTable,
    Component, ComponentBox, ComponentKey, Entity, EntityRef, Error, Urn,
};

/// Id arena shared by every pool of a manager
pub(crate) type SharedStore = Arc<RwLock<EntityStore>>;

struct PoolSlot {
    id: Entity,
    /// None until the entity is committed with [`EntityPool::insert_ref`]
    handle: Option<EntityRef>,
}

type Slots = Vec<Option<PoolSlot>>;

fn slot_of(slots: &Slots, id: Entity) -> Option<&PoolSlot> {
    slots
        .get(id.index() as usize)?
        .as_ref()
        .filter(|slot| slot.id == id)
}

fn is_resident(slots: &Slots, id: Entity) -> bool {
    slot_of(slots, id).is_some_and(|slot| slot.handle.is_some())
}

fn slot_mut(slots: &mut Slots, index: usize) -> &mut Option<PoolSlot> {
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }

    &mut slots[index]
}

/// Owns a set of entities and their components.
///
/// Ids are allocated from an [`EntityStore`] which may be shared with other
/// pools, so an entity can be relocated between pools of the same manager
/// without changing its id.
///
/// Each pool keeps a registry of the urns claimed through
/// [`SingleComponent`]; at most one live entity per pool holds a given urn.
///
/// Locks are always acquired in the order singleton registry, id store,
/// slots, component table. Events are emitted after all locks are released.
pub struct EntityPool {
    this: Weak<EntityPool>,
    store: SharedStore,
    slots: RwLock<Slots>,
    table: ComponentTable,
    singles: RwLock<BTreeMap<Urn, Entity>>,
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EntityPool {
    /// Creates a standalone pool with its own id arena
    pub fn new() -> Arc<Self> {
        Self::with_capacity(0)
    }

    /// Creates a standalone pool pre-sized for `capacity` entities
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Self::from_store(
            Arc::new(RwLock::new(EntityStore::with_capacity(capacity))),
            capacity,
        )
    }

    pub(crate) fn from_store(store: SharedStore, capacity: usize) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            store,
            slots: RwLock::new(Vec::with_capacity(capacity + 1)),
            table: ComponentTable::new(),
            singles: RwLock::new(BTreeMap::new()),
            subscribers: RwLock::new(Vec::new()),
        })
    }

    pub(crate) fn downgrade(&self) -> Weak<Self> {
        self.this.clone()
    }

    pub(crate) fn shares_store(&self, other: &EntityPool) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    pub(crate) fn load(&self, id: Entity) {
        let mut slots = self.slots.write();
        *slot_mut(&mut slots, id.index() as usize) = Some(PoolSlot { id, handle: None });
    }

    /// Forgets a loaded but uncommitted id without releasing it
    pub(crate) fn unload(&self, id: Entity) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(id.index() as usize) else {
            return false;
        };

        if !matches!(slot, Some(v) if v.id == id && v.handle.is_none()) {
            return false;
        }

        *slot = None;
        true
    }

    /// Allocates a fresh id and marks it as loaded in this pool.
    ///
    /// The entity becomes visible once committed with [`Self::insert_ref`].
    pub fn create_entity(&self) -> Entity {
        let id = self.store.write().spawn();
        self.load(id);
        tracing::trace!(%id, "allocated entity");
        id
    }

    /// Marks an already minted, currently unused id as loaded in this pool.
    ///
    /// Returns false if the id was never allocated, is in use, or is older
    /// than the latest generation of its slot.
    pub fn register_id(&self, id: Entity) -> bool {
        match self.try_register_id(id) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(%id, %err, "id registration rejected");
                false
            }
        }
    }

    /// Same as [`Self::register_id`], returning the reason of a rejection
    pub fn try_register_id(&self, id: Entity) -> Result<()> {
        self.store.write().spawn_at(id)?;
        self.load(id);
        Ok(())
    }

    /// Commits `handle` with an initial set of components.
    ///
    /// The id must be loaded in this pool through [`Self::create_entity`] or
    /// [`Self::register_id`], otherwise [`Error::NotLoaded`] is returned. An
    /// id loaded in another pool sharing the id arena is never committed here.
    ///
    /// If any [`SingleComponent`] in the set names a urn already held by
    /// another entity, nothing is written and [`Error::UrnClaimed`] is
    /// returned. When several components share a concrete type the last one
    /// wins.
    ///
    /// On success the handle becomes active and resident in this pool.
    pub fn insert_ref(
        &self,
        handle: EntityRef,
        components: impl IntoIterator<Item = ComponentBox>,
    ) -> Result<()> {
        let id = handle.id();
        if handle.is_null() || !handle.exists() {
            return Err(Error::NoSuchEntity(id));
        }

        let components: BTreeMap<ComponentKey, ComponentBox> = components
            .into_iter()
            .map(|value| (value.key(), value))
            .collect();

        let urn = components
            .get(&ComponentKey::of::<SingleComponent>())
            .and_then(|v| v.downcast_ref::<SingleComponent>())
            .map(|v| v.urn().clone());

        {
            let mut singles = self.singles.write();

            if !self.store.read().is_alive(id) {
                return Err(Error::NoSuchEntity(id));
            }

            if let Some(urn) = &urn {
                if let Some(&owner) = singles.get(urn) {
                    if owner != id {
                        tracing::warn!(%id, %urn, %owner, "singleton already claimed, discarding entity");
                        return Err(Error::UrnClaimed {
                            urn: urn.clone(),
                            owner,
                        });
                    }
                }
            }

            let mut slots = self.slots.write();
            let slot = slot_mut(&mut slots, id.index() as usize);
            match slot {
                Some(v) if v.id == id && v.handle.is_none() => {}
                Some(v) if v.id == id => return Err(Error::EntityOccupied(id)),
                _ => return Err(Error::NotLoaded(id)),
            }

            *slot = Some(PoolSlot {
                id,
                handle: Some(handle.clone()),
            });

            for value in components.into_values() {
                self.table.put(id, value);
            }

            if let Some(urn) = urn {
                singles.insert(urn, id);
            }

            handle.attach(self.downgrade());
        }

        tracing::debug!(%id, "created entity");
        self.emit(EntityEvent::Created(id));

        Ok(())
    }

    /// Returns the handle of a committed entity, or the null handle
    pub fn get_entity(&self, id: Entity) -> EntityRef {
        if id.is_null() {
            return EntityRef::null();
        }

        slot_of(&self.slots.read(), id)
            .and_then(|slot| slot.handle.clone())
            .unwrap_or_else(EntityRef::null)
    }

    /// Returns true if `id` is committed to this pool
    pub fn contains(&self, id: Entity) -> bool {
        is_resident(&self.slots.read(), id)
    }

    /// Destroys an entity loaded in this pool.
    ///
    /// Frees the id, purges every component, releases claimed urns and
    /// invalidates the handle. Returns false if `id` is not loaded here.
    pub fn destroy(&self, id: Entity) -> bool {
        let slot = {
            let mut singles = self.singles.write();
            let mut store = self.store.write();
            let mut slots = self.slots.write();

            let Some(slot) = slots.get_mut(id.index() as usize) else {
                return false;
            };

            if !matches!(slot, Some(v) if v.id == id) {
                return false;
            }

            let slot = slot.take();
            if let Err(err) = store.despawn(id) {
                tracing::error!(%id, %err, "loaded entity was not alive in the store");
            }

            singles.retain(|_, owner| *owner != id);
            slot
        };

        let removed = self.table.remove_all(id);

        if let Some(handle) = slot.and_then(|v| v.handle) {
            handle.invalidate();
        }

        tracing::debug!(%id, removed, "destroyed entity");
        self.emit(EntityEvent::Destroyed(id));
        true
    }

    /// Removes a committed entity from this pool without freeing its id.
    ///
    /// The components are dropped from this pool and the returned handle is
    /// left existing but inactive, ready to be committed to another pool.
    /// Returns the null handle if `id` is not committed here.
    pub fn detach(&self, id: Entity) -> EntityRef {
        let handle = {
            let mut singles = self.singles.write();
            let mut slots = self.slots.write();

            let Some(slot) = slots.get_mut(id.index() as usize) else {
                return EntityRef::null();
            };

            if !matches!(slot, Some(v) if v.id == id && v.handle.is_some()) {
                return EntityRef::null();
            }

            let handle = slot.take().and_then(|v| v.handle);

            singles.retain(|_, owner| *owner != id);
            handle
        };

        self.table.remove_all(id);

        let handle = handle.unwrap_or_else(EntityRef::null);
        handle.deactivate();
        handle
    }

    /// Returns the entity claiming `urn`, or the null handle
    pub fn get_single_entity(&self, urn: &Urn) -> EntityRef {
        let owner = self.singles.read().get(urn).copied();
        owner
            .map(|id| self.get_entity(id))
            .unwrap_or_else(EntityRef::null)
    }

    /// Returns every claimed urn and its owner
    pub fn single_entities(&self) -> Vec<(Urn, Entity)> {
        self.singles
            .read()
            .iter()
            .map(|(urn, &id)| (urn.clone(), id))
            .collect_vec()
    }

    pub fn get_component<T: Component>(&self, id: Entity) -> Option<Arc<T>> {
        self.table.get::<T>(id)
    }

    /// Access a component by concrete or family key
    pub fn get_component_dyn(&self, id: Entity, key: ComponentKey) -> Option<ComponentBox> {
        self.table.get_dyn(id, key)
    }

    pub fn has_component(&self, id: Entity, key: ComponentKey) -> bool {
        self.table.has(id, key)
    }

    /// Attaches a component to a committed entity, returning the replaced
    /// value of the same concrete type.
    ///
    /// Adding a [`SingleComponent`] claims its urn, releasing any urn
    /// previously claimed by the entity.
    pub fn add_component(&self, id: Entity, value: ComponentBox) -> Result<Option<ComponentBox>> {
        let key = value.key();

        let old = if let Some(single) = value.downcast_ref::<SingleComponent>() {
            let urn = single.urn().clone();
            let mut singles = self.singles.write();
            let slots = self.slots.read();
            if !is_resident(&slots, id) {
                return Err(Error::NoSuchEntity(id));
            }

            if let Some(&owner) = singles.get(&urn) {
                if owner != id {
                    tracing::warn!(%id, %urn, %owner, "singleton already claimed");
                    return Err(Error::UrnClaimed { urn, owner });
                }
            }

            let old = self.table.put(id, value);
            if let Some(prev) = old.as_ref().and_then(|v| v.downcast_ref::<SingleComponent>()) {
                singles.remove(prev.urn());
            }

            singles.insert(urn, id);
            old
        } else {
            let slots = self.slots.read();
            if !is_resident(&slots, id) {
                return Err(Error::NoSuchEntity(id));
            }

            self.table.put(id, value)
        };

        self.emit(match old {
            Some(_) => EntityEvent::ComponentChanged(id, key),
            None => EntityEvent::ComponentAdded(id, key),
        });

        Ok(old)
    }

    /// Removes the component of the concrete or family `key` from a committed
    /// entity
    pub fn remove_component(&self, id: Entity, key: ComponentKey) -> Result<Option<ComponentBox>> {
        let old = {
            let mut singles = (key == ComponentKey::of::<SingleComponent>())
                .then(|| self.singles.write());
            let slots = self.slots.read();
            if !is_resident(&slots, id) {
                return Err(Error::NoSuchEntity(id));
            }

            let old = self.table.remove(id, key);
            if let (Some(singles), Some(single)) = (
                &mut singles,
                old.as_ref().and_then(|v| v.downcast_ref::<SingleComponent>()),
            ) {
                singles.remove(single.urn());
            }

            old
        };

        if let Some(old) = &old {
            self.emit(EntityEvent::ComponentRemoved(id, old.key()));
        }

        Ok(old)
    }

    /// Replaces a component with an updated copy.
    ///
    /// Returns false if the entity does not hold a `T`.
    pub fn update_component<T: Component + Clone>(
        &self,
        id: Entity,
        f: impl FnOnce(&mut T),
    ) -> Result<bool> {
        if !self.contains(id) {
            return Err(Error::NoSuchEntity(id));
        }

        let Some(current) = self.get_component::<T>(id) else {
            return Ok(false);
        };

        let mut value = T::clone(&current);
        f(&mut value);
        self.add_component(id, boxed(value))?;

        Ok(true)
    }

    /// Returns all components of an entity
    pub fn iter_components(&self, id: Entity) -> Vec<ComponentBox> {
        self.table.components_of(id).into_values().collect()
    }

    /// Snapshot of the components of an entity by concrete type.
    ///
    /// The values are shared, not cloned, so committing them elsewhere does
    /// not create new component instances.
    pub fn copy_components(&self, id: Entity) -> BTreeMap<ComponentKey, ComponentBox> {
        self.table.components_of(id)
    }

    /// Returns the underlying component storage
    pub fn components(&self) -> &ComponentTable {
        &self.table
    }

    fn resident_ids(&self) -> Vec<Entity> {
        self.slots
            .read()
            .iter()
            .flatten()
            .filter(|slot| slot.handle.is_some())
            .map(|slot| slot.id)
            .collect_vec()
    }

    /// Iterates the committed entities matching `filter`
    pub fn query(&self, filter: Filter) -> EntityIter<'_> {
        EntityIter::new(self, self.resident_ids(), filter)
    }

    /// Iterates every committed entity
    pub fn iter(&self) -> EntityIter<'_> {
        self.query(Filter::new())
    }

    /// Entities holding every key in `all`
    pub fn entities_with_all(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.query(Filter::new().all_of(all))
    }

    /// Entities holding at least one key in `one`
    pub fn entities_with_one(
        &self,
        one: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.query(Filter::new().one_of(one))
    }

    pub fn entities_with_all_and_exclude(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
        exclude: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.query(Filter::new().all_of(all).none_of(exclude))
    }

    pub fn entities_with_one_and_exclude(
        &self,
        one: impl IntoIterator<Item = ComponentKey>,
        exclude: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.query(Filter::new().one_of(one).none_of(exclude))
    }

    /// Entities holding every key in `all` and at least one key in `one`
    pub fn entities_with_one_or_all(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
        one: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.query(Filter::new().all_of(all).one_of(one))
    }

    pub fn entities_with_one_or_all_and_exclude(
        &self,
        all: impl IntoIterator<Item = ComponentKey>,
        one: impl IntoIterator<Item = ComponentKey>,
        exclude: impl IntoIterator<Item = ComponentKey>,
    ) -> EntityIter<'_> {
        self.query(Filter::new().all_of(all).one_of(one).none_of(exclude))
    }

    /// Returns the number of committed entities
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .iter()
            .flatten()
            .filter(|slot| slot.handle.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a receiver for the lifecycle events of this pool
    pub fn subscribe(&self, subscriber: impl EventSubscriber) {
        self.subscribers.write().push(Arc::new(subscriber))
    }

    fn emit(&self, event: EntityEvent) {
        let subscribers = self.subscribers.read().clone();
        if subscribers.is_empty() {
            return;
        }

        let mut stale = false;
        for subscriber in &subscribers {
            if subscriber.is_connected() {
                subscriber.on_event(&event);
            } else {
                stale = true;
            }
        }

        if stale {
            self.subscribers.write().retain(|v| v.is_connected());
        }
    }
}

impl core::fmt::Debug for EntityPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityPool")
            .field("len", &self.len())
            .field("components", &self.table)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::key;

    #[derive(Debug, Clone, PartialEq)]
    struct Name(&'static str);
    impl Component for Name {}

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    fn spawn(pool: &EntityPool, components: Vec<ComponentBox>) -> Entity {
        let id = pool.create_entity();
        pool.insert_ref(EntityRef::new(id, pool), components).unwrap();
        id
    }

    #[test]
    fn created_but_uncommitted() {
        let pool = EntityPool::new();
        let id = pool.create_entity();

        assert!(pool.get_entity(id).is_null());
        assert!(!pool.contains(id));
        assert_eq!(pool.iter().count(), 0);

        // Loaded ids can be released before they are committed
        assert!(pool.destroy(id));
        assert!(!pool.destroy(id));
    }

    #[test]
    fn destroy_purges() {
        let pool = EntityPool::new();
        let id = spawn(&pool, vec![boxed(Name("a")), boxed(Health(3))]);
        let handle = pool.get_entity(id);

        assert!(pool.destroy(id));
        assert!(pool.get_component::<Name>(id).is_none());
        assert!(pool.get_component::<Health>(id).is_none());
        assert!(pool.get_entity(id).is_null());
        assert!(!handle.exists());
        assert_eq!(pool.components().num_entities(), 0);

        assert!(matches!(
            pool.add_component(id, boxed(Health(1))),
            Err(Error::NoSuchEntity(v)) if v == id
        ));
    }

    #[test]
    fn register_id() {
        let pool = EntityPool::new();
        let id = spawn(&pool, vec![]);

        // In use
        assert!(!pool.register_id(id));

        pool.destroy(id);
        // Same generation can not be revived
        assert!(!pool.register_id(id));
        // Never minted
        assert!(!pool.register_id(Entity::from_parts(42, 1)));

        let next = Entity::from_parts(id.index(), id.gen() + 1);
        assert!(pool.register_id(next));
        pool.insert_ref(EntityRef::new(next, &pool), [boxed(Name("revived"))])
            .unwrap();
        assert_eq!(pool.get_component::<Name>(next).as_deref(), Some(&Name("revived")));

        // The reused index gets a fresh generation
        let fresh = pool.create_entity();
        assert_ne!(fresh.index(), id.index());
    }

    #[test]
    fn singleton_urns() {
        let pool = EntityPool::new();
        let urn: Urn = "engine:entities#camera".parse().unwrap();

        let first = spawn(
            &pool,
            vec![boxed(SingleComponent::new(urn.clone())), boxed(Name("first"))],
        );
        assert_eq!(pool.get_single_entity(&urn).id(), first);

        let second = pool.create_entity();
        let res = pool.insert_ref(
            EntityRef::new(second, &pool),
            [boxed(SingleComponent::new(urn.clone())), boxed(Name("second"))],
        );

        assert_eq!(res, Err(Error::UrnClaimed { urn: urn.clone(), owner: first }));
        assert!(pool.get_component::<Name>(second).is_none());
        assert!(pool.get_entity(second).is_null());

        // Claiming through add_component is rejected the same way
        let third = spawn(&pool, vec![]);
        assert!(matches!(
            pool.add_component(third, boxed(SingleComponent::new(urn.clone()))),
            Err(Error::UrnClaimed { .. })
        ));

        // Removing the marker releases the urn
        pool.remove_component(first, key::<SingleComponent>()).unwrap();
        assert!(pool.get_single_entity(&urn).is_null());
        pool.add_component(third, boxed(SingleComponent::new(urn.clone())))
            .unwrap();
        assert_eq!(pool.get_single_entity(&urn).id(), third);

        pool.destroy(third);
        assert!(pool.get_single_entity(&urn).is_null());
        assert!(pool.single_entities().is_empty());
    }

    #[test]
    fn detach_keeps_id() {
        let pool = EntityPool::new();
        let id = spawn(&pool, vec![boxed(Health(1))]);

        let handle = pool.detach(id);
        assert_eq!(handle.id(), id);
        assert!(handle.exists());
        assert!(!handle.is_active());
        assert!(pool.get_entity(id).is_null());
        assert!(pool.get_component::<Health>(id).is_none());
        assert_eq!(handle.set(Health(2)), Err(Error::Inactive(id)));

        // A detached id is no longer loaded
        assert_eq!(
            pool.insert_ref(handle.clone(), [boxed(Health(5))]),
            Err(Error::NotLoaded(id))
        );

        pool.load(id);
        pool.insert_ref(handle.clone(), [boxed(Health(5))]).unwrap();
        assert!(handle.is_active());
        assert_eq!(handle.get::<Health>().as_deref(), Some(&Health(5)));
    }

    #[test]
    fn ids_loaded_elsewhere_are_rejected() {
        let pool = EntityPool::new();
        let staging = EntityPool::from_store(pool.store.clone(), 0);

        let id = staging.create_entity();
        assert_eq!(
            pool.insert_ref(EntityRef::new(id, &pool), [boxed(Health(1))]),
            Err(Error::NotLoaded(id))
        );
        assert!(!pool.contains(id));
        assert!(pool.get_component::<Health>(id).is_none());

        // The owning pool still commits and releases it
        staging
            .insert_ref(EntityRef::new(id, &staging), [boxed(Health(2))])
            .unwrap();
        assert!(staging.destroy(id));
        assert!(!pool.store.read().is_alive(id));

        let never = Entity::from_parts(7, 1);
        assert_eq!(
            pool.insert_ref(EntityRef::new(never, &pool), Vec::new()),
            Err(Error::NoSuchEntity(never))
        );

        let loaded = pool.create_entity();
        assert!(pool.unload(loaded));
        assert!(!pool.unload(loaded));
        assert!(pool.store.read().is_alive(loaded));
    }

    #[test]
    fn queries() {
        let pool = EntityPool::new();
        let a = spawn(&pool, vec![boxed(Name("a"))]);
        let ab = spawn(&pool, vec![boxed(Health(1)), boxed(Name("ab"))]);
        let b = spawn(&pool, vec![boxed(Health(2))]);

        let ids = |iter: EntityIter| iter.map(|v| v.id()).collect_vec();

        assert_eq!(ids(pool.entities_with_all([key::<Name>(), key::<Health>()])), [ab]);
        assert_eq!(ids(pool.entities_with_one([key::<Name>(), key::<Health>()])), [a, ab, b]);
        assert_eq!(
            ids(pool.entities_with_one_and_exclude(
                [key::<Name>(), key::<Health>()],
                [key::<Health>()]
            )),
            [a]
        );
        assert_eq!(
            ids(pool.entities_with_all_and_exclude([key::<Health>()], [key::<Name>()])),
            [b]
        );
        assert_eq!(
            ids(pool.entities_with_one_or_all([key::<Name>()], [key::<Health>()])),
            [ab]
        );
        assert_eq!(
            ids(pool.entities_with_one_or_all_and_exclude(
                [key::<Health>()],
                [key::<Health>(), key::<Name>()],
                [key::<Name>()]
            )),
            [b]
        );
        assert_eq!(pool.len(), 3);
    }
}
