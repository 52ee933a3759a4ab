use core::{
    fmt::{self, Debug},
    sync::atomic::{AtomicU8, Ordering},
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};

use parking_lot::RwLock;

use crate::{
    component::{boxed, downcast},
    error::Result,
    Component, ComponentBox, ComponentKey, Entity, EntityPool, Error,
};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct HandleFlags: u8 {
        /// The entity has not been destroyed
        const EXISTS = 1;
        /// The entity is resident in a pool
        const ACTIVE = 2;
    }
}

struct HandleState {
    flags: AtomicU8,
    pool: RwLock<Weak<EntityPool>>,
}

impl HandleState {
    fn flags(&self) -> HandleFlags {
        HandleFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    fn store(&self, flags: HandleFlags) {
        self.flags.store(flags.bits(), Ordering::Release)
    }
}

/// A reference to an entity which stays safe to use after the entity is
/// destroyed.
///
/// All data access is forwarded to the pool the entity currently lives in.
/// Clones share their state, so disposing one clone is observed by all of
/// them.
///
/// Reads return `None` or nothing once the entity no longer exists.
/// Mutations fail with [`Error::Inactive`] without touching storage when the
/// handle is not resident in a pool.
#[derive(Clone)]
pub struct EntityRef {
    id: Entity,
    state: Option<Arc<HandleState>>,
}

impl EntityRef {
    /// Create a handle for `id` owned by `pool`.
    ///
    /// The handle becomes active once committed with
    /// [`EntityPool::insert_ref`].
    pub fn new(id: Entity, pool: &EntityPool) -> Self {
        Self {
            id,
            state: Some(Arc::new(HandleState {
                flags: AtomicU8::new(HandleFlags::EXISTS.bits()),
                pool: RwLock::new(pool.downgrade()),
            })),
        }
    }

    /// The null handle.
    ///
    /// Refers to [`Entity::NULL`], never exists and has no pool.
    pub const fn null() -> Self {
        Self {
            id: Entity::NULL,
            state: None,
        }
    }

    /// Returns the entity id
    #[inline]
    pub fn id(&self) -> Entity {
        self.id
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.state.is_none()
    }

    /// Returns true until the entity is destroyed
    pub fn exists(&self) -> bool {
        self.flags().contains(HandleFlags::EXISTS)
    }

    /// Returns true while the entity is resident in a pool
    pub fn is_active(&self) -> bool {
        self.flags().contains(HandleFlags::ACTIVE)
    }

    fn flags(&self) -> HandleFlags {
        self.state
            .as_ref()
            .map(|v| v.flags())
            .unwrap_or(HandleFlags::empty())
    }

    /// Returns the pool the entity lives in
    pub fn pool(&self) -> Option<Arc<EntityPool>> {
        let state = self.state.as_ref()?;
        if !state.flags().contains(HandleFlags::EXISTS) {
            return None;
        }

        let pool = state.pool.read().upgrade();
        pool
    }

    fn active_pool(&self) -> Result<Arc<EntityPool>> {
        let state = self.state.as_ref().ok_or(Error::Inactive(self.id))?;
        if !state.flags().contains(HandleFlags::EXISTS | HandleFlags::ACTIVE) {
            return Err(Error::Inactive(self.id));
        }

        let pool = state.pool.read().upgrade();
        pool.ok_or(Error::Inactive(self.id))
    }

    /// Access a component
    pub fn get<T: Component>(&self) -> Option<Arc<T>> {
        self.pool()?.get_component::<T>(self.id)
    }

    /// Access a component by concrete or family key
    pub fn get_dyn(&self, key: ComponentKey) -> Option<ComponentBox> {
        self.pool()?.get_component_dyn(self.id, key)
    }

    /// Check if the entity currently has the specified component
    pub fn has<T: Component>(&self) -> bool {
        self.has_key(ComponentKey::of::<T>())
    }

    /// Check if the entity has a component of the concrete or family key
    pub fn has_key(&self, key: ComponentKey) -> bool {
        self.pool()
            .map(|pool| pool.has_component(self.id, key))
            .unwrap_or(false)
    }

    /// Returns all components of the entity
    pub fn components(&self) -> Vec<ComponentBox> {
        self.pool()
            .map(|pool| pool.iter_components(self.id))
            .unwrap_or_default()
    }

    /// Snapshot of the components by concrete type
    pub fn copy_components(&self) -> BTreeMap<ComponentKey, ComponentBox> {
        self.pool()
            .map(|pool| pool.copy_components(self.id))
            .unwrap_or_default()
    }

    /// Set a component for the entity, returning the replaced value
    pub fn set<T: Component>(&self, value: T) -> Result<Option<Arc<T>>> {
        let old = self.set_boxed(boxed(value))?;
        Ok(old.and_then(downcast))
    }

    /// Set a type erased component for the entity
    pub fn set_boxed(&self, value: ComponentBox) -> Result<Option<ComponentBox>> {
        self.active_pool()?.add_component(self.id, value)
    }

    /// Remove a component
    pub fn remove<T: Component>(&self) -> Result<Option<Arc<T>>> {
        let old = self.remove_key(ComponentKey::of::<T>())?;
        Ok(old.and_then(downcast))
    }

    /// Remove a component by its concrete or family key
    pub fn remove_key(&self, key: ComponentKey) -> Result<Option<ComponentBox>> {
        self.active_pool()?.remove_component(self.id, key)
    }

    /// Modify a component in place by replacing it with an updated copy.
    ///
    /// Returns false if the entity does not have the component.
    pub fn update<T: Component + Clone>(&self, f: impl FnOnce(&mut T)) -> Result<bool> {
        self.active_pool()?.update_component(self.id, f)
    }

    /// Destroys the entity.
    ///
    /// Only the first call on an active handle has an effect, subsequent
    /// calls and calls on the null handle do nothing.
    pub fn dispose(&self) {
        let Some(state) = &self.state else {
            return;
        };

        let live = HandleFlags::EXISTS | HandleFlags::ACTIVE;
        let taken = state
            .flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (HandleFlags::from_bits_truncate(bits) == live).then_some(0)
            })
            .is_ok();

        if taken {
            let pool = state.pool.read().upgrade();
            if let Some(pool) = pool {
                pool.destroy(self.id);
            }
        }
    }

    /// Marks the handle as resident in `pool`
    pub(crate) fn attach(&self, pool: Weak<EntityPool>) {
        if let Some(state) = &self.state {
            *state.pool.write() = pool;
            state.store(HandleFlags::EXISTS | HandleFlags::ACTIVE);
        }
    }

    /// Marks the handle as removed from its pool without being destroyed
    pub(crate) fn deactivate(&self) {
        if let Some(state) = &self.state {
            state.flags.fetch_and(!HandleFlags::ACTIVE.bits(), Ordering::AcqRel);
        }
    }

    /// Marks the entity as destroyed
    pub(crate) fn invalidate(&self) {
        if let Some(state) = &self.state {
            state.store(HandleFlags::empty());
        }
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        (!self.exists() && !other.exists()) || self.id == other.id
    }
}

impl Eq for EntityRef {}

impl Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.id).finish()
    }
}

impl From<&EntityRef> for Entity {
    fn from(value: &EntityRef) -> Self {
        value.id
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(f32);
    impl Component for Health {}

    #[test]
    fn null_handle() {
        let null = EntityRef::null();
        assert!(null.is_null());
        assert!(!null.exists());
        assert!(!null.is_active());
        assert_eq!(null.id(), Entity::NULL);
        assert!(null.pool().is_none());
        assert!(null.get::<Health>().is_none());
        assert!(null.components().is_empty());
        assert_eq!(null.set(Health(1.0)), Err(Error::Inactive(Entity::NULL)));
        null.dispose();
        null.dispose();
        assert_eq!(null, EntityRef::default());
    }

    #[test]
    fn handle_ops() {
        let pool = EntityPool::new();
        let id = pool.create_entity();
        pool.insert_ref(EntityRef::new(id, &pool), [boxed(Health(10.0))])
            .unwrap();

        let entity = pool.get_entity(id);
        assert!(entity.exists());
        assert!(entity.is_active());
        assert_eq!(entity.get::<Health>().as_deref(), Some(&Health(10.0)));
        assert!(entity.has::<Health>());

        let old = entity.set(Health(5.0)).unwrap();
        assert_eq!(old.as_deref(), Some(&Health(10.0)));

        assert!(entity.update::<Health>(|v| v.0 += 1.0).unwrap());
        assert_eq!(entity.get::<Health>().as_deref(), Some(&Health(6.0)));

        let removed = entity.remove::<Health>().unwrap();
        assert_eq!(removed.as_deref(), Some(&Health(6.0)));
        assert!(!entity.has::<Health>());
        assert!(!entity.update::<Health>(|v| v.0 += 1.0).unwrap());
    }

    #[test]
    fn dispose_is_idempotent() {
        let pool = EntityPool::new();
        let id = pool.create_entity();
        pool.insert_ref(EntityRef::new(id, &pool), [boxed(Health(1.0))])
            .unwrap();

        let entity = pool.get_entity(id);
        let other = entity.clone();

        entity.dispose();
        assert!(!entity.exists());
        assert!(!entity.is_active());
        assert!(!other.exists());
        assert!(pool.get_entity(id).is_null());

        entity.dispose();
        other.dispose();
        assert!(!entity.exists());
        assert!(!entity.is_active());

        assert_eq!(entity.set(Health(2.0)), Err(Error::Inactive(id)));
        assert!(entity.get::<Health>().is_none());
        assert!(pool.get_component::<Health>(id).is_none());
    }

    #[test]
    fn equality() {
        let pool = EntityPool::new();
        let a = pool.create_entity();
        let b = pool.create_entity();
        pool.insert_ref(EntityRef::new(a, &pool), Vec::new()).unwrap();
        pool.insert_ref(EntityRef::new(b, &pool), Vec::new()).unwrap();

        let a = pool.get_entity(a);
        let b = pool.get_entity(b);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        a.dispose();
        b.dispose();
        // Destroyed handles are all alike
        assert_eq!(a, b);
        assert_eq!(a, EntityRef::null());
    }
}
