use std::{collections::BTreeMap, mem};

use crate::{
    component::boxed, components::SingleComponent, error::Result, Component, ComponentBox,
    ComponentKey, Entity, EntityPool, EntityRef, Urn,
};

/// Accumulates a set of components and commits them as a new entity.
///
/// Setting a component of a type already present replaces it.
#[derive(Debug, Default)]
pub struct EntityBuilder {
    components: BTreeMap<ComponentKey, ComponentBox>,
    id: Option<Entity>,
}

impl EntityBuilder {
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
            id: None,
        }
    }

    /// Starts from an existing set of components, such as one obtained from
    /// [`EntityPool::copy_components`]
    pub fn from_components(components: BTreeMap<ComponentKey, ComponentBox>) -> Self {
        Self {
            components,
            id: None,
        }
    }

    /// Sets the component of the entity.
    pub fn set<T: Component>(&mut self, value: T) -> &mut Self {
        self.set_boxed(boxed(value))
    }

    /// Sets a type erased component
    pub fn set_boxed(&mut self, value: ComponentBox) -> &mut Self {
        self.components.insert(value.key(), value);
        self
    }

    /// Sets a component with the default value of `T`
    pub fn set_default<T: Component + Default>(&mut self) -> &mut Self {
        self.set(T::default())
    }

    /// Claims `urn` for the entity through a [`SingleComponent`]
    pub fn single(&mut self, urn: Urn) -> &mut Self {
        self.set(SingleComponent::new(urn))
    }

    /// Return a reference to the stored component.
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.components
            .get(&ComponentKey::of::<T>())?
            .downcast_ref::<T>()
    }

    /// Removes a previously set component
    pub fn remove<T: Component>(&mut self) -> &mut Self {
        self.components.remove(&ComponentKey::of::<T>());
        self
    }

    /// Returns true if a component of type `T` has been set
    pub fn has<T: Component>(&self) -> bool {
        self.components.contains_key(&ComponentKey::of::<T>())
    }

    /// Commit the entity with a specific, previously minted id rather than a
    /// freshly allocated one.
    pub fn with_id(&mut self, id: Entity) -> &mut Self {
        self.id = Some(id);
        self
    }

    /// Commits the entity into the pool.
    ///
    /// Returns the null handle if the pinned id could not be registered or
    /// if the pool rejected the components. See [`Self::try_build`] for the
    /// reason.
    pub fn build(&mut self, pool: &EntityPool) -> EntityRef {
        match self.try_build(pool) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::debug!(%err, "failed to build entity");
                EntityRef::null()
            }
        }
    }

    /// Commits the entity into the pool.
    ///
    /// Clears the builder and allows it to be used again. On failure no
    /// component is written and an allocated id is released.
    pub fn try_build(&mut self, pool: &EntityPool) -> Result<EntityRef> {
        let components = mem::take(&mut self.components);

        let id = match self.id.take() {
            Some(id) => {
                pool.try_register_id(id)?;
                id
            }
            None => pool.create_entity(),
        };

        if let Err(err) = pool.insert_ref(EntityRef::new(id, pool), components.into_values()) {
            pool.destroy(id);
            return Err(err);
        }

        Ok(pool.get_entity(id))
    }
}
