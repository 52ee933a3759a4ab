use std::sync::Arc;

use crate::{
    schedule::EntitySystemManager,
    system::{BoxedSystem, Context},
    EntityManager,
};

/// Composes an [`EntityManager`] with the systems operating on it.
///
/// The manager is registered in the world's [`Context`], so systems resolve
/// it with `ctx.expect::<EntityManager>()` during initialization.
#[derive(Debug)]
pub struct World {
    entities: Arc<EntityManager>,
    systems: EntitySystemManager,
    context: Context,
}

impl World {
    pub fn new() -> Self {
        Self::from_manager(EntityManager::new())
    }

    /// Creates a world pre-sized for `capacity` entities
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_manager(EntityManager::with_capacity(capacity))
    }

    fn from_manager(manager: EntityManager) -> Self {
        let entities = Arc::new(manager);
        let mut context = Context::new();
        context.insert(entities.clone());

        Self {
            entities,
            systems: EntitySystemManager::new(),
            context,
        }
    }

    pub fn entities(&self) -> &Arc<EntityManager> {
        &self.entities
    }

    pub fn systems(&self) -> &EntitySystemManager {
        &self.systems
    }

    pub fn systems_mut(&mut self) -> &mut EntitySystemManager {
        &mut self.systems
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Register additional collaborators before initializing.
    ///
    /// Systems which are already initialized do not observe later changes.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn add_system(&mut self, system: impl Into<BoxedSystem>) -> &mut Self {
        self.systems.add(system);
        self
    }

    /// Initializes every system
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        self.systems.initialize(&self.context)
    }

    /// Advances one frame, initializing any system which was not yet
    pub fn update(&mut self, delta: f32) -> anyhow::Result<()> {
        if self.systems.iter().any(|v| !v.is_initialized()) {
            self.initialize()?;
        }

        self.systems.process(delta)?;
        self.systems.post_process(delta)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{system::System, Component, EntityBuilder};

    #[derive(Debug, Clone, PartialEq)]
    struct Age(u32);
    impl Component for Age {}

    #[derive(Default)]
    struct Aging {
        manager: Option<Arc<EntityManager>>,
    }

    impl System for Aging {
        fn initialize(&mut self, ctx: &Context) -> anyhow::Result<()> {
            self.manager = Some(ctx.expect::<EntityManager>()?);
            Ok(())
        }

        fn update(&mut self, _: f32) -> anyhow::Result<()> {
            let manager = self.manager.as_ref().ok_or_else(|| anyhow::anyhow!("not initialized"))?;
            for entity in manager.entities_with_all([crate::key::<Age>()]) {
                entity.update::<Age>(|v| v.0 += 1)?;
            }

            Ok(())
        }
    }

    #[test]
    fn systems_resolve_manager() {
        let mut world = World::new();
        let entity = world.entities().build(EntityBuilder::new().set(Age(0)));

        world.add_system(Aging::default());
        world.update(1.0).unwrap();
        world.update(1.0).unwrap();

        assert_eq!(entity.get::<Age>().as_deref(), Some(&Age(2)));
    }

    #[test]
    fn missing_collaborator_fails_initialization() {
        struct NeedsString;
        impl System for NeedsString {
            fn initialize(&mut self, ctx: &Context) -> anyhow::Result<()> {
                ctx.expect::<String>()?;
                Ok(())
            }

            fn update(&mut self, _: f32) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let mut world = World::new();
        world.add_system(NeedsString);
        assert!(world.update(0.0).is_err());

        world.context_mut().insert(Arc::new(String::from("ready")));
        assert!(world.update(0.0).is_ok());
    }
}
