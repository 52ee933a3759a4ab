use core::any::TypeId;
use std::collections::BTreeMap;

use crate::system::{BoxedSystem, Context, System};

/// Orders and drives a list of systems.
///
/// Systems run sequentially by ascending priority. A system added after the
/// manager was initialized is initialized before its first update.
#[derive(Default, Debug)]
pub struct EntitySystemManager {
    systems: Vec<BoxedSystem>,
    by_type: BTreeMap<TypeId, usize>,
    context: Option<Context>,
}

impl EntitySystemManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex(&mut self) {
        self.systems.sort_by_key(|v| v.priority());
        self.by_type = self
            .systems
            .iter()
            .enumerate()
            .map(|(i, v)| (v.system_type(), i))
            .collect();
    }

    /// Add a new system, replacing any system of the same type.
    pub fn add(&mut self, system: impl Into<BoxedSystem>) -> &mut Self {
        let system = system.into();
        if let Some(&index) = self.by_type.get(&system.system_type()) {
            let old = self.systems.remove(index);
            tracing::debug!(system = old.name(), "replacing system");
        }

        self.systems.push(system);
        self.reindex();
        self
    }

    /// Removes the system of type `S`
    pub fn remove<S: System>(&mut self) -> Option<BoxedSystem> {
        let index = *self.by_type.get(&TypeId::of::<S>())?;
        let system = self.systems.remove(index);
        self.reindex();
        Some(system)
    }

    pub fn get<S: System>(&self) -> Option<&S> {
        let &index = self.by_type.get(&TypeId::of::<S>())?;
        self.systems[index].downcast_ref()
    }

    pub fn get_mut<S: System>(&mut self) -> Option<&mut S> {
        let &index = self.by_type.get(&TypeId::of::<S>())?;
        self.systems[index].downcast_mut()
    }

    /// Enables or disables updates of the system of type `S`.
    ///
    /// A disabled system stays in the schedule but neither its update nor
    /// its post update hook runs. Returns false if no such system exists.
    pub fn set_processing<S: System>(&mut self, processing: bool) -> bool {
        match self.by_type.get(&TypeId::of::<S>()) {
            Some(&index) => {
                self.systems[index].set_processing(processing);
                true
            }
            None => false,
        }
    }

    pub fn contains<S: System>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<S>())
    }

    /// Iterate the systems in execution order
    pub fn iter(&self) -> impl Iterator<Item = &BoxedSystem> {
        self.systems.iter()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Initializes every system with the given context.
    ///
    /// Each system is initialized at most once, calling this again only
    /// initializes systems added since or which previously failed.
    #[tracing::instrument(level = "debug", skip_all, fields(systems = self.systems.len()))]
    pub fn initialize(&mut self, ctx: &Context) -> anyhow::Result<()> {
        self.context = Some(ctx.clone());
        self.initialize_pending()
    }

    fn initialize_pending(&mut self) -> anyhow::Result<()> {
        let Some(ctx) = &self.context else {
            return Ok(());
        };

        self.systems
            .iter_mut()
            .try_for_each(|system| system.initialize(ctx))
    }

    /// Updates every system in order.
    /// Returns the first error and aborts if a system fails.
    pub fn process(&mut self, delta: f32) -> anyhow::Result<()> {
        self.initialize_pending()?;
        self.systems
            .iter_mut()
            .try_for_each(|system| system.update(delta))
    }

    /// Runs the post update of every system in order
    pub fn post_process(&mut self, delta: f32) -> anyhow::Result<()> {
        self.systems
            .iter_mut()
            .try_for_each(|system| system.post_update(delta))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct Physics(Log);
    struct Render(Log);

    impl System for Physics {
        fn update(&mut self, _: f32) -> anyhow::Result<()> {
            self.0.lock().push("physics");
            Ok(())
        }
    }

    impl System for Render {
        fn update(&mut self, _: f32) -> anyhow::Result<()> {
            self.0.lock().push("render");
            Ok(())
        }

        fn post_update(&mut self, _: f32) -> anyhow::Result<()> {
            self.0.lock().push("present");
            Ok(())
        }
    }

    #[test]
    fn registration_order() {
        let log = Log::default();
        let mut manager = EntitySystemManager::new();
        manager
            .add(Physics(log.clone()))
            .add(Render(log.clone()));

        manager.process(0.0).unwrap();
        manager.post_process(0.0).unwrap();
        assert_eq!(*log.lock(), ["physics", "render", "present"]);
    }

    #[test]
    fn priority_override() {
        let log = Log::default();
        let mut manager = EntitySystemManager::new();
        manager
            .add(Physics(log.clone()))
            .add(BoxedSystem::new(Render(log.clone())).with_priority(0));

        manager.process(0.0).unwrap();
        assert_eq!(*log.lock(), ["render", "physics"]);
    }

    #[test]
    fn replace_same_type() {
        let first = Log::default();
        let second = Log::default();
        let mut manager = EntitySystemManager::new();
        manager.add(Physics(first.clone())).add(Physics(second.clone()));

        assert_eq!(manager.len(), 1);
        manager.process(0.0).unwrap();
        assert!(first.lock().is_empty());
        assert_eq!(*second.lock(), ["physics"]);

        assert!(manager.remove::<Physics>().is_some());
        assert!(manager.is_empty());
        assert!(manager.remove::<Physics>().is_none());
    }

    #[test]
    fn processing_flag() {
        let log = Log::default();
        let mut manager = EntitySystemManager::new();
        manager
            .add(Physics(log.clone()))
            .add(Render(log.clone()));

        assert!(manager.set_processing::<Physics>(false));
        manager.process(0.0).unwrap();
        assert_eq!(*log.lock(), ["render"]);
        assert_eq!(manager.len(), 2);
        assert!(manager.get::<Physics>().is_some());
    }
}
