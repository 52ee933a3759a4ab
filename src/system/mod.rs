mod context;

use core::{
    any::{Any, TypeId},
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::Context as _;

pub use context::Context;

/// Gives access to the concrete type behind a `dyn System`
#[doc(hidden)]
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of per-frame logic.
///
/// Collaborators such as the [`crate::EntityManager`] are resolved from the
/// [`Context`] in [`System::initialize`], which runs exactly once before the
/// first update.
pub trait System: AsAny + Send + Sync + 'static {
    fn initialize(&mut self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per frame
    fn update(&mut self, delta: f32) -> anyhow::Result<()>;

    /// Called once per frame after every system has been updated
    fn post_update(&mut self, _delta: f32) -> anyhow::Result<()> {
        Ok(())
    }
}

static NEXT_PRIORITY: AtomicU64 = AtomicU64::new(0);

/// A type erased system along with its scheduling state.
///
/// The priority is drawn from a process wide counter when the system is
/// boxed, so systems are ordered by creation unless overridden with
/// [`Self::with_priority`].
pub struct BoxedSystem {
    system: Box<dyn System>,
    type_id: TypeId,
    name: String,
    priority: u64,
    processing: bool,
    initialized: bool,
}

impl BoxedSystem {
    pub fn new<S: System>(system: S) -> Self {
        Self {
            system: Box::new(system),
            type_id: TypeId::of::<S>(),
            name: tynm::type_name::<S>(),
            priority: NEXT_PRIORITY.fetch_add(1, Ordering::Relaxed),
            processing: true,
            initialized: false,
        }
    }

    /// Overrides the ordering key. Lower runs first.
    pub fn with_priority(mut self, priority: u64) -> Self {
        self.priority = priority;
        self
    }

    pub fn priority(&self) -> u64 {
        self.priority
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type id of the concrete system
    pub fn system_type(&self) -> TypeId {
        self.type_id
    }

    /// Returns false if the system is currently skipped during updates
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn set_processing(&mut self, processing: bool) {
        self.processing = processing
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn downcast_ref<S: System>(&self) -> Option<&S> {
        (*self.system).as_any().downcast_ref::<S>()
    }

    pub fn downcast_mut<S: System>(&mut self) -> Option<&mut S> {
        (*self.system).as_any_mut().downcast_mut::<S>()
    }

    pub(crate) fn initialize(&mut self, ctx: &Context) -> anyhow::Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.system
            .initialize(ctx)
            .with_context(|| format!("Failed to initialize system {}", self.name))?;

        self.initialized = true;
        Ok(())
    }

    pub(crate) fn update(&mut self, delta: f32) -> anyhow::Result<()> {
        if !self.processing {
            return Ok(());
        }

        tracing::trace!(system = %self.name, delta, "update");
        self.system
            .update(delta)
            .with_context(|| format!("Failed to update system {}", self.name))
    }

    pub(crate) fn post_update(&mut self, delta: f32) -> anyhow::Result<()> {
        if !self.processing {
            return Ok(());
        }

        tracing::trace!(system = %self.name, delta, "post update");
        self.system
            .post_update(delta)
            .with_context(|| format!("Failed to post update system {}", self.name))
    }
}

impl<S: System> From<S> for BoxedSystem {
    fn from(system: S) -> Self {
        Self::new(system)
    }
}

impl fmt::Debug for BoxedSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedSystem")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("processing", &self.processing)
            .field("initialized", &self.initialized)
            .finish()
    }
}
