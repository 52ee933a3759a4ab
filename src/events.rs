use crate::{ComponentKey, Entity};

/// Lifecycle notification emitted by a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    /// The entity was committed to the pool
    Created(Entity),
    /// The entity was destroyed and its components purged
    Destroyed(Entity),
    /// A component was attached to the entity
    ComponentAdded(Entity, ComponentKey),
    /// An existing component was replaced
    ComponentChanged(Entity, ComponentKey),
    /// A component was removed from the entity
    ComponentRemoved(Entity, ComponentKey),
}

impl EntityEvent {
    /// Returns the affected entity
    pub fn id(&self) -> Entity {
        match *self {
            EntityEvent::Created(id)
            | EntityEvent::Destroyed(id)
            | EntityEvent::ComponentAdded(id, _)
            | EntityEvent::ComponentChanged(id, _)
            | EntityEvent::ComponentRemoved(id, _) => id,
        }
    }

    /// Returns the affected component, if any
    pub fn component(&self) -> Option<ComponentKey> {
        match *self {
            EntityEvent::ComponentAdded(_, key)
            | EntityEvent::ComponentChanged(_, key)
            | EntityEvent::ComponentRemoved(_, key) => Some(key),
            _ => None,
        }
    }
}

/// Receives pool events.
///
/// The pool is a plain call site, delivery happens synchronously on the
/// mutating thread after storage locks are released.
pub trait EventSubscriber: Send + Sync + 'static {
    fn on_event(&self, event: &EntityEvent);
    /// Returns false once the subscriber should be dropped
    fn is_connected(&self) -> bool {
        true
    }
}

impl<F> EventSubscriber for F
where
    F: Fn(&EntityEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &EntityEvent) {
        (self)(event)
    }
}

#[cfg(feature = "flume")]
impl EventSubscriber for flume::Sender<EntityEvent> {
    fn on_event(&self, event: &EntityEvent) {
        let _ = self.send(*event);
    }

    fn is_connected(&self) -> bool {
        !self.is_disconnected()
    }
}
