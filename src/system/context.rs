use core::any::{type_name, Any, TypeId};
use std::{collections::BTreeMap, sync::Arc};

use crate::{error::Result, Error};

type Resource = Arc<dyn Any + Send + Sync>;

/// Typed registry of shared collaborators handed to systems on
/// initialization.
///
/// At most one value is registered per type. Cloning the context shares the
/// registered values.
#[derive(Default, Clone)]
pub struct Context {
    resources: BTreeMap<TypeId, (Resource, &'static str)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a value, returning the previously registered value of the
    /// same type
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> Option<Arc<T>> {
        let value: Resource = value;
        self.resources
            .insert(TypeId::of::<T>(), (value, type_name::<T>()))
            .and_then(|(old, _)| old.downcast().ok())
    }

    /// Same as [`Self::insert`] for an owned value
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(Arc::new(value));
        self
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let (value, _) = self.resources.get(&TypeId::of::<T>())?;
        value.clone().downcast().ok()
    }

    /// Resolves a required collaborator
    pub fn expect<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get().ok_or(Error::MissingResource(type_name::<T>()))
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        let (value, _) = self.resources.remove(&TypeId::of::<T>())?;
        value.downcast().ok()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.resources.values().map(|(_, name)| name))
            .finish()
    }
}
