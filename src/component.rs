use core::{
    any::{Any, TypeId},
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};
use std::sync::Arc;

/// A plain data value which can be attached to an entity.
///
/// A component is identified by its concrete type. A component may
/// additionally belong to a *family*, a marker type which lets queries and
/// lookups address every member type at once.
///
/// ```
/// use strata::{Component, ComponentKey};
///
/// /// Marker for all shapes
/// pub struct Shape;
///
/// pub struct Circle(pub f32);
///
/// impl Component for Circle {
///     fn family() -> Option<ComponentKey> {
///         Some(ComponentKey::of::<Shape>())
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// The family this component can also be addressed as
    fn family() -> Option<ComponentKey>
    where
        Self: Sized,
    {
        None
    }
}

/// Unique identifier of a component type or a component family.
///
/// Keys compare by type only, the name exists for diagnostics.
#[derive(Clone, Copy)]
pub struct ComponentKey {
    id: TypeId,
    name: fn() -> String,
}

impl ComponentKey {
    /// Returns the key of `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: tynm::type_name::<T>,
        }
    }

    /// Returns the underlying type id
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the short name of the type
    pub fn name(&self) -> String {
        (self.name)()
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentKey {}

impl PartialOrd for ComponentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for ComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Type erased view of a [`Component`]
pub trait ComponentValue: Any + Send + Sync {
    /// The key of the concrete type
    fn key(&self) -> ComponentKey;
    /// The family of the concrete type
    fn family_key(&self) -> Option<ComponentKey>;
    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;
    #[doc(hidden)]
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Component> ComponentValue for T {
    fn key(&self) -> ComponentKey {
        ComponentKey::of::<T>()
    }

    fn family_key(&self) -> Option<ComponentKey> {
        T::family()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for dyn ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl dyn ComponentValue {
    /// Returns true if the concrete type is `T`
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the concrete value
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// A shared, type erased component value.
///
/// Cloning only clones the pointer, the stored instance is shared.
pub type ComponentBox = Arc<dyn ComponentValue>;

/// Erase a component value
pub fn boxed<T: Component>(value: T) -> ComponentBox {
    Arc::new(value)
}

/// Recover the concrete type of an erased component
pub fn downcast<T: Component>(value: ComponentBox) -> Option<Arc<T>> {
    value.into_any().downcast::<T>().ok()
}

/// Short hand for the key of a type
#[inline]
pub fn key<T: 'static>() -> ComponentKey {
    ComponentKey::of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health(f32);
    impl Component for Health {}

    struct Shape;
    struct Circle;
    impl Component for Circle {
        fn family() -> Option<ComponentKey> {
            Some(key::<Shape>())
        }
    }

    #[test]
    fn component_keys() {
        assert_eq!(key::<Health>(), key::<Health>());
        assert_ne!(key::<Health>(), key::<Circle>());
        assert_eq!(key::<Health>().name(), "Health");
        assert_eq!(Circle::family(), Some(key::<Shape>()));
        assert_eq!(Health::family(), None);
    }

    #[test]
    fn erase_and_recover() {
        let value = boxed(Health(5.0));
        assert_eq!(value.key(), key::<Health>());
        assert!(value.is::<Health>());
        assert!(!value.is::<Circle>());
        assert_eq!(value.downcast_ref::<Health>().map(|v| v.0), Some(5.0));

        let health = downcast::<Health>(value.clone()).unwrap();
        assert_eq!(health.0, 5.0);
        assert!(downcast::<Circle>(value).is_none());

        assert_eq!(boxed(Circle).family_key(), Some(key::<Shape>()));
    }
}
