use core::{fmt, ops::BitAnd};

use smallvec::SmallVec;

use crate::{component::key, ComponentKey};

type KeySet = SmallVec<[ComponentKey; 4]>;

fn push_unique(set: &mut KeySet, key: ComponentKey) {
    if !set.contains(&key) {
        set.push(key)
    }
}

/// A composed predicate over the components of an entity.
///
/// An entity matches if it holds every key in `all`, at least one key in
/// `one` (when non-empty), and none of the keys in `exclude`. Each set is
/// independently optional; an empty filter matches every entity.
///
/// Keys may name a concrete component type or a family.
///
/// ```
/// use strata::{filter::Filter, Component};
///
/// struct Position;
/// impl Component for Position {}
/// struct Frozen;
/// impl Component for Frozen {}
///
/// let filter = Filter::with::<Position>() & Filter::without::<Frozen>();
/// assert!(filter.matches(|key| key == strata::key::<Position>()));
/// ```
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Filter {
    all: KeySet,
    one: KeySet,
    exclude: KeySet,
}

impl Filter {
    /// Matches every entity
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches entities holding `T`
    pub fn with<T: 'static>() -> Self {
        Self::new().all(key::<T>())
    }

    /// Matches entities not holding `T`
    pub fn without<T: 'static>() -> Self {
        Self::new().exclude(key::<T>())
    }

    /// Requires `key`
    pub fn all(mut self, key: ComponentKey) -> Self {
        push_unique(&mut self.all, key);
        self
    }

    /// Adds `key` to the set of which at least one is required
    pub fn one(mut self, key: ComponentKey) -> Self {
        push_unique(&mut self.one, key);
        self
    }

    /// Rejects entities holding `key`
    pub fn exclude(mut self, key: ComponentKey) -> Self {
        push_unique(&mut self.exclude, key);
        self
    }

    /// Requires every key
    pub fn all_of(self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        keys.into_iter().fold(self, Self::all)
    }

    /// Requires at least one of the keys
    pub fn one_of(self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        keys.into_iter().fold(self, Self::one)
    }

    /// Rejects entities holding any of the keys
    pub fn none_of(self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        keys.into_iter().fold(self, Self::exclude)
    }

    pub fn all_keys(&self) -> &[ComponentKey] {
        &self.all
    }

    pub fn one_keys(&self) -> &[ComponentKey] {
        &self.one
    }

    pub fn exclude_keys(&self) -> &[ComponentKey] {
        &self.exclude
    }

    /// Returns true if the filter has neither required nor optional keys.
    ///
    /// An exclude set alone does not constitute a meaningful query.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.one.is_empty()
    }

    /// Evaluates the filter given a membership test for the entity.
    pub fn matches(&self, has: impl Fn(ComponentKey) -> bool) -> bool {
        self.all.iter().all(|&k| has(k))
            && (self.one.is_empty() || self.one.iter().any(|&k| has(k)))
            && !self.exclude.iter().any(|&k| has(k))
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.all_of(rhs.all)
            .one_of(rhs.one)
            .none_of(rhs.exclude)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Filter");
        if !self.all.is_empty() {
            s.field("all", &self.all);
        }
        if !self.one.is_empty() {
            s.field("one", &self.one);
        }
        if !self.exclude.is_empty() {
            s.field("exclude", &self.exclude);
        }

        s.finish()
    }
}
