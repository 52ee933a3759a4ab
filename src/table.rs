use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{component::downcast, Component, ComponentBox, ComponentKey, Entity};

type Column = BTreeMap<Entity, ComponentBox>;

#[derive(Default)]
struct Tables {
    /// One column per concrete component type
    columns: BTreeMap<ComponentKey, Column>,
    /// family -> member types, in order of first registration
    families: BTreeMap<ComponentKey, Vec<ComponentKey>>,
}

impl Tables {
    fn members(&self, key: ComponentKey) -> &[ComponentKey] {
        self.families.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    fn get(&self, id: Entity, key: ComponentKey) -> Option<&ComponentBox> {
        if let Some(value) = self.columns.get(&key).and_then(|col| col.get(&id)) {
            return Some(value);
        }

        self.members(key)
            .iter()
            .find_map(|member| self.columns.get(member)?.get(&id))
    }

    /// Resolves a concrete or family key to the concrete key [`Self::get`]
    /// would read for `id`
    fn resolve(&self, id: Entity, key: ComponentKey) -> Option<ComponentKey> {
        if self.columns.get(&key).is_some_and(|col| col.contains_key(&id)) {
            return Some(key);
        }

        self.members(key)
            .iter()
            .copied()
            .find(|member| self.columns.get(member).is_some_and(|col| col.contains_key(&id)))
    }
}

/// Associative storage mapping `(entity, component type)` to a component.
///
/// Every concrete type owns a column. A type's family is recorded in an
/// explicit is-a table, so a lookup or query by family key resolves to
/// whichever member the entity holds.
///
/// All operations take `&self` and lock internally; iteration works on a
/// snapshot so a reader thread may iterate while another thread mutates.
#[derive(Default)]
pub struct ComponentTable {
    inner: RwLock<Tables>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the component of type `T` attached to `id`
    pub fn get<T: Component>(&self, id: Entity) -> Option<Arc<T>> {
        let value = self.inner.read().get(id, ComponentKey::of::<T>())?.clone();
        downcast(value)
    }

    /// Returns the component attached to `id` for a concrete or family key.
    ///
    /// For a family key the earliest registered member type held by `id` is
    /// returned.
    pub fn get_dyn(&self, id: Entity, key: ComponentKey) -> Option<ComponentBox> {
        self.inner.read().get(id, key).cloned()
    }

    /// Returns every member of the family `key` attached to `id`
    pub fn get_family(&self, id: Entity, key: ComponentKey) -> Vec<ComponentBox> {
        let tables = self.inner.read();
        tables
            .members(key)
            .iter()
            .filter_map(|member| tables.columns.get(member)?.get(&id).cloned())
            .collect()
    }

    /// Returns true if `id` has a component of the concrete or family key
    pub fn has(&self, id: Entity, key: ComponentKey) -> bool {
        self.inner.read().get(id, key).is_some()
    }

    /// Stores `value` for `id`, returning the replaced component of the same
    /// concrete type.
    pub fn put(&self, id: Entity, value: ComponentBox) -> Option<ComponentBox> {
        let key = value.key();
        let mut tables = self.inner.write();

        if let Some(family) = value.family_key() {
            let members = tables.families.entry(family).or_default();
            if !members.contains(&key) {
                members.push(key);
            }
        }

        tables.columns.entry(key).or_default().insert(id, value)
    }

    /// Typed version of [`Self::put`]
    pub fn set<T: Component>(&self, id: Entity, value: T) -> Option<Arc<T>> {
        self.put(id, Arc::new(value)).and_then(downcast)
    }

    /// Removes the component of the concrete or family `key` from `id`.
    ///
    /// For a family key the member [`Self::get_dyn`] returns is removed.
    pub fn remove(&self, id: Entity, key: ComponentKey) -> Option<ComponentBox> {
        let mut tables = self.inner.write();
        let key = tables.resolve(id, key)?;
        let column = tables.columns.get_mut(&key)?;
        let value = column.remove(&id);
        if column.is_empty() {
            tables.columns.remove(&key);
        }

        value
    }

    /// Removes every component of `id`, returning how many were removed
    pub fn remove_all(&self, id: Entity) -> usize {
        let mut tables = self.inner.write();
        let mut count = 0;
        tables.columns.retain(|_, column| {
            if column.remove(&id).is_some() {
                count += 1;
            }

            !column.is_empty()
        });

        count
    }

    /// Iterate all components of the concrete or family `key`.
    ///
    /// A family key yields one row per entity, picking the earliest
    /// registered member as [`Self::get_dyn`] does.
    pub fn iter(&self, key: ComponentKey) -> ComponentIter {
        let tables = self.inner.read();
        let rows = match tables.columns.get(&key) {
            Some(column) => column.clone(),
            None => {
                let mut rows = Column::new();
                for member in tables.members(key) {
                    for (&id, value) in tables.columns.get(member).into_iter().flatten() {
                        rows.entry(id).or_insert_with(|| value.clone());
                    }
                }

                rows
            }
        };

        ComponentIter {
            inner: rows.into_iter(),
        }
    }

    /// Iterate all components of type `T`
    pub fn iter_typed<T: Component>(&self) -> impl Iterator<Item = (Entity, Arc<T>)> {
        self.iter(ComponentKey::of::<T>())
            .filter_map(|(id, value)| Some((id, downcast(value)?)))
    }

    /// Returns a snapshot of all components attached to `id`, by concrete type
    pub fn components_of(&self, id: Entity) -> BTreeMap<ComponentKey, ComponentBox> {
        self.inner
            .read()
            .columns
            .iter()
            .filter_map(|(&key, column)| Some((key, column.get(&id)?.clone())))
            .collect()
    }

    /// Returns every entity with at least one component.
    ///
    /// Visits every row, intended for diagnostics.
    pub fn entity_ids(&self) -> BTreeSet<Entity> {
        self.inner
            .read()
            .columns
            .values()
            .flat_map(|column| column.keys().copied())
            .collect()
    }

    /// Returns the number of entities with at least one component
    pub fn num_entities(&self) -> usize {
        self.entity_ids().len()
    }

    /// Returns the member types registered for a family
    pub fn family_members(&self, family: ComponentKey) -> Vec<ComponentKey> {
        self.inner.read().members(family).to_vec()
    }
}

impl core::fmt::Debug for ComponentTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let tables = self.inner.read();
        f.debug_map()
            .entries(tables.columns.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

/// Iterates a snapshot of a component column
pub struct ComponentIter {
    inner: btree_map::IntoIter<Entity, ComponentBox>,
}

impl Iterator for ComponentIter {
    type Item = (Entity, ComponentBox);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ComponentIter {}
