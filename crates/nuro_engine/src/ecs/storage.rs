//! Sparse-set component storage
//!
//! `sparse[entity.index]` points into the dense arrays; `dense` and `data`
//! are kept parallel. Removal swaps the last element into the hole, so
//! iteration order is insertion order until the first removal.

use std::any::Any;

use super::{Component, Entity};

/// Type-erased view of a storage, used by the world for bulk operations
pub trait AnyStorage: Any {
    /// Drop the component owned by `entity`, if any
    fn remove_entity(&mut self, entity: Entity) -> bool;
    /// Number of stored components
    fn len(&self) -> usize;
    /// Downcast helper
    fn as_any(&self) -> &dyn Any;
    /// Mutable downcast helper
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Densely packed storage for one component type
pub struct SparseSet<T: Component> {
    sparse: Vec<Option<u32>>,
    dense: Vec<Entity>,
    data: Vec<T>,
}

impl<T: Component> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> SparseSet<T> {
    /// Create an empty storage
    pub const fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }

    fn slot(&self, entity: Entity) -> Option<usize> {
        let dense_index = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.dense[dense_index] == entity).then_some(dense_index)
    }

    /// Insert or replace the component of `entity`
    pub fn insert(&mut self, entity: Entity, component: T) -> &mut T {
        if let Some(i) = self.slot(entity) {
            self.data[i] = component;
            return &mut self.data[i];
        }

        let index = entity.index() as usize;
        if self.sparse.len() <= index {
            self.sparse.resize(index + 1, None);
        }
        // A stale generation may still occupy this slot.
        if let Some(old) = self.sparse[index] {
            let old_entity = self.dense[old as usize];
            self.remove(old_entity);
        }

        self.sparse[index] = Some(self.dense.len() as u32);
        self.dense.push(entity);
        self.data.push(component);
        let last = self.data.len() - 1;
        &mut self.data[last]
    }

    /// Remove the component of `entity`
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let i = self.slot(entity)?;
        self.sparse[entity.index() as usize] = None;

        let last = self.dense.len() - 1;
        self.dense.swap(i, last);
        self.data.swap(i, last);
        self.dense.pop();
        let removed = self.data.pop();

        if i < self.dense.len() {
            let moved = self.dense[i];
            self.sparse[moved.index() as usize] = Some(i as u32);
        }
        removed
    }

    /// Borrow the component of `entity`
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slot(entity).map(|i| &self.data[i])
    }

    /// Mutably borrow the component of `entity`
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slot(entity).map(|i| &mut self.data[i])
    }

    /// Whether `entity` owns a component here
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Owning entities in storage order
    pub fn entities(&self) -> &[Entity] {
        &self.dense
    }

    /// Iterate `(entity, component)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.dense.iter().copied().zip(self.data.iter())
    }

    /// Mutably iterate `(entity, component)` pairs in storage order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.dense.iter().copied().zip(self.data.iter_mut())
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

impl<T: Component> AnyStorage for SparseSet<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[test]
    fn test_insert_get_remove() {
        let mut set = SparseSet::new();
        let a = Entity::new(0, 0);
        let b = Entity::new(5, 0);
        set.insert(a, Health(10));
        set.insert(b, Health(20));

        assert_eq!(set.get(b), Some(&Health(20)));
        assert_eq!(set.remove(a), Some(Health(10)));
        assert!(!set.contains(a));
        // b was swapped into slot 0 and must still resolve.
        assert_eq!(set.get(b), Some(&Health(20)));
        assert_eq!(set.entities(), &[b]);
    }

    #[test]
    fn test_stale_generation_does_not_resolve() {
        let mut set = SparseSet::new();
        let old = Entity::new(3, 0);
        let new = Entity::new(3, 1);
        set.insert(old, Health(1));
        assert!(set.get(new).is_none());

        set.insert(new, Health(2));
        assert!(set.get(old).is_none());
        assert_eq!(set.get(new), Some(&Health(2)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_replaces() {
        let mut set = SparseSet::new();
        let e = Entity::new(1, 0);
        set.insert(e, Health(1));
        set.insert(e, Health(7));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(e), Some(&Health(7)));
    }
}
