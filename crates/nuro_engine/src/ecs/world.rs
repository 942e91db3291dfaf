//! ECS World implementation
//!
//! ## Architecture
//!
//! - Entity slots carry a generation; freed slots are recycled with the
//!   generation bumped, so old handles fail every lookup.
//! - One [`SparseSet`] per component type, erased behind [`AnyStorage`].
//! - Iteration order of a view is the storage order of its first component
//!   type. Callers that need "first encountered" semantics (camera
//!   selection) rely on this being stable between frames.

use std::any::TypeId;
use std::collections::HashMap;

use super::storage::{AnyStorage, SparseSet};
use super::{Component, Entity};

/// ECS World containing all entities and components
pub struct World {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_slots: Vec<u32>,
    live_count: usize,
    component_storages: HashMap<TypeId, Box<dyn AnyStorage>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_slots: Vec::new(),
            live_count: 0,
            component_storages: HashMap::new(),
        }
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        self.live_count += 1;
        if let Some(index) = self.free_slots.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            return Entity::new(index, self.generations[slot]);
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        Entity::new(index, 0)
    }

    /// Destroy an entity and every component it owns
    ///
    /// Returns `false` for handles that are already dead.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            log::debug!("destroy_entity: {entity} is not alive");
            return false;
        }
        for storage in self.component_storages.values_mut() {
            storage.remove_entity(entity);
        }
        let slot = entity.index() as usize;
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free_slots.push(entity.index());
        self.live_count -= 1;
        true
    }

    /// Whether `entity` refers to a live slot of the same generation
    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.index() as usize;
        self.alive.get(slot).copied().unwrap_or(false) && self.generations[slot] == entity.generation()
    }

    /// Number of live entities
    pub const fn entity_count(&self) -> usize {
        self.live_count
    }

    fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        self.component_storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<SparseSet<T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        self.component_storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<SparseSet<T>>())
    }

    fn storage_or_insert<T: Component>(&mut self) -> &mut SparseSet<T> {
        let storage = self
            .component_storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseSet::<T>::new()));
        match storage.as_any_mut().downcast_mut::<SparseSet<T>>() {
            Some(set) => set,
            None => unreachable!("storage registered under a foreign TypeId"),
        }
    }

    /// Add (or replace) a component on an entity
    ///
    /// Returns `None` without storing anything when the entity is dead.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Option<&mut T> {
        if !self.is_alive(entity) {
            log::warn!(
                "add_component<{}>: {entity} is not alive",
                std::any::type_name::<T>()
            );
            return None;
        }
        Some(self.storage_or_insert::<T>().insert(entity, component))
    }

    /// Remove a component from an entity, returning it
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storage_mut::<T>()?.remove(entity)
    }

    /// Get a component from an entity
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Get a mutable component from an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    /// Whether an entity owns a component of type `T`
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>().is_some_and(|s| s.contains(entity))
    }

    /// Entities owning `T`, in storage order
    pub fn view<T: Component>(&self) -> Vec<Entity> {
        self.storage::<T>()
            .map(|s| s.entities().to_vec())
            .unwrap_or_default()
    }

    /// Entities owning both `A` and `B`, in `A`'s storage order
    pub fn view2<A: Component, B: Component>(&self) -> Vec<Entity> {
        let (Some(a), Some(b)) = (self.storage::<A>(), self.storage::<B>()) else {
            return Vec::new();
        };
        a.entities().iter().copied().filter(|e| b.contains(*e)).collect()
    }

    /// Iterate `(entity, &T)` pairs in storage order
    pub fn query<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.storage::<T>().into_iter().flat_map(SparseSet::iter)
    }

    /// Visit every `T` mutably
    pub fn each_mut<T: Component>(&mut self, mut f: impl FnMut(Entity, &mut T)) {
        if let Some(storage) = self.storage_mut::<T>() {
            for (entity, component) in storage.iter_mut() {
                f(entity, component);
            }
        }
    }

    /// Borrow two different components of one entity mutably
    pub fn get2_mut<A: Component, B: Component>(&mut self, entity: Entity) -> Option<(&mut A, &mut B)> {
        if TypeId::of::<A>() == TypeId::of::<B>() {
            return None;
        }
        let mut found_a = None;
        let mut found_b = None;
        for (type_id, storage) in &mut self.component_storages {
            if *type_id == TypeId::of::<A>() {
                found_a = storage.as_any_mut().downcast_mut::<SparseSet<A>>();
            } else if *type_id == TypeId::of::<B>() {
                found_b = storage.as_any_mut().downcast_mut::<SparseSet<B>>();
            }
        }
        Some((found_a?.get_mut(entity)?, found_b?.get_mut(entity)?))
    }

    /// Visit every entity owning both `A` and `B` mutably, in `A`'s order
    pub fn each2_mut<A: Component, B: Component>(&mut self, mut f: impl FnMut(Entity, &mut A, &mut B)) {
        for entity in self.view2::<A, B>() {
            if let Some((a, b)) = self.get2_mut::<A, B>(entity) {
                f(entity, a, b);
            }
        }
    }

    /// Spawn an entity carrying a transform, optionally parented
    ///
    /// The transform's cached matrices are evaluated immediately against an
    /// identity view-projection so the entity is drawable before the next
    /// pre-pass runs.
    pub fn spawn(&mut self, parent: Option<Entity>) -> Entity {
        use crate::ecs::components::TransformComponent;
        use crate::foundation::math::Mat4;

        let entity = self.create_entity();
        let transform = TransformComponent::default().with_parent(parent);
        self.add_component(entity, transform);
        crate::render::transformation::evaluate(self, entity, &Mat4::identity());
        entity
    }
}
