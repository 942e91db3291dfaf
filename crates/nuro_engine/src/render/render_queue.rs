//! # Render Queue
//!
//! Rebuilt once per frame from every entity carrying both a
//! `TransformComponent` and a `MeshRendererComponent`, then sorted so that
//! consecutive entries share as much GPU state as possible.
//!
//! ## Ordering
//!
//! Entries are ordered by `(shader id, material id)` ascending, ties broken
//! by entity. A renderer missing its mesh or material has no key; under
//! [`UnboundPolicy::SortFirst`] it sorts before every bound entry (and the
//! passes skip it), under [`UnboundPolicy::Exclude`] it never enters the
//! queue.
//!
//! ## Design Notes
//!
//! The queue stores entity handles, not references, so it never borrows the
//! registry across a frame. [`RenderQueue::iter`] re-resolves each entry and
//! silently drops anything destroyed since the build.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::material::{Material, MaterialId};
use super::mesh::Mesh;
use super::shader::ShaderId;
use crate::ecs::components::{MeshRendererComponent, TransformComponent};
use crate::ecs::{Entity, World};

/// What to do with renderers that have no mesh or material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnboundPolicy {
    /// Keep them, sorted before every bound entry
    #[default]
    SortFirst,
    /// Leave them out of the queue
    Exclude,
}

/// Composite sort key; `None` is the "no binding" sentinel
pub type SortKey = Option<(ShaderId, MaterialId)>;

/// One queued renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    /// Owning entity
    pub entity: Entity,
    /// Key the entry was sorted by
    pub key: SortKey,
}

/// A resolved entry with borrowed components
pub struct QueueItem<'w> {
    /// Owning entity
    pub entity: Entity,
    /// Key the entry was sorted by
    pub key: SortKey,
    /// Transform of the entity
    pub transform: &'w TransformComponent,
    /// Renderer of the entity
    pub renderer: &'w MeshRendererComponent,
}

impl QueueItem<'_> {
    /// Mesh and material, if both are bound
    pub fn bound(&self) -> Option<(&Rc<Mesh>, &Rc<dyn Material>)> {
        Some((self.renderer.mesh.as_ref()?, self.renderer.material.as_ref()?))
    }
}

/// Sort key of a renderer
pub fn sort_key(renderer: &MeshRendererComponent) -> SortKey {
    match (&renderer.mesh, &renderer.material) {
        (Some(_), Some(material)) => Some((material.shader_id(), material.id())),
        _ => None,
    }
}

/// Sorted per-frame draw list
#[derive(Debug, Default, Clone)]
pub struct RenderQueue {
    entries: Vec<QueueEntry>,
    policy: UnboundPolicy,
}

impl RenderQueue {
    /// Empty queue with the given policy
    pub fn new(policy: UnboundPolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    /// Policy for unbound renderers
    pub const fn policy(&self) -> UnboundPolicy {
        self.policy
    }

    /// Change the policy; takes effect on the next build
    pub fn set_policy(&mut self, policy: UnboundPolicy) {
        self.policy = policy;
    }

    /// Replace the queue contents from the registry
    pub fn build(&mut self, world: &World) {
        self.entries.clear();
        for entity in world.view2::<MeshRendererComponent, TransformComponent>() {
            let Some(renderer) = world.get_component::<MeshRendererComponent>(entity) else {
                continue;
            };
            let key = sort_key(renderer);
            if key.is_none() && self.policy == UnboundPolicy::Exclude {
                continue;
            }
            self.entries.push(QueueEntry { entity, key });
        }
        // `None < Some(_)` puts unbound entries first
        self.entries.sort_unstable_by_key(|e| (e.key, e.entity));
        log::trace!("Render queue rebuilt with {} entries", self.entries.len());
    }

    /// Entries in draw order
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve entries against the registry, skipping stale ones
    pub fn iter<'w>(&'w self, world: &'w World) -> impl Iterator<Item = QueueItem<'w>> + 'w {
        self.entries.iter().filter_map(move |entry| {
            Some(QueueItem {
                entity: entry.entity,
                key: entry.key,
                transform: world.get_component::<TransformComponent>(entry.entity)?,
                renderer: world.get_component::<MeshRendererComponent>(entry.entity)?,
            })
        })
    }
}
