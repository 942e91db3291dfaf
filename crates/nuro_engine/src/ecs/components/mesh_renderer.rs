//! Mesh renderer component

use std::fmt;
use std::rc::Rc;

use crate::ecs::Component;
use crate::render::material::Material;
use crate::render::mesh::Mesh;

/// Shared mesh plus the material it is drawn with
///
/// Both references are optional: a renderer missing either one is kept in
/// the registry but never drawn.
#[derive(Clone, Default)]
pub struct MeshRendererComponent {
    /// Shared mesh resource
    pub mesh: Option<Rc<Mesh>>,
    /// Bound material
    pub material: Option<Rc<dyn Material>>,
}

impl Component for MeshRendererComponent {}

impl MeshRendererComponent {
    /// Renderer with both mesh and material bound
    pub fn new(mesh: Rc<Mesh>, material: Rc<dyn Material>) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
        }
    }

    /// Whether this renderer can be drawn
    pub const fn is_bound(&self) -> bool {
        self.mesh.is_some() && self.material.is_some()
    }
}

impl fmt::Debug for MeshRendererComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshRendererComponent")
            .field("mesh", &self.mesh.as_ref().map(|m| m.name()))
            .field("material", &self.material.as_ref().map(|m| m.id()))
            .finish()
    }
}
