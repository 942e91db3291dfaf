//! # Materials
//!
//! A material owns a shader reference and the parameters it uploads when
//! bound. The forward pass sorts and binds through the [`Material`] trait
//! only; the concrete kinds are [`LitMaterial`] (PBR with lights, shadows and
//! SSAO) and [`UnlitMaterial`] (flat colour, used for the selection
//! outline).

use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use super::context::FrameContext;
use super::device::GraphicsDevice;
use super::shader::{Shader, ShaderId};

pub mod lit;
pub mod unlit;

pub use lit::{LitMaterial, LitMaterialParams, MaterialMaps};
pub use unlit::UnlitMaterial;

/// Unique identifier for materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

static NEXT_MATERIAL_ID: AtomicU32 = AtomicU32::new(1);

impl MaterialId {
    /// Allocate a fresh process-wide id
    pub fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shader plus parameters, bound once per run of equal materials
pub trait Material {
    /// Upload every material and frame uniform
    ///
    /// Uniforms are addressed by program, so the caller decides when the
    /// shader becomes current.
    fn bind(&self, device: &mut dyn GraphicsDevice, context: &FrameContext<'_>);

    /// Sort key within a shader
    fn id(&self) -> MaterialId;

    /// Shader this material renders with
    fn shader(&self) -> &Rc<Shader>;

    /// Sort key across shaders
    fn shader_id(&self) -> ShaderId {
        self.shader().id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = MaterialId::next();
        let b = MaterialId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
