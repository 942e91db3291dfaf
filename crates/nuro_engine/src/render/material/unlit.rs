//! Unlit material

use std::rc::Rc;

use super::{Material, MaterialId};
use crate::render::context::FrameContext;
use crate::render::device::GraphicsDevice;
use crate::render::shader::Shader;
use crate::foundation::math::Vec4;

/// Flat colour without lighting
#[derive(Debug)]
pub struct UnlitMaterial {
    id: MaterialId,
    shader: Rc<Shader>,
    /// RGBA colour
    pub base_color: Vec4,
}

impl UnlitMaterial {
    /// White unlit material on `shader`
    pub fn new(shader: Rc<Shader>) -> Self {
        Self {
            id: MaterialId::next(),
            shader,
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }

    /// Builder pattern: set colour
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }
}

impl Material for UnlitMaterial {
    fn bind(&self, device: &mut dyn GraphicsDevice, _context: &FrameContext<'_>) {
        self.shader.set_vec4(device, "baseColor", self.base_color);
    }

    fn id(&self) -> MaterialId {
        self.id
    }

    fn shader(&self) -> &Rc<Shader> {
        &self.shader
    }
}
