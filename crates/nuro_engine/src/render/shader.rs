//! # Shaders
//!
//! A [`Shader`] wraps a linked program and exposes a name-keyed uniform
//! upload surface. Uniform locations are resolved through the device the
//! first time a name is used and cached for the lifetime of the shader.
//!
//! [`ShaderLibrary`] hands out shared shaders by name. A program the device
//! cannot provide degrades to an empty shader: binding it and setting
//! uniforms on it are no-ops, so draws issued with it render nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};

use super::device::{GraphicsDevice, ProgramId, UniformLocation, UniformValue};
use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Identifier used to group draws by program
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderId(pub u32);

/// Linked program with cached uniform locations
#[derive(Debug)]
pub struct Shader {
    id: ShaderId,
    name: String,
    program: Option<ProgramId>,
    locations: RefCell<HashMap<String, Option<UniformLocation>>>,
}

impl Shader {
    /// Wrap a linked program
    pub fn new(id: ShaderId, name: &str, program: ProgramId) -> Self {
        Self {
            id,
            name: name.to_string(),
            program: Some(program),
            locations: RefCell::new(HashMap::new()),
        }
    }

    /// Shader without a program
    pub fn empty(id: ShaderId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            program: None,
            locations: RefCell::new(HashMap::new()),
        }
    }

    /// Sort key
    pub const fn id(&self) -> ShaderId {
        self.id
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the program failed to load
    pub const fn is_empty(&self) -> bool {
        self.program.is_none()
    }

    /// Make this shader's program current
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        if let Some(program) = self.program {
            device.use_program(program);
        }
    }

    /// Upload a `bool` uniform
    pub fn set_bool(&self, device: &mut dyn GraphicsDevice, name: &str, value: bool) {
        self.set(device, name, UniformValue::Bool(value));
    }

    /// Upload an `int` uniform (also used for sampler units)
    pub fn set_int(&self, device: &mut dyn GraphicsDevice, name: &str, value: i32) {
        self.set(device, name, UniformValue::Int(value));
    }

    /// Upload a `float` uniform
    pub fn set_float(&self, device: &mut dyn GraphicsDevice, name: &str, value: f32) {
        self.set(device, name, UniformValue::Float(value));
    }

    /// Upload a `vec2` uniform
    pub fn set_vec2(&self, device: &mut dyn GraphicsDevice, name: &str, value: Vec2) {
        self.set(device, name, UniformValue::Vec2(value));
    }

    /// Upload a `vec3` uniform
    pub fn set_vec3(&self, device: &mut dyn GraphicsDevice, name: &str, value: Vec3) {
        self.set(device, name, UniformValue::Vec3(value));
    }

    /// Upload a `vec4` uniform
    pub fn set_vec4(&self, device: &mut dyn GraphicsDevice, name: &str, value: Vec4) {
        self.set(device, name, UniformValue::Vec4(value));
    }

    /// Upload a `mat3` uniform
    pub fn set_mat3(&self, device: &mut dyn GraphicsDevice, name: &str, value: Mat3) {
        self.set(device, name, UniformValue::Mat3(value));
    }

    /// Upload a `mat4` uniform
    pub fn set_mat4(&self, device: &mut dyn GraphicsDevice, name: &str, value: Mat4) {
        self.set(device, name, UniformValue::Mat4(value));
    }

    fn set(&self, device: &mut dyn GraphicsDevice, name: &str, value: UniformValue) {
        let Some(program) = self.program else {
            return;
        };
        if let Some(location) = self.location(device, program, name) {
            device.set_uniform(program, location, value);
        }
    }

    fn location(&self, device: &mut dyn GraphicsDevice, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if let Some(cached) = self.locations.borrow().get(name) {
            return *cached;
        }
        let location = device.uniform_location(program, name);
        if location.is_none() {
            debug!("Shader '{}' has no uniform '{name}'", self.name);
        }
        self.locations.borrow_mut().insert(name.to_string(), location);
        location
    }
}

/// Shared shaders keyed by program name
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: HashMap<String, Rc<Shader>>,
    next_id: u32,
}

impl ShaderLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or load the shader for `name`
    ///
    /// Ids are assigned in load order. A program the device cannot provide
    /// yields an empty shader, which is cached like any other so the failure
    /// is reported once.
    pub fn get(&mut self, device: &mut dyn GraphicsDevice, name: &str) -> Rc<Shader> {
        if let Some(shader) = self.shaders.get(name) {
            return Rc::clone(shader);
        }
        let id = ShaderId(self.next_id);
        self.next_id += 1;
        let shader = match device.program(name) {
            Ok(program) => {
                debug!("Loaded shader '{name}' as {id:?}");
                Shader::new(id, name, program)
            }
            Err(e) => {
                warn!("Shader '{name}' unavailable, using empty shader: {e}");
                Shader::empty(id, name)
            }
        };
        let shader = Rc::new(shader);
        self.shaders.insert(name.to_string(), Rc::clone(&shader));
        shader
    }

    /// Number of cached shaders
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Whether nothing was loaded yet
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessDevice;

    #[test]
    fn test_location_caching() {
        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new();
        let shader = library.get(&mut device, "lit");

        shader.bind(&mut device);
        for i in 0..10 {
            shader.set_float(&mut device, "material.roughness", i as f32);
        }
        shader.set_int(&mut device, "configuration.numPointLights", 3);

        assert_eq!(device.location_lookups(), 2);
        assert_eq!(device.uniform("lit", "material.roughness"), Some(UniformValue::Float(9.0)));
        assert_eq!(device.uniform("lit", "configuration.numPointLights"), Some(UniformValue::Int(3)));
    }

    #[test]
    fn test_library_shares_and_numbers_shaders() {
        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new();
        let a = library.get(&mut device, "pre_pass");
        let b = library.get(&mut device, "lit");
        let again = library.get(&mut device, "pre_pass");

        assert!(Rc::ptr_eq(&a, &again));
        assert_eq!(a.id(), ShaderId(0));
        assert_eq!(b.id(), ShaderId(1));
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn test_missing_program_degrades_to_empty_shader() {
        let mut device = HeadlessDevice::new();
        device.remove_program("ssao");
        let mut library = ShaderLibrary::new();
        let shader = library.get(&mut device, "ssao");

        assert!(shader.is_empty());
        shader.bind(&mut device);
        shader.set_float(&mut device, "radius", 1.0);
        assert_eq!(device.location_lookups(), 0);
    }
}
