//! Mesh representation for 3D models
//!
//! CPU-side vertex and index data plus a lazily created GPU copy. Meshes are
//! shared between renderers through `Rc`, so their lifetime is independent
//! of any entity; the GPU copy is created on the first draw and lives until
//! [`Mesh::release`].

use std::cell::Cell;

use bytemuck::{Pod, Zeroable};
use log::warn;

use super::device::{GraphicsDevice, MeshId};

/// Vertex data structure for 3D rendering with position, normal, and texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in 3D space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }
}

/// Indexed triangle mesh
#[derive(Debug)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    gpu: Cell<Option<MeshId>>,
    upload_failed: Cell<bool>,
}

impl Mesh {
    /// Create a mesh from vertices and indices
    pub fn new(name: &str, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.to_string(),
            vertices,
            indices,
            gpu: Cell::new(None),
            upload_failed: Cell::new(false),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertex data
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Index data
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// GPU handle, uploading on first use
    ///
    /// A failed upload is logged once and the mesh is skipped from then on.
    pub fn gpu_handle(&self, device: &mut dyn GraphicsDevice) -> Option<MeshId> {
        if let Some(id) = self.gpu.get() {
            return Some(id);
        }
        if self.upload_failed.get() {
            return None;
        }
        let bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        match device.upload_mesh(bytes, std::mem::size_of::<Vertex>(), &self.indices) {
            Ok(id) => {
                self.gpu.set(Some(id));
                Some(id)
            }
            Err(e) => {
                warn!("Mesh '{}' upload failed: {e}", self.name);
                self.upload_failed.set(true);
                None
            }
        }
    }

    /// Draw with whatever program and state is current
    pub fn draw(&self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.gpu_handle(device) {
            device.draw_mesh(id);
        }
    }

    /// Release the GPU copy; the next draw uploads again
    pub fn release(&self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.gpu.take() {
            device.destroy_mesh(id);
        }
        self.upload_failed.set(false);
    }

    /// Unit cube centred at the origin
    pub fn cube() -> Self {
        // (normal, tangent u, tangent v) per face
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];
        let corners = [(-1.0, -1.0, [0.0, 0.0]), (1.0, -1.0, [1.0, 0.0]), (1.0, 1.0, [1.0, 1.0]), (-1.0, 1.0, [0.0, 1.0])];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = u32::try_from(vertices.len()).unwrap_or(0);
            for (su, sv, uv) in corners {
                let position = [
                    0.5 * (normal[0] + su * u[0] + sv * v[0]),
                    0.5 * (normal[1] + su * u[1] + sv * v[1]),
                    0.5 * (normal[2] + su * u[2] + sv * v[2]),
                ];
                vertices.push(Vertex::new(position, normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new("cube", vertices, indices)
    }

    /// Unit plane in XZ facing +Y
    pub fn plane() -> Self {
        let up = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex::new([-0.5, 0.0, 0.5], up, [0.0, 0.0]),
            Vertex::new([0.5, 0.0, 0.5], up, [1.0, 0.0]),
            Vertex::new([0.5, 0.0, -0.5], up, [1.0, 1.0]),
            Vertex::new([-0.5, 0.0, -0.5], up, [0.0, 1.0]),
        ];
        Self::new("plane", vertices, vec![0, 1, 2, 0, 2, 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessDevice;

    #[test]
    fn test_cube_geometry() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.indices().len(), 36);
        for v in cube.vertices() {
            assert!(v.position.iter().all(|c| c.abs() <= 0.5 + f32::EPSILON));
            // Every vertex lies on the face its normal points at
            let along: f32 = v.position.iter().zip(v.normal).map(|(p, n)| p * n).sum();
            assert!((along - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lazy_upload_and_release() {
        let mut device = HeadlessDevice::new();
        let plane = Mesh::plane();

        plane.draw(&mut device);
        plane.draw(&mut device);
        assert_eq!(device.mesh_count(), 1);
        assert_eq!(device.draws().len(), 2);

        plane.release(&mut device);
        assert_eq!(device.mesh_count(), 0);
    }

    #[test]
    fn test_bad_indices_skip_draw() {
        let mut device = HeadlessDevice::new();
        let mesh = Mesh::new("broken", vec![Vertex::new([0.0; 3], [0.0, 1.0, 0.0], [0.0; 2])], vec![0, 1, 2]);

        mesh.draw(&mut device);
        mesh.draw(&mut device);
        assert!(device.draws().is_empty());
        assert_eq!(device.mesh_count(), 0);
    }
}
