//! Mesh and vertex definitions

use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::gpu::{GpuError, GraphicsContext, VertexArrayId, VertexLayout};

/// Vertex with position, normal, and UV coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed CPU-side geometry
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from vertices and indices
    pub fn from_data(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let vertices = vec![
            // Front face
            Vertex::new([-0.5, -0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([0.5, -0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 1.0]),
            // Back face
            Vertex::new([0.5, -0.5, -0.5], [0.0, 0.0, -1.0], [0.0, 0.0]),
            Vertex::new([-0.5, -0.5, -0.5], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, -0.5], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, -0.5], [0.0, 0.0, -1.0], [0.0, 1.0]),
            // Top face
            Vertex::new([-0.5, 0.5, 0.5], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([0.5, 0.5, 0.5], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, -0.5], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, -0.5], [0.0, 1.0, 0.0], [0.0, 1.0]),
            // Bottom face
            Vertex::new([-0.5, -0.5, -0.5], [0.0, -1.0, 0.0], [0.0, 0.0]),
            Vertex::new([0.5, -0.5, -0.5], [0.0, -1.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.5, -0.5, 0.5], [0.0, -1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-0.5, -0.5, 0.5], [0.0, -1.0, 0.0], [0.0, 1.0]),
            // Right face
            Vertex::new([0.5, -0.5, 0.5], [1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([0.5, -0.5, -0.5], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, -0.5], [1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.5], [1.0, 0.0, 0.0], [0.0, 1.0]),
            // Left face
            Vertex::new([-0.5, -0.5, -0.5], [-1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([-0.5, -0.5, 0.5], [-1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, 0.5], [-1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, -0.5], [-1.0, 0.0, 0.0], [0.0, 1.0]),
        ];

        let indices = vec![
            0, 1, 2, 2, 3, 0, // Front
            4, 5, 6, 6, 7, 4, // Back
            8, 9, 10, 10, 11, 8, // Top
            12, 13, 14, 14, 15, 12, // Bottom
            16, 17, 18, 18, 19, 16, // Right
            20, 21, 22, 22, 23, 20, // Left
        ];

        Self::from_data(vertices, indices)
    }

    /// Create a plane on the XZ axis
    pub fn plane(size: f32) -> Self {
        let half = size / 2.0;
        let vertices = vec![
            Vertex::new([-half, 0.0, half], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([half, 0.0, half], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([half, 0.0, -half], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-half, 0.0, -half], [0.0, 1.0, 0.0], [0.0, 1.0]),
        ];

        let indices = vec![0, 1, 2, 2, 3, 0];

        Self::from_data(vertices, indices)
    }

    /// Create a UV sphere with counter-clockwise outward faces
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let y = radius * phi.cos();
            let ring_radius = radius * phi.sin();

            for segment in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                let position = Vec3::new(x, y, z);
                let normal = position.normalize_or_zero();

                vertices.push(Vertex::new(
                    position.into(),
                    normal.into(),
                    [segment as f32 / segments as f32, ring as f32 / rings as f32],
                ));
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                indices.push(current);
                indices.push(current + 1);
                indices.push(next);

                indices.push(current + 1);
                indices.push(next + 1);
                indices.push(next);
            }
        }

        Self::from_data(vertices, indices)
    }

    /// Get the number of indices
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Expand the index list into a flat triangle list
    pub fn triangle_vertices(&self) -> Vec<Vertex> {
        self.indices
            .iter()
            .filter_map(|&index| self.vertices.get(index as usize).copied())
            .collect()
    }

    /// Upload the mesh as a non-indexed vertex array.
    ///
    /// The returned handle is meant to be shared between models.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is empty or the upload fails
    pub fn upload(&self, ctx: &mut dyn GraphicsContext) -> Result<Rc<GpuMesh>, GpuError> {
        let vertices = self.triangle_vertices();
        let vertex_count = vertices.len() as u32;
        let vertex_array = ctx.create_vertex_array(
            VertexLayout::Mesh,
            bytemuck::cast_slice(&vertices),
            vertex_count,
        )?;
        log::debug!("Uploaded mesh with {vertex_count} vertices");
        Ok(Rc::new(GpuMesh {
            vertex_array,
            vertex_count,
        }))
    }
}

/// Uploaded mesh
#[derive(Debug)]
pub struct GpuMesh {
    vertex_array: VertexArrayId,
    vertex_count: u32,
}

impl GpuMesh {
    #[must_use]
    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::RecordingContext;

    fn face_normal(vertices: &[Vertex]) -> Vec3 {
        let a = Vec3::from(vertices[0].position);
        let b = Vec3::from(vertices[1].position);
        let c = Vec3::from(vertices[2].position);
        (b - a).cross(c - a)
    }

    #[test]
    fn test_cube_expands_to_36_vertices() {
        let cube = Mesh::cube();
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.triangle_vertices().len(), 36);
    }

    #[test]
    fn test_sphere_faces_point_outward() {
        let sphere = Mesh::sphere(1.0, 16, 8);
        let vertices = sphere.triangle_vertices();

        for triangle in vertices.chunks_exact(3) {
            let normal = face_normal(triangle);
            if normal.length_squared() < 1e-8 {
                // Degenerate triangles at the poles
                continue;
            }
            let center = triangle
                .iter()
                .map(|v| Vec3::from(v.position))
                .sum::<Vec3>()
                / 3.0;
            assert!(normal.dot(center) > 0.0);
        }
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let vertices = Mesh::cube().triangle_vertices();
        for triangle in vertices.chunks_exact(3) {
            let normal = face_normal(triangle);
            assert!(normal.dot(Vec3::from(triangle[0].normal)) > 0.0);
        }
    }

    #[test]
    fn test_upload_reports_vertex_count() {
        let mut ctx = RecordingContext::new();
        let mesh = Mesh::plane(2.0).upload(&mut ctx).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
    }

    #[test]
    fn test_empty_mesh_upload_fails() {
        let mut ctx = RecordingContext::new();
        assert!(Mesh::default().upload(&mut ctx).is_err());
    }
}
