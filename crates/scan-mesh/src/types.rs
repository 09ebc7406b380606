//! Core mesh data types.

use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, MeshResult};

/// A mesh vertex.
///
/// Coordinates are typically in millimeters but the library is unit-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,
}

impl Vertex {
    /// Create a new vertex at the given position.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A triangle mesh with indexed vertices and faces.
///
/// Vertex order is significant: shapes registered to a common baseline are
/// compared vertex by vertex, so operations that keep the topology also keep
/// the order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    /// Each face is [v0, v1, v2] with counter-clockwise winding.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Build a mesh from positions and faces.
    pub fn from_parts(positions: &[Point3<f64>], faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices: positions.iter().copied().map(Vertex::new).collect(),
            faces,
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Vertex positions in vertex order.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Flatten vertex positions into `[x0, y0, z0, x1, y1, z1, ...]`.
    ///
    /// This vertex-major layout is the one used for shape-model columns.
    pub fn flat_positions(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.vertices.len() * 3);
        for v in &self.vertices {
            flat.extend_from_slice(&[v.position.x, v.position.y, v.position.z]);
        }
        flat
    }

    /// Return a copy of this mesh with positions replaced from a flat
    /// vertex-major buffer. Faces are kept as-is.
    pub fn with_flat_positions(&self, flat: &[f64]) -> MeshResult<Self> {
        let expected = self.vertices.len() * 3;
        if flat.len() != expected {
            return Err(MeshError::CoordinateCountMismatch {
                expected,
                actual: flat.len(),
            });
        }

        let vertices = flat
            .chunks_exact(3)
            .map(|c| Vertex::from_coords(c[0], c[1], c[2]))
            .collect();

        Ok(Self {
            vertices,
            faces: self.faces.clone(),
        })
    }

    /// Check that every face references an existing vertex.
    pub fn check_faces(&self) -> MeshResult<()> {
        let vertex_count = self.vertices.len();
        for (face, tri) in self.faces.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::FaceIndexOutOfRange {
                    face,
                    vertex,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh is empty.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let mut min = first;
        let mut max = first;

        for vertex in &self.vertices[1..] {
            let p = &vertex.position;
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }

    /// Translate mesh by the given vector.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale mesh uniformly around the origin.
    pub fn scale(&mut self, factor: f64) {
        for vertex in &mut self.vertices {
            vertex.position.coords *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    fn square() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([0, 2, 3]);
        mesh
    }

    #[test]
    fn test_vertex_creation() {
        let v = Vertex::from_coords(1.0, 2.0, 3.0);
        assert!(approx_eq(v.position.x, 1.0));
        assert!(approx_eq(v.position.y, 2.0));
        assert!(approx_eq(v.position.z, 3.0));
    }

    #[test]
    fn test_flat_positions_are_vertex_major() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(1.0, 2.0, 3.0));
        mesh.vertices.push(Vertex::from_coords(4.0, 5.0, 6.0));

        assert_eq!(mesh.flat_positions(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_with_flat_positions_keeps_faces() {
        let mesh = square();
        let flat: Vec<f64> = mesh.flat_positions().iter().map(|c| c * 2.0).collect();

        let scaled = mesh.with_flat_positions(&flat).expect("matching length");
        assert_eq!(scaled.faces, mesh.faces);
        assert!(approx_eq(scaled.vertices[2].position.x, 2.0));
        assert!(approx_eq(scaled.vertices[2].position.y, 2.0));
    }

    #[test]
    fn test_with_flat_positions_rejects_wrong_length() {
        let mesh = square();
        let err = mesh.with_flat_positions(&[0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            MeshError::CoordinateCountMismatch {
                expected: 12,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_check_faces() {
        let mut mesh = square();
        assert!(mesh.check_faces().is_ok());

        mesh.faces.push([0, 1, 7]);
        assert!(matches!(
            mesh.check_faces(),
            Err(MeshError::FaceIndexOutOfRange { face: 2, vertex: 7, .. })
        ));
    }

    #[test]
    fn test_mesh_bounds() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(10.0, 5.0, 3.0));
        mesh.vertices.push(Vertex::from_coords(-2.0, 8.0, 1.0));

        let (min, max) = mesh.bounds().expect("non-empty mesh");
        assert!(approx_eq(min.x, -2.0));
        assert!(approx_eq(min.y, 0.0));
        assert!(approx_eq(min.z, 0.0));
        assert!(approx_eq(max.x, 10.0));
        assert!(approx_eq(max.y, 8.0));
        assert!(approx_eq(max.z, 3.0));
    }

    #[test]
    fn test_empty_mesh_bounds() {
        let mesh = Mesh::new();
        assert!(mesh.bounds().is_none());
    }

    #[test]
    fn test_translate_and_scale() {
        let mut mesh = square();
        mesh.scale(3.0);
        mesh.translate(Vector3::new(1.0, 0.0, -1.0));

        assert!(approx_eq(mesh.vertices[2].position.x, 4.0));
        assert!(approx_eq(mesh.vertices[2].position.y, 3.0));
        assert!(approx_eq(mesh.vertices[2].position.z, -1.0));
    }
}
