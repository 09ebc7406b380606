//! Mesh topology queries via adjacency structures.

use hashbrown::{HashMap, HashSet};

/// Lightweight topology structure for mesh queries.
///
/// Provides edge-to-face and vertex-to-vertex lookups without the overhead
/// of a full half-edge data structure.
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps edge (min_idx, max_idx) → list of face indices that share this edge.
    /// Edge key is always (smaller_index, larger_index) for canonical ordering.
    pub edge_to_faces: HashMap<(u32, u32), Vec<u32>>,

    /// Maps vertex index → neighbouring vertex indices (one-ring).
    pub vertex_neighbors: HashMap<u32, Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency structures from a face list.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> = HashMap::new();
        let mut neighbor_sets: HashMap<u32, HashSet<u32>> = HashMap::new();

        for (face_idx, &[v0, v1, v2]) in faces.iter().enumerate() {
            let face_idx = face_idx as u32;

            for &(a, b) in &[(v0, v1), (v1, v2), (v2, v0)] {
                let edge_key = if a < b { (a, b) } else { (b, a) };
                edge_to_faces.entry(edge_key).or_default().push(face_idx);

                neighbor_sets.entry(a).or_default().insert(b);
                neighbor_sets.entry(b).or_default().insert(a);
            }
        }

        // Sorted so that traversal order does not depend on hashing
        let vertex_neighbors = neighbor_sets
            .into_iter()
            .map(|(v, set)| {
                let mut list: Vec<u32> = set.into_iter().collect();
                list.sort_unstable();
                (v, list)
            })
            .collect();

        Self {
            edge_to_faces,
            vertex_neighbors,
        }
    }

    /// Find boundary edges (edges with exactly 1 adjacent face).
    ///
    /// In a watertight mesh, this returns an empty iterator.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Count boundary edges.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Vertices lying on a boundary edge, sorted and deduplicated.
    ///
    /// For an open scan this is the brim where the surface was cut.
    pub fn boundary_vertices(&self) -> Vec<u32> {
        let mut vertices: Vec<u32> = self.boundary_edges().flat_map(|(a, b)| [a, b]).collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    /// Neighbouring vertices of `vertex_idx`, in ascending index order.
    pub fn neighbors(&self, vertex_idx: u32) -> &[u32] {
        self.vertex_neighbors
            .get(&vertex_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get faces adjacent to an edge.
    /// The edge is automatically canonicalized (min, max).
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[u32]> {
        let edge_key = if v0 < v1 { (v0, v1) } else { (v1, v0) };
        self.edge_to_faces.get(&edge_key).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle() -> Vec<[u32; 3]> {
        vec![[0, 1, 2]]
    }

    fn two_triangles_shared_edge() -> Vec<[u32; 3]> {
        vec![[0, 1, 2], [1, 0, 3]]
    }

    fn tetrahedron() -> Vec<[u32; 3]> {
        vec![[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]]
    }

    #[test]
    fn test_single_triangle_boundary() {
        let adj = MeshAdjacency::build(&single_triangle());
        assert_eq!(adj.boundary_edge_count(), 3);
        assert_eq!(adj.boundary_vertices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_two_triangles_shared_edge() {
        let adj = MeshAdjacency::build(&two_triangles_shared_edge());
        let shared = adj.faces_for_edge(0, 1).expect("edge exists");
        assert_eq!(shared.len(), 2);
        assert_eq!(adj.boundary_edge_count(), 4);
        assert_eq!(adj.faces_for_edge(1, 0), adj.faces_for_edge(0, 1));
    }

    #[test]
    fn test_tetrahedron_has_no_brim() {
        let adj = MeshAdjacency::build(&tetrahedron());
        assert_eq!(adj.boundary_edge_count(), 0);
        assert!(adj.boundary_vertices().is_empty());
    }

    #[test]
    fn test_neighbors_sorted() {
        let adj = MeshAdjacency::build(&two_triangles_shared_edge());
        assert_eq!(adj.neighbors(0), &[1, 2, 3]);
        assert_eq!(adj.neighbors(2), &[0, 1]);
        assert!(adj.neighbors(99).is_empty());
    }
}
