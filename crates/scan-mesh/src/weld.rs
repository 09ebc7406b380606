//! Vertex unification: welding coincident vertices, splitting shared ones,
//! and compacting the vertex array.

use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use tracing::{debug, info};

use crate::Mesh;

/// Distance below which two vertices are treated as the same point when
/// unifying a freshly loaded scan.
pub const UNIFY_EPSILON: f64 = 1e-9;

/// Merge coincident vertices and drop any vertex no face uses.
///
/// Returns the number of vertices removed.
pub fn unify_vertices(mesh: &mut Mesh) -> usize {
    let before = mesh.vertex_count();
    weld_vertices(mesh, UNIFY_EPSILON);
    remove_unreferenced_vertices(mesh);
    let removed = before - mesh.vertex_count();
    debug!("Unified vertices: {} -> {}", before, mesh.vertex_count());
    removed
}

/// Give every face corner its own vertex (triangle soup layout).
pub fn split_vertices(mesh: &mut Mesh) {
    let mut vertices = Vec::with_capacity(mesh.faces.len() * 3);
    for face in &mut mesh.faces {
        for index in face.iter_mut() {
            vertices.push(mesh.vertices[*index as usize].clone());
            *index = (vertices.len() - 1) as u32;
        }
    }
    debug!(
        "Split {} shared vertices into {} corners",
        mesh.vertices.len(),
        vertices.len()
    );
    mesh.vertices = vertices;
}

/// Weld vertices that are within epsilon distance of each other.
///
/// Uses spatial hashing for efficiency. Returns the number of vertices merged.
/// Merged vertices stay in the array until [`remove_unreferenced_vertices`]
/// compacts it.
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    let original_count = mesh.vertices.len();
    if original_count == 0 {
        return 0;
    }

    let cell_size = epsilon * 2.0;

    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let cell = pos_to_cell(&vertex.position, cell_size);
        spatial_hash.entry(cell).or_default().push(idx as u32);
    }

    // Each vertex maps to the smallest index in its cluster
    let mut vertex_remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged_count = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if vertex_remap[idx as usize] != idx {
            continue;
        }

        let cell = pos_to_cell(&vertex.position, cell_size);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor_cell = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                    let Some(candidates) = spatial_hash.get(&neighbor_cell) else {
                        continue;
                    };

                    for &other_idx in candidates {
                        if other_idx <= idx || vertex_remap[other_idx as usize] != other_idx {
                            continue;
                        }

                        let other_pos = &mesh.vertices[other_idx as usize].position;
                        if (vertex.position - other_pos).norm() < epsilon {
                            vertex_remap[other_idx as usize] = idx;
                            merged_count += 1;
                        }
                    }
                }
            }
        }
    }

    if merged_count == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for index in face.iter_mut() {
            *index = vertex_remap[*index as usize];
        }
    }

    // Remove faces that collapsed during welding
    mesh.faces.retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);

    info!(
        "Welded {} vertices (epsilon = {:e}): {} → {}",
        merged_count,
        epsilon,
        original_count,
        original_count - merged_count
    );

    merged_count
}

/// Remove unreferenced vertices and compact the vertex array.
///
/// Surviving vertices keep their relative order. Returns the number of
/// vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let original_count = mesh.vertices.len();

    let referenced: HashSet<u32> = mesh.faces.iter().flatten().copied().collect();
    if referenced.len() == original_count {
        return 0;
    }

    let mut new_vertices = Vec::with_capacity(referenced.len());
    let mut remap: HashMap<u32, u32> = HashMap::with_capacity(referenced.len());

    for (old_idx, vertex) in mesh.vertices.iter().enumerate() {
        if referenced.contains(&(old_idx as u32)) {
            remap.insert(old_idx as u32, new_vertices.len() as u32);
            new_vertices.push(vertex.clone());
        }
    }

    for face in &mut mesh.faces {
        for index in face.iter_mut() {
            *index = remap[&*index];
        }
    }

    let removed = original_count - new_vertices.len();
    mesh.vertices = new_vertices;

    if removed > 0 {
        debug!("Removed {} unreferenced vertices", removed);
    }

    removed
}

/// Convert position to spatial hash cell.
fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;

    fn soup_square() -> Mesh {
        // Two triangles, each with its own three corners
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([3, 4, 5]);
        mesh
    }

    #[test]
    fn test_weld_vertices() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0)); // 0
        mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 0.0)); // 1
        mesh.vertices.push(Vertex::from_coords(0.0, 10.0, 0.0)); // 2
        mesh.vertices.push(Vertex::from_coords(10.001, 0.0, 0.0)); // 3, near 1
        mesh.vertices.push(Vertex::from_coords(10.0, 10.0, 0.0)); // 4

        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([3, 2, 4]);

        let merged = weld_vertices(&mut mesh, 0.01);
        assert_eq!(merged, 1);
        assert_eq!(mesh.faces[1], [1, 2, 4]);
    }

    #[test]
    fn test_unify_soup() {
        let mut mesh = soup_square();
        let removed = unify_vertices(&mut mesh);

        assert_eq!(removed, 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert!(mesh.check_faces().is_ok());
    }

    #[test]
    fn test_unify_is_idempotent() {
        let mut mesh = soup_square();
        unify_vertices(&mut mesh);
        let once = mesh.clone();
        assert_eq!(unify_vertices(&mut mesh), 0);
        assert_eq!(mesh, once);
    }

    #[test]
    fn test_split_then_unify_restores_count() {
        let mut mesh = soup_square();
        unify_vertices(&mut mesh);

        split_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [3, 4, 5]]);

        unify_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn test_remove_unreferenced_keeps_order() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(100.0, 100.0, 100.0)); // unused
        mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 10.0, 0.0));
        mesh.faces.push([0, 2, 3]);

        let removed = remove_unreferenced_vertices(&mut mesh);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert_eq!(mesh.vertices[1].position.x, 10.0);
    }
}
