//! Planar trimming of scans.
//!
//! Residual-limb scans are usually cut at a fixed height so that every
//! shape in a corpus covers the same region before registration.

use tracing::{debug, info};

use crate::weld::remove_unreferenced_vertices;
use crate::Mesh;

/// Coordinate axis used as the trimming direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    #[inline]
    fn coord(self, p: &nalgebra::Point3<f64>) -> f64 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
            Axis::Z => p.z,
        }
    }
}

/// Remove all geometry above `height` along the Z axis.
///
/// See [`planar_trim_along`].
pub fn planar_trim(mesh: &Mesh, height: f64) -> Mesh {
    planar_trim_along(mesh, height, Axis::Z)
}

/// Remove all geometry whose `axis` coordinate exceeds `height`.
///
/// A face is kept only if all three of its vertices lie at or below the
/// plane; vertices left without a face are dropped. Surviving vertices keep
/// their relative order, and trimming an already trimmed mesh at the same
/// height returns it unchanged.
pub fn planar_trim_along(mesh: &Mesh, height: f64, axis: Axis) -> Mesh {
    let below = |i: u32| axis.coord(&mesh.vertices[i as usize].position) <= height;

    let trimmed = if mesh.faces.is_empty() {
        // Point cloud: filter vertices directly
        Mesh {
            vertices: mesh
                .vertices
                .iter()
                .filter(|v| axis.coord(&v.position) <= height)
                .cloned()
                .collect(),
            faces: Vec::new(),
        }
    } else {
        let mut kept = Mesh {
            vertices: mesh.vertices.clone(),
            faces: mesh
                .faces
                .iter()
                .copied()
                .filter(|f| f.iter().all(|&i| below(i)))
                .collect(),
        };
        remove_unreferenced_vertices(&mut kept);
        kept
    };

    let removed_faces = mesh.face_count() - trimmed.face_count();
    let removed_vertices = mesh.vertex_count() - trimmed.vertex_count();
    if removed_faces > 0 || removed_vertices > 0 {
        info!(
            "Trimmed at {:?} = {:.2}: removed {} faces, {} vertices",
            axis, height, removed_faces, removed_vertices
        );
    } else {
        debug!("Trim at {:?} = {:.2} removed nothing", axis, height);
    }

    trimmed
}
