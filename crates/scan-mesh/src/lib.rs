//! Triangle mesh utilities for surface scans.
//!
//! This crate provides the mesh layer used by the shape-model pipeline:
//!
//! - **Loading/Saving**: STL and OBJ formats, with optional vertex unification
//! - **Topology**: boundary (brim) detection and one-ring neighbourhoods
//! - **Preparation**: planar trimming and vertex welding
//!
//! # Example
//!
//! ```no_run
//! use scan_mesh::{LoadOptions, Mesh};
//!
//! // Load a scan, merging coincident STL corners
//! let mesh = Mesh::load_with("limb_01.stl", &LoadOptions { unify: true }).unwrap();
//!
//! // Cut everything above 150 mm
//! let trimmed = mesh.trimmed(150.0);
//!
//! // Write as OBJ to keep the indexed structure
//! trimmed.save("limb_01_trimmed.obj").unwrap();
//! ```

mod error;
mod types;

pub mod adjacency;
pub mod io;
pub mod trim;
pub mod weld;

// Re-export core types at crate root
pub use error::{MeshError, MeshResult};
pub use types::{Mesh, Vertex};

pub use adjacency::MeshAdjacency;

pub use io::{load_mesh, load_mesh_with, save_mesh, save_obj, save_stl, LoadOptions, MeshFormat};
pub use trim::{planar_trim, planar_trim_along, Axis};
pub use weld::{remove_unreferenced_vertices, split_vertices, unify_vertices, weld_vertices};

// Re-export nalgebra so downstream crates agree on point types
pub use nalgebra;

// Convenience methods on Mesh
impl Mesh {
    /// Load a mesh from a file, auto-detecting format from extension.
    pub fn load(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        io::load_mesh(path.as_ref())
    }

    /// Load a mesh from a file with explicit load options.
    pub fn load_with(path: impl AsRef<std::path::Path>, options: &LoadOptions) -> MeshResult<Self> {
        io::load_mesh_with(path.as_ref(), options)
    }

    /// Save the mesh to a file, auto-detecting format from extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> MeshResult<()> {
        io::save_mesh(self, path.as_ref())
    }

    /// Copy of this mesh with everything above `height` (Z axis) removed.
    pub fn trimmed(&self, height: f64) -> Mesh {
        trim::planar_trim(self, height)
    }

    /// Build adjacency information for this mesh.
    pub fn adjacency(&self) -> MeshAdjacency {
        MeshAdjacency::build(&self.faces)
    }
}
