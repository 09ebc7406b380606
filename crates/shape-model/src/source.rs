//! Where corpus meshes come from.

use std::path::Path;

use scan_mesh::{planar_trim, LoadOptions, Mesh, MeshResult};

/// Loads and trims meshes for the corpus manager.
pub trait MeshSource {
    /// Load the mesh stored at `path`. `unify` merges coincident vertices.
    fn load(&self, path: &Path, unify: bool) -> MeshResult<Mesh>;

    /// Copy of `mesh` with everything above `height` removed.
    fn trim(&self, mesh: &Mesh, height: f64) -> Mesh;
}

/// STL/OBJ files read through `scan-mesh`, trimmed along Z.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMeshSource;

impl MeshSource for FileMeshSource {
    fn load(&self, path: &Path, unify: bool) -> MeshResult<Mesh> {
        Mesh::load_with(path, &LoadOptions { unify })
    }

    fn trim(&self, mesh: &Mesh, height: f64) -> Mesh {
        planar_trim(mesh, height)
    }
}

impl<T: MeshSource + ?Sized> MeshSource for &T {
    fn load(&self, path: &Path, unify: bool) -> MeshResult<Mesh> {
        (**self).load(path, unify)
    }

    fn trim(&self, mesh: &Mesh, height: f64) -> Mesh {
        (**self).trim(mesh, height)
    }
}
