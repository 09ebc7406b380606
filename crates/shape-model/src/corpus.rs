//! Corpus management: the baseline mesh and the raw input shapes.

use std::path::{Path, PathBuf};

use scan_mesh::Mesh;
use tracing::{debug, info, warn};

use crate::error::{ShapeModelError, ShapeModelResult};
use crate::source::{FileMeshSource, MeshSource};

/// A baseline needs vertices, and every face must index one of them.
pub(crate) fn check_baseline(mesh: &Mesh) -> ShapeModelResult<()> {
    if mesh.vertices.is_empty() {
        return Err(ShapeModelError::InvalidInput {
            details: "baseline mesh has no vertices".to_string(),
        });
    }
    mesh.check_faces().map_err(|e| ShapeModelError::InvalidInput {
        details: format!("malformed baseline: {}", e),
    })
}

/// A raw shape and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusShape {
    /// File name (or caller-supplied label).
    pub name: String,
    /// Source file, if loaded from disk.
    pub path: Option<PathBuf>,
    pub mesh: Mesh,
}

/// Ordered collection of raw shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    shapes: Vec<CorpusShape>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shapes(&self) -> &[CorpusShape] {
        &self.shapes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CorpusShape> {
        self.shapes.iter()
    }

    /// Names in corpus order.
    pub fn names(&self) -> Vec<&str> {
        self.shapes.iter().map(|s| s.name.as_str()).collect()
    }

    /// Append an in-memory shape.
    pub fn push(&mut self, name: impl Into<String>, mesh: Mesh) {
        self.shapes.push(CorpusShape {
            name: name.into(),
            path: None,
            mesh,
        });
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a CorpusShape;
    type IntoIter = std::slice::Iter<'a, CorpusShape>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.iter()
    }
}

/// Owns the baseline and the raw corpus.
///
/// ```no_run
/// use shape_model::CorpusManager;
///
/// let mut manager = CorpusManager::new();
/// manager.load_baseline("scans/baseline.stl", true)?;
/// manager.import_corpus("scans/limbs", ".stl", true)?;
/// manager.slice_all(150.0)?;
/// # Ok::<(), shape_model::ShapeModelError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CorpusManager<S = FileMeshSource> {
    source: S,
    baseline: Option<Mesh>,
    corpus: Corpus,
}

impl CorpusManager<FileMeshSource> {
    /// Manager backed by STL/OBJ files.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: MeshSource> CorpusManager<S> {
    /// Manager backed by a custom mesh source.
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            baseline: None,
            corpus: Corpus::new(),
        }
    }

    /// Store the baseline, replacing any previous one.
    ///
    /// Results already derived from a previous baseline are not touched;
    /// they must be rebuilt by the caller.
    pub fn set_baseline(&mut self, mesh: Mesh) -> ShapeModelResult<()> {
        check_baseline(&mesh)?;
        if let Some(previous) = &self.baseline {
            warn!(
                "Replacing baseline ({} vertices) with a new one ({} vertices)",
                previous.vertex_count(),
                mesh.vertex_count()
            );
        } else {
            info!(
                "Baseline set: {} vertices, {} faces",
                mesh.vertex_count(),
                mesh.face_count()
            );
        }
        self.baseline = Some(mesh);
        Ok(())
    }

    /// Load the baseline through the mesh source.
    pub fn load_baseline(&mut self, path: impl AsRef<Path>, unify: bool) -> ShapeModelResult<()> {
        let mesh = self.source.load(path.as_ref(), unify)?;
        self.set_baseline(mesh)
    }

    pub fn baseline(&self) -> Option<&Mesh> {
        self.baseline.as_ref()
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Mutable access for adding in-memory shapes.
    pub fn corpus_mut(&mut self) -> &mut Corpus {
        &mut self.corpus
    }

    /// Replace the corpus with every file in `dir` whose name ends with
    /// `extension`, sorted by file name.
    ///
    /// A directory without matching files gives an empty corpus. Returns the
    /// number of shapes loaded.
    pub fn import_corpus(
        &mut self,
        dir: impl AsRef<Path>,
        extension: &str,
        unify: bool,
    ) -> ShapeModelResult<usize> {
        let dir = dir.as_ref();
        let io_error = |source| ShapeModelError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(extension) && path.is_file() {
                files.push((name, path));
            }
        }
        files.sort();

        let mut corpus = Corpus::new();
        for (name, path) in files {
            let mesh = self.source.load(&path, unify)?;
            debug!("Loaded {} ({} vertices)", name, mesh.vertex_count());
            corpus.shapes.push(CorpusShape {
                name,
                path: Some(path),
                mesh,
            });
        }

        if corpus.is_empty() {
            warn!("No files ending in {:?} found in {}", extension, dir.display());
        } else {
            info!("Imported {} shapes from {}", corpus.len(), dir.display());
        }

        self.corpus = corpus;
        Ok(self.corpus.len())
    }

    /// Trim every corpus shape at `height`, in place.
    pub fn slice_all(&mut self, height: f64) -> ShapeModelResult<()> {
        if self.corpus.is_empty() {
            return Err(ShapeModelError::InsufficientData {
                details: "cannot slice an empty corpus".to_string(),
            });
        }
        for shape in &mut self.corpus.shapes {
            shape.mesh = self.source.trim(&shape.mesh, height);
        }
        info!("Sliced {} shapes at {:.2}", self.corpus.len(), height);
        Ok(())
    }

    /// Take the baseline and corpus out of the manager.
    pub fn into_parts(self) -> (Option<Mesh>, Corpus) {
        (self.baseline, self.corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_mesh::Vertex;

    fn triangle(z: f64) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, z));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, z));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, z + 10.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    #[test]
    fn test_empty_baseline_rejected() {
        let mut manager = CorpusManager::new();
        let err = manager.set_baseline(Mesh::new()).unwrap_err();
        assert!(matches!(err, ShapeModelError::InvalidInput { .. }));
        assert!(manager.baseline().is_none());
    }

    #[test]
    fn test_baseline_with_dangling_face_rejected() {
        let mut mesh = triangle(0.0);
        mesh.faces[0] = [0, 1, 5];

        let mut manager = CorpusManager::new();
        let err = manager.set_baseline(mesh).unwrap_err();
        assert!(matches!(err, ShapeModelError::InvalidInput { .. }));
        assert!(manager.baseline().is_none());
    }

    #[test]
    fn test_baseline_can_be_replaced() {
        let mut manager = CorpusManager::new();
        manager.set_baseline(triangle(0.0)).unwrap();
        manager.set_baseline(triangle(5.0)).unwrap();
        assert_eq!(manager.baseline(), Some(&triangle(5.0)));
    }

    #[test]
    fn test_missing_directory() {
        let mut manager = CorpusManager::new();
        let err = manager
            .import_corpus("/definitely/not/a/real/dir", ".stl", true)
            .unwrap_err();
        assert!(matches!(err, ShapeModelError::Io { .. }));
    }

    #[test]
    fn test_no_matching_files_gives_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a mesh").unwrap();

        let mut manager = CorpusManager::new();
        let count = manager.import_corpus(dir.path(), ".stl", true).unwrap();
        assert_eq!(count, 0);
        assert!(manager.corpus().is_empty());
    }

    #[test]
    fn test_import_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.obj", "a.obj", "c.obj"] {
            triangle(0.0).save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("skip.stl"), "solid x\nendsolid x\n").unwrap();

        let mut manager = CorpusManager::new();
        let count = manager.import_corpus(dir.path(), ".obj", true).unwrap();
        assert_eq!(count, 3);
        assert_eq!(manager.corpus().names(), vec!["a.obj", "b.obj", "c.obj"]);
        assert!(manager.corpus().iter().all(|s| s.path.is_some()));
    }

    #[test]
    fn test_slice_empty_corpus() {
        let mut manager = CorpusManager::new();
        let err = manager.slice_all(10.0).unwrap_err();
        assert!(matches!(err, ShapeModelError::InsufficientData { .. }));
    }

    #[test]
    fn test_slice_all_is_idempotent() {
        let mut manager = CorpusManager::new();
        manager.corpus_mut().push("low", triangle(0.0));
        manager.corpus_mut().push("high", triangle(-20.0));

        manager.slice_all(5.0).unwrap();
        let once = manager.corpus().clone();
        manager.slice_all(5.0).unwrap();

        assert_eq!(manager.corpus(), &once);
        // The first triangle reaches z = 10 and loses its only face.
        assert!(once.shapes()[0].mesh.faces.is_empty());
        assert_eq!(once.shapes()[1].mesh.face_count(), 1);
    }
}
