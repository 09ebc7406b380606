//! JSON model files.
//!
//! A basis is only meaningful together with the flattening order of its
//! rows, so the file records that order explicitly alongside the arrays.
//! Matrices are stored flat in column-major order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ShapeModelError, ShapeModelResult};
use crate::pca::ShapeModel;

/// Current model file version.
pub const FORMAT_VERSION: u32 = 1;

/// Row order of the mean and basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexOrder {
    /// Vertex by vertex, x then y then z.
    VertexMajorXyz,
}

/// On-disk representation of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub format_version: u32,
    pub vertex_order: VertexOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub vertex_count: usize,
    pub mode_count: usize,
    pub sample_count: usize,
    pub mean: Vec<f64>,
    /// D×K, column-major.
    pub basis: Vec<f64>,
    pub singular_values: Vec<f64>,
    /// K×N, column-major.
    pub scores: Vec<f64>,
    pub mode_std_devs: Vec<f64>,
    /// Baseline faces, for turning synthesized shapes back into meshes.
    #[serde(default)]
    pub faces: Vec<[u32; 3]>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl ModelFile {
    /// Capture a model and the faces of its baseline.
    pub fn from_model(model: &ShapeModel, faces: &[[u32; 3]]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            vertex_order: VertexOrder::VertexMajorXyz,
            name: None,
            vertex_count: model.vertex_count(),
            mode_count: model.mode_count(),
            sample_count: model.sample_count(),
            mean: model.mean().as_slice().to_vec(),
            basis: model.basis().as_slice().to_vec(),
            singular_values: model.singular_values().as_slice().to_vec(),
            scores: model.scores().as_slice().to_vec(),
            mode_std_devs: model.mode_std_devs().as_slice().to_vec(),
            faces: faces.to_vec(),
            sources: model.sources().to_vec(),
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Check every array length against the recorded dimensions.
    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            ));
        }
        let k = self.mode_count;
        let n = self.sample_count;
        let product = |field: &str, a: usize, b: usize| {
            a.checked_mul(b)
                .ok_or_else(|| format!("{} size overflows ({} x {})", field, a, b))
        };
        let d = product("mean", 3, self.vertex_count)?;

        let expect = |field: &str, got: usize, want: usize| {
            if got == want {
                Ok(())
            } else {
                Err(format!("{} has {} values, expected {}", field, got, want))
            }
        };
        expect("mean", self.mean.len(), d)?;
        expect("basis", self.basis.len(), product("basis", d, k)?)?;
        expect("singular_values", self.singular_values.len(), k)?;
        expect("scores", self.scores.len(), product("scores", k, n)?)?;
        expect("mode_std_devs", self.mode_std_devs.len(), k)?;
        if !self.sources.is_empty() {
            expect("sources", self.sources.len(), n)?;
        }

        if let Some(face) = self
            .faces
            .iter()
            .find(|f| f.iter().any(|&v| v as usize >= self.vertex_count))
        {
            return Err(format!(
                "face {:?} references a vertex beyond {}",
                face, self.vertex_count
            ));
        }
        Ok(())
    }

    /// Rebuild the model. Returns the model and the stored faces.
    pub fn into_model(self) -> ShapeModelResult<(ShapeModel, Vec<[u32; 3]>)> {
        self.validate()
            .map_err(|details| ShapeModelError::InvalidInput { details })?;

        let d = 3 * self.vertex_count;
        let k = self.mode_count;
        let n = self.sample_count;
        let model = ShapeModel::from_parts(
            DVector::from_vec(self.mean),
            DMatrix::from_vec(d, k, self.basis),
            DVector::from_vec(self.singular_values),
            DMatrix::from_vec(k, n, self.scores),
            DVector::from_vec(self.mode_std_devs),
            self.sources,
        )?;
        Ok((model, self.faces))
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> ShapeModelResult<()> {
        let path = path.as_ref();
        let persist_error = |details: String| ShapeModelError::Persist {
            path: path.to_path_buf(),
            details,
        };

        let file = File::create(path).map_err(|e| persist_error(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| persist_error(e.to_string()))?;
        writer.flush().map_err(|e| persist_error(e.to_string()))?;

        info!(
            "Saved model ({} vertices, {} modes) to {}",
            self.vertex_count,
            self.mode_count,
            path.display()
        );
        Ok(())
    }

    /// Read and validate a model file.
    pub fn load(path: impl AsRef<Path>) -> ShapeModelResult<Self> {
        let path = path.as_ref();
        let persist_error = |details: String| ShapeModelError::Persist {
            path: path.to_path_buf(),
            details,
        };

        let file = File::open(path).map_err(|e| persist_error(e.to_string()))?;
        let model_file: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| persist_error(e.to_string()))?;
        model_file.validate().map_err(persist_error)?;
        Ok(model_file)
    }
}

/// Save `model` with its baseline faces.
pub fn save_model(
    model: &ShapeModel,
    faces: &[[u32; 3]],
    path: impl AsRef<Path>,
) -> ShapeModelResult<()> {
    ModelFile::from_model(model, faces).save(path)
}

/// Load a model and its baseline faces.
pub fn load_model(path: impl AsRef<Path>) -> ShapeModelResult<(ShapeModel, Vec<[u32; 3]>)> {
    ModelFile::load(path)?.into_model()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::DataMatrix;
    use approx::assert_relative_eq;

    fn model() -> ShapeModel {
        let data = DataMatrix::new(DMatrix::from_column_slice(
            6,
            3,
            &[
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
                0.1, 0.0, 0.0, 2.0, 0.0, 0.5, //
                0.0, 1.0, 0.0, 1.0, 0.3, 0.0,
            ],
        ))
        .unwrap();
        ShapeModel::fit(&data).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let original = model();

        save_model(&original, &[], &path).unwrap();
        let (loaded, faces) = load_model(&path).unwrap();

        assert!(faces.is_empty());
        assert_eq!(loaded.sources(), original.sources());
        assert_relative_eq!(loaded.mean(), original.mean(), epsilon = 1e-12);
        assert_relative_eq!(loaded.basis(), original.basis(), epsilon = 1e-12);
        assert_relative_eq!(
            loaded.singular_values(),
            original.singular_values(),
            epsilon = 1e-12
        );
        assert_relative_eq!(loaded.scores(), original.scores(), epsilon = 1e-12);
        assert_relative_eq!(
            loaded.mode_std_devs(),
            original.mode_std_devs(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_vertex_order_tag() {
        let json = serde_json::to_string(&ModelFile::from_model(&model(), &[])).unwrap();
        assert!(json.contains("\"vertex_order\":\"vertex_major_xyz\""));
    }

    #[test]
    fn test_truncated_basis_rejected() {
        let mut file = ModelFile::from_model(&model(), &[]);
        file.basis.pop();
        assert!(file.validate().is_err());
        assert!(matches!(
            file.into_model(),
            Err(ShapeModelError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let mut file = ModelFile::from_model(&model(), &[]);
        file.vertex_count = usize::MAX / 2;
        let err = file.validate().unwrap_err();
        assert!(err.contains("overflows"));

        let mut file = ModelFile::from_model(&model(), &[]);
        file.mode_count = usize::MAX;
        assert!(file.validate().unwrap_err().contains("overflows"));
    }

    #[test]
    fn test_load_oversized_file_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut file = ModelFile::from_model(&model(), &[]);
        file.vertex_count = usize::MAX / 2;
        file.save(&path).unwrap();

        let err = load_model(&path).unwrap_err();
        assert!(matches!(err, ShapeModelError::Persist { .. }));
    }

    #[test]
    fn test_bad_face_rejected() {
        let file = ModelFile::from_model(&model(), &[[0, 1, 2]]);
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_model("/no/such/model.json").unwrap_err();
        assert!(matches!(err, ShapeModelError::Persist { .. }));
    }
}
