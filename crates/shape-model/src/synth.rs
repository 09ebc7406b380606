//! Synthesis of new shapes from mode coefficients.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DVector, Point3};
use scan_mesh::Mesh;
use serde::{Deserialize, Serialize};

use crate::error::{ShapeModelError, ShapeModelResult};
use crate::pca::ShapeModel;

/// How synthesis coefficients are scaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// Coefficients in score units: `mean + Σ U[:,k]·c[k]`.
    #[default]
    Raw,
    /// Coefficients in standard deviations of each mode:
    /// `mean + Σ U[:,k]·σ[k]·c[k]`.
    Standardized,
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleMode::Raw => write!(f, "raw"),
            ScaleMode::Standardized => write!(f, "standardized"),
        }
    }
}

impl FromStr for ScaleMode {
    type Err = ShapeModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "eigs" => Ok(ScaleMode::Raw),
            "standardized" | "std" => Ok(ScaleMode::Standardized),
            other => Err(ShapeModelError::InvalidInput {
                details: format!("unknown scale mode {:?} (expected raw or standardized)", other),
            }),
        }
    }
}

impl ShapeModel {
    /// Flattened shape (length D) for the given coefficients.
    ///
    /// Fewer than K coefficients are padded with zeros for the trailing
    /// modes; more than K is a [`ShapeModelError::DimensionMismatch`].
    pub fn synthesize(&self, coefficients: &[f64], mode: ScaleMode) -> ShapeModelResult<DVector<f64>> {
        let modes = self.mode_count();
        if coefficients.len() > modes {
            return Err(ShapeModelError::DimensionMismatch {
                got: coefficients.len(),
                modes,
            });
        }

        let mut shape = self.mean().clone();
        for (k, &c) in coefficients.iter().enumerate() {
            let weight = match mode {
                ScaleMode::Raw => c,
                ScaleMode::Standardized => c * self.mode_std_devs()[k],
            };
            if weight != 0.0 {
                shape.axpy(weight, &self.basis().column(k), 1.0);
            }
        }
        Ok(shape)
    }

    /// Synthesized shape as vertex positions.
    pub fn synthesize_positions(
        &self,
        coefficients: &[f64],
        mode: ScaleMode,
    ) -> ShapeModelResult<Vec<Point3<f64>>> {
        let flat = self.synthesize(coefficients, mode)?;
        Ok(flat
            .as_slice()
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect())
    }

    /// Synthesized shape as a mesh with the given (baseline) faces.
    pub fn synthesize_mesh(
        &self,
        coefficients: &[f64],
        mode: ScaleMode,
        faces: &[[u32; 3]],
    ) -> ShapeModelResult<Mesh> {
        let positions = self.synthesize_positions(coefficients, mode)?;
        let mesh = Mesh::from_parts(&positions, faces.to_vec());
        mesh.check_faces()?;
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::DataMatrix;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn model() -> ShapeModel {
        let data = DataMatrix::new(DMatrix::from_column_slice(
            6,
            3,
            &[
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 2.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 1.0, 0.0, 0.0,
            ],
        ))
        .unwrap();
        ShapeModel::fit(&data).unwrap()
    }

    #[test]
    fn test_zero_coefficients_give_mean() {
        let model = model();
        for mode in [ScaleMode::Raw, ScaleMode::Standardized] {
            assert_eq!(&model.synthesize(&[0.0, 0.0], mode).unwrap(), model.mean());
            assert_eq!(&model.synthesize(&[], mode).unwrap(), model.mean());
        }
    }

    #[test]
    fn test_raw_mode_adds_basis_column() {
        let model = model();
        let shape = model.synthesize(&[2.0], ScaleMode::Raw).unwrap();
        let expected = model.mean() + model.basis().column(0) * 2.0;
        assert_relative_eq!(shape, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_standardized_mode_scales_by_std_dev() {
        let model = model();
        let sigma = model.mode_std_devs()[1];
        let standardized = model.synthesize(&[0.0, 1.5], ScaleMode::Standardized).unwrap();
        let raw = model.synthesize(&[0.0, 1.5 * sigma], ScaleMode::Raw).unwrap();
        assert_relative_eq!(standardized, raw, epsilon = 1e-12);
    }

    #[test]
    fn test_too_many_coefficients() {
        let model = model();
        let err = model.synthesize(&[0.0; 4], ScaleMode::Raw).unwrap_err();
        assert!(matches!(err, ShapeModelError::DimensionMismatch { got: 4, modes: 3 }));
    }

    #[test]
    fn test_positions_and_mesh() {
        let model = model();
        let positions = model.synthesize_positions(&[], ScaleMode::Raw).unwrap();
        assert_eq!(positions.len(), 2);
        assert_relative_eq!(positions[1].x, 4.0 / 3.0, epsilon = 1e-12);

        let err = model
            .synthesize_mesh(&[], ScaleMode::Raw, &[[0, 1, 2]])
            .unwrap_err();
        assert!(matches!(err, ShapeModelError::Mesh(_)));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("raw".parse::<ScaleMode>().unwrap(), ScaleMode::Raw);
        assert_eq!("eigs".parse::<ScaleMode>().unwrap(), ScaleMode::Raw);
        assert_eq!("Std".parse::<ScaleMode>().unwrap(), ScaleMode::Standardized);
        assert!("loud".parse::<ScaleMode>().is_err());
        assert_eq!(ScaleMode::Standardized.to_string(), "standardized");
    }
}
