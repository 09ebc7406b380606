//! Holder for the current model.

use std::sync::Arc;

use nalgebra::DVector;
use tracing::warn;

use crate::align::DataMatrix;
use crate::error::{ShapeModelError, ShapeModelResult};
use crate::pca::ShapeModel;
use crate::synth::ScaleMode;

/// Fits models and serves synthesis requests from the latest one.
///
/// A failed [`fit`](Self::fit) leaves the previous model in place.
#[derive(Debug, Clone, Default)]
pub struct ShapeModelEngine {
    model: Option<Arc<ShapeModel>>,
}

impl ShapeModelEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine serving an existing model.
    pub fn with_model(model: ShapeModel) -> Self {
        Self {
            model: Some(Arc::new(model)),
        }
    }

    /// Fit a new model and make it current.
    pub fn fit(&mut self, data: &DataMatrix) -> ShapeModelResult<Arc<ShapeModel>> {
        let model = match ShapeModel::fit(data) {
            Ok(model) => Arc::new(model),
            Err(e) => {
                if self.model.is_some() {
                    warn!("Fit failed, keeping the previous model: {}", e);
                }
                return Err(e);
            }
        };
        self.model = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Current model, shared.
    pub fn model(&self) -> ShapeModelResult<Arc<ShapeModel>> {
        self.model.clone().ok_or(ShapeModelError::ModelNotFitted)
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    /// Synthesize from the current model.
    pub fn synthesize(&self, coefficients: &[f64], mode: ScaleMode) -> ShapeModelResult<DVector<f64>> {
        self.model
            .as_ref()
            .ok_or(ShapeModelError::ModelNotFitted)?
            .synthesize(coefficients, mode)
    }

    /// Explained variance of the current model.
    pub fn explained_variance(&self) -> ShapeModelResult<DVector<f64>> {
        Ok(self.model()?.explained_variance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn data() -> DataMatrix {
        DataMatrix::new(DMatrix::from_column_slice(
            3,
            2,
            &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        ))
        .unwrap()
    }

    #[test]
    fn test_synthesize_before_fit() {
        let engine = ShapeModelEngine::new();
        let err = engine.synthesize(&[], ScaleMode::Raw).unwrap_err();
        assert!(matches!(err, ShapeModelError::ModelNotFitted));
        assert!(matches!(engine.model(), Err(ShapeModelError::ModelNotFitted)));
    }

    #[test]
    fn test_failed_fit_keeps_previous_model() {
        let mut engine = ShapeModelEngine::new();
        let first = engine.fit(&data()).unwrap();

        let mut bad = DMatrix::zeros(3, 2);
        bad[(0, 0)] = f64::INFINITY;
        let err = engine.fit(&DataMatrix::new(bad).unwrap()).unwrap_err();
        assert!(matches!(err, ShapeModelError::Decomposition { .. }));

        let current = engine.model().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
    }

    #[test]
    fn test_synthesize_after_fit() {
        let mut engine = ShapeModelEngine::new();
        engine.fit(&data()).unwrap();
        let mean = engine.synthesize(&[0.0], ScaleMode::Standardized).unwrap();
        assert_eq!(mean.as_slice(), &[0.5, 0.5, 0.5]);
        assert_eq!(engine.explained_variance().unwrap().len(), 2);
    }
}
