//! One-call model building from a [`PipelineConfig`].
//!
//! ```no_run
//! use shape_model::{ModelPipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_toml_file("model.toml")?;
//! let output = ModelPipeline::new(config).build("scans/baseline.stl", "scans/limbs")?;
//!
//! println!("{} modes from {} shapes", output.model.mode_count(), output.model.sample_count());
//! for entry in &output.operation_log {
//!     println!("  - {}", entry);
//! }
//! output.save("model.json")?;
//! # Ok::<(), shape_model::ShapeModelError>(())
//! ```

use std::path::Path;

use scan_mesh::Mesh;
use tracing::info;

use crate::align::{register_all, ShapeFailure};
use crate::config::PipelineConfig;
use crate::corpus::{Corpus, CorpusManager};
use crate::error::{ShapeModelError, ShapeModelResult};
use crate::pca::ShapeModel;
use crate::persist::ModelFile;
use crate::registration::{ClosestPointRegistrar, Registrar};
use crate::source::{FileMeshSource, MeshSource};

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Name from the configuration, if any.
    pub name: Option<String>,
    pub model: ShapeModel,
    /// Faces of the baseline, shared by every synthesized shape.
    pub faces: Vec<[u32; 3]>,
    /// Shapes dropped during registration.
    pub failures: Vec<ShapeFailure>,
    /// Human-readable record of each stage.
    pub operation_log: Vec<String>,
}

impl BuildOutput {
    /// Model file for this output.
    pub fn to_model_file(&self) -> ModelFile {
        ModelFile::from_model(&self.model, &self.faces).with_name(self.name.clone())
    }

    /// Save the model as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> ShapeModelResult<()> {
        self.to_model_file().save(path)
    }
}

/// Corpus import, registration and fitting driven by one configuration.
#[derive(Debug, Clone)]
pub struct ModelPipeline<S = FileMeshSource, R = ClosestPointRegistrar> {
    config: PipelineConfig,
    source: S,
    registrar: R,
}

impl ModelPipeline {
    /// File-backed pipeline with the closest-point registrar configured
    /// from `config.registrar`.
    pub fn new(config: PipelineConfig) -> Self {
        let registrar = ClosestPointRegistrar::from_config(&config.registrar);
        Self {
            config,
            source: FileMeshSource,
            registrar,
        }
    }
}

impl<S: MeshSource, R: Registrar> ModelPipeline<S, R> {
    /// Pipeline with a custom mesh source and registrar.
    pub fn with_parts(config: PipelineConfig, source: S, registrar: R) -> Self {
        Self {
            config,
            source,
            registrar,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the baseline and corpus from disk, then build the model.
    pub fn build(
        &self,
        baseline_path: impl AsRef<Path>,
        corpus_dir: impl AsRef<Path>,
    ) -> ShapeModelResult<BuildOutput> {
        self.config.validate()?;
        let corpus_config = &self.config.corpus;

        let baseline = self
            .source
            .load(baseline_path.as_ref(), corpus_config.unify)?;

        let mut manager = CorpusManager::with_source(&self.source);
        manager.import_corpus(
            corpus_dir.as_ref(),
            &corpus_config.extension,
            corpus_config.unify,
        )?;

        let (_, corpus) = manager.into_parts();
        self.build_from(baseline, corpus)
    }

    /// Build the model from an in-memory baseline and corpus.
    pub fn build_from(&self, baseline: Mesh, corpus: Corpus) -> ShapeModelResult<BuildOutput> {
        self.config.validate()?;
        let mut log = Vec::new();

        let mut manager = CorpusManager::with_source(&self.source);
        manager.set_baseline(baseline)?;
        *manager.corpus_mut() = corpus;
        log.push(format!("corpus: {} shapes", manager.corpus().len()));

        if let Some(height) = self.config.corpus.slice_height {
            manager.slice_all(height)?;
            log.push(format!("slice: trimmed at {:.2}", height));
        }

        let (baseline, corpus) = manager.into_parts();
        let baseline = baseline.ok_or_else(|| ShapeModelError::InvalidInput {
            details: "no baseline".to_string(),
        })?;

        let registered = register_all(&baseline, &corpus, &self.registrar, &self.config.registration)?;
        log.push(format!(
            "register: {} registered, {} dropped",
            registered.shapes.len(),
            registered.failures.len()
        ));

        let data = registered.build_matrix()?;
        log.push(format!(
            "matrix: {} x {}",
            data.dimension(),
            data.sample_count()
        ));

        let model = ShapeModel::fit(&data)?;
        log.push(format!("fit: {} modes", model.mode_count()));

        info!(
            "Pipeline {} complete: {} modes from {} shapes",
            self.config.name.as_deref().unwrap_or("(unnamed)"),
            model.mode_count(),
            model.sample_count()
        );

        Ok(BuildOutput {
            name: self.config.name.clone(),
            model,
            faces: baseline.faces,
            failures: registered.failures,
            operation_log: log,
        })
    }
}
