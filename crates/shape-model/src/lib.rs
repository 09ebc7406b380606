//! Statistical shape models from registered surface scans.
//!
//! The pipeline runs in four stages, each consuming the previous stage's
//! output:
//!
//! 1. **Corpus**: a baseline mesh plus a directory of raw scans, optionally
//!    trimmed at a fixed height ([`CorpusManager`])
//! 2. **Alignment**: every scan registered onto the baseline topology and
//!    flattened into a D×N data matrix ([`register_all`], [`build_matrix`])
//! 3. **PCA**: mean shape and ranked modes of variation ([`ShapeModel::fit`])
//! 4. **Synthesis**: new shapes from mode coefficients, in raw or
//!    standardized units ([`ShapeModel::synthesize`])
//!
//! # Example
//!
//! ```no_run
//! use shape_model::{
//!     build_matrix, register_all, ClosestPointRegistrar, CorpusManager, RegistrationConfig,
//!     ScaleMode, ShapeModel,
//! };
//!
//! let mut manager = CorpusManager::new();
//! manager.load_baseline("scans/baseline.stl", true)?;
//! manager.import_corpus("scans/limbs", ".stl", true)?;
//! manager.slice_all(150.0)?;
//!
//! let baseline = manager.baseline().unwrap();
//! let registered = register_all(
//!     baseline,
//!     manager.corpus(),
//!     &ClosestPointRegistrar::new(),
//!     &RegistrationConfig::default(),
//! )?;
//! let model = ShapeModel::fit(&build_matrix(&registered.shapes)?)?;
//!
//! // Two standard deviations along the first mode
//! let shape = model.synthesize_mesh(&[2.0], ScaleMode::Standardized, &baseline.faces)?;
//! shape.save("mode1_plus2sd.obj")?;
//! # Ok::<(), shape_model::ShapeModelError>(())
//! ```

mod error;

pub mod align;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod pca;
pub mod persist;
pub mod pipeline;
pub mod registration;
pub mod source;
pub mod synth;

pub use error::{ShapeModelError, ShapeModelResult};

pub use align::{build_matrix, register_all, DataMatrix, RegisteredSet, RegisteredShape, ShapeFailure};
pub use config::{CorpusConfig, FailurePolicy, PipelineConfig, RegistrarConfig, RegistrationConfig};
pub use corpus::{Corpus, CorpusManager, CorpusShape};
pub use engine::ShapeModelEngine;
pub use pca::ShapeModel;
pub use persist::{load_model, save_model, ModelFile, VertexOrder, FORMAT_VERSION};
pub use pipeline::{BuildOutput, ModelPipeline};
pub use registration::{ClosestPointRegistrar, Registrar, RegistrationFailure, RegistrationOptions};
pub use source::{FileMeshSource, MeshSource};
pub use synth::ScaleMode;

pub use scan_mesh::{self, nalgebra, Mesh};
