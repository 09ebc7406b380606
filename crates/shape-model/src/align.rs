//! Alignment stage: registration of the corpus and the data matrix.
//!
//! Every corpus shape is registered onto the baseline so that all shapes
//! share the baseline's vertex count and order. The registered shapes are
//! then flattened, vertex-major then x, y, z, into the columns of a D×N
//! matrix with D = 3V.

use nalgebra::DMatrix;
use rayon::prelude::*;
use scan_mesh::Mesh;
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, RegistrationConfig};
use crate::corpus::{check_baseline, Corpus, CorpusShape};
use crate::error::{ShapeModelError, ShapeModelResult};
use crate::registration::{Registrar, RegistrationFailure, RegistrationOptions};

/// A shape resampled onto the baseline topology.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredShape {
    /// Position of the raw shape in the corpus.
    pub source_index: usize,
    pub name: String,
    pub mesh: Mesh,
}

impl RegisteredShape {
    /// Wrap an already registered mesh.
    pub fn new(source_index: usize, name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            source_index,
            name: name.into(),
            mesh,
        }
    }
}

/// A corpus shape that could not be registered.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFailure {
    /// Position of the raw shape in the corpus.
    pub index: usize,
    pub name: String,
    pub failure: RegistrationFailure,
}

/// Output of [`register_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisteredSet {
    /// Successfully registered shapes, in corpus order.
    pub shapes: Vec<RegisteredShape>,
    /// Shapes dropped under the skip policy, in corpus order.
    pub failures: Vec<ShapeFailure>,
}

impl RegisteredSet {
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Assemble the data matrix from the registered shapes.
    pub fn build_matrix(&self) -> ShapeModelResult<DataMatrix> {
        build_matrix(&self.shapes)
    }
}

/// Register every corpus shape onto `baseline`.
///
/// Shapes keep their corpus order whatever order the workers finish in.
/// Under [`FailurePolicy::Skip`] a failed shape is dropped and recorded;
/// under [`FailurePolicy::Strict`] the first failure in corpus order aborts
/// the batch. A registrar that returns the wrong vertex count is always an
/// error.
pub fn register_all<R>(
    baseline: &Mesh,
    corpus: &Corpus,
    registrar: &R,
    config: &RegistrationConfig,
) -> ShapeModelResult<RegisteredSet>
where
    R: Registrar + ?Sized,
{
    check_baseline(baseline)?;

    let options = config.options();
    info!(
        "Registering {} shapes (steps={}, fix_brim={}, policy={:?})",
        corpus.len(),
        options.steps,
        options.fix_brim,
        config.failure_policy
    );

    let outcomes = if config.parallel && corpus.len() > 1 {
        register_parallel(baseline, corpus.shapes(), registrar, &options, config.max_threads)?
    } else {
        register_sequential(
            baseline,
            corpus.shapes(),
            registrar,
            &options,
            config.failure_policy,
        )
    };

    let expected = baseline.vertex_count();
    let mut set = RegisteredSet::default();

    for (index, (shape, outcome)) in corpus.iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(mesh) => {
                if mesh.vertex_count() != expected {
                    return Err(ShapeModelError::TopologyMismatch {
                        index,
                        name: shape.name.clone(),
                        expected,
                        found: mesh.vertex_count(),
                    });
                }
                debug!("Registered shape {} ({})", index, shape.name);
                set.shapes.push(RegisteredShape::new(index, shape.name.clone(), mesh));
            }
            Err(failure) => match config.failure_policy {
                FailurePolicy::Strict => {
                    return Err(ShapeModelError::Registration {
                        index,
                        name: shape.name.clone(),
                        source: failure,
                    });
                }
                FailurePolicy::Skip => {
                    warn!("Dropping shape {} ({}): {}", index, shape.name, failure);
                    set.failures.push(ShapeFailure {
                        index,
                        name: shape.name.clone(),
                        failure,
                    });
                }
            },
        }
    }

    info!(
        "Registration complete: {} registered, {} dropped",
        set.shapes.len(),
        set.failures.len()
    );
    Ok(set)
}

type Outcome = Result<Mesh, RegistrationFailure>;

/// One outcome per shape, in order. Under the strict policy the list stops
/// after the first failure.
fn register_sequential<R: Registrar + ?Sized>(
    baseline: &Mesh,
    shapes: &[CorpusShape],
    registrar: &R,
    options: &RegistrationOptions,
    policy: FailurePolicy,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let outcome = registrar.register(baseline, &shape.mesh, options);
        let failed = outcome.is_err();
        outcomes.push(outcome);
        if failed && policy == FailurePolicy::Strict {
            break;
        }
    }
    outcomes
}

fn register_parallel<R: Registrar + ?Sized>(
    baseline: &Mesh,
    shapes: &[CorpusShape],
    registrar: &R,
    options: &RegistrationOptions,
    max_threads: usize,
) -> ShapeModelResult<Vec<Outcome>> {
    let run = || -> Vec<Outcome> {
        shapes
            .par_iter()
            .map(|shape| registrar.register(baseline, &shape.mesh, options))
            .collect()
    };

    if max_threads == 0 {
        return Ok(run());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build()
        .map_err(|e| ShapeModelError::Config {
            details: format!("cannot start registration workers: {}", e),
        })?;
    Ok(pool.install(run))
}

/// The D×N data matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMatrix {
    matrix: DMatrix<f64>,
    sources: Vec<String>,
}

impl DataMatrix {
    /// Wrap a matrix whose columns are flattened shapes.
    ///
    /// The row count must be a positive multiple of 3. Columns are named
    /// `shape_0`, `shape_1`, ...
    pub fn new(matrix: DMatrix<f64>) -> ShapeModelResult<Self> {
        let sources = (0..matrix.ncols()).map(|i| format!("shape_{}", i)).collect();
        Self::with_sources(matrix, sources)
    }

    /// Wrap a matrix with one source name per column.
    pub fn with_sources(matrix: DMatrix<f64>, sources: Vec<String>) -> ShapeModelResult<Self> {
        if matrix.nrows() == 0 || matrix.nrows() % 3 != 0 {
            return Err(ShapeModelError::InvalidInput {
                details: format!(
                    "data matrix needs a positive multiple of 3 rows, got {}",
                    matrix.nrows()
                ),
            });
        }
        if sources.len() != matrix.ncols() {
            return Err(ShapeModelError::InvalidInput {
                details: format!(
                    "{} source names for {} columns",
                    sources.len(),
                    matrix.ncols()
                ),
            });
        }
        Ok(Self { matrix, sources })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// D = 3V.
    pub fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    /// N, the number of shapes.
    pub fn sample_count(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn vertex_count(&self) -> usize {
        self.matrix.nrows() / 3
    }

    /// Source name of each column.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

/// Flatten registered shapes into the columns of a data matrix.
///
/// All shapes must have the same vertex count, and there must be at least
/// two of them.
pub fn build_matrix(shapes: &[RegisteredShape]) -> ShapeModelResult<DataMatrix> {
    if let Some(first) = shapes.first() {
        let expected = first.mesh.vertex_count();
        for (index, shape) in shapes.iter().enumerate() {
            if shape.mesh.vertex_count() != expected {
                return Err(ShapeModelError::TopologyMismatch {
                    index,
                    name: shape.name.clone(),
                    expected,
                    found: shape.mesh.vertex_count(),
                });
            }
        }
    }

    if shapes.len() < 2 {
        return Err(ShapeModelError::InsufficientData {
            details: format!("need at least 2 registered shapes, got {}", shapes.len()),
        });
    }

    let vertex_count = shapes[0].mesh.vertex_count();
    let matrix = DMatrix::from_iterator(
        3 * vertex_count,
        shapes.len(),
        shapes.iter().flat_map(|s| s.mesh.flat_positions()),
    );
    let sources = shapes.iter().map(|s| s.name.clone()).collect();

    debug!(
        "Data matrix: {} x {} ({} vertices)",
        matrix.nrows(),
        matrix.ncols(),
        vertex_count
    );
    DataMatrix::with_sources(matrix, sources)
}
