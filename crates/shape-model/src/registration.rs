//! Registration of a target scan onto the baseline topology.
//!
//! A [`Registrar`] deforms a copy of the baseline until it matches the
//! target's surface. The output keeps the baseline's vertex count, vertex
//! order and faces, which is what makes shapes comparable column by column
//! in the data matrix.
//!
//! [`ClosestPointRegistrar`] is the default implementation: each step pulls
//! every baseline vertex toward its closest target vertex, with the pull
//! smoothed over the one-ring so the surface moves coherently.

use std::time::{Duration, Instant};

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use scan_mesh::Mesh;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::RegistrarConfig;

/// Per-call registration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOptions {
    /// Keep brim vertices at the baseline's brim height.
    pub fix_brim: bool,
    /// Number of deformation steps.
    pub steps: u32,
    /// Wall-clock budget for one call. `None` means unbounded.
    pub budget: Option<Duration>,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            fix_brim: true,
            steps: 10,
            budget: None,
        }
    }
}

/// Why a single registration did not produce a usable shape.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistrationFailure {
    /// Baseline mesh has no vertices.
    #[error("baseline mesh has no vertices")]
    EmptyBaseline,

    /// Target mesh has no vertices.
    #[error("target mesh has no vertices")]
    EmptyTarget,

    /// The deformed baseline is still too far from the target.
    #[error("did not converge after {steps} steps (rms error {rms_error:.6})")]
    DidNotConverge { steps: u32, rms_error: f64 },

    /// The per-call budget ran out.
    #[error("budget of {budget:?} exceeded after {elapsed:?}")]
    BudgetExceeded { budget: Duration, elapsed: Duration },

    /// A displacement became NaN or infinite.
    #[error("non-finite displacement at step {step}")]
    NonFinite { step: u32 },

    /// Failure reported by an external registrar.
    #[error("{0}")]
    Other(String),
}

/// Resamples a target onto the baseline topology.
///
/// Implementations must return a mesh with exactly the baseline's vertex
/// count, where vertex `i` corresponds to baseline vertex `i`. They are
/// shared across worker threads during batch registration.
pub trait Registrar: Send + Sync {
    /// Register `target` onto `baseline`.
    fn register(
        &self,
        baseline: &Mesh,
        target: &Mesh,
        options: &RegistrationOptions,
    ) -> Result<Mesh, RegistrationFailure>;
}

/// Iterative closest-point deformation of the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestPointRegistrar {
    /// Weight of the one-ring average in each displacement (0 = none).
    pub smoothing: f64,
    /// Largest accepted RMS distance to the target after the last step.
    pub tolerance: f64,
}

impl Default for ClosestPointRegistrar {
    fn default() -> Self {
        Self::from_config(&RegistrarConfig::default())
    }
}

impl ClosestPointRegistrar {
    /// Creates a registrar with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registrar from its configuration table.
    pub fn from_config(config: &RegistrarConfig) -> Self {
        Self {
            smoothing: config.smoothing,
            tolerance: config.tolerance,
        }
    }

    /// Sets the smoothing weight, clamped to [0, 1].
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    /// Sets the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl Registrar for ClosestPointRegistrar {
    fn register(
        &self,
        baseline: &Mesh,
        target: &Mesh,
        options: &RegistrationOptions,
    ) -> Result<Mesh, RegistrationFailure> {
        if baseline.vertices.is_empty() {
            return Err(RegistrationFailure::EmptyBaseline);
        }
        if target.vertices.is_empty() {
            return Err(RegistrationFailure::EmptyTarget);
        }
        baseline
            .check_faces()
            .map_err(|e| RegistrationFailure::Other(format!("malformed baseline: {}", e)))?;

        let start = Instant::now();
        let target_points = target.positions();
        let tree = build_kdtree(&target_points);
        let adjacency = baseline.adjacency();

        let mut on_brim = vec![false; baseline.vertex_count()];
        if options.fix_brim {
            for v in adjacency.boundary_vertices() {
                on_brim[v as usize] = true;
            }
        }

        let mut positions = baseline.positions();

        for step in 0..options.steps {
            if let Some(budget) = options.budget {
                let elapsed = start.elapsed();
                if elapsed >= budget {
                    return Err(RegistrationFailure::BudgetExceeded { budget, elapsed });
                }
            }

            let closest = closest_points(&positions, &target_points, &tree);
            let raw: Vec<Vector3<f64>> = positions
                .iter()
                .zip(&closest)
                .map(|(p, q)| q - p)
                .collect();

            let mut displacement: Vec<Vector3<f64>> = if self.smoothing > 0.0 {
                raw.iter()
                    .enumerate()
                    .map(|(i, d)| {
                        let ring = adjacency.neighbors(i as u32);
                        if ring.is_empty() {
                            return *d;
                        }
                        let avg = ring
                            .iter()
                            .fold(Vector3::zeros(), |acc, &n| acc + raw[n as usize])
                            / ring.len() as f64;
                        d * (1.0 - self.smoothing) + avg * self.smoothing
                    })
                    .collect()
            } else {
                raw
            };

            for (d, &brim) in displacement.iter_mut().zip(&on_brim) {
                if brim {
                    d.z = 0.0;
                }
            }

            if displacement.iter().any(|d| !d.iter().all(|c| c.is_finite())) {
                return Err(RegistrationFailure::NonFinite { step });
            }

            for (p, d) in positions.iter_mut().zip(&displacement) {
                *p += *d;
            }

            trace!("Registration step {} of {}", step + 1, options.steps);
        }

        let rms_error = rms_distance(&positions, &target_points, &tree);
        debug!(
            "Registered {} vertices in {} steps, rms error {:.6}",
            positions.len(),
            options.steps,
            rms_error
        );

        if !rms_error.is_finite() || rms_error > self.tolerance {
            return Err(RegistrationFailure::DidNotConverge {
                steps: options.steps,
                rms_error,
            });
        }

        Ok(Mesh::from_parts(&positions, baseline.faces.clone()))
    }
}

/// Builds a KD-tree over the target points.
fn build_kdtree(points: &[Point3<f64>]) -> KdTree<f64, 3> {
    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in points.iter().enumerate() {
        tree.add(&[p.x, p.y, p.z], i as u64);
    }
    tree
}

/// Closest target point for every query point.
fn closest_points(
    queries: &[Point3<f64>],
    targets: &[Point3<f64>],
    tree: &KdTree<f64, 3>,
) -> Vec<Point3<f64>> {
    queries
        .par_iter()
        .map(|p| {
            let nearest = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]);
            targets[nearest.item as usize]
        })
        .collect()
}

/// Root-mean-square distance from each query to its closest target point.
fn rms_distance(queries: &[Point3<f64>], targets: &[Point3<f64>], tree: &KdTree<f64, 3>) -> f64 {
    if queries.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = closest_points(queries, targets, tree)
        .iter()
        .zip(queries)
        .map(|(q, p)| (q - p).norm_squared())
        .sum();
    (sum_sq / queries.len() as f64).sqrt()
}
