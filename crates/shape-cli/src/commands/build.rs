//! `build`: corpus → registered set → model file.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use shape_model::{FailurePolicy, ModelPipeline, PipelineConfig};
use tracing::debug;

use crate::output;
use crate::{CliResult, Context};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Baseline mesh (STL or OBJ)
    #[arg(short, long)]
    pub baseline: PathBuf,

    /// Directory of corpus scans
    #[arg(short = 'd', long)]
    pub corpus: PathBuf,

    /// Output model file
    #[arg(short, long, default_value = "model.json")]
    pub output: PathBuf,

    /// Pipeline configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// File name suffix of corpus scans
    #[arg(long)]
    pub extension: Option<String>,

    /// Trim corpus scans above this height
    #[arg(long)]
    pub slice_height: Option<f64>,

    /// Registration steps per shape
    #[arg(long)]
    pub steps: Option<u32>,

    /// Abort on the first registration failure
    #[arg(long)]
    pub strict: bool,

    /// Let the brim move during registration
    #[arg(long)]
    pub free_brim: bool,

    /// Worker threads for registration (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

impl BuildArgs {
    /// Configuration file (or defaults) with command-line overrides applied.
    fn resolve_config(&self) -> shape_model::ShapeModelResult<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(extension) = &self.extension {
            config.corpus.extension = extension.clone();
        }
        if self.slice_height.is_some() {
            config.corpus.slice_height = self.slice_height;
        }
        if let Some(steps) = self.steps {
            config.registration.steps = steps;
        }
        if self.strict {
            config.registration.failure_policy = FailurePolicy::Strict;
        }
        if self.free_brim {
            config.registration.fix_brim = false;
        }
        if let Some(threads) = self.threads {
            config.registration.max_threads = threads;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct BuildReport {
    output: PathBuf,
    shapes: usize,
    vertices: usize,
    modes: usize,
    dropped: Vec<DroppedShape>,
    log: Vec<String>,
}

#[derive(Serialize)]
struct DroppedShape {
    index: usize,
    name: String,
    reason: String,
}

pub fn run(args: &BuildArgs, ctx: &Context) -> CliResult {
    let config = args.resolve_config()?;
    debug!("Resolved configuration: {:?}", config);
    let result = ModelPipeline::new(config).build(&args.baseline, &args.corpus)?;
    result.save(&args.output)?;

    let report = BuildReport {
        output: args.output.clone(),
        shapes: result.model.sample_count(),
        vertices: result.model.vertex_count(),
        modes: result.model.mode_count(),
        dropped: result
            .failures
            .iter()
            .map(|f| DroppedShape {
                index: f.index,
                name: f.name.clone(),
                reason: f.failure.to_string(),
            })
            .collect(),
        log: result.operation_log.clone(),
    };

    for dropped in &report.dropped {
        output::warning(
            &format!("dropped {} (#{}): {}", dropped.name, dropped.index, dropped.reason),
            ctx.format,
            ctx.quiet,
        );
    }
    output::success(
        &format!(
            "Built {} modes from {} shapes ({} vertices) -> {}",
            report.modes,
            report.shapes,
            report.vertices,
            args.output.display()
        ),
        ctx.format,
        ctx.quiet,
    );
    output::print(&report, ctx.format, ctx.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> BuildArgs {
        BuildArgs {
            baseline: PathBuf::from("baseline.stl"),
            corpus: PathBuf::from("scans"),
            output: PathBuf::from("model.json"),
            config: None,
            extension: None,
            slice_height: None,
            steps: None,
            strict: false,
            free_brim: false,
            threads: None,
        }
    }

    #[test]
    fn test_defaults_without_overrides() {
        assert_eq!(args().resolve_config().unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_overrides_apply() {
        let mut args = args();
        args.extension = Some(".obj".to_string());
        args.slice_height = Some(120.0);
        args.steps = Some(4);
        args.strict = true;
        args.free_brim = true;

        let config = args.resolve_config().unwrap();
        assert_eq!(config.corpus.extension, ".obj");
        assert_eq!(config.corpus.slice_height, Some(120.0));
        assert_eq!(config.registration.steps, 4);
        assert_eq!(config.registration.failure_policy, FailurePolicy::Strict);
        assert!(!config.registration.fix_brim);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut args = args();
        args.steps = Some(0);
        assert!(args.resolve_config().is_err());
    }
}
