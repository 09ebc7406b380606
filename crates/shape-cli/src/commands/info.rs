//! `info`: summary of a saved model.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use shape_model::{ModelFile, ShapeModel};

use crate::output;
use crate::{CliResult, Context};

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Model file written by `build`
    pub model: PathBuf,

    /// Number of modes to list
    #[arg(short = 'n', long, default_value = "10")]
    pub modes: usize,
}

#[derive(Debug, Serialize)]
struct ModeSummary {
    mode: usize,
    singular_value: f64,
    std_dev: f64,
    variance_ratio: f64,
    cumulative_ratio: f64,
}

#[derive(Debug, Serialize)]
struct ModelSummary {
    name: Option<String>,
    vertices: usize,
    faces: usize,
    shapes: usize,
    modes: usize,
    modes_for_95_percent: usize,
    sources: Vec<String>,
    leading_modes: Vec<ModeSummary>,
}

fn summarize(name: Option<String>, model: &ShapeModel, faces: usize, limit: usize) -> ModelSummary {
    let ratio = model.explained_variance_ratio();
    let mut cumulative = 0.0;
    let leading_modes = (0..model.mode_count().min(limit))
        .map(|k| {
            cumulative += ratio[k];
            ModeSummary {
                mode: k + 1,
                singular_value: model.singular_values()[k],
                std_dev: model.mode_std_devs()[k],
                variance_ratio: ratio[k],
                cumulative_ratio: cumulative,
            }
        })
        .collect();

    ModelSummary {
        name,
        vertices: model.vertex_count(),
        faces,
        shapes: model.sample_count(),
        modes: model.mode_count(),
        modes_for_95_percent: model.modes_for_variance(0.95),
        sources: model.sources().to_vec(),
        leading_modes,
    }
}

pub fn run(args: &InfoArgs, ctx: &Context) -> CliResult {
    let file = ModelFile::load(&args.model)?;
    let name = file.name.clone();
    let (model, faces) = file.into_model()?;
    let summary = summarize(name, &model, faces.len(), args.modes);

    let (format, quiet) = (ctx.format, ctx.quiet);
    output::heading(&format!("Model: {}", args.model.display()), format, quiet);
    if let Some(name) = &summary.name {
        output::field("Name", name, format, quiet);
    }
    output::field("Vertices", summary.vertices, format, quiet);
    output::field("Faces", summary.faces, format, quiet);
    output::field("Training shapes", summary.shapes, format, quiet);
    output::field("Modes", summary.modes, format, quiet);
    output::field("Modes for 95%", summary.modes_for_95_percent, format, quiet);

    output::heading("Leading modes", format, quiet);
    for mode in &summary.leading_modes {
        output::field(
            &format!("Mode {}", mode.mode),
            format!(
                "s={:.4}  sd={:.4}  {:5.1}% (cumulative {:5.1}%)",
                mode.singular_value,
                mode.std_dev,
                mode.variance_ratio * 100.0,
                mode.cumulative_ratio * 100.0
            ),
            format,
            quiet,
        );
    }

    output::print(&summary, format, quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shape_model::nalgebra::DMatrix;
    use shape_model::DataMatrix;

    #[test]
    fn test_summary_limits_modes() {
        let data = DataMatrix::new(DMatrix::from_column_slice(
            3,
            3,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0],
        ))
        .unwrap();
        let model = ShapeModel::fit(&data).unwrap();

        let summary = summarize(None, &model, 0, 1);
        assert_eq!(summary.modes, 3);
        assert_eq!(summary.leading_modes.len(), 1);
        assert_eq!(summary.leading_modes[0].mode, 1);
        assert_eq!(summary.sources.len(), 3);
    }
}
