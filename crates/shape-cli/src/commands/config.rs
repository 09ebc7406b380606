//! `config`: print or check a pipeline configuration.

use std::path::PathBuf;

use clap::Args;
use shape_model::PipelineConfig;

use crate::output;
use crate::{CliResult, Context, OutputFormat};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Validate this file and print it with defaults filled in
    #[arg(long)]
    pub check: Option<PathBuf>,
}

pub fn run(args: &ConfigArgs, ctx: &Context) -> CliResult {
    let config = match &args.check {
        Some(path) => {
            let config = PipelineConfig::from_toml_file(path)?;
            output::success(&format!("{} is valid", path.display()), ctx.format, ctx.quiet);
            config
        }
        None => PipelineConfig::default(),
    };

    if ctx.quiet {
        return Ok(());
    }
    match ctx.format {
        OutputFormat::Text => print!("{}", config.to_toml()?),
        OutputFormat::Json => println!("{}", config.to_json()?),
    }
    Ok(())
}
