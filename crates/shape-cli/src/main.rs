//! Shape model CLI.
//!
//! Usage: shape-cli <COMMAND> [OPTIONS]
//!
//! Run `shape-cli --help` for available commands.

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod output;

use commands::{build::BuildArgs, config::ConfigArgs, info::InfoArgs, synth::SynthArgs};

/// Result type shared by all commands.
pub type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "shape-cli")]
#[command(author, version, about = "Build and sample statistical shape models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Suppress normal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a shape model from a baseline and a directory of scans
    Build(BuildArgs),

    /// Synthesize a shape from mode coefficients
    Synth(SynthArgs),

    /// Show a summary of a saved model
    Info(InfoArgs),

    /// Print the default pipeline configuration
    Config(ConfigArgs),
}

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Settings every command needs for printing.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context {
        format: cli.format,
        quiet: cli.quiet,
    };

    let result = match &cli.command {
        Commands::Build(args) => commands::build::run(args, &ctx),
        Commands::Synth(args) => commands::synth::run(args, &ctx),
        Commands::Info(args) => commands::info::run(args, &ctx),
        Commands::Config(args) => commands::config::run(args, &ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string(), ctx.format);
            ExitCode::FAILURE
        }
    }
}
