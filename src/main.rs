mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hjvalue",
    version,
    about = "Inspect and query precomputed Hamilton-Jacobi value functions"
)]
struct Cli {
    /// Log level filter when RUST_LOG is unset (e.g. info, hjvalue=debug)
    #[arg(long, global = true, default_value = "warn")]
    log: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an artifact and print its metadata
    Inspect {
        /// Artifact file (.json or binary)
        artifact: PathBuf,
        /// Show the full 256-bit model id
        #[arg(long)]
        full: bool,
    },
    /// Evaluate V and its gradient at one or more states
    Query {
        /// Comma-separated states, e.g. 0.1,-0.2
        #[arg(required = true, allow_hyphen_values = true)]
        states: Vec<String>,
        /// Artifact file (default: artifact_path from the config)
        #[arg(short, long)]
        artifact: Option<PathBuf>,
        /// Engine config file (TOML)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Also print the optimal tracking control
        #[arg(long)]
        control: bool,
    },
    /// Re-encode an artifact as JSON or binary
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Write the binary encoding instead of JSON
        #[arg(long)]
        binary: bool,
    },
    /// Lower bound on planner travel time between two points
    Time {
        artifact: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        start: String,
        #[arg(long, allow_hyphen_values = true)]
        stop: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Inspect { artifact, full } => cli::inspect::cmd_inspect(artifact, full),
        Command::Query {
            states,
            artifact,
            config,
            control,
        } => cli::query::cmd_query(artifact, states, config, control),
        Command::Convert {
            input,
            output,
            binary,
        } => cli::convert::cmd_convert(input, output, binary),
        Command::Time {
            artifact,
            start,
            stop,
        } => cli::time::cmd_time(artifact, start, stop),
    }
}
