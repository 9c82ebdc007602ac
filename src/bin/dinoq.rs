//! dinoq CLI - Train, evaluate, and inspect Chrome Dino runner bots
//!
//! This CLI provides a unified interface for:
//! - Training controllers (tabular Q-learning, adaptive thresholds)
//! - Evaluating saved policies on the simulated course
//! - Inspecting snapshot files
//! - Exporting learned Q-tables for further analysis

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dinoq")]
#[command(version, about = "Runner bot training toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a controller (Q-learning or adaptive threshold)
    Train(Box<dinoq::cli::commands::train::TrainArgs>),

    /// Evaluate a controller without learning
    Evaluate(dinoq::cli::commands::evaluate::EvaluateArgs),

    /// Inspect a snapshot file
    Inspect(dinoq::cli::commands::inspect::InspectArgs),

    /// Export a saved Q-table for analysis
    Export(dinoq::cli::commands::export::ExportArgs),
}

fn main() -> Result<()> {
    dinoq::utils::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => dinoq::cli::commands::train::execute(*args),
        Commands::Evaluate(args) => dinoq::cli::commands::evaluate::execute(args),
        Commands::Inspect(args) => dinoq::cli::commands::inspect::execute(args),
        Commands::Export(args) => dinoq::cli::commands::export::execute(args),
    }
}
