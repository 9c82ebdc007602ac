//! Export command - Dump a saved Q-table as CSV or JSON
//!
//! The snapshot format is MessagePack for compactness; this command turns
//! it into something a spreadsheet or notebook can read. Rows come out in
//! the snapshot's key order, which is already sorted.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::{
    Error,
    adapters::MsgPackRepository,
    ports::SnapshotRepository,
    q_learning::SavedAgent,
    types::Action,
};

#[derive(Parser, Debug)]
#[command(about = "Export a saved Q-table for analysis")]
pub struct ExportArgs {
    /// Path to the agent snapshot file
    pub snapshot: PathBuf,

    /// Output file path
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    /// Export format
    #[arg(long, short = 'f', default_value = "csv")]
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// CSV, one row per state
    Csv,
    /// JSON with snapshot provenance
    Json,
}

pub fn execute(args: ExportArgs) -> Result<()> {
    let repo = MsgPackRepository::new();
    let saved = repo
        .load(&args.snapshot)?
        .ok_or_else(|| Error::SnapshotMissing {
            path: args.snapshot.display().to_string(),
        })?;

    println!("Loaded snapshot from: {}", args.snapshot.display());
    println!("States: {}", saved.entries.len());
    println!("Lifetime runs: {}", saved.stats.episodes);

    match args.format {
        ExportFormat::Csv => export_csv(&saved, &args)?,
        ExportFormat::Json => export_json(&saved, &args)?,
    }

    println!("✓ Q-table exported to: {}", args.output.display());
    Ok(())
}

fn export_csv(saved: &SavedAgent, args: &ExportArgs) -> Result<()> {
    let mut file = BufWriter::new(File::create(&args.output)?);

    writeln!(file, "# Q-table export")?;
    writeln!(file, "# Snapshot: {}", args.snapshot.display())?;
    writeln!(file, "# Lifetime runs: {}", saved.stats.episodes)?;
    writeln!(file, "# States: {}", saved.entries.len())?;
    writeln!(file)?;

    let mut header = "state".to_string();
    for action in Action::ALL {
        header.push_str(&format!(",q_{}", action.label()));
    }
    header.push_str(",best_action");
    writeln!(file, "{header}")?;

    for entry in &saved.entries {
        let mut row = entry.key.to_string();
        for action in Action::ALL {
            row.push_str(&format!(",{}", entry.values.get(action)));
        }
        row.push_str(&format!(",{}", entry.values.greedy()));
        writeln!(file, "{row}")?;
    }

    file.flush()?;
    Ok(())
}

fn export_json(saved: &SavedAgent, args: &ExportArgs) -> Result<()> {
    #[derive(Serialize)]
    struct TableExport {
        snapshot: String,
        lifetime_runs: u64,
        epsilon: f64,
        states: usize,
        entries: Vec<ExportRow>,
    }

    #[derive(Serialize)]
    struct ExportRow {
        state: String,
        q_idle: f64,
        q_jump: f64,
        q_duck: f64,
        best_action: String,
    }

    let entries = saved
        .entries
        .iter()
        .map(|entry| ExportRow {
            state: entry.key.to_string(),
            q_idle: entry.values.get(Action::Idle),
            q_jump: entry.values.get(Action::Jump),
            q_duck: entry.values.get(Action::Duck),
            best_action: entry.values.greedy().label().to_string(),
        })
        .collect();

    let export = TableExport {
        snapshot: args.snapshot.display().to_string(),
        lifetime_runs: saved.stats.episodes,
        epsilon: saved.epsilon,
        states: saved.entries.len(),
        entries,
    };

    let file = File::create(&args.output)?;
    serde_json::to_writer_pretty(file, &export)?;
    Ok(())
}
