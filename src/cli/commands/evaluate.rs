//! Evaluate command - Run a frozen controller and report performance

use std::{fs::File, path::PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::to_writer_pretty;

use crate::{
    Error,
    adapters::MsgPackRepository,
    cli::commands::train::build_course,
    cli::output::{format_number, print_kv, print_section},
    pipeline::{
        JsonlObserver, ProgressObserver, QLearnerController, RandomController,
        ThresholdController, TrainingConfig, TrainingPipeline, TrainingResult,
    },
    ports::{Controller, Environment, SnapshotRepository},
    runner::{EncoderConfig, SpeedBand, StateEncoder},
    threshold::ThresholdPolicy,
};

/// Controller to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EvalController {
    /// Greedy policy from a saved Q-learning snapshot
    QLearning,
    /// Saved adaptive jump thresholds
    Threshold,
    /// Uniform random actions (baseline)
    Random,
}

impl EvalController {
    fn label(self) -> &'static str {
        match self {
            EvalController::QLearning => "q-learning",
            EvalController::Threshold => "adaptive-threshold",
            EvalController::Random => "random",
        }
    }

    fn default_snapshot(self) -> Option<PathBuf> {
        match self {
            EvalController::QLearning => Some(PathBuf::from("learning_data.msgpack")),
            EvalController::Threshold => Some(PathBuf::from("thresholds.json")),
            EvalController::Random => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct EvaluationSummaryFile {
    evaluation: TrainingResult,
    metadata: EvaluationMetadata,
}

#[derive(Debug, Serialize)]
struct EvaluationMetadata {
    controller: String,
    environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<String>,
    seed: Option<u64>,
}

#[derive(Parser, Debug)]
#[command(about = "Evaluate a controller without learning")]
pub struct EvaluateArgs {
    /// Controller to evaluate
    #[arg(value_enum)]
    pub controller: EvalController,

    /// Number of evaluation runs
    #[arg(long, short = 'e', default_value_t = 20)]
    pub episodes: usize,

    /// Tick cap per run
    #[arg(long, default_value_t = 10_000)]
    pub max_ticks: u64,

    /// Snapshot file to load (defaults to learning_data.msgpack or
    /// thresholds.json per controller)
    #[arg(long, short = 's')]
    pub snapshot: Option<PathBuf>,

    /// Random seed for reproducibility (defaults to the snapshot's
    /// training seed + 1 so evaluation runs a different course)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Show progress bar
    #[arg(long, default_value_t = true)]
    pub progress: bool,

    /// Optional file for JSONL run records
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Optional path for writing results as JSON
    #[arg(long)]
    pub export: Option<PathBuf>,
}

pub fn execute(args: EvaluateArgs) -> Result<()> {
    let snapshot_path = args
        .snapshot
        .clone()
        .or_else(|| args.controller.default_snapshot());
    let mut saved_seed = None;

    let mut controller: Box<dyn Controller> = match args.controller {
        EvalController::QLearning => {
            let path = snapshot_path
                .as_deref()
                .ok_or_else(|| Error::InvalidConfiguration {
                    message: "q-learning evaluation needs a snapshot path".to_string(),
                })?;
            let repo = MsgPackRepository::new();
            let saved = repo.load(path)?.ok_or_else(|| Error::SnapshotMissing {
                path: path.display().to_string(),
            })?;
            let (agent, stats, metadata) = saved.into_agent()?;
            saved_seed = metadata.seed;

            print_section("Loaded Agent");
            print_kv("Snapshot", &path.display().to_string());
            print_kv("Lifetime runs", &format_number(stats.episodes as usize));
            print_kv("Best distance", &format!("{:.1}", stats.best_distance));
            print_kv("Table states", &format_number(agent.table().len()));
            print_kv("Epsilon", &format!("{:.3}", agent.epsilon()));
            if let Some(environment) = &metadata.environment {
                print_kv("Trained on", environment);
            }

            let encoder = StateEncoder::new(EncoderConfig::default())?;
            Box::new(QLearnerController::frozen(agent, encoder))
        }
        EvalController::Threshold => {
            let path = snapshot_path
                .as_deref()
                .ok_or_else(|| Error::InvalidConfiguration {
                    message: "threshold evaluation needs a snapshot path".to_string(),
                })?;
            if !path.exists() {
                return Err(Error::SnapshotMissing {
                    path: path.display().to_string(),
                }
                .into());
            }
            let policy = ThresholdPolicy::load_from(path)?;

            print_section("Loaded Thresholds");
            print_kv("Snapshot", &path.display().to_string());
            for band in SpeedBand::ALL {
                print_kv(
                    &format!("Threshold ({})", band.label()),
                    &format!("{:.1}", policy.thresholds()[band.index()]),
                );
            }
            print_kv("Step", &policy.step().to_string());
            print_kv(
                "Crashes recorded",
                &policy.score_history().len().to_string(),
            );

            Box::new(ThresholdController::frozen(policy))
        }
        EvalController::Random => match args.seed {
            Some(seed) => Box::new(RandomController::with_seed(seed)),
            None => Box::new(RandomController::new()),
        },
    };

    let evaluation_seed = args
        .seed
        .or_else(|| saved_seed.map(|s| s.wrapping_add(1)));

    print_section("Evaluation");
    print_kv("Controller", args.controller.label());
    print_kv("Runs", &args.episodes.to_string());
    if let Some(seed) = evaluation_seed {
        print_kv("Seed", &seed.to_string());
    }

    let mut course = build_course(evaluation_seed)?;
    let mut pipeline = TrainingPipeline::new(TrainingConfig {
        episodes: args.episodes,
        max_ticks_per_episode: args.max_ticks,
    });
    if args.progress {
        pipeline = pipeline.with_observer(Box::new(ProgressObserver::new()));
    }
    if let Some(records_path) = &args.records {
        pipeline = pipeline.with_observer(Box::new(JsonlObserver::new(records_path)?));
    }

    let result = pipeline.run(controller.as_mut(), &mut course)?;

    print_section("Results");
    print_kv("Runs", &result.episodes.to_string());
    print_kv("Best distance", &format!("{:.1}", result.best_distance));
    print_kv("Mean distance", &format!("{:.1}", result.mean_distance));
    print_kv(
        "Obstacles passed",
        &result.total_obstacles_passed.to_string(),
    );
    if result.episodes > 0 {
        print_kv(
            "Crash rate",
            &format!(
                "{:.1}%",
                result.crashes as f64 / result.episodes as f64 * 100.0
            ),
        );
        print_kv(
            "Mean ticks",
            &format!("{:.0}", result.total_ticks as f64 / result.episodes as f64),
        );
    }

    if let Some(export_path) = &args.export {
        let summary = EvaluationSummaryFile {
            evaluation: result,
            metadata: EvaluationMetadata {
                controller: args.controller.label().to_string(),
                environment: course.name().to_string(),
                snapshot: snapshot_path.map(|p| p.display().to_string()),
                seed: evaluation_seed,
            },
        };
        let file = File::create(export_path)?;
        to_writer_pretty(file, &summary)?;
        println!("\n✓ Results written to: {}", export_path.display());
    }

    Ok(())
}
