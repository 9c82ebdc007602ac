//! Train command - Train runner controllers (Q-learning, adaptive threshold)

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::to_writer_pretty;

use crate::{
    adapters::MsgPackRepository,
    cli::output::{format_number, print_kv, print_section},
    pipeline::{
        JsonlObserver, ProgressObserver, QLearnerController, ThresholdController, TrainingConfig,
        TrainingPipeline, TrainingResult,
    },
    ports::{Environment, SnapshotRepository},
    q_learning::{QAgentConfig, ResumedAgent, RewardSchedule, SavedAgent},
    runner::{CourseConfig, EncoderConfig, SimulatedCourse, SpeedBand, StateEncoder},
    stats::RunStats,
    threshold::{ThresholdConfig, ThresholdPolicy},
    utils::mean,
};

/// Type of controller to train or evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ControllerType {
    /// Tabular Q-learning agent
    QLearning,
    /// Adaptive jump-threshold heuristic
    Threshold,
}

impl ControllerType {
    /// Default snapshot path for this controller kind.
    pub fn default_snapshot(self) -> PathBuf {
        match self {
            ControllerType::QLearning => PathBuf::from("learning_data.msgpack"),
            ControllerType::Threshold => PathBuf::from("thresholds.json"),
        }
    }
}

#[derive(Debug, Serialize)]
struct TrainingSummaryFile {
    training: TrainingResult,
    lifetime: LifetimeSection,
    metadata: SummaryMetadata,
}

#[derive(Debug, Serialize)]
struct LifetimeSection {
    episodes: u64,
    total_obstacles_passed: u64,
    best_distance: f64,
    mean_distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    table_states: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SummaryMetadata {
    controller: String,
    environment: String,
    snapshot: String,
    seed: Option<u64>,
    resumed: bool,
}

fn sanitize_summary_path(raw: &Path) -> PathBuf {
    let mut normalized = raw.to_path_buf();
    let raw_str = raw.as_os_str().to_string_lossy();

    // Treat trailing separators or missing filename as a directory target.
    if raw_str.ends_with(std::path::MAIN_SEPARATOR) || normalized.file_name().is_none() {
        normalized.push("training_summary.json");
        return normalized;
    }

    match normalized.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => normalized,
        _ => {
            normalized.set_extension("json");
            normalized
        }
    }
}

fn write_summary(raw_path: &Path, summary: &TrainingSummaryFile) -> Result<PathBuf> {
    let path = sanitize_summary_path(raw_path);
    let file = File::create(&path)?;
    to_writer_pretty(file, summary)?;
    Ok(path)
}

#[derive(Parser, Debug)]
#[command(about = "Train a runner controller", allow_negative_numbers = true)]
pub struct TrainArgs {
    /// Type of controller to train
    #[arg(value_enum)]
    pub controller: ControllerType,

    /// Number of training runs
    #[arg(long, short = 'e', default_value_t = 50)]
    pub episodes: usize,

    /// Tick cap per run
    #[arg(long, default_value_t = 10_000)]
    pub max_ticks: u64,

    /// Snapshot file to resume from and save to (defaults to
    /// learning_data.msgpack or thresholds.json per controller)
    #[arg(long, short = 's')]
    pub snapshot: Option<PathBuf>,

    /// Save a checkpoint every N runs
    #[arg(long)]
    pub checkpoint_every: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// On a config mismatch with the snapshot, keep the saved values
    #[arg(long, default_value_t = false)]
    pub adopt_saved_config: bool,

    /// Step size toward each TD target
    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    /// Weight of future value in the TD target
    #[arg(long, default_value_t = 0.9)]
    pub discount_factor: f64,

    /// Exploration rate at the start of a cold session
    #[arg(long, default_value_t = 1.0)]
    pub initial_epsilon: f64,

    /// Multiplicative epsilon decay per run
    #[arg(long, default_value_t = 0.99)]
    pub epsilon_decay: f64,

    /// Exploration floor
    #[arg(long, default_value_t = 0.05)]
    pub min_epsilon: f64,

    /// Reward schedule (survive=0.01,pass=1,streak=0.5,every=3,crash=-10)
    #[arg(long)]
    pub reward: Option<String>,

    /// Show progress bar
    #[arg(long, default_value_t = true)]
    pub progress: bool,

    /// Optional file for JSONL run records
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Optional path for writing a summary JSON file
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

pub fn execute(args: TrainArgs) -> Result<()> {
    match args.controller {
        ControllerType::QLearning => train_q_learning(args),
        ControllerType::Threshold => train_threshold(args),
    }
}

/// Parse reward schedule from string (e.g., "pass=2,crash=-5")
///
/// Unnamed components keep their defaults.
fn parse_reward_schedule(s: &str) -> Result<RewardSchedule> {
    let mut rewards = RewardSchedule::default();

    for part in s.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut iter = trimmed.splitn(2, '=');
        let key = iter
            .next()
            .ok_or_else(|| anyhow!("Invalid reward entry: '{trimmed}'"))?;
        let value_str = iter
            .next()
            .ok_or_else(|| anyhow!("Invalid reward entry '{trimmed}'. Expected key=value"))?;
        match key.trim().to_ascii_lowercase().as_str() {
            "every" => {
                rewards.streak_every = value_str.trim().parse().map_err(|_| {
                    anyhow!("Invalid streak length '{value_str}' in '{trimmed}'")
                })?;
            }
            other => {
                let value: f64 = value_str.trim().parse().map_err(|_| {
                    anyhow!("Invalid numeric reward '{value_str}' in '{trimmed}'")
                })?;
                match other {
                    "survive" => rewards.survive = value,
                    "pass" => rewards.obstacle_pass = value,
                    "streak" => rewards.streak_bonus = value,
                    "crash" => rewards.crash = value,
                    unknown => {
                        return Err(anyhow!(
                            "Unknown reward key '{unknown}'. Expected survive, pass, streak, every, or crash"
                        ));
                    }
                }
            }
        }
    }

    Ok(rewards)
}

/// The course the CLI trains and evaluates on.
///
/// A fixed seed makes the whole run reproducible; the offset keeps the
/// course's obstacle stream decorrelated from the agent's exploration
/// stream, which shares the user-facing seed.
pub(crate) fn build_course(seed: Option<u64>) -> Result<SimulatedCourse> {
    let course = SimulatedCourse::new(CourseConfig {
        seed: seed.map(|s| s.wrapping_add(1)),
        ..CourseConfig::default()
    })?;
    Ok(course)
}

fn train_q_learning(args: TrainArgs) -> Result<()> {
    let snapshot_path = args
        .snapshot
        .clone()
        .unwrap_or_else(|| args.controller.default_snapshot());

    let rewards = match &args.reward {
        Some(overrides) => parse_reward_schedule(overrides)?,
        None => RewardSchedule::default(),
    };
    let config = QAgentConfig {
        learning_rate: args.learning_rate,
        discount_factor: args.discount_factor,
        initial_epsilon: args.initial_epsilon,
        epsilon_decay: args.epsilon_decay,
        min_epsilon: args.min_epsilon,
        rewards,
    };

    let repo = MsgPackRepository::new();
    let ResumedAgent {
        agent,
        mut stats,
        mut metadata,
        resumed,
    } = SavedAgent::resume_or_new(&repo, &snapshot_path, config, args.adopt_saved_config)?;

    let agent = match args.seed {
        Some(seed) => agent.with_seed(seed),
        None => agent,
    };

    print_section("Training Configuration");
    print_kv("Controller", "q-learning");
    print_kv("Runs", &args.episodes.to_string());
    print_kv("Snapshot", &snapshot_path.display().to_string());
    print_kv("Resumed", if resumed { "yes" } else { "no" });
    print_kv(
        "Learning rate",
        &agent.config().learning_rate.to_string(),
    );
    print_kv(
        "Discount factor",
        &agent.config().discount_factor.to_string(),
    );
    print_kv("Epsilon", &format!("{:.3}", agent.epsilon()));
    if let Some(seed) = args.seed {
        print_kv("Seed", &seed.to_string());
    }

    let encoder = StateEncoder::new(EncoderConfig::default())?;
    let mut course = build_course(args.seed)?;
    let mut controller = QLearnerController::new(agent, encoder);

    let chunk = args.checkpoint_every.unwrap_or(args.episodes).max(1);
    let mut pipeline = TrainingPipeline::new(TrainingConfig {
        episodes: chunk,
        max_ticks_per_episode: args.max_ticks,
    })
    .with_first_episode(stats.episodes);
    if args.progress {
        pipeline = pipeline.with_observer(Box::new(ProgressObserver::new()));
    }
    if let Some(records_path) = &args.records {
        pipeline = pipeline.with_observer(Box::new(JsonlObserver::new(records_path)?));
    }

    let mut session = RunStats::default();
    let mut total_ticks: u64 = 0;
    let mut crashes: u64 = 0;
    let mut final_epsilon = None;

    let mut completed = 0usize;
    while completed < args.episodes {
        let in_chunk = chunk.min(args.episodes - completed);
        pipeline.set_episodes(in_chunk);
        let result = pipeline.run(&mut controller, &mut course)?;
        completed += in_chunk;

        stats.merge(&result.stats());
        session.merge(&result.stats());
        total_ticks += result.total_ticks;
        crashes += result.crashes;
        final_epsilon = result.final_epsilon;

        metadata.episodes_trained = stats.episodes;
        metadata.environment = Some(course.name().to_string());
        if args.seed.is_some() {
            metadata.seed = args.seed;
        }

        // A failed checkpoint must not end the session; the learner keeps
        // its progress in memory and the final save still runs.
        if completed < args.episodes {
            let saved = SavedAgent::from_agent(controller.agent(), stats, metadata.clone());
            match repo.save(&saved, &snapshot_path) {
                Ok(()) => log::info!(
                    "checkpoint saved to {} after {} lifetime runs",
                    snapshot_path.display(),
                    stats.episodes
                ),
                Err(err) => log::warn!(
                    "checkpoint save to {} failed: {err}",
                    snapshot_path.display()
                ),
            }
        }
    }

    let saved = SavedAgent::from_agent(controller.agent(), stats, metadata);
    repo.save(&saved, &snapshot_path)?;

    let result = TrainingResult::from_stats(&session, total_ticks, crashes, final_epsilon);

    print_section("Training Complete");
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
            &format!("{:.1}%", result.crashes as f64 / result.episodes as f64 * 100.0),
        );
    }
    if let Some(eps) = result.final_epsilon {
        print_kv("Final epsilon", &format!("{eps:.3}"));
    }
    print_kv(
        "Table states",
        &format_number(controller.agent().table().len()),
    );
    println!("\n✓ Agent saved to: {}", snapshot_path.display());

    if let Some(summary_path) = &args.summary {
        let summary = TrainingSummaryFile {
            training: result,
            lifetime: LifetimeSection {
                episodes: stats.episodes,
                total_obstacles_passed: stats.total_obstacles_passed,
                best_distance: stats.best_distance,
                mean_distance: stats.mean_distance(),
                table_states: Some(controller.agent().table().len()),
            },
            metadata: SummaryMetadata {
                controller: "q-learning".to_string(),
                environment: course.name().to_string(),
                snapshot: snapshot_path.display().to_string(),
                seed: args.seed,
                resumed,
            },
        };
        let written = write_summary(summary_path, &summary)?;
        println!("✓ Summary written to: {}", written.display());
    }

    Ok(())
}

fn train_threshold(args: TrainArgs) -> Result<()> {
    let snapshot_path = args
        .snapshot
        .clone()
        .unwrap_or_else(|| args.controller.default_snapshot());

    let policy = ThresholdPolicy::load_or_default(&snapshot_path, ThresholdConfig::default())?;
    let resumed = !policy.score_history().is_empty();
    let prior_crashes = policy.score_history().len() as u64;

    print_section("Training Configuration");
    print_kv("Controller", "adaptive-threshold");
    print_kv("Runs", &args.episodes.to_string());
    print_kv("Snapshot", &snapshot_path.display().to_string());
    print_kv("Resumed", if resumed { "yes" } else { "no" });
    print_kv("Step", &policy.step().to_string());
    for band in SpeedBand::ALL {
        print_kv(
            &format!("Threshold ({})", band.label()),
            &format!("{:.1}", policy.thresholds()[band.index()]),
        );
    }
    if let Some(seed) = args.seed {
        print_kv("Seed", &seed.to_string());
    }

    let mut course = build_course(args.seed)?;
    let mut controller = ThresholdController::new(policy);

    let chunk = args.checkpoint_every.unwrap_or(args.episodes).max(1);
    let mut pipeline = TrainingPipeline::new(TrainingConfig {
        episodes: chunk,
        max_ticks_per_episode: args.max_ticks,
    })
    .with_first_episode(prior_crashes);
    if args.progress {
        pipeline = pipeline.with_observer(Box::new(ProgressObserver::new()));
    }
    if let Some(records_path) = &args.records {
        pipeline = pipeline.with_observer(Box::new(JsonlObserver::new(records_path)?));
    }

    let mut session = RunStats::default();
    let mut total_ticks: u64 = 0;
    let mut crashes: u64 = 0;

    let mut completed = 0usize;
    while completed < args.episodes {
        let in_chunk = chunk.min(args.episodes - completed);
        pipeline.set_episodes(in_chunk);
        let result = pipeline.run(&mut controller, &mut course)?;
        completed += in_chunk;

        session.merge(&result.stats());
        total_ticks += result.total_ticks;
        crashes += result.crashes;

        // Checkpoint failures are logged, not fatal; the final save below
        // still persists everything.
        if completed < args.episodes {
            match controller.policy().save_to(&snapshot_path) {
                Ok(()) => log::info!(
                    "checkpoint saved to {} after {} crashes recorded",
                    snapshot_path.display(),
                    controller.policy().score_history().len()
                ),
                Err(err) => log::warn!(
                    "checkpoint save to {} failed: {err}",
                    snapshot_path.display()
                ),
            }
        }
    }

    let result = TrainingResult::from_stats(&session, total_ticks, crashes, None);
    let policy = controller.into_policy();
    policy.save_to(&snapshot_path)?;

    print_section("Training Complete");
    print_kv("Runs", &result.episodes.to_string());
    print_kv("Best distance", &format!("{:.1}", result.best_distance));
    print_kv("Mean distance", &format!("{:.1}", result.mean_distance));
    print_kv(
        "Obstacles passed",
        &result.total_obstacles_passed.to_string(),
    );
    for band in SpeedBand::ALL {
        print_kv(
            &format!("Threshold ({})", band.label()),
            &format!("{:.1}", policy.thresholds()[band.index()]),
        );
    }
    print_kv("Step", &policy.step().to_string());
    print_kv(
        "Threshold changes",
        &policy.threshold_history().len().to_string(),
    );
    println!("\n✓ Thresholds saved to: {}", snapshot_path.display());

    if let Some(summary_path) = &args.summary {
        let scores = policy.score_history();
        let summary = TrainingSummaryFile {
            training: result,
            lifetime: LifetimeSection {
                episodes: scores.len() as u64,
                total_obstacles_passed: policy.obstacles_passed(),
                best_distance: scores.iter().copied().fold(0.0, f64::max),
                mean_distance: mean(scores),
                table_states: None,
            },
            metadata: SummaryMetadata {
                controller: "adaptive-threshold".to_string(),
                environment: course.name().to_string(),
                snapshot: snapshot_path.display().to_string(),
                seed: args.seed,
                resumed,
            },
        };
        let written = write_summary(summary_path, &summary)?;
        println!("✓ Summary written to: {}", written.display());
    }

    Ok(())
}
