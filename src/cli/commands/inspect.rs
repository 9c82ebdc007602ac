//! Inspect command - Print what a snapshot file contains
//!
//! Works on both snapshot kinds: agent snapshots (MessagePack) and
//! threshold files (JSON). The file is probed as an agent snapshot first
//! and falls back to thresholds, so the user never has to say which one
//! they have.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

use crate::{
    Error,
    adapters::MsgPackRepository,
    cli::output::{format_number, print_kv, print_section, print_subsection},
    ports::SnapshotRepository,
    q_learning::SavedAgent,
    runner::SpeedBand,
    threshold::ThresholdPolicy,
    utils::mean,
};

#[derive(Parser, Debug)]
#[command(about = "Inspect a snapshot file")]
pub struct InspectArgs {
    /// Path to an agent snapshot or threshold file
    pub snapshot: PathBuf,

    /// How many top states or recent changes to list
    #[arg(long, short = 't', default_value_t = 10)]
    pub top: usize,
}

pub fn execute(args: InspectArgs) -> Result<()> {
    let repo = MsgPackRepository::new();
    match repo.load(&args.snapshot) {
        Ok(Some(saved)) => {
            inspect_agent(&args, &saved);
            Ok(())
        }
        Ok(None) => Err(Error::SnapshotMissing {
            path: args.snapshot.display().to_string(),
        }
        .into()),
        Err(agent_err) => {
            let policy = ThresholdPolicy::load_from(&args.snapshot).map_err(|threshold_err| {
                anyhow!(
                    "failed to read {} as an agent snapshot ({agent_err:#}) or a threshold file ({threshold_err:#})",
                    args.snapshot.display()
                )
            })?;
            inspect_thresholds(&args, &policy);
            Ok(())
        }
    }
}

fn inspect_agent(args: &InspectArgs, saved: &SavedAgent) {
    print_section("Agent Snapshot");
    print_kv("File", &args.snapshot.display().to_string());
    print_kv("Format version", &saved.version.to_string());
    print_kv("Table states", &format_number(saved.entries.len()));
    print_kv("Epsilon", &format!("{:.3}", saved.epsilon));
    if let Some(seed) = saved.rng_seed {
        print_kv("RNG seed", &seed.to_string());
    }

    print_subsection("Configuration");
    print_kv("Learning rate", &saved.config.learning_rate.to_string());
    print_kv("Discount factor", &saved.config.discount_factor.to_string());
    print_kv(
        "Epsilon range",
        &format!(
            "{} down to {} (decay {})",
            saved.config.initial_epsilon, saved.config.min_epsilon, saved.config.epsilon_decay
        ),
    );
    let rewards = &saved.config.rewards;
    print_kv(
        "Rewards",
        &format!(
            "survive {}, pass {}, streak {} every {}, crash {}",
            rewards.survive,
            rewards.obstacle_pass,
            rewards.streak_bonus,
            rewards.streak_every,
            rewards.crash
        ),
    );

    print_subsection("Lifetime");
    print_kv("Runs", &format_number(saved.stats.episodes as usize));
    print_kv("Best distance", &format!("{:.1}", saved.stats.best_distance));
    print_kv(
        "Mean distance",
        &format!("{:.1}", saved.stats.mean_distance()),
    );
    print_kv(
        "Obstacles passed",
        &format_number(saved.stats.total_obstacles_passed as usize),
    );
    if let Some(environment) = &saved.metadata.environment {
        print_kv("Trained on", environment);
    }
    if let Some(seed) = saved.metadata.seed {
        print_kv("Training seed", &seed.to_string());
    }
    if let Some(saved_at) = &saved.metadata.saved_at {
        print_kv("Saved at", saved_at);
    }

    if args.top > 0 && !saved.entries.is_empty() {
        print_subsection(&format!("Top {} States by Value", args.top));
        let mut by_value: Vec<_> = saved.entries.iter().collect();
        by_value.sort_by(|a, b| {
            b.values
                .best()
                .partial_cmp(&a.values.best())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for entry in by_value.into_iter().take(args.top) {
            println!(
                "  {:<40} {:>+9.3}  ({})",
                entry.key.to_string(),
                entry.values.best(),
                entry.values.greedy()
            );
        }
    }
}

fn inspect_thresholds(args: &InspectArgs, policy: &ThresholdPolicy) {
    print_section("Threshold Snapshot");
    print_kv("File", &args.snapshot.display().to_string());
    for band in SpeedBand::ALL {
        print_kv(
            &format!("Threshold ({})", band.label()),
            &format!("{:.1}", policy.thresholds()[band.index()]),
        );
    }
    print_kv("Step", &policy.step().to_string());
    print_kv(
        "Obstacles passed",
        &format_number(policy.obstacles_passed() as usize),
    );

    let scores = policy.score_history();
    print_subsection("Crash History");
    print_kv("Crashes recorded", &scores.len().to_string());
    if !scores.is_empty() {
        print_kv("Mean distance", &format!("{:.1}", mean(scores)));
        print_kv(
            "Best distance",
            &format!("{:.1}", scores.iter().copied().fold(0.0, f64::max)),
        );
    }

    let changes = policy.threshold_history();
    if args.top > 0 && !changes.is_empty() {
        print_subsection(&format!("Last {} Threshold Changes", args.top));
        for change in changes.iter().rev().take(args.top) {
            println!(
                "  {:<8} -> {:>6.1}  (crash at {:.1})",
                change.band.label(),
                change.new_threshold,
                change.distance_ran
            );
        }
    }
}
