//! End-to-end tests for the training pipeline on the simulated course

use std::sync::{Arc, Mutex};

use dinoq::{
    pipeline::{
        JsonlObserver, MetricsObserver, QLearnerController, RandomController,
        ThresholdController, TrainingConfig, TrainingPipeline, TrainingResult,
    },
    ports::{EpisodeRecord, Observer},
    q_learning::{QAgentConfig, QLearningAgent},
    runner::{CourseConfig, SimulatedCourse, StateEncoder},
    stats::RunStats,
    threshold::{ThresholdConfig, ThresholdPolicy},
};

fn q_controller(seed: u64) -> QLearnerController {
    let agent = QLearningAgent::new(QAgentConfig::default())
        .expect("default config is valid")
        .with_seed(seed);
    QLearnerController::new(agent, StateEncoder::default())
}

/// Test basic training pipeline with a random controller
#[test]
fn test_basic_training_pipeline() {
    let config = TrainingConfig {
        episodes: 50,
        max_ticks_per_episode: 2_000,
    };

    let mut pipeline = TrainingPipeline::new(config);
    let mut controller = RandomController::with_seed(42);
    let mut course = SimulatedCourse::with_seed(42);

    let result = pipeline.run(&mut controller, &mut course).unwrap();

    assert_eq!(result.episodes, 50);
    assert!(result.crashes <= result.episodes);
    assert!(result.total_ticks > 0);
    assert!(result.best_distance >= result.mean_distance);
    assert!(result.mean_distance > 0.0);
    assert!(result.final_epsilon.is_none());
}

/// Test Q-learner training populates the table and decays exploration
#[test]
fn test_q_learner_trains_on_simulated_course() {
    let config = TrainingConfig {
        episodes: 30,
        max_ticks_per_episode: 2_000,
    };

    let mut pipeline = TrainingPipeline::new(config);
    let mut controller = q_controller(7);
    let mut course = SimulatedCourse::with_seed(7);

    let result = pipeline.run(&mut controller, &mut course).unwrap();

    assert_eq!(result.episodes, 30);
    assert!(
        !controller.agent().table().is_empty(),
        "Training should materialize table rows"
    );

    let epsilon = result.final_epsilon.expect("learner exposes epsilon");
    assert!(
        epsilon < 1.0,
        "Epsilon should decay from its initial value, got {epsilon}"
    );
    assert!(epsilon >= controller.agent().config().min_epsilon);
}

/// Test frozen evaluation neither grows the table nor decays epsilon
#[test]
fn test_frozen_policy_does_not_learn() {
    let train_config = TrainingConfig {
        episodes: 10,
        max_ticks_per_episode: 1_000,
    };
    let mut pipeline = TrainingPipeline::new(train_config);
    let mut controller = q_controller(19);
    let mut course = SimulatedCourse::with_seed(19);
    pipeline.run(&mut controller, &mut course).unwrap();

    let agent = controller.into_agent();
    let states_before = agent.table().len();
    let epsilon_before = agent.epsilon();

    let mut frozen = QLearnerController::frozen(agent, StateEncoder::default());
    let mut pipeline = TrainingPipeline::new(TrainingConfig {
        episodes: 10,
        max_ticks_per_episode: 1_000,
    });
    let result = pipeline.run(&mut frozen, &mut course).unwrap();

    assert_eq!(result.episodes, 10);
    assert!(
        result.final_epsilon.is_none(),
        "A frozen policy reports no exploration rate"
    );

    let agent = frozen.into_agent();
    assert_eq!(agent.table().len(), states_before);
    assert_eq!(agent.epsilon(), epsilon_before);
}

/// Test the threshold controller records crashes and adapts
#[test]
fn test_threshold_controller_adapts_after_crashes() {
    let policy = ThresholdPolicy::new(ThresholdConfig::default()).unwrap();
    let initial_thresholds = policy.thresholds();

    let config = TrainingConfig {
        episodes: 20,
        max_ticks_per_episode: 2_000,
    };
    let mut pipeline = TrainingPipeline::new(config);
    let mut controller = ThresholdController::new(policy);
    // The policy only ever jumps. Mid-height pterodactyls need a duck, so
    // spawning them from the start guarantees crashes within the tick cap.
    let mut course = SimulatedCourse::new(CourseConfig {
        seed: Some(5),
        pterodactyl_min_speed: 0.0,
        ..CourseConfig::default()
    })
    .unwrap();

    let result = pipeline.run(&mut controller, &mut course).unwrap();
    let policy = controller.into_policy();

    assert_eq!(result.episodes, 20);
    assert!(result.crashes > 0, "Runs on the course should crash");
    assert_eq!(
        policy.score_history().len() as u64,
        result.crashes,
        "Every crash should append a score"
    );
    assert!(
        !policy.threshold_history().is_empty(),
        "Crashes on obstacles should adjust thresholds"
    );
    assert_ne!(
        policy.thresholds(),
        initial_thresholds,
        "At least one band should have moved"
    );
}

/// Test training with a metrics observer attached
#[test]
fn test_metrics_observer() {
    let config = TrainingConfig {
        episodes: 20,
        max_ticks_per_episode: 1_000,
    };

    let mut pipeline =
        TrainingPipeline::new(config).with_observer(Box::new(MetricsObserver::new()));
    let mut controller = RandomController::with_seed(123);
    let mut course = SimulatedCourse::with_seed(123);

    let result = pipeline.run(&mut controller, &mut course).unwrap();
    assert_eq!(result.episodes, 20);
}

/// Test JSONL observer writes one parseable record per run
#[test]
fn test_jsonl_observer_writes_sequential_records() {
    let temp_file = tempfile::NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let config = TrainingConfig {
        episodes: 5,
        max_ticks_per_episode: 1_000,
    };
    let mut pipeline =
        TrainingPipeline::new(config).with_observer(Box::new(JsonlObserver::new(&path).unwrap()));
    let mut controller = RandomController::with_seed(456);
    let mut course = SimulatedCourse::with_seed(456);

    pipeline.run(&mut controller, &mut course).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let records: Vec<EpisodeRecord> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line parses as a record"))
        .collect();

    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.episode, i as u64);
        assert!(record.ticks > 0);
        assert!(record.distance_ran > 0.0);
    }
}

/// Test observer event ordering
#[test]
fn test_observer_event_ordering() {
    struct TestObserver {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Observer for TestObserver {
        fn on_training_start(&mut self, total_episodes: usize) -> dinoq::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("training_start_{total_episodes}"));
            Ok(())
        }

        fn on_episode_end(&mut self, record: &EpisodeRecord) -> dinoq::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("episode_end_{}", record.episode));
            Ok(())
        }

        fn on_training_end(&mut self) -> dinoq::Result<()> {
            self.events.lock().unwrap().push("training_end".to_string());
            Ok(())
        }
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let observer = TestObserver {
        events: events.clone(),
    };

    let config = TrainingConfig {
        episodes: 3,
        max_ticks_per_episode: 500,
    };
    let mut pipeline = TrainingPipeline::new(config).with_observer(Box::new(observer));
    let mut controller = RandomController::with_seed(333);
    let mut course = SimulatedCourse::with_seed(333);

    pipeline.run(&mut controller, &mut course).unwrap();

    let event_log = events.lock().unwrap();
    let expected = [
        "training_start_3",
        "episode_end_0",
        "episode_end_1",
        "episode_end_2",
        "training_end",
    ];
    assert_eq!(event_log.as_slice(), expected);
}

/// Test empty training (edge case)
#[test]
fn test_empty_training() {
    let config = TrainingConfig {
        episodes: 0,
        max_ticks_per_episode: 1_000,
    };

    let mut pipeline = TrainingPipeline::new(config);
    let mut controller = RandomController::with_seed(444);
    let mut course = SimulatedCourse::with_seed(444);

    let result = pipeline.run(&mut controller, &mut course).unwrap();

    assert_eq!(result.episodes, 0);
    assert_eq!(result.total_ticks, 0);
    assert_eq!(result.crashes, 0);
    assert_eq!(result.best_distance, 0.0);
}

/// Test that identical seeds reproduce an identical session
#[test]
fn test_seeded_sessions_reproduce() {
    let run_session = || {
        let config = TrainingConfig {
            episodes: 15,
            max_ticks_per_episode: 1_500,
        };
        let mut pipeline = TrainingPipeline::new(config);
        let mut controller = q_controller(21);
        let mut course = SimulatedCourse::with_seed(22);
        let result = pipeline.run(&mut controller, &mut course).unwrap();
        (result, controller.into_agent().table().len())
    };

    let (first, first_states) = run_session();
    let (second, second_states) = run_session();

    assert_eq!(first.total_ticks, second.total_ticks);
    assert_eq!(first.total_obstacles_passed, second.total_obstacles_passed);
    assert_eq!(first.best_distance, second.best_distance);
    assert_eq!(first.crashes, second.crashes);
    assert_eq!(first_states, second_states);
}

/// Test training result serialization
#[test]
fn test_training_result_serialization() {
    let mut stats = RunStats::default();
    stats.record_episode(350.0, 2);
    stats.record_episode(540.0, 5);
    let result = TrainingResult::from_stats(&stats, 1_234, 2, Some(0.42));

    let temp_file = tempfile::NamedTempFile::new().unwrap();
    result.save(temp_file.path()).unwrap();

    let loaded = TrainingResult::load(temp_file.path()).unwrap();

    assert_eq!(loaded.episodes, 2);
    assert_eq!(loaded.total_ticks, 1_234);
    assert_eq!(loaded.total_obstacles_passed, 7);
    assert_eq!(loaded.crashes, 2);
    assert_eq!(loaded.best_distance, 540.0);
    assert!((loaded.mean_distance - 445.0).abs() < 1e-9);
    assert_eq!(loaded.final_epsilon, Some(0.42));
}
