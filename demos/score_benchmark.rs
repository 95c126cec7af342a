//! Score and tune a synthetic benchmark end to end
//!
//! This example demonstrates:
//! - Writing ground-truth and prediction tables as Parquet
//! - Scoring a prediction with `BenchmarkScorer`
//! - Picking a smoothing window with the `Tuner`
//! - Persisting scores with `ResultStore`
//!
//! Run with: RUST_LOG=sysidexpr=debug cargo run --example score_benchmark

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;
use sysidexpr::benchmark::{Benchmark, BenchmarkScorer, DEFAULT_TEST_GROUP};
use sysidexpr::config::{BenchmarkConfiguration, PathsConfig, PredictionConfiguration};
use sysidexpr::experiment::{PredictionResult, ResultStore};
use sysidexpr::loss::{integration_loss, SCORING_FUNCTIONS};
use sysidexpr::storage::{write_parquet, ParquetSource};
use sysidexpr::trajectory::{Trajectory, TrajectoryCollection};
use sysidexpr::tuner::Tuner;
use tracing_subscriber::EnvFilter;

const SUBJECTS: i32 = 40;
const VISITS: usize = 6;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== sysidexpr: synthetic benchmark ===\n");

    let workdir = std::env::temp_dir().join("sysidexpr_demo");
    let paths = PathsConfig {
        data_base_path: workdir.join("data"),
        predictions_base_path: workdir.join("predictions"),
        scores_base_path: workdir.join("scores"),
    };
    for dir in [&paths.data_base_path, &paths.predictions_base_path, &paths.scores_base_path] {
        std::fs::create_dir_all(dir)?;
    }
    paths.validate()?;

    // -------------------------------------------------------------------------
    // 1. Ground truth: noisy exponential decay, shuffled rows
    // -------------------------------------------------------------------------
    let config = BenchmarkConfiguration {
        name: "decay".to_string(),
        data_source: paths.data_base_path.join("decay.parquet"),
        prediction_dir: paths.predictions_base_path.join("decay"),
        states: vec!["level".to_string()],
        groups: vec!["Train".to_string(), "Test".to_string()],
        time: "age".to_string(),
        traj: "subject".to_string(),
    };
    std::fs::create_dir_all(&config.prediction_dir)?;

    let table = ground_truth_table(42);
    write_parquet(&config.data_source, &table)?;
    println!("1. Wrote {} rows to {}", table.num_rows(), config.data_source.display());

    let scorer = BenchmarkScorer::new(ParquetSource::new());
    let grouped = scorer.load(&config)?;
    for (group, collection) in &grouped {
        println!("   {group}: {} subjects", collection.len());
    }

    // -------------------------------------------------------------------------
    // 2. Score a moving-average predictor with every registered loss
    // -------------------------------------------------------------------------
    println!("\n2. Scoring the moving-average predictor...");
    let loader = Benchmark::new(config.clone());
    let mut store = ResultStore::new();

    let smoothed = moving_average(&grouped[DEFAULT_TEST_GROUP], 3)?;
    let pred_path = config.prediction_dir.join("moving_average.parquet");
    write_parquet(&pred_path, &loader.store_trajectories(&smoothed, DEFAULT_TEST_GROUP)?)?;
    let prediction = PredictionConfiguration::new("moving_average", config.clone(), &pred_path);

    for (name, scoring) in SCORING_FUNCTIONS {
        let result = scorer.score_benchmark(&prediction, *scoring, DEFAULT_TEST_GROUP)?;
        println!("   {name:<22} {:.4}", result.value());
        store.add_result(result);
    }

    // -------------------------------------------------------------------------
    // 3. Tune the window on the training cohort
    // -------------------------------------------------------------------------
    println!("\n3. Tuning the smoothing window on Train...");
    let train = &grouped["Train"];
    let tuner = Tuner::new(|window: usize| {
        let (metric, score) = integration_loss(train, &moving_average(train, window)?)?;
        Ok((metric, score, window))
    });
    let report = tuner.tune(1..=VISITS)?;
    for trial in report.trials() {
        println!("   window {:>2}: {:.4}", trial.hyperparameter, trial.score);
    }
    let (metric, score, window) = report.best();
    println!("   best window: {window} ({metric} = {score:.4})");

    let tuned = moving_average(&grouped[DEFAULT_TEST_GROUP], window)?;
    let tuned_path = config.prediction_dir.join("moving_average_tuned.parquet");
    write_parquet(&tuned_path, &loader.store_trajectories(&tuned, DEFAULT_TEST_GROUP)?)?;
    let tuned_prediction = PredictionConfiguration::new("moving_average_tuned", config.clone(), &tuned_path);
    store.add_result(scorer.score_benchmark(&tuned_prediction, integration_loss, DEFAULT_TEST_GROUP)?);

    // -------------------------------------------------------------------------
    // 4. Persist scores
    // -------------------------------------------------------------------------
    println!("\n4. Writing scores...");
    for path in store.write_scores(&paths)? {
        println!("   {}", path.display());
    }
    if let Some(best) = store.best_for_benchmark(&config.name, "integration_loss") {
        print_best(best);
    }

    cleanup(&workdir);
    Ok(())
}

/// Subjects split 3:1 into Train/Test, rows shuffled.
fn ground_truth_table(seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows: Vec<(i32, f64, f64)> = Vec::new();
    for subject in 0..SUBJECTS {
        let rate = rng.gen_range(0.1..0.5);
        let mut age = 50.0 + rng.gen_range(0.0..20.0);
        for _ in 0..VISITS {
            let level = 100.0 * (-rate * (age - 50.0) / 10.0_f64).exp() + rng.gen_range(-2.0..2.0);
            rows.push((subject, age, level));
            age += rng.gen_range(0.5..3.0);
        }
    }
    for i in (1..rows.len()).rev() {
        rows.swap(i, rng.gen_range(0..=i));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("subject", DataType::Int32, false),
        Field::new("age", DataType::Float64, false),
        Field::new("level", DataType::Float64, false),
        Field::new("Train", DataType::Boolean, false),
        Field::new("Test", DataType::Boolean, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.0))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.1))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.2))),
        Arc::new(BooleanArray::from(rows.iter().map(|r| r.0 % 4 != 0).collect::<Vec<_>>())),
        Arc::new(BooleanArray::from(rows.iter().map(|r| r.0 % 4 == 0).collect::<Vec<_>>())),
    ];
    RecordBatch::try_new(schema, columns).unwrap_or_else(|e| panic!("synthetic table: {e}"))
}

/// Trailing moving average over `window` samples, per subject and state.
#[allow(clippy::cast_precision_loss)]
fn moving_average(collection: &TrajectoryCollection, window: usize) -> sysidexpr::Result<TrajectoryCollection> {
    collection
        .iter()
        .map(|(subject, traj)| {
            let rows: Vec<&[f64]> = traj.rows().collect();
            let states = (0..rows.len())
                .map(|i| {
                    let from = (i + 1).saturating_sub(window);
                    let span = &rows[from..=i];
                    (0..traj.state_dim())
                        .map(|d| span.iter().map(|r| r[d]).sum::<f64>() / span.len() as f64)
                        .collect()
                })
                .collect();
            let smoothed = Trajectory::new(traj.times().to_vec(), states, traj.state_names().to_vec())?;
            Ok::<_, sysidexpr::Error>((subject.to_string(), smoothed))
        })
        .collect()
}

fn print_best(best: &PredictionResult) {
    println!(
        "\n   Best on {}: {} ({} = {:.4})",
        best.benchmark_name(),
        best.model_name(),
        best.metric(),
        best.value()
    );
}

fn cleanup(workdir: &Path) {
    std::fs::remove_dir_all(workdir).ok();
}
