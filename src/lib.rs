//! # sysidexpr: Trajectory Prediction Benchmarks
//!
//! Scores externally produced predictions of longitudinal (per-subject,
//! irregularly sampled) measurements against ground truth, and selects
//! hyperparameters by the resulting scores.
//!
//! ## Pipeline
//!
//! ```text
//! Arrow table ──> Benchmark loader ──> TrajectoryCollection per cohort
//!                                            │
//!            ground truth + prediction ──> loss engine ──> (Metric, score)
//!                                            │
//!                    BenchmarkScorer ──> PredictionResult ──> ResultStore
//!                    Tuner ──> best (Metric, score, hyperparameter)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sysidexpr::benchmark::BenchmarkScorer;
//! use sysidexpr::config::{load_benchmark_configs, PredictionConfiguration};
//! use sysidexpr::loss::integration_loss_5;
//! use sysidexpr::storage::ParquetSource;
//!
//! let schema = load_benchmark_configs("benchmarks.json")?;
//! let plasma = schema.get("plasma").expect("plasma benchmark").clone();
//! let prediction = PredictionConfiguration::new("koopman", plasma, "predictions/koopman.parquet");
//!
//! let scorer = BenchmarkScorer::new(ParquetSource::new());
//! let result = scorer.score_benchmark(&prediction, integration_loss_5, "Test")?;
//! println!("{}: {}", result.metric(), result.value());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod benchmark;
pub mod config;
pub mod error;
pub mod experiment;
pub mod loss;
pub mod storage;
pub mod trajectory;
pub mod tuner;

pub use error::{Error, Result};
