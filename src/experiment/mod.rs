//! Scoring records
//!
//! ## Schema Overview
//!
//! ```text
//! ResultStore ──< PredictionResult (N)
//!                      │
//!                      └── Metric (name, lower_better)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use sysidexpr::experiment::{Metric, PredictionResult, ResultStore};
//!
//! let mut store = ResultStore::new();
//! let metric = Metric::new("integration_loss", true);
//! store.add_result(PredictionResult::new("koopman", "plasma", metric.clone(), 0.8));
//! store.add_result(PredictionResult::new("sindy", "plasma", metric, 0.5));
//!
//! let best = store.best_for_benchmark("plasma", "integration_loss").unwrap();
//! assert_eq!(best.model_name(), "sindy");
//! ```

mod metric;
mod prediction_result;
mod store;

pub use metric::Metric;
pub use prediction_result::PredictionResult;
pub use store::ResultStore;
