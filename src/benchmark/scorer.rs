//! Benchmark scorer - ground truth vs prediction for one model

use super::{Benchmark, GroupedTrajectories};
use crate::config::{BenchmarkConfiguration, PredictionConfiguration};
use crate::experiment::{Metric, PredictionResult};
use crate::storage::TableSource;
use crate::trajectory::TrajectoryCollection;
use crate::{Error, Result};

/// Default cohort compared by [`BenchmarkScorer::score_benchmark`].
pub const DEFAULT_TEST_GROUP: &str = "Test";

/// Loads benchmark and prediction tables from a [`TableSource`] and scores
/// them with a caller-supplied scoring function.
#[derive(Debug, Clone)]
pub struct BenchmarkScorer<S> {
    source: S,
}

impl<S: TableSource> BenchmarkScorer<S> {
    /// Create a scorer reading tables from `source`.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Get the table source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Load every declared cohort of a benchmark.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the source and `Configuration` errors from
    /// the loader.
    pub fn load(&self, config: &BenchmarkConfiguration) -> Result<GroupedTrajectories> {
        let table = self.source.load_table(&config.data_source)?;
        Benchmark::new(config.clone()).load_trajectories(&table)
    }

    /// Score a model's predictions for `test_group` against ground truth.
    ///
    /// The prediction table is read with the benchmark's column names and
    /// treated as a single cohort named `test_group`. Errors raised by
    /// `scoring_fn` are returned as is.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a table does not match the schema or the
    /// benchmark does not declare `test_group`, plus any error of `scoring_fn`.
    pub fn score_benchmark<F>(
        &self,
        prediction: &PredictionConfiguration,
        scoring_fn: F,
        test_group: &str,
    ) -> Result<PredictionResult>
    where
        F: Fn(&TrajectoryCollection, &TrajectoryCollection) -> Result<(Metric, f64)>,
    {
        let benchmark = &prediction.benchmark;
        let mut data = self.load(benchmark)?;
        let ground_truth = data.remove(test_group).ok_or_else(|| {
            Error::configuration(
                test_group,
                format!("cohort not declared by benchmark `{}`", benchmark.name),
            )
        })?;

        let pred_table = self.source.load_table(&prediction.pred_source)?;
        let predicted = Benchmark::new(benchmark.clone()).load_single_group(&pred_table, test_group)?;

        tracing::debug!(
            model = %prediction.model_name,
            benchmark = %benchmark.name,
            subjects = ground_truth.len(),
            "scoring predictions"
        );
        let (metric, value) = scoring_fn(&ground_truth, &predicted)?;
        tracing::info!(
            model = %prediction.model_name,
            benchmark = %benchmark.name,
            metric = %metric,
            value,
            "scored benchmark"
        );

        Ok(PredictionResult::new(
            prediction.model_name.clone(),
            benchmark.name.clone(),
            metric,
            value,
        ))
    }
}
