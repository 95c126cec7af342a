//! Result Store - in-memory collection of prediction results
//!
//! Results are kept in insertion order; queries filter by benchmark and
//! metric and pick the best model under the metric's direction.

use std::path::{Path, PathBuf};

use super::PredictionResult;
use crate::config::PathsConfig;
use crate::Result;

/// In-memory store of [`PredictionResult`]s.
///
/// ## Design
///
/// A flat vector in insertion order. Ties between equally scored models are
/// resolved in favour of the result added first.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Vec<PredictionResult>,
}

impl ResultStore {
    /// Create a new empty result store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get the number of results in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Add a result to the store.
    pub fn add_result(&mut self, result: PredictionResult) {
        self.results.push(result);
    }

    /// All results, in insertion order.
    #[must_use]
    pub fn results(&self) -> &[PredictionResult] {
        &self.results
    }

    /// Get all results scored against a benchmark.
    #[must_use]
    pub fn results_for_benchmark(&self, benchmark_name: &str) -> Vec<&PredictionResult> {
        self.results
            .iter()
            .filter(|r| r.benchmark_name() == benchmark_name)
            .collect()
    }

    /// Best result on a benchmark under a named metric.
    ///
    /// Returns `None` if no result matches or every matching score is NaN.
    #[must_use]
    pub fn best_for_benchmark(
        &self,
        benchmark_name: &str,
        metric_name: &str,
    ) -> Option<&PredictionResult> {
        let mut best: Option<&PredictionResult> = None;
        for result in self
            .results
            .iter()
            .filter(|r| r.benchmark_name() == benchmark_name && r.metric().name() == metric_name)
            .filter(|r| !r.value().is_nan())
        {
            match best {
                Some(incumbent) if !result.metric().is_better(result.value(), incumbent.value()) => {}
                _ => best = Some(result),
            }
        }
        best
    }

    /// Write all results to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.results)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Read results previously written by [`save_json`](Self::save_json).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let results = serde_json::from_str(&raw)?;
        Ok(Self { results })
    }

    /// Write one `<benchmark>_scores.json` file per benchmark into the
    /// configured scores directory.
    ///
    /// # Errors
    ///
    /// Returns error if a file cannot be written.
    pub fn write_scores(&self, paths: &PathsConfig) -> Result<Vec<PathBuf>> {
        let mut benchmarks: Vec<&str> = self.results.iter().map(PredictionResult::benchmark_name).collect();
        benchmarks.sort_unstable();
        benchmarks.dedup();

        let mut written = Vec::with_capacity(benchmarks.len());
        for benchmark in benchmarks {
            let path = paths.scores_base_path.join(format!("{benchmark}_scores.json"));
            let subset: Vec<&PredictionResult> = self.results_for_benchmark(benchmark);
            std::fs::write(&path, serde_json::to_string_pretty(&subset)?)?;
            tracing::info!(benchmark, path = %path.display(), results = subset.len(), "wrote scores");
            written.push(path);
        }
        Ok(written)
    }
}
