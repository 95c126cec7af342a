//! Prediction Result - terminal record of one scoring run

use serde::{Deserialize, Serialize};

use super::Metric;

/// Score of one model on one benchmark under one metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    model_name: String,
    benchmark_name: String,
    metric: Metric,
    value: f64,
}

impl PredictionResult {
    /// Create a new prediction result.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Model that produced the predictions
    /// * `benchmark_name` - Benchmark scored against
    /// * `metric` - Metric used for scoring
    /// * `value` - Resulting score
    #[must_use]
    pub fn new(
        model_name: impl Into<String>,
        benchmark_name: impl Into<String>,
        metric: Metric,
        value: f64,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            benchmark_name: benchmark_name.into(),
            metric,
            value,
        }
    }

    /// Get the model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Get the benchmark name.
    #[must_use]
    pub fn benchmark_name(&self) -> &str {
        &self.benchmark_name
    }

    /// Get the metric.
    #[must_use]
    pub const fn metric(&self) -> &Metric {
        &self.metric
    }

    /// Get the score.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_result_json_shape() {
        let result = PredictionResult::new("koopman", "plasma", Metric::new("integration_loss", true), 1.5);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model_name": "koopman",
                "benchmark_name": "plasma",
                "metric": {"name": "integration_loss", "lower_better": true},
                "value": 1.5
            })
        );
    }
}
