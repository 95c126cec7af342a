//! Metric - identity and optimization direction of a score

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A named scoring function plus the direction in which it improves.
///
/// Produced alongside every score; immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Metric {
    name: String,
    lower_better: bool,
}

impl Metric {
    /// Create a new metric.
    ///
    /// # Arguments
    ///
    /// * `name` - Metric name (e.g., "integration_loss_5")
    /// * `lower_better` - True if smaller scores are better
    #[must_use]
    pub fn new(name: impl Into<String>, lower_better: bool) -> Self {
        Self {
            name: name.into(),
            lower_better,
        }
    }

    /// Get the metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if smaller scores are better.
    #[must_use]
    pub const fn lower_better(&self) -> bool {
        self.lower_better
    }

    /// Order two scores from worse to better under this metric.
    ///
    /// NaN ranks below every number, so it is never the better score.
    #[must_use]
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                if self.lower_better {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    }

    /// True if `candidate` is strictly better than `incumbent`.
    #[must_use]
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        self.compare(candidate, incumbent) == Ordering::Greater
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = if self.lower_better { "min" } else { "max" };
        write!(f, "{} ({direction})", self.name)
    }
}
