//! Integral-error scoring of predicted trajectories
//!
//! For every subject the prediction error is reduced to a scalar sequence
//! `v[i] = ||y[i] - ŷ[i]||₂` and integrated over time:
//!
//! ```text
//! total(subject) = Σ_{i < h}  (t[i+1] - t[i]) · v[i+1]²      h = min(n, L-1)
//! score          = sqrt( Σ_subjects total(subject) )
//! ```
//!
//! Each interval is weighted by the error at its *later* endpoint.
//! Intervals whose error is NaN are dropped rather than counted as zero
//! error, so a predictor cannot score well by emitting missing values; the
//! dropped intervals are reported through `tracing`.

use crate::experiment::Metric;
use crate::trajectory::{TrajectoryAlgebra, TrajectoryCollection};
use crate::{Error, Result};

/// Base name of the integration loss family.
pub const INTEGRATION_LOSS: &str = "integration_loss";

/// Name of the full-horizon loss as originally published.
pub const PENALTY_LOSS: &str = "penalty_loss";

/// Signature shared by every scoring function.
pub type ScoringFn = fn(&TrajectoryCollection, &TrajectoryCollection) -> Result<(Metric, f64)>;

/// Registered scoring functions, by metric name.
pub const SCORING_FUNCTIONS: &[(&str, ScoringFn)] = &[
    ("integration_loss", integration_loss),
    ("integration_loss_1", integration_loss_1),
    ("integration_loss_5", integration_loss_5),
    ("integration_loss_10", integration_loss_10),
    ("penalty_loss", penalty_loss),
];

/// Resolve a scoring function by metric name.
#[must_use]
pub fn scoring_function(name: &str) -> Option<ScoringFn> {
    SCORING_FUNCTIONS
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, f)| *f)
}

/// Metric for an integration loss truncated to `horizon` intervals.
#[must_use]
pub fn integration_metric(horizon: Option<usize>) -> Metric {
    match horizon {
        Some(n) => Metric::new(format!("{INTEGRATION_LOSS}_{n}"), true),
        None => Metric::new(INTEGRATION_LOSS, true),
    }
}

/// Accumulated error of one subject within the horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
struct IntervalTotal {
    total: f64,
    /// Intervals that entered the sum
    counted: usize,
    /// Intervals dropped for a NaN error
    skipped: usize,
}

/// Time-weighted squared error of one scalar error sequence.
///
/// Returns `None` when fewer than two samples exist (no interval), and
/// the total plus the number of NaN intervals skipped otherwise.
fn trajectory_total(times: &[f64], errors: &[f64], horizon: Option<usize>) -> Option<IntervalTotal> {
    if times.len() < 2 {
        return None;
    }
    let intervals = times.len() - 1;
    let limit = horizon.map_or(intervals, |n| n.min(intervals));

    let mut total = 0.0;
    let mut skipped = 0;
    for i in 0..limit {
        let sq = errors[i + 1].powi(2);
        if sq.is_nan() {
            skipped += 1;
            continue;
        }
        total += (times[i + 1] - times[i]) * sq;
    }
    Some(IntervalTotal {
        total,
        counted: limit - skipped,
        skipped,
    })
}

/// Sum over subjects of the time-weighted squared error, before the root.
///
/// # Errors
///
/// Returns `Mismatch` if the collections cannot be compared and `AllNaN` if
/// every subject total is NaN or every interval within the horizon was
/// dropped for a NaN error.
pub fn integrated_squared_error<C: TrajectoryAlgebra>(
    ground_truth: &C,
    prediction: &C,
    horizon: Option<usize>,
) -> Result<f64> {
    let metric = integration_metric(horizon);
    let errors = ground_truth.difference(prediction)?.norm_reduce();

    let mut contributing = 0usize;
    let mut nan_subjects = 0usize;
    let mut counted = 0usize;
    let mut sum = 0.0;
    for (subject, traj) in errors.subjects() {
        let values: Vec<f64> = traj.rows().map(|row| row[0]).collect();
        let Some(IntervalTotal { total, counted: intervals, skipped }) =
            trajectory_total(traj.times(), &values, horizon)
        else {
            continue;
        };
        if skipped > 0 {
            tracing::warn!(subject, skipped, metric = metric.name(), "NaN errors excluded from integration");
        }
        contributing += 1;
        counted += intervals;
        if total.is_nan() {
            // NaN time stamps; the total cannot be recovered
            tracing::warn!(subject, metric = metric.name(), "NaN subject total excluded from score");
            nan_subjects += 1;
            continue;
        }
        sum += total;
    }

    if contributing == 0 {
        tracing::warn!(metric = metric.name(), "no subject has two or more samples; score is 0");
    } else if nan_subjects == contributing || counted == 0 {
        // every interval was masked: nothing was measured, not a perfect score
        return Err(Error::AllNaN {
            metric: metric.name().to_string(),
        });
    }
    Ok(sum)
}

/// Integration loss over the first `horizon` intervals (all if `None`).
///
/// A prediction that is NaN on every interval within the horizon has no
/// measured error and is rejected with `AllNaN` rather than scored `0.0`.
/// Subjects with fewer than two samples contribute nothing; if no subject
/// has two samples the score is `0.0`.
///
/// # Errors
///
/// Returns `InvalidInput` for a zero horizon, `Mismatch` if the collections
/// cannot be compared and `AllNaN` if no interval yields a number.
pub fn integration_loss_n<C: TrajectoryAlgebra>(
    ground_truth: &C,
    prediction: &C,
    horizon: Option<usize>,
) -> Result<(Metric, f64)> {
    if horizon == Some(0) {
        return Err(Error::InvalidInput("integration horizon must be at least 1".to_string()));
    }
    let sum = integrated_squared_error(ground_truth, prediction, horizon)?;
    Ok((integration_metric(horizon), sum.sqrt()))
}

/// Full-horizon integration loss.
///
/// # Errors
///
/// See [`integration_loss_n`].
pub fn integration_loss(gt: &TrajectoryCollection, pred: &TrajectoryCollection) -> Result<(Metric, f64)> {
    integration_loss_n(gt, pred, None)
}

/// Integration loss over the first interval.
///
/// # Errors
///
/// See [`integration_loss_n`].
pub fn integration_loss_1(gt: &TrajectoryCollection, pred: &TrajectoryCollection) -> Result<(Metric, f64)> {
    integration_loss_n(gt, pred, Some(1))
}

/// Integration loss over the first 5 intervals.
///
/// # Errors
///
/// See [`integration_loss_n`].
pub fn integration_loss_5(gt: &TrajectoryCollection, pred: &TrajectoryCollection) -> Result<(Metric, f64)> {
    integration_loss_n(gt, pred, Some(5))
}

/// Integration loss over the first 10 intervals.
///
/// # Errors
///
/// See [`integration_loss_n`].
pub fn integration_loss_10(gt: &TrajectoryCollection, pred: &TrajectoryCollection) -> Result<(Metric, f64)> {
    integration_loss_n(gt, pred, Some(10))
}

/// Full-horizon integration loss reported as `penalty_loss`.
///
/// # Errors
///
/// See [`integration_loss_n`].
pub fn penalty_loss(gt: &TrajectoryCollection, pred: &TrajectoryCollection) -> Result<(Metric, f64)> {
    let (_, value) = integration_loss_n(gt, pred, None)?;
    Ok((Metric::new(PENALTY_LOSS, true), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trajectory_total_alignment() {
        // weights pair with the later endpoint: 1*2² + 2*3²
        let sum = trajectory_total(&[0.0, 1.0, 3.0], &[100.0, 2.0, 3.0], None).unwrap();
        assert!((sum.total - 22.0).abs() < 1e-12);
        assert_eq!(sum.counted, 2);
        assert_eq!(sum.skipped, 0);
    }

    #[test]
    fn test_trajectory_total_horizon() {
        let first = trajectory_total(&[0.0, 1.0, 3.0], &[0.0, 2.0, 3.0], Some(1)).unwrap();
        assert!((first.total - 4.0).abs() < 1e-12);
        assert_eq!(first.counted, 1);

        let full = trajectory_total(&[0.0, 1.0, 3.0], &[0.0, 2.0, 3.0], Some(50)).unwrap();
        assert!((full.total - 22.0).abs() < 1e-12);
    }

    #[test]
    fn test_trajectory_total_skips_nan() {
        let sum = trajectory_total(&[0.0, 1.0, 3.0], &[0.0, f64::NAN, 3.0], None).unwrap();
        assert!((sum.total - 18.0).abs() < 1e-12);
        assert_eq!(sum.counted, 1);
        assert_eq!(sum.skipped, 1);
    }

    #[test]
    fn test_trajectory_total_short() {
        assert!(trajectory_total(&[0.0], &[1.0], None).is_none());
        assert!(trajectory_total(&[], &[], None).is_none());
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(integration_metric(None).name(), "integration_loss");
        assert_eq!(integration_metric(Some(5)).name(), "integration_loss_5");
        assert!(integration_metric(Some(5)).lower_better());
    }

    #[test]
    fn test_registry() {
        assert!(scoring_function("integration_loss_10").is_some());
        assert!(scoring_function("penalty_loss").is_some());
        assert!(scoring_function("accuracy").is_none());
    }
}
