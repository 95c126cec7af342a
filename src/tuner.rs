//! Hyperparameter selection over scored experiment runs
//!
//! The tuner is accumulate-then-select: every candidate is run through an
//! [`ExperimentRunner`], all trials are recorded, then the best score under
//! the first trial's metric direction is chosen. Exact ties go to the
//! earliest candidate. A runner failure aborts the whole tuning run.
//!
//! ```rust
//! use sysidexpr::experiment::Metric;
//! use sysidexpr::tuner::Tuner;
//!
//! let runner = |rank: usize| Ok((Metric::new("integration_loss", true), (rank as f64 - 3.0).abs(), rank));
//! let report = Tuner::new(runner).tune(1..=6)?;
//! let (_, score, rank) = report.best();
//! assert_eq!(rank, 3);
//! assert_eq!(score, 0.0);
//! # Ok::<(), sysidexpr::Error>(())
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::experiment::Metric;
use crate::{Error, Result};

/// Runs one experiment for a hyperparameter candidate.
///
/// Returns the metric, the score, and the hyperparameter as the runner
/// wants it recorded (which may be a normalized form of the input).
pub trait ExperimentRunner<H> {
    /// Run the experiment for `hyperparameter`.
    ///
    /// # Errors
    ///
    /// Any error aborts the tuning run and is returned unchanged.
    fn run(&self, hyperparameter: H) -> Result<(Metric, f64, H)>;
}

impl<H, F> ExperimentRunner<H> for F
where
    F: Fn(H) -> Result<(Metric, f64, H)>,
{
    fn run(&self, hyperparameter: H) -> Result<(Metric, f64, H)> {
        self(hyperparameter)
    }
}

/// One evaluated candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trial<H> {
    /// Position of the candidate in the input sequence
    pub index: usize,
    /// Metric reported by the runner
    pub metric: Metric,
    /// Score reported by the runner
    pub score: f64,
    /// Hyperparameter as echoed by the runner
    pub hyperparameter: H,
    /// When the runner returned
    pub evaluated_at: DateTime<Utc>,
}

/// Every trial of a tuning run plus the selected one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TuningReport<H> {
    trials: Vec<Trial<H>>,
    best_index: usize,
}

impl<H: Clone> TuningReport<H> {
    /// Select the best trial.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCandidates` if `trials` is empty, `InconsistentMetric`
    /// if a trial's direction differs from the first trial's, and `AllNaN`
    /// if no score is a number.
    fn select(trials: Vec<Trial<H>>) -> Result<Self> {
        let first = trials.first().ok_or(Error::EmptyCandidates)?;
        let direction = first.metric.clone();

        for trial in &trials[1..] {
            if trial.metric.lower_better() != direction.lower_better() {
                return Err(Error::InconsistentMetric {
                    index: trial.index,
                    expected: direction.to_string(),
                    found: trial.metric.to_string(),
                });
            }
            if trial.metric.name() != direction.name() {
                tracing::warn!(
                    index = trial.index,
                    expected = direction.name(),
                    found = trial.metric.name(),
                    "candidates report different metric names"
                );
            }
        }

        let mut best: Option<usize> = None;
        for (pos, trial) in trials.iter().enumerate() {
            if trial.score.is_nan() {
                tracing::warn!(index = trial.index, "NaN score is never selected");
                continue;
            }
            match best {
                Some(b) if !direction.is_better(trial.score, trials[b].score) => {}
                _ => best = Some(pos),
            }
        }

        let best_index = best.ok_or_else(|| Error::AllNaN {
            metric: direction.name().to_string(),
        })?;
        Ok(Self { trials, best_index })
    }

    /// All trials in candidate order.
    #[must_use]
    pub fn trials(&self) -> &[Trial<H>] {
        &self.trials
    }

    /// The selected trial.
    #[must_use]
    pub fn best_trial(&self) -> &Trial<H> {
        &self.trials[self.best_index]
    }

    /// `(best metric, best score, best hyperparameter)`.
    #[must_use]
    pub fn best(&self) -> (Metric, f64, H) {
        let trial = self.best_trial();
        (trial.metric.clone(), trial.score, trial.hyperparameter.clone())
    }
}

/// Drives hyperparameter candidates through an [`ExperimentRunner`].
#[derive(Debug, Clone)]
pub struct Tuner<R> {
    runner: R,
}

impl<R> Tuner<R> {
    /// Create a tuner around `runner`.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Evaluate every candidate in order and select the best.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCandidates` for an empty sequence, the first runner
    /// error unchanged, or a selection error (see [`TuningReport`]).
    pub fn tune<H, I>(&self, candidates: I) -> Result<TuningReport<H>>
    where
        H: Clone,
        I: IntoIterator<Item = H>,
        R: ExperimentRunner<H>,
    {
        let mut trials = Vec::new();
        for (index, candidate) in candidates.into_iter().enumerate() {
            let (metric, score, hyperparameter) = self.runner.run(candidate).map_err(|e| {
                tracing::warn!(index, error = %e, "candidate failed; aborting tuning");
                e
            })?;
            tracing::info!(index, metric = %metric, score, "evaluated candidate");
            trials.push(Trial {
                index,
                metric,
                score,
                hyperparameter,
                evaluated_at: Utc::now(),
            });
        }

        let report = TuningReport::select(trials)?;
        let best = report.best_trial();
        tracing::info!(index = best.index, score = best.score, "selected best candidate");
        Ok(report)
    }

    /// Like [`tune`](Self::tune), evaluating candidates on the rayon pool.
    ///
    /// Trials are collected in candidate order, so selection and tie-break
    /// match the sequential form. After a failure no further candidates are
    /// started; the failure with the lowest candidate index is returned.
    ///
    /// # Errors
    ///
    /// Same as [`tune`](Self::tune).
    #[cfg(feature = "rayon")]
    pub fn tune_parallel<H>(&self, candidates: Vec<H>) -> Result<TuningReport<H>>
    where
        H: Clone + Send,
        R: ExperimentRunner<H> + Sync,
    {
        use rayon::prelude::*;
        use std::sync::atomic::{AtomicBool, Ordering};

        enum Slot<H> {
            Done(Trial<H>),
            Failed(Error),
            Skipped,
        }

        let cancelled = AtomicBool::new(false);
        let slots: Vec<Slot<H>> = candidates
            .into_par_iter()
            .enumerate()
            .map(|(index, candidate)| {
                if cancelled.load(Ordering::Relaxed) {
                    return Slot::Skipped;
                }
                match self.runner.run(candidate) {
                    Ok((metric, score, hyperparameter)) => {
                        tracing::info!(index, metric = %metric, score, "evaluated candidate");
                        Slot::Done(Trial {
                            index,
                            metric,
                            score,
                            hyperparameter,
                            evaluated_at: Utc::now(),
                        })
                    }
                    Err(e) => {
                        cancelled.store(true, Ordering::Relaxed);
                        tracing::warn!(index, error = %e, "candidate failed; cancelling remaining work");
                        Slot::Failed(e)
                    }
                }
            })
            .collect();

        let mut trials = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Done(trial) => trials.push(trial),
                Slot::Failed(e) => return Err(e),
                Slot::Skipped => {}
            }
        }

        let report = TuningReport::select(trials)?;
        let best = report.best_trial();
        tracing::info!(index = best.index, score = best.score, "selected best candidate");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loss() -> Metric {
        Metric::new("integration_loss", true)
    }

    #[test]
    fn test_tune_empty() {
        let tuner = Tuner::new(|h: f64| Ok((loss(), h, h)));
        let err = tuner.tune(Vec::<f64>::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyCandidates));
    }

    #[test]
    fn test_tune_minimizes() {
        let tuner = Tuner::new(|h: f64| Ok((loss(), (h - 0.3).abs(), h)));
        let (metric, score, best) = tuner.tune(vec![0.1, 0.3, 0.5]).unwrap().best();
        assert_eq!(metric, loss());
        assert!(score.abs() < 1e-12);
        assert!((best - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_tune_maximizes() {
        let tuner = Tuner::new(|h: i32| Ok((Metric::new("accuracy", false), f64::from(h), h)));
        let (_, _, best) = tuner.tune(vec![1, 9, 4]).unwrap().best();
        assert_eq!(best, 9);
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let tuner = Tuner::new(|h: &'static str| Ok((loss(), 1.0, h)));
        let (_, _, best) = tuner.tune(vec!["first", "second"]).unwrap().best();
        assert_eq!(best, "first");
    }

    #[test]
    fn test_records_echoed_hyperparameter() {
        let tuner = Tuner::new(|h: i32| Ok((loss(), f64::from(h), h * 10)));
        let report = tuner.tune(vec![2, 1]).unwrap();
        assert_eq!(report.best().2, 10);
        assert_eq!(report.trials().len(), 2);
        assert_eq!(report.trials()[0].hyperparameter, 20);
    }

    #[test]
    fn test_runner_error_aborts() {
        let tuner = Tuner::new(|h: i32| {
            if h == 2 {
                Err(Error::Other(format!("candidate {h} diverged")))
            } else {
                Ok((loss(), 1.0, h))
            }
        });
        let err = tuner.tune(vec![1, 2, 3]).unwrap_err();
        assert_eq!(err.to_string(), "candidate 2 diverged");
    }

    #[test]
    fn test_inconsistent_direction() {
        let tuner = Tuner::new(|h: i32| Ok((Metric::new("m", h == 0), 1.0, h)));
        match tuner.tune(vec![0, 1]).unwrap_err() {
            Error::InconsistentMetric { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nan_scores_not_selected() {
        let tuner = Tuner::new(|h: f64| Ok((loss(), h, h)));
        let (_, score, _) = tuner.tune(vec![f64::NAN, 2.0, 3.0]).unwrap().best();
        assert!((score - 2.0).abs() < 1e-12);

        let err = tuner.tune(vec![f64::NAN]).unwrap_err();
        assert!(matches!(err, Error::AllNaN { ref metric } if metric == "integration_loss"));
        assert!(err.to_string().contains("candidate score is NaN"));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_matches_sequential() {
        let tuner = Tuner::new(|h: u32| Ok((loss(), f64::from(h % 7), h)));
        let candidates: Vec<u32> = (0..64).rev().collect();

        let sequential = tuner.tune(candidates.clone()).unwrap();
        let parallel = tuner.tune_parallel(candidates).unwrap();
        assert_eq!(sequential.best().2, parallel.best().2);
        assert_eq!(parallel.trials().len(), 64);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_empty_and_failure() {
        let tuner = Tuner::new(|h: u32| {
            if h == 5 {
                Err(Error::Other("boom".to_string()))
            } else {
                Ok((loss(), 0.0, h))
            }
        });
        assert!(matches!(
            tuner.tune_parallel(Vec::new()).unwrap_err(),
            Error::EmptyCandidates
        ));
        assert_eq!(tuner.tune_parallel((0..32).collect()).unwrap_err().to_string(), "boom");
    }
}
