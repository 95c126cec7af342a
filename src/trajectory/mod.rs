//! Per-subject time series and their grouping into collections
//!
//! ## Layout
//!
//! ```text
//! TrajectoryCollection (1) ──< Trajectory (N)   keyed by subject id
//!                                   │
//!                                   ├── times   [L]
//!                                   └── states  [L x S]  row-major
//! ```
//!
//! Collections are rebuilt on every load and never mutated afterwards.
//! Comparison goes through [`TrajectoryAlgebra`]: `difference` then
//! `norm_reduce` gives one error magnitude per subject and time step.

mod collection;

pub use collection::{TrajectoryAlgebra, TrajectoryCollection};

use crate::{Error, Result};

/// State column name produced by [`TrajectoryAlgebra::norm_reduce`].
pub const NORM_STATE: &str = "norm";

/// One subject's time series.
///
/// Invariant: `times.len()` rows of `state_names.len()` values each.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<f64>,
    state_names: Vec<String>,
}

impl Trajectory {
    /// Create a trajectory from parallel times and state rows.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the row count differs from the number of
    /// time points, or a row's width differs from `state_names.len()`.
    pub fn new(times: Vec<f64>, states: Vec<Vec<f64>>, state_names: Vec<String>) -> Result<Self> {
        if times.len() != states.len() {
            return Err(Error::InvalidInput(format!(
                "{} time points but {} state rows",
                times.len(),
                states.len()
            )));
        }

        let width = state_names.len();
        let mut flat = Vec::with_capacity(times.len() * width);
        for (row_idx, row) in states.into_iter().enumerate() {
            if row.len() != width {
                return Err(Error::InvalidInput(format!(
                    "state row {row_idx} has {} values, expected {width}",
                    row.len()
                )));
            }
            flat.extend(row);
        }

        Ok(Self {
            times,
            states: flat,
            state_names,
        })
    }

    /// Build from an already flattened row-major state buffer.
    pub(crate) fn from_flat(times: Vec<f64>, states: Vec<f64>, state_names: Vec<String>) -> Self {
        debug_assert_eq!(times.len() * state_names.len(), states.len());
        Self {
            times,
            states,
            state_names,
        }
    }

    /// Time stamps, ascending when produced by the loader.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Names of the state columns.
    #[must_use]
    pub fn state_names(&self) -> &[String] {
        &self.state_names
    }

    /// Number of time points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True if the trajectory has no time points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Number of state variables per time point.
    #[must_use]
    pub fn state_dim(&self) -> usize {
        self.state_names.len()
    }

    /// State vector at time index `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub fn state(&self, i: usize) -> &[f64] {
        let width = self.state_dim();
        &self.states[i * width..(i + 1) * width]
    }

    /// Iterate over state rows in time order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        // chunks_exact(0) panics; zero-width trajectories yield empty rows
        let width = self.state_dim().max(1);
        let empty: &[f64] = &[];
        let zero_width = self.state_dim() == 0;
        let n = self.len();
        self.states
            .chunks_exact(width)
            .chain(std::iter::repeat(empty).take(if zero_width { n } else { 0 }))
    }

    /// Values of one state column, in time order.
    #[must_use]
    pub fn column(&self, state_idx: usize) -> Vec<f64> {
        self.rows().map(|row| row[state_idx]).collect()
    }
}
