//! Trajectory Collection - one cohort of subject trajectories

use std::collections::BTreeMap;

use super::{Trajectory, NORM_STATE};
use crate::{Error, Result};

/// Relative tolerance when checking that two trajectories share time stamps.
const TIME_TOLERANCE: f64 = 1e-9;

/// Comparison operations over a grouping of trajectories.
///
/// The loss engine only relies on this contract, so alternative containers
/// can be scored as long as they implement it.
pub trait TrajectoryAlgebra: Sized {
    /// Element-wise `self - other`, per subject, per time step, per state.
    ///
    /// Iterates the subjects of `self`; every one of them must be present in
    /// `other` with the same time stamps and state width.
    ///
    /// # Errors
    ///
    /// Returns `Mismatch` naming the first subject that cannot be compared.
    fn difference(&self, other: &Self) -> Result<Self>;

    /// Reduce each state vector to its Euclidean norm.
    ///
    /// Every resulting trajectory has a single state column named `norm`.
    #[must_use]
    fn norm_reduce(&self) -> Self;

    /// Iterate `(subject id, trajectory)` pairs in a stable order.
    fn subjects(&self) -> Box<dyn Iterator<Item = (&str, &Trajectory)> + '_>;
}

/// Immutable mapping from subject id to [`Trajectory`].
///
/// Iteration order is the lexicographic order of subject ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectoryCollection {
    trajectories: BTreeMap<String, Trajectory>,
}

impl TrajectoryCollection {
    /// Create a collection from `(subject id, trajectory)` pairs.
    #[must_use]
    pub fn new(trajectories: BTreeMap<String, Trajectory>) -> Self {
        Self { trajectories }
    }

    /// Number of subjects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    /// True if no subject is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Get a subject's trajectory.
    #[must_use]
    pub fn get(&self, subject: &str) -> Option<&Trajectory> {
        self.trajectories.get(subject)
    }

    /// Check whether a subject is present.
    #[must_use]
    pub fn contains(&self, subject: &str) -> bool {
        self.trajectories.contains_key(subject)
    }

    /// Subject ids in iteration order.
    pub fn subject_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.trajectories.keys().map(String::as_str)
    }

    /// Iterate over trajectories in subject order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Trajectory)> + '_ {
        self.trajectories.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Trajectory)> for TrajectoryCollection {
    fn from_iter<I: IntoIterator<Item = (String, Trajectory)>>(iter: I) -> Self {
        Self {
            trajectories: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TrajectoryCollection {
    type Item = (&'a String, &'a Trajectory);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Trajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.trajectories.iter()
    }
}

fn times_match(a: f64, b: f64) -> bool {
    // NaN stamps on both sides are the same missing value
    (a.is_nan() && b.is_nan()) || (a - b).abs() <= TIME_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

fn subtract(subject: &str, lhs: &Trajectory, rhs: &Trajectory) -> Result<Trajectory> {
    if lhs.len() != rhs.len() {
        return Err(Error::mismatch(
            subject,
            format!("{} samples vs {} samples", lhs.len(), rhs.len()),
        ));
    }
    if lhs.state_dim() != rhs.state_dim() {
        return Err(Error::mismatch(
            subject,
            format!(
                "{} state columns vs {} state columns",
                lhs.state_dim(),
                rhs.state_dim()
            ),
        ));
    }
    if let Some(idx) = lhs
        .times()
        .iter()
        .zip(rhs.times())
        .position(|(&a, &b)| !times_match(a, b))
    {
        return Err(Error::mismatch(
            subject,
            format!(
                "time stamp {idx} differs ({} vs {})",
                lhs.times()[idx],
                rhs.times()[idx]
            ),
        ));
    }

    let states = lhs
        .states
        .iter()
        .zip(&rhs.states)
        .map(|(a, b)| a - b)
        .collect();

    Ok(Trajectory::from_flat(
        lhs.times.clone(),
        states,
        lhs.state_names.clone(),
    ))
}

impl TrajectoryAlgebra for TrajectoryCollection {
    fn difference(&self, other: &Self) -> Result<Self> {
        let mut out = BTreeMap::new();
        for (subject, lhs) in &self.trajectories {
            let rhs = other
                .get(subject)
                .ok_or_else(|| Error::mismatch(subject, "missing from the right-hand collection"))?;
            out.insert(subject.clone(), subtract(subject, lhs, rhs)?);
        }

        let extra = other.subject_ids().filter(|s| !self.contains(s)).count();
        if extra > 0 {
            tracing::debug!(extra, "ignoring subjects present only on the right-hand side");
        }

        Ok(Self::new(out))
    }

    fn norm_reduce(&self) -> Self {
        self.trajectories
            .iter()
            .map(|(subject, traj)| {
                let norms = traj
                    .rows()
                    .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
                    .collect();
                (
                    subject.clone(),
                    Trajectory::from_flat(traj.times.clone(), norms, vec![NORM_STATE.to_string()]),
                )
            })
            .collect()
    }

    fn subjects(&self) -> Box<dyn Iterator<Item = (&str, &Trajectory)> + '_> {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traj(times: &[f64], states: &[&[f64]]) -> Trajectory {
        let width = states.first().map_or(0, |r| r.len());
        Trajectory::new(
            times.to_vec(),
            states.iter().map(|r| r.to_vec()).collect(),
            (0..width).map(|i| format!("s{i}")).collect(),
        )
        .unwrap()
    }

    fn collection(items: Vec<(&str, Trajectory)>) -> TrajectoryCollection {
        items.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_difference_elementwise() {
        let a = collection(vec![("A", traj(&[0.0, 1.0], &[&[3.0, 4.0], &[1.0, 1.0]]))]);
        let b = collection(vec![("A", traj(&[0.0, 1.0], &[&[0.0, 0.0], &[1.0, 2.0]]))]);

        let diff = a.difference(&b).unwrap();
        let d = diff.get("A").unwrap();
        assert_eq!(d.state(0), &[3.0, 4.0]);
        assert_eq!(d.state(1), &[0.0, -1.0]);
    }

    #[test]
    fn test_norm_reduce() {
        let a = collection(vec![("A", traj(&[0.0, 1.0], &[&[3.0, 4.0], &[0.0, 0.0]]))]);
        let norm = a.norm_reduce();
        let n = norm.get("A").unwrap();
        assert_eq!(n.state_names(), &[NORM_STATE.to_string()]);
        assert!((n.state(0)[0] - 5.0).abs() < f64::EPSILON);
        assert!(n.state(1)[0].abs() < f64::EPSILON);
    }

    #[test]
    fn test_norm_reduce_propagates_nan() {
        let a = collection(vec![("A", traj(&[0.0], &[&[f64::NAN, 1.0]]))]);
        assert!(a.norm_reduce().get("A").unwrap().state(0)[0].is_nan());
    }

    #[test]
    fn test_difference_missing_subject() {
        let a = collection(vec![("A", traj(&[0.0], &[&[1.0]])), ("B", traj(&[0.0], &[&[1.0]]))]);
        let b = collection(vec![("A", traj(&[0.0], &[&[1.0]]))]);

        match a.difference(&b).unwrap_err() {
            Error::Mismatch { subject, .. } => assert_eq!(subject, "B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_difference_ignores_extra_right_subjects() {
        let a = collection(vec![("A", traj(&[0.0], &[&[1.0]]))]);
        let b = collection(vec![("A", traj(&[0.0], &[&[1.0]])), ("Z", traj(&[0.0], &[&[1.0]]))]);
        let diff = a.difference(&b).unwrap();
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn test_difference_length_mismatch() {
        let a = collection(vec![("A", traj(&[0.0, 1.0], &[&[1.0], &[2.0]]))]);
        let b = collection(vec![("A", traj(&[0.0], &[&[1.0]]))]);
        let err = a.difference(&b).unwrap_err();
        assert!(err.to_string().contains("2 samples vs 1 samples"));
    }

    #[test]
    fn test_difference_time_mismatch() {
        let a = collection(vec![("A", traj(&[0.0, 1.0], &[&[1.0], &[2.0]]))]);
        let b = collection(vec![("A", traj(&[0.0, 1.5], &[&[1.0], &[2.0]]))]);
        let err = a.difference(&b).unwrap_err();
        assert!(err.to_string().contains("time stamp 1"));
    }

    #[test]
    fn test_iteration_order_is_stable() {
        let a = collection(vec![
            ("b", traj(&[0.0], &[&[1.0]])),
            ("a", traj(&[0.0], &[&[1.0]])),
        ]);
        let ids: Vec<&str> = a.subjects().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
