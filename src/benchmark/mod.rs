//! Benchmark loading and scoring
//!
//! A [`Benchmark`] turns one source table into a Trajectory Collection per
//! declared cohort:
//!
//! ```text
//! RecordBatch ──> rows grouped by subject ──> per cohort: flagged rows
//!                                                  │ stable sort by time
//!                                                  v
//!                                       TrajectoryCollection[cohort]
//! ```
//!
//! Cohorts overlap freely; a subject with no flagged rows in a cohort is
//! simply absent from that cohort's collection.

mod scorer;

pub use scorer::{BenchmarkScorer, DEFAULT_TEST_GROUP};

use crate::config::BenchmarkConfiguration;
use crate::trajectory::{Trajectory, TrajectoryCollection};
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::compute::{self, CastOptions};
use arrow::error::ArrowError;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Trajectory Collections keyed by cohort name.
pub type GroupedTrajectories = BTreeMap<String, TrajectoryCollection>;

/// How rows are assigned to a cohort.
enum Membership {
    /// Rows whose boolean flag is true (null counts as false)
    Flag(BooleanArray),
    /// Every row
    All,
}

impl Membership {
    fn contains(&self, row: usize) -> bool {
        match self {
            Self::Flag(flags) => flags.is_valid(row) && flags.value(row),
            Self::All => true,
        }
    }
}

/// Columns of a table decoded per the benchmark schema.
struct DecodedTable {
    times: Vec<f64>,
    /// One vector per state column
    states: Vec<Vec<f64>>,
    /// Row indices per subject, in first-appearance order of the subject
    subjects: Vec<(String, Vec<usize>)>,
}

/// Generic benchmark loader driven by a [`BenchmarkConfiguration`].
#[derive(Debug, Clone)]
pub struct Benchmark {
    config: BenchmarkConfiguration,
}

impl Benchmark {
    /// Create a loader for `config`.
    #[must_use]
    pub const fn new(config: BenchmarkConfiguration) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &BenchmarkConfiguration {
        &self.config
    }

    /// Partition `table` into one Trajectory Collection per declared cohort.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` naming the column if a declared column is
    /// missing, a numeric column cannot be read as `Float64`, or a cohort
    /// column is not boolean.
    pub fn load_trajectories(&self, table: &RecordBatch) -> Result<GroupedTrajectories> {
        self.check_columns(table, self.config.declared_columns())?;
        let decoded = self.decode(table)?;

        let mut grouped = GroupedTrajectories::new();
        for group in &self.config.groups {
            let membership = Membership::Flag(boolean_column(table, group)?);
            grouped.insert(group.clone(), self.collect_group(&decoded, &membership));
        }
        Ok(grouped)
    }

    /// Load `table` as a single cohort named `group`.
    ///
    /// Prediction tables hold one cohort only. If `table` carries a boolean
    /// column named `group` it is honoured, otherwise every row belongs.
    ///
    /// # Errors
    ///
    /// Same column errors as [`load_trajectories`](Self::load_trajectories),
    /// ignoring the configured cohort list.
    pub fn load_single_group(&self, table: &RecordBatch, group: &str) -> Result<TrajectoryCollection> {
        self.check_columns(table, self.config.measurement_columns())?;
        let decoded = self.decode(table)?;

        let membership = if table.schema().index_of(group).is_ok() {
            Membership::Flag(boolean_column(table, group)?)
        } else {
            tracing::debug!(group, "no cohort column; treating every row as a member");
            Membership::All
        };
        Ok(self.collect_group(&decoded, &membership))
    }

    /// Inverse of loading for one cohort.
    ///
    /// Produces columns `[traj, time, states.., group]`, rows ordered by
    /// subject then time, with the cohort flag set on every row.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a trajectory's state width differs from
    /// the configured state list.
    pub fn store_trajectories(
        &self,
        trajectories: &TrajectoryCollection,
        group: &str,
    ) -> Result<RecordBatch> {
        let width = self.config.states.len();
        let mut ids = Vec::new();
        let mut times = Vec::new();
        let mut states: Vec<Vec<f64>> = vec![Vec::new(); width];

        for (subject, traj) in trajectories {
            if traj.state_dim() != width {
                return Err(Error::configuration(
                    "states",
                    format!(
                        "subject `{subject}` has {} state columns, configuration declares {width}",
                        traj.state_dim()
                    ),
                ));
            }
            for (t, row) in traj.times().iter().zip(traj.rows()) {
                ids.push(subject.clone());
                times.push(*t);
                for (column, value) in states.iter_mut().zip(row) {
                    column.push(*value);
                }
            }
        }

        let num_rows = times.len();
        let mut fields = vec![
            Field::new(&self.config.traj, DataType::Utf8, false),
            Field::new(&self.config.time, DataType::Float64, false),
        ];
        fields.extend(
            self.config
                .states
                .iter()
                .map(|s| Field::new(s, DataType::Float64, false)),
        );
        fields.push(Field::new(group, DataType::Boolean, false));

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(Float64Array::from(times)),
        ];
        columns.extend(
            states
                .into_iter()
                .map(|values| Arc::new(Float64Array::from(values)) as ArrayRef),
        );
        columns.push(Arc::new(BooleanArray::from(vec![true; num_rows])));

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }

    fn check_columns<'a>(
        &self,
        table: &RecordBatch,
        columns: impl Iterator<Item = (&'static str, &'a str)>,
    ) -> Result<()> {
        let schema = table.schema();
        for (role, column) in columns {
            if schema.index_of(column).is_err() {
                return Err(Error::configuration(
                    column,
                    format!(
                        "column declared in `{role}` of benchmark `{}` not found in table",
                        self.config.name
                    ),
                ));
            }
        }
        Ok(())
    }

    fn decode(&self, table: &RecordBatch) -> Result<DecodedTable> {
        let times = float_column(table, &self.config.time)?;
        let states = self
            .config
            .states
            .iter()
            .map(|s| float_column(table, s))
            .collect::<Result<Vec<_>>>()?;

        let ids = string_column(table, &self.config.traj)?;
        let mut order: Vec<String> = Vec::new();
        let mut rows: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        let mut skipped = 0usize;
        for (row, id) in ids.iter().enumerate() {
            let Some(id) = id else {
                skipped += 1;
                continue;
            };
            rows.entry(id)
                .or_insert_with(|| {
                    order.push(id.to_string());
                    Vec::new()
                })
                .push(row);
        }
        if skipped > 0 {
            tracing::warn!(
                column = %self.config.traj,
                skipped,
                "skipping rows with a null subject id"
            );
        }

        let subjects = order
            .into_iter()
            .map(|id| {
                let indices = rows.remove(id.as_str()).unwrap_or_default();
                (id, indices)
            })
            .collect();

        Ok(DecodedTable {
            times,
            states,
            subjects,
        })
    }

    fn collect_group(&self, decoded: &DecodedTable, membership: &Membership) -> TrajectoryCollection {
        let width = decoded.states.len();
        let mut collection = BTreeMap::new();

        for (subject, rows) in &decoded.subjects {
            let mut members: Vec<usize> = rows.iter().copied().filter(|&r| membership.contains(r)).collect();
            if members.is_empty() {
                continue;
            }
            // stable: ties keep table order
            members.sort_by(|&a, &b| decoded.times[a].total_cmp(&decoded.times[b]));

            let times = members.iter().map(|&r| decoded.times[r]).collect();
            let mut states = Vec::with_capacity(members.len() * width);
            for &r in &members {
                states.extend(decoded.states.iter().map(|column| column[r]));
            }
            collection.insert(
                subject.clone(),
                Trajectory::from_flat(times, states, self.config.states.clone()),
            );
        }

        tracing::debug!(
            benchmark = %self.config.name,
            subjects = collection.len(),
            "collected cohort"
        );
        TrajectoryCollection::new(collection)
    }
}

fn column<'a>(table: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    table
        .column_by_name(name)
        .ok_or_else(|| Error::configuration(name, "column not found in table"))
}

fn strict_cast(array: &ArrayRef, to: &DataType) -> std::result::Result<ArrayRef, ArrowError> {
    // unparseable values are errors, not silent nulls
    let options = CastOptions {
        safe: false,
        ..CastOptions::default()
    };
    compute::cast_with_options(array, to, &options)
}

fn float_column(table: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let cast = strict_cast(column(table, name)?, &DataType::Float64).map_err(|e| {
        Error::configuration(name, format!("cannot read column as Float64: {e}"))
    })?;
    let array = cast
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::configuration(name, "cast did not produce a Float64 column"))?;
    Ok(array.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Float ids holding only whole numbers are read as integers, so `1.0`
/// keys the same subject as `1`. Other float ids keep their printed form.
fn subject_key_column(array: &ArrayRef) -> std::result::Result<ArrayRef, ArrowError> {
    if !array.data_type().is_floating() {
        return Ok(Arc::clone(array));
    }
    let floats = compute::cast(array, &DataType::Float64)?;
    let whole = floats
        .as_any()
        .downcast_ref::<Float64Array>()
        .is_some_and(|values| {
            values
                .iter()
                .flatten()
                .all(|v| v.fract() == 0.0 && v.abs() < 9.0e15)
        });
    if whole {
        strict_cast(&floats, &DataType::Int64)
    } else {
        Ok(floats)
    }
}

fn string_column(table: &RecordBatch, name: &str) -> Result<StringArray> {
    let cast = subject_key_column(column(table, name)?)
        .and_then(|keys| strict_cast(&keys, &DataType::Utf8))
        .map_err(|e| Error::configuration(name, format!("cannot read column as subject ids: {e}")))?;
    cast.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| Error::configuration(name, "cast did not produce a Utf8 column"))
}

fn boolean_column(table: &RecordBatch, name: &str) -> Result<BooleanArray> {
    let array = column(table, name)?;
    array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .cloned()
        .ok_or_else(|| {
            Error::configuration(
                name,
                format!("cohort column must be Boolean, found {}", array.data_type()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use std::path::PathBuf;

    fn config(groups: &[&str]) -> BenchmarkConfiguration {
        BenchmarkConfiguration {
            name: "toy".to_string(),
            data_source: PathBuf::from("toy.parquet"),
            prediction_dir: PathBuf::from("predictions"),
            states: vec!["x".to_string()],
            groups: groups.iter().map(ToString::to_string).collect(),
            time: "t".to_string(),
            traj: "id".to_string(),
        }
    }

    fn table(ids: Vec<i64>, t: Vec<f64>, x: Vec<Option<f64>>, test: Vec<Option<bool>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("t", DataType::Float64, false),
            Field::new("x", DataType::Float64, true),
            Field::new("Test", DataType::Boolean, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(Float64Array::from(t)),
                Arc::new(Float64Array::from(x)),
                Arc::new(BooleanArray::from(test)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_integer_subject_ids_become_strings() {
        let batch = table(vec![7, 7], vec![1.0, 2.0], vec![Some(1.0), Some(2.0)], vec![Some(true), Some(true)]);
        let grouped = Benchmark::new(config(&["Test"])).load_trajectories(&batch).unwrap();
        assert!(grouped["Test"].contains("7"));
    }

    #[test]
    fn test_whole_float_subject_ids_key_as_integers() {
        let ids: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.0), None, Some(-12.0)]));
        let keys = subject_key_column(&ids).unwrap();
        assert_eq!(keys.data_type(), &DataType::Int64);

        let fractional: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.5]));
        let keys = subject_key_column(&fractional).unwrap();
        let keys = strict_cast(&keys, &DataType::Utf8).unwrap();
        let keys = keys.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(keys.value(0), "1.0");
        assert_eq!(keys.value(1), "2.5");
    }

    #[test]
    fn test_null_state_becomes_nan_and_null_flag_is_false() {
        let batch = table(
            vec![1, 1, 1],
            vec![1.0, 2.0, 3.0],
            vec![Some(1.0), None, Some(3.0)],
            vec![Some(true), Some(true), None],
        );
        let grouped = Benchmark::new(config(&["Test"])).load_trajectories(&batch).unwrap();
        let traj = grouped["Test"].get("1").unwrap();
        assert_eq!(traj.times(), &[1.0, 2.0]);
        assert!(traj.state(1)[0].is_nan());
    }

    #[test]
    fn test_non_boolean_group_column() {
        let batch = table(vec![1], vec![1.0], vec![Some(1.0)], vec![Some(true)]);
        let mut cfg = config(&["x"]);
        cfg.states = vec!["t".to_string()];
        match Benchmark::new(cfg).load_trajectories(&batch).unwrap_err() {
            Error::Configuration { field, reason } => {
                assert_eq!(field, "x");
                assert!(reason.contains("Boolean"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_group_without_flag_column() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("t", DataType::Float64, false),
            Field::new("x", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["a", "a", "b"])),
                Arc::new(Float64Array::from(vec![2.0, 1.0, 0.0])),
                Arc::new(Float64Array::from(vec![20.0, 10.0, 0.0])),
            ],
        )
        .unwrap();

        let collection = Benchmark::new(config(&["Train", "Test"]))
            .load_single_group(&batch, "Test")
            .unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get("a").unwrap().column(0), vec![10.0, 20.0]);
    }

    #[test]
    fn test_store_then_load_reproduces_collection() {
        let batch = table(
            vec![2, 1, 2, 1],
            vec![5.0, 3.0, 4.0, 1.0],
            vec![Some(50.0), Some(30.0), Some(40.0), Some(10.0)],
            vec![Some(true); 4],
        );
        let benchmark = Benchmark::new(config(&["Test"]));
        let grouped = benchmark.load_trajectories(&batch).unwrap();

        let stored = benchmark.store_trajectories(&grouped["Test"], "Test").unwrap();
        assert_eq!(stored.num_rows(), 4);
        assert_eq!(stored.schema().field(0).name(), "id");

        let reloaded = benchmark.load_trajectories(&stored).unwrap();
        assert_eq!(reloaded["Test"], grouped["Test"]);
    }

    #[test]
    fn test_store_rejects_wrong_state_width() {
        let traj = Trajectory::new(vec![0.0], vec![vec![1.0, 2.0]], vec!["a".into(), "b".into()]).unwrap();
        let collection: TrajectoryCollection = std::iter::once(("s".to_string(), traj)).collect();
        let err = Benchmark::new(config(&["Test"]))
            .store_trajectories(&collection, "Test")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { ref field, .. } if field == "states"));
    }
}
