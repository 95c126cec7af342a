//! Benchmark and prediction configuration
//!
//! Configuration is plain data, deserialized from JSON and passed by
//! reference into the loader and scorer. Nothing here is process-global.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema mapping for one benchmark dataset.
///
/// Names which columns of the source table hold the time, the state
/// variables, the subject id and the cohort membership flags. Cohorts may
/// overlap: a row can be flagged in several groups at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfiguration {
    /// Benchmark name (e.g. "plasma")
    pub name: String,
    /// Location of the ground-truth table
    #[serde(alias = "data_csv")]
    pub data_source: PathBuf,
    /// Directory holding model prediction tables
    pub prediction_dir: PathBuf,
    /// State column names, in order
    pub states: Vec<String>,
    /// Boolean cohort column names
    pub groups: Vec<String>,
    /// Time column name
    pub time: String,
    /// Subject id column name
    pub traj: String,
}

impl BenchmarkConfiguration {
    /// Time, subject id and state columns, labelled by role.
    pub(crate) fn measurement_columns(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        std::iter::once(("time", self.time.as_str()))
            .chain(std::iter::once(("traj", self.traj.as_str())))
            .chain(self.states.iter().map(|s| ("states", s.as_str())))
    }

    /// Every column name the configuration declares, labelled by role.
    pub(crate) fn declared_columns(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.measurement_columns()
            .chain(self.groups.iter().map(|g| ("groups", g.as_str())))
    }
}

/// List of benchmarks, as stored in a benchmark schema file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkSchema {
    /// Declared benchmarks
    pub benchmarks: Vec<BenchmarkConfiguration>,
}

impl BenchmarkSchema {
    /// Look up a benchmark by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BenchmarkConfiguration> {
        self.benchmarks.iter().find(|b| b.name == name)
    }
}

/// Load a [`BenchmarkSchema`] from a JSON file.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, `Json` if it does not match
/// the schema.
pub fn load_benchmark_configs<P: AsRef<Path>>(schema_path: P) -> Result<BenchmarkSchema> {
    let raw = std::fs::read_to_string(schema_path.as_ref())?;
    let schema: BenchmarkSchema = serde_json::from_str(&raw)?;
    tracing::debug!(
        path = %schema_path.as_ref().display(),
        benchmarks = schema.benchmarks.len(),
        "loaded benchmark schema"
    );
    Ok(schema)
}

/// Pairs a model's prediction table with the benchmark it predicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionConfiguration {
    /// Model name
    pub model_name: String,
    /// Benchmark the predictions are compared against
    pub benchmark: BenchmarkConfiguration,
    /// Location of the prediction table
    #[serde(alias = "pred_csv")]
    pub pred_source: PathBuf,
}

impl PredictionConfiguration {
    /// Create a prediction configuration.
    #[must_use]
    pub fn new(
        model_name: impl Into<String>,
        benchmark: BenchmarkConfiguration,
        pred_source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            benchmark,
            pred_source: pred_source.into(),
        }
    }
}

/// Base directories for data, predictions and score outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the benchmark data tables
    pub data_base_path: PathBuf,
    /// Root of the model prediction tables
    pub predictions_base_path: PathBuf,
    /// Directory where score results are written
    pub scores_base_path: PathBuf,
}

impl PathsConfig {
    /// Check that every configured path is an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` naming the first field that is not a directory.
    pub fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("data_base_path", &self.data_base_path),
            ("predictions_base_path", &self.predictions_base_path),
            ("scores_base_path", &self.scores_base_path),
        ] {
            if !path.is_dir() {
                return Err(Error::configuration(
                    field,
                    format!("path {} is not a directory", path.display()),
                ));
            }
        }
        Ok(())
    }

    /// Load from a JSON file and validate.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Json` on read or parse failure and `Configuration` if
    /// a path is not a directory.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plasma() -> BenchmarkConfiguration {
        BenchmarkConfiguration {
            name: "plasma".to_string(),
            data_source: PathBuf::from("plasma.parquet"),
            prediction_dir: PathBuf::from("predictions"),
            states: vec!["ABeta_1_40".to_string(), "NFL".to_string()],
            groups: vec!["Train".to_string(), "Test".to_string()],
            time: "AgeAtVisit".to_string(),
            traj: "WRAPNo".to_string(),
        }
    }

    #[test]
    fn test_declared_columns() {
        let cfg = plasma();
        let cols: Vec<_> = cfg.declared_columns().collect();
        assert_eq!(cols[0], ("time", "AgeAtVisit"));
        assert_eq!(cols[1], ("traj", "WRAPNo"));
        assert_eq!(cols.len(), 6);
        assert_eq!(plasma().measurement_columns().count(), 4);
    }

    #[test]
    fn test_schema_accepts_csv_aliases() {
        let json = serde_json::json!({
            "benchmarks": [{
                "name": "plasma",
                "data_csv": "plasma.csv",
                "prediction_dir": "predictions",
                "states": ["NFL"],
                "groups": ["Test"],
                "time": "AgeAtVisit",
                "traj": "WRAPNo"
            }]
        });
        let schema: BenchmarkSchema = serde_json::from_value(json).unwrap();
        assert_eq!(schema.get("plasma").unwrap().data_source, PathBuf::from("plasma.csv"));
        assert!(schema.get("imaging").is_none());
    }

    #[test]
    fn test_paths_validate_names_field() {
        let dir = tempfile::tempdir().unwrap();
        let config = PathsConfig {
            data_base_path: dir.path().to_path_buf(),
            predictions_base_path: dir.path().join("missing"),
            scores_base_path: dir.path().to_path_buf(),
        };
        match config.validate().unwrap_err() {
            Error::Configuration { field, .. } => assert_eq!(field, "predictions_base_path"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
