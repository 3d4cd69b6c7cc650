//! Pipeline configuration.
//!
//! Every threshold the detector and corrector use is tunable here. Defaults
//! reproduce the documented behaviour: 3× IQR outlier fences, edit distance 1
//! fuzzy matching at confidence 0.8, outlier confidence capped at 0.6.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::aliases::AliasTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Fence multiple `k` in `[Q1 - k·IQR, Q3 + k·IQR]`.
    pub iqr_multiplier: f64,
    /// Cohorts with fewer samples get no bounds.
    pub min_cohort_size: usize,
    /// Width of the date window grouping a cohort, in days.
    pub cohort_window_days: u32,
    pub fuzzy_max_distance: usize,
    /// Confidence attached to a unique fuzzy enum candidate.
    pub fuzzy_confidence: f64,
    /// Confidence attached to a leniently re-parsed date.
    pub date_repair_confidence: f64,
    pub outlier_confidence_cap: f64,
    /// Plausible year window for parsed dates (inclusive).
    pub min_year: i32,
    pub max_year: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 3.0,
            min_cohort_size: 4,
            cohort_window_days: 7,
            fuzzy_max_distance: 1,
            fuzzy_confidence: 0.8,
            date_repair_confidence: 0.9,
            outlier_confidence_cap: 0.6,
            min_year: 2000,
            max_year: 2100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectorConfig {
    /// Candidates below this confidence are rejected instead of applied.
    pub min_auto_correct_confidence: f64,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            min_auto_correct_confidence: 0.8,
        }
    }
}

/// Extra spellings mapped to canonical values: `{"JULINHO": "JULIO"}`.
///
/// `roster` maps responsible people to their team (`{"Ana Lídia": "JULIO"}`)
/// and fills the team of records that have none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub team: BTreeMap<String, String>,
    pub status: BTreeMap<String, String>,
    pub roster: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub corrector: CorrectorConfig,
    pub aliases: AliasConfig,
    /// Worker threads for the detect/correct stage. `None` uses all cores.
    pub workers: Option<usize>,
}

impl PipelineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detector;

        if !(d.iqr_multiplier.is_finite() && d.iqr_multiplier > 0.0) {
            return Err(invalid(format!(
                "detector.iqr_multiplier must be positive, got {}",
                d.iqr_multiplier
            )));
        }
        if d.min_cohort_size < 2 {
            return Err(invalid(format!(
                "detector.min_cohort_size must be at least 2, got {}",
                d.min_cohort_size
            )));
        }
        if d.cohort_window_days == 0 {
            return Err(invalid("detector.cohort_window_days must be at least 1"));
        }
        if d.min_year > d.max_year {
            return Err(invalid(format!(
                "detector.min_year {} is after max_year {}",
                d.min_year, d.max_year
            )));
        }

        for (name, value) in [
            ("detector.fuzzy_confidence", d.fuzzy_confidence),
            ("detector.date_repair_confidence", d.date_repair_confidence),
            ("detector.outlier_confidence_cap", d.outlier_confidence_cap),
            (
                "corrector.min_auto_correct_confidence",
                self.corrector.min_auto_correct_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }

        if self.workers == Some(0) {
            return Err(invalid("workers must be at least 1"));
        }

        // Alias targets must name canonical values.
        AliasTable::from_config(&self.aliases)?;

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
