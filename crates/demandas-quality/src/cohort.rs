//! Per-cohort resolution-time statistics (pass 1 of a batch).
//!
//! A cohort is one team over one date window. Its samples are the positive
//! resolution times of records whose effective status closes the demand.
//! Bounds are `[Q1 - k·IQR, Q3 + k·IQR]` with linearly interpolated
//! quartiles; small cohorts get no bounds at all.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use demandas_core::{AliasTable, DemandRecord, DetectorConfig, Team};

use crate::candidates::{effective_date, effective_status, effective_team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CohortKey {
    pub team: Team,
    /// Window index: days since the common era divided by the window width.
    pub window: i64,
}

impl CohortKey {
    pub fn new(team: Team, date: NaiveDate, window_days: u32) -> Self {
        let days = i64::from(date.num_days_from_ce());
        Self {
            team,
            window: days.div_euclid(i64::from(window_days.max(1))),
        }
    }
}

/// Outlier fences for one cohort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
    pub samples: usize,
}

impl Bounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// Distance past the nearest fence, or `None` when inside.
    pub fn excess(&self, value: f64) -> Option<f64> {
        if value < self.lower {
            Some(self.lower - value)
        } else if value > self.upper {
            Some(value - self.upper)
        } else {
            None
        }
    }
}

/// Read-only cohort bounds for a batch.
#[derive(Debug, Clone, Default)]
pub struct CohortStats {
    bounds: HashMap<CohortKey, Bounds>,
    window_days: u32,
}

impl CohortStats {
    /// Gather samples from every record and compute fences per cohort.
    pub fn build(records: &[DemandRecord], aliases: &AliasTable, config: &DetectorConfig) -> Self {
        let mut samples: HashMap<CohortKey, Vec<f64>> = HashMap::new();

        for record in records {
            let Some(minutes) = record.resolution_time_minutes.value() else {
                continue;
            };
            if minutes <= 0.0 {
                continue;
            }
            let Some(status) = effective_status(record, aliases, config) else {
                continue;
            };
            if !status.is_resolution() {
                continue;
            }
            let (Some(date), Some(team)) = (
                effective_date(record, config),
                effective_team(record, aliases, config),
            ) else {
                continue;
            };

            samples
                .entry(CohortKey::new(team, date, config.cohort_window_days))
                .or_default()
                .push(minutes);
        }

        let sampled = samples.len();
        let bounds: HashMap<CohortKey, Bounds> = samples
            .into_iter()
            .filter(|(_, values)| values.len() >= config.min_cohort_size)
            .map(|(key, mut values)| {
                values.sort_by(f64::total_cmp);
                (key, fences(&values, config.iqr_multiplier))
            })
            .collect();

        tracing::info!(
            cohorts = sampled,
            with_bounds = bounds.len(),
            "computed cohort statistics"
        );

        Self {
            bounds,
            window_days: config.cohort_window_days,
        }
    }

    pub fn bounds_for(&self, team: Team, date: NaiveDate) -> Option<&Bounds> {
        self.bounds
            .get(&CohortKey::new(team, date, self.window_days))
    }

    /// Number of cohorts large enough to carry bounds.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

/// Quantile of sorted data by linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(last);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

fn fences(sorted: &[f64], k: f64) -> Bounds {
    let q1 = quantile(sorted, 0.25).unwrap_or_default();
    let q3 = quantile(sorted, 0.75).unwrap_or_default();
    let iqr = q3 - q1;
    Bounds {
        q1,
        q3,
        lower: q1 - k * iqr,
        upper: q3 + k * iqr,
        samples: sorted.len(),
    }
}
