//! Anomaly Detector: rule and statistics based checks per record field.
//!
//! Fields are checked independently; within a field the first matching rule
//! wins, in this order:
//!
//! 1. Structural: required field absent
//! 2. Enumeration / parse: team or status outside the closed set, unparseable
//!    date or resolution time, date outside the plausible year window
//! 3. Consistency: resolution time against the record's status
//! 4. Statistical: resolution time outside its cohort fences
//!
//! Detection never changes the record.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use demandas_core::{
    AliasTable, DemandRecord, DetectorConfig, Field, FieldValue, FuzzyMatch, Status, Team,
};

use crate::candidates::{
    effective_date, effective_status, effective_team, in_year_window, repair_date, roster_team,
    status_candidate, team_candidate,
};
use crate::cohort::CohortStats;

/// Confidence for a resolution time that contradicts its status.
pub const INCONSISTENT_CONFIDENCE: f64 = 0.9;
/// Confidence for hard structural and parse failures.
pub const CERTAIN: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Missing,
    OutOfRange,
    UnknownEnumValue,
    StatisticalOutlier,
    InconsistentWithStatus,
}

impl FlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::OutOfRange => "out_of_range",
            Self::UnknownEnumValue => "unknown_enum_value",
            Self::StatisticalOutlier => "statistical_outlier",
            Self::InconsistentWithStatus => "inconsistent_with_status",
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proposed replacement value attached to a flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Candidate {
    Date(NaiveDate),
    Team(Team),
    Status(Status),
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{d}"),
            Self::Team(t) => write!(f, "{t}"),
            Self::Status(s) => write!(f, "{s}"),
        }
    }
}

/// One suspected defect. Transient: consumed by the corrector.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyFlag {
    pub record_id: String,
    pub field: Field,
    pub kind: FlagKind,
    pub confidence: f64,
    pub candidate: Option<Candidate>,
}

/// Stateless checker over a shared alias table, config, and cohort bounds.
#[derive(Debug, Clone, Copy)]
pub struct Detector<'a> {
    aliases: &'a AliasTable,
    config: &'a DetectorConfig,
    cohorts: &'a CohortStats,
}

impl<'a> Detector<'a> {
    pub fn new(aliases: &'a AliasTable, config: &'a DetectorConfig, cohorts: &'a CohortStats) -> Self {
        Self {
            aliases,
            config,
            cohorts,
        }
    }

    /// Flags for `record`, at most one per field, in field order.
    pub fn detect(&self, record: &DemandRecord) -> Vec<AnomalyFlag> {
        let flag = |field, kind, confidence, candidate| AnomalyFlag {
            record_id: record.id.clone(),
            field,
            kind,
            confidence,
            candidate,
        };

        let mut flags = Vec::new();
        for field in Field::ALL {
            let found = match field {
                Field::Date => self.check_date(record),
                Field::Team => self.check_team(record),
                Field::Status => self.check_status(record),
                Field::ResolutionTimeMinutes => self.check_resolution_time(record),
            };
            if let Some((kind, confidence, candidate)) = found {
                flags.push(flag(field, kind, confidence, candidate));
            }
        }

        if !flags.is_empty() {
            tracing::debug!(id = %record.id, flags = flags.len(), "record flagged");
        }
        flags
    }

    fn check_date(&self, record: &DemandRecord) -> Option<Finding> {
        match &record.date {
            FieldValue::Absent => Some((FlagKind::Missing, CERTAIN, None)),
            FieldValue::Malformed(raw) => Some(match repair_date(raw, self.config) {
                Some(d) => (
                    FlagKind::OutOfRange,
                    self.config.date_repair_confidence,
                    Some(Candidate::Date(d)),
                ),
                None => (FlagKind::OutOfRange, CERTAIN, None),
            }),
            FieldValue::Parsed(d) if !in_year_window(*d, self.config) => {
                Some((FlagKind::OutOfRange, CERTAIN, None))
            }
            FieldValue::Parsed(_) => None,
        }
    }

    fn check_team(&self, record: &DemandRecord) -> Option<Finding> {
        match &record.team {
            FieldValue::Absent => Some((
                FlagKind::Missing,
                CERTAIN,
                roster_team(record, self.aliases).map(Candidate::Team),
            )),
            FieldValue::Malformed(raw) => Some(self.enum_finding(
                team_candidate(raw, self.aliases, self.config),
                Candidate::Team,
            )),
            FieldValue::Parsed(_) => None,
        }
    }

    fn check_status(&self, record: &DemandRecord) -> Option<Finding> {
        match &record.status {
            FieldValue::Absent => Some((FlagKind::Missing, CERTAIN, None)),
            FieldValue::Malformed(raw) => Some(self.enum_finding(
                status_candidate(raw, record.origin.as_deref(), self.aliases, self.config),
                Candidate::Status,
            )),
            FieldValue::Parsed(_) => None,
        }
    }

    fn enum_finding<T>(&self, found: FuzzyMatch<T>, wrap: fn(T) -> Candidate) -> Finding {
        match found {
            FuzzyMatch::Unique(v) => (
                FlagKind::UnknownEnumValue,
                self.config.fuzzy_confidence,
                Some(wrap(v)),
            ),
            FuzzyMatch::None | FuzzyMatch::Ambiguous => (FlagKind::UnknownEnumValue, CERTAIN, None),
        }
    }

    fn check_resolution_time(&self, record: &DemandRecord) -> Option<Finding> {
        let minutes = match &record.resolution_time_minutes {
            FieldValue::Absent => return None,
            FieldValue::Malformed(_) => return Some((FlagKind::OutOfRange, CERTAIN, None)),
            FieldValue::Parsed(m) => *m,
        };

        // Consistency and cohort checks need a status to measure against.
        let status = effective_status(record, self.aliases, self.config)?;
        if minutes <= 0.0 || !status.is_resolution() {
            return Some((FlagKind::InconsistentWithStatus, INCONSISTENT_CONFIDENCE, None));
        }

        let team = effective_team(record, self.aliases, self.config)?;
        let date = effective_date(record, self.config)?;
        let bounds = self.cohorts.bounds_for(team, date)?;
        let excess = bounds.excess(minutes)?;

        let cap = self.config.outlier_confidence_cap;
        let scale = self.config.iqr_multiplier * bounds.iqr();
        let confidence = if scale > 0.0 {
            (cap * excess / scale).min(cap)
        } else {
            cap
        };
        Some((FlagKind::StatisticalOutlier, confidence, None))
    }
}

type Finding = (FlagKind, f64, Option<Candidate>);
