//! Canonical demand record and the closed team/status enumerations.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Handling team. Closed set: anything else goes through the anomaly path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Team {
    Julio,
    Leandro,
    Adriano,
}

impl Team {
    pub const ALL: [Team; 3] = [Team::Julio, Team::Leandro, Team::Adriano];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Julio => "JULIO",
            Self::Leandro => "LEANDRO",
            Self::Adriano => "ADRIANO",
        }
    }

    /// Exact match on the canonical name (already folded).
    pub fn from_canonical(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Demand status. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Resolved,
    Approved,
    /// Settled by the customer (*quitado*).
    Settled,
    PendingActive,
    PendingReceptive,
    /// Pending with no channel to tell active from receptive.
    Pending,
    InAnalysis,
    InProgress,
}

/// Dashboard bucket a status counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBucket {
    Resolved,
    Pending,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Resolved,
        Status::Approved,
        Status::Settled,
        Status::PendingActive,
        Status::PendingReceptive,
        Status::Pending,
        Status::InAnalysis,
        Status::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Approved => "approved",
            Self::Settled => "settled",
            Self::PendingActive => "pending_active",
            Self::PendingReceptive => "pending_receptive",
            Self::Pending => "pending",
            Self::InAnalysis => "in_analysis",
            Self::InProgress => "in_progress",
        }
    }

    /// Whether this status closes the demand (and so may carry a resolution time).
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolved | Self::Approved | Self::Settled)
    }

    pub fn bucket(&self) -> StatusBucket {
        if self.is_resolution() {
            StatusBucket::Resolved
        } else {
            StatusBucket::Pending
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checked field: absent in the source, coerced, or kept as raw text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FieldValue<T> {
    Absent,
    Parsed(T),
    /// Coercion failed; the trimmed source text is retained for repair.
    Malformed(String),
}

impl<T> FieldValue<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            Self::Parsed(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl<T: Copy> FieldValue<T> {
    pub fn value(&self) -> Option<T> {
        self.parsed().copied()
    }
}

impl<T: fmt::Display> FieldValue<T> {
    /// Text form used in audit entries: `None` when absent.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            Self::Parsed(v) => Some(v.to_string()),
            Self::Malformed(raw) => Some(raw.clone()),
        }
    }
}

/// Record fields that are checked by detection. Ordered as corrections apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Team,
    Status,
    ResolutionTimeMinutes,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Date,
        Field::Team,
        Field::Status,
        Field::ResolutionTimeMinutes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Team => "team",
            Self::Status => "status",
            Self::ResolutionTimeMinutes => "resolution_time_minutes",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome tags applied by the corrector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityState {
    /// Fields the corrector could not safely fix. Non-empty means unresolved.
    pub rejected: BTreeSet<Field>,
    /// Resolution time sits outside its cohort bounds; kept as-is.
    pub flagged_outlier: bool,
}

impl QualityState {
    pub fn is_unresolved(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// One demand, as normalized from a raw row and later corrected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandRecord {
    pub id: String,
    /// Zero-based position in the input batch.
    pub row: usize,
    pub date: FieldValue<NaiveDate>,
    pub team: FieldValue<Team>,
    pub status: FieldValue<Status>,
    pub resolution_time_minutes: FieldValue<f64>,
    pub origin: Option<String>,
    /// Person handling the demand; used to derive a missing team.
    pub responsible: Option<String>,
    pub quality: QualityState,
}

/// Fully-typed view of a record that may be aggregated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidDemand<'a> {
    pub id: &'a str,
    pub date: NaiveDate,
    pub team: Team,
    pub status: Status,
    pub resolution_time_minutes: Option<f64>,
    pub flagged_outlier: bool,
}

impl DemandRecord {
    /// A record with only an id; every checked field absent.
    pub fn new(id: impl Into<String>, row: usize) -> Self {
        Self {
            id: id.into(),
            row,
            date: FieldValue::Absent,
            team: FieldValue::Absent,
            status: FieldValue::Absent,
            resolution_time_minutes: FieldValue::Absent,
            origin: None,
            responsible: None,
            quality: QualityState::default(),
        }
    }

    /// Whether any field failed coercion.
    pub fn is_malformed(&self) -> bool {
        self.date.is_malformed()
            || self.team.is_malformed()
            || self.status.is_malformed()
            || self.resolution_time_minutes.is_malformed()
    }

    pub fn is_unresolved(&self) -> bool {
        self.quality.is_unresolved()
    }

    /// Text form of a field's current value.
    pub fn field_text(&self, field: Field) -> Option<String> {
        match field {
            Field::Date => self.date.text(),
            Field::Team => self.team.text(),
            Field::Status => self.status.text(),
            Field::ResolutionTimeMinutes => self.resolution_time_minutes.text(),
        }
    }

    /// Typed view, or `None` if the record is unresolved or a required
    /// field is not parsed.
    pub fn valid(&self) -> Option<ValidDemand<'_>> {
        if self.is_unresolved() {
            return None;
        }
        Some(ValidDemand {
            id: &self.id,
            date: self.date.value()?,
            team: self.team.value()?,
            status: self.status.value()?,
            resolution_time_minutes: self.resolution_time_minutes.value(),
            flagged_outlier: self.quality.flagged_outlier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(id: &str) -> DemandRecord {
        let mut r = DemandRecord::new(id, 0);
        r.date = FieldValue::Parsed(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        r.team = FieldValue::Parsed(Team::Julio);
        r.status = FieldValue::Parsed(Status::Resolved);
        r.resolution_time_minutes = FieldValue::Parsed(90.0);
        r
    }

    #[test]
    fn status_buckets() {
        assert_eq!(Status::Resolved.bucket(), StatusBucket::Resolved);
        assert_eq!(Status::Settled.bucket(), StatusBucket::Resolved);
        assert_eq!(Status::Approved.bucket(), StatusBucket::Resolved);
        assert_eq!(Status::InAnalysis.bucket(), StatusBucket::Pending);
        assert_eq!(Status::PendingReceptive.bucket(), StatusBucket::Pending);
    }

    #[test]
    fn team_canonical_names() {
        assert_eq!(Team::from_canonical("JULIO"), Some(Team::Julio));
        assert_eq!(Team::from_canonical("julio"), None);
        assert_eq!(Team::Adriano.to_string(), "ADRIANO");
    }

    #[test]
    fn field_text_forms() {
        let mut r = complete("1");
        assert_eq!(r.field_text(Field::Date).as_deref(), Some("2025-01-05"));
        assert_eq!(r.field_text(Field::Team).as_deref(), Some("JULIO"));
        assert_eq!(r.field_text(Field::Status).as_deref(), Some("resolved"));
        assert_eq!(
            r.field_text(Field::ResolutionTimeMinutes).as_deref(),
            Some("90")
        );

        r.team = FieldValue::Malformed("Julho".into());
        assert_eq!(r.field_text(Field::Team).as_deref(), Some("Julho"));
        r.resolution_time_minutes = FieldValue::Absent;
        assert_eq!(r.field_text(Field::ResolutionTimeMinutes), None);
    }

    #[test]
    fn valid_view_requires_parsed_fields() {
        let r = complete("1");
        let v = r.valid().unwrap();
        assert_eq!(v.team, Team::Julio);
        assert_eq!(v.resolution_time_minutes, Some(90.0));

        let mut bad = complete("2");
        bad.team = FieldValue::Malformed("X".into());
        assert!(bad.valid().is_none());
        assert!(bad.is_malformed());
    }

    #[test]
    fn unresolved_records_have_no_valid_view() {
        let mut r = complete("1");
        r.quality.rejected.insert(Field::Team);
        assert!(r.is_unresolved());
        assert!(r.valid().is_none());
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&Team::Leandro).unwrap(), "\"LEANDRO\"");
        assert_eq!(
            serde_json::to_string(&Status::PendingActive).unwrap(),
            "\"pending_active\""
        );
        assert_eq!(
            serde_json::to_string(&Field::ResolutionTimeMinutes).unwrap(),
            "\"resolution_time_minutes\""
        );
    }
}
