//! Correction Audit Log.
//!
//! Append-only. Every change the corrector makes, rejections included,
//! becomes one entry carrying the value before and after. Entries are enough
//! to put a corrected record back the way the normalizer produced it.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use demandas_core::{DemandRecord, Field, Normalizer};

use crate::detector::FlagKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    /// Enum value replaced by its fuzzy-match candidate.
    FuzzyMatch,
    /// Resolution time cleared because the status does not allow it.
    StatusPriority,
    RejectedMissing,
    RejectedUnknownValue,
    /// Date replaced by a lenient re-parse of the source text.
    DateRepair,
    RejectedOutOfRange,
    /// Non-numeric resolution time cleared.
    ClearedUnparseable,
    /// Value kept; record tagged as a statistical outlier.
    FlaggedOutlier,
    /// Missing team filled from the responsible person's roster entry.
    RosterLookup,
}

impl CorrectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FuzzyMatch => "fuzzy_match",
            Self::StatusPriority => "status_priority",
            Self::RejectedMissing => "rejected_missing",
            Self::RejectedUnknownValue => "rejected_unknown_value",
            Self::DateRepair => "date_repair",
            Self::RejectedOutOfRange => "rejected_out_of_range",
            Self::ClearedUnparseable => "cleared_unparseable",
            Self::FlaggedOutlier => "flagged_outlier",
            Self::RosterLookup => "roster_lookup",
        }
    }

    /// Methods that mark a field rejected instead of changing it.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::RejectedMissing | Self::RejectedUnknownValue | Self::RejectedOutOfRange
        )
    }

    /// Methods that replace the field value.
    pub fn changes_value(&self) -> bool {
        matches!(
            self,
            Self::FuzzyMatch
                | Self::StatusPriority
                | Self::DateRepair
                | Self::ClearedUnparseable
                | Self::RosterLookup
        )
    }
}

/// One write-once audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionAuditEntry {
    pub record_id: String,
    pub field: Field,
    pub original_value: Option<String>,
    pub corrected_value: Option<String>,
    pub method: CorrectionMethod,
    pub flag_kind: FlagKind,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<CorrectionAuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: CorrectionAuditEntry) {
        tracing::trace!(
            id = %entry.record_id,
            field = %entry.field,
            method = entry.method.as_str(),
            "audit entry appended"
        );
        self.entries.push(entry);
    }

    /// Append per-record entry lists in the order given. Entries within each
    /// list keep their order.
    pub fn merge<I>(&mut self, parts: I)
    where
        I: IntoIterator<Item = Vec<CorrectionAuditEntry>>,
    {
        for part in parts {
            self.entries.extend(part);
        }
    }

    pub fn entries(&self) -> &[CorrectionAuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_record<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a CorrectionAuditEntry> {
        self.entries.iter().filter(move |e| e.record_id == id)
    }

    /// Undo every logged correction of `record`, newest first.
    ///
    /// `normalizer` must carry the alias table the batch was normalized
    /// with, since restored text is re-coerced through it.
    pub fn revert(&self, record: &DemandRecord, normalizer: &Normalizer) -> DemandRecord {
        let mut restored = record.clone();
        let entries: Vec<_> = self.for_record(&record.id).collect();

        for entry in entries.into_iter().rev() {
            if entry.method.is_rejection() {
                restored.quality.rejected.remove(&entry.field);
            } else if entry.method == CorrectionMethod::FlaggedOutlier {
                restored.quality.flagged_outlier = false;
            } else {
                normalizer.restore_field(&mut restored, entry.field, entry.original_value.as_deref());
            }
        }
        restored
    }

    /// One JSON object per line.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> io::Result<()> {
        for entry in &self.entries {
            serde_json::to_writer(&mut out, entry)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl IntoIterator for AuditLog {
    type Item = CorrectionAuditEntry;
    type IntoIter = std::vec::IntoIter<CorrectionAuditEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use demandas_core::{FieldValue, Team};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap()
    }

    fn entry(id: &str, field: Field, method: CorrectionMethod) -> CorrectionAuditEntry {
        CorrectionAuditEntry {
            record_id: id.into(),
            field,
            original_value: Some("Julho".into()),
            corrected_value: Some("JULIO".into()),
            method,
            flag_kind: FlagKind::UnknownEnumValue,
            confidence: 0.8,
            timestamp: at(),
        }
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(entry("1", Field::Team, CorrectionMethod::FuzzyMatch)).unwrap();
        assert_eq!(json["recordId"], "1");
        assert_eq!(json["field"], "team");
        assert_eq!(json["originalValue"], "Julho");
        assert_eq!(json["correctedValue"], "JULIO");
        assert_eq!(json["method"], "fuzzy_match");
        assert_eq!(json["flagKind"], "unknown_enum_value");
        assert_eq!(json["confidence"], 0.8);
        assert_eq!(json["timestamp"], "2025-01-06T12:00:00Z");
    }

    #[test]
    fn merge_keeps_part_order() {
        let mut log = AuditLog::new();
        log.append(entry("0", Field::Team, CorrectionMethod::FuzzyMatch));
        log.merge(vec![
            vec![
                entry("1", Field::Date, CorrectionMethod::DateRepair),
                entry("1", Field::Team, CorrectionMethod::FuzzyMatch),
            ],
            vec![],
            vec![entry("2", Field::Status, CorrectionMethod::RejectedMissing)],
        ]);
        let ids: Vec<_> = log
            .entries()
            .iter()
            .map(|e| (e.record_id.as_str(), e.field))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("0", Field::Team),
                ("1", Field::Date),
                ("1", Field::Team),
                ("2", Field::Status),
            ]
        );
        assert_eq!(log.for_record("1").count(), 2);
    }

    #[test]
    fn revert_restores_values_and_tags() {
        let mut corrected = DemandRecord::new("1", 0);
        corrected.team = FieldValue::Parsed(Team::Julio);
        corrected.quality.flagged_outlier = true;
        corrected.quality.rejected.insert(Field::Status);

        let mut log = AuditLog::new();
        log.append(entry("1", Field::Team, CorrectionMethod::FuzzyMatch));
        let mut reject = entry("1", Field::Status, CorrectionMethod::RejectedMissing);
        reject.original_value = None;
        reject.corrected_value = None;
        log.append(reject);
        log.append(entry("1", Field::ResolutionTimeMinutes, CorrectionMethod::FlaggedOutlier));
        log.append(entry("other", Field::Team, CorrectionMethod::RejectedUnknownValue));

        let reverted = log.revert(&corrected, &Normalizer::default());
        assert_eq!(reverted.team, FieldValue::Malformed("Julho".into()));
        assert!(reverted.quality.rejected.is_empty());
        assert!(!reverted.quality.flagged_outlier);
    }

    #[test]
    fn json_lines_one_per_entry() {
        let mut log = AuditLog::new();
        log.append(entry("1", Field::Team, CorrectionMethod::FuzzyMatch));
        log.append(entry("2", Field::Team, CorrectionMethod::FuzzyMatch));
        let mut buf = Vec::new();
        log.write_json_lines(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: CorrectionAuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back.record_id, "2");
    }

    #[test]
    fn method_classes() {
        assert!(CorrectionMethod::RejectedOutOfRange.is_rejection());
        assert!(!CorrectionMethod::FlaggedOutlier.is_rejection());
        assert!(!CorrectionMethod::FlaggedOutlier.changes_value());
        assert!(CorrectionMethod::ClearedUnparseable.changes_value());
        assert!(CorrectionMethod::RosterLookup.changes_value());
        assert!(!CorrectionMethod::RosterLookup.is_rejection());
        assert_eq!(CorrectionMethod::RosterLookup.as_str(), "roster_lookup");
    }
}
