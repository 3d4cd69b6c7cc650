//! Corrector: applies deterministic fixes for detector flags.
//!
//! Records are copy-on-write. A record that needs no change comes back
//! borrowed; otherwise the outcome owns a patched clone and one audit entry
//! per change. Re-running on a corrected record emits nothing: rejections and
//! outlier tags already present in the record's quality state are skipped.

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use demandas_core::{CorrectorConfig, DemandRecord, Field, FieldValue};

use crate::audit::{CorrectionAuditEntry, CorrectionMethod};
use crate::detector::{AnomalyFlag, Candidate, FlagKind};

/// Corrected record plus the audit entries describing what changed.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome<'r> {
    pub record: Cow<'r, DemandRecord>,
    pub entries: Vec<CorrectionAuditEntry>,
}

impl CorrectionOutcome<'_> {
    pub fn is_changed(&self) -> bool {
        matches!(self.record, Cow::Owned(_))
    }

    pub fn into_owned(self) -> (DemandRecord, Vec<CorrectionAuditEntry>) {
        (self.record.into_owned(), self.entries)
    }
}

enum Action {
    Assign(Candidate),
    Clear(Field),
    Reject(Field),
    TagOutlier,
}

#[derive(Debug, Clone, Copy)]
pub struct Corrector<'a> {
    config: &'a CorrectorConfig,
}

impl<'a> Corrector<'a> {
    pub fn new(config: &'a CorrectorConfig) -> Self {
        Self { config }
    }

    /// Apply `flags` (as produced by the detector for `record`). Every entry
    /// is stamped with `at`, the batch timestamp.
    pub fn correct<'r>(
        &self,
        record: &'r DemandRecord,
        flags: &[AnomalyFlag],
        at: DateTime<Utc>,
    ) -> CorrectionOutcome<'r> {
        let mut current = Cow::Borrowed(record);
        let mut entries = Vec::new();

        for flag in flags.iter().filter(|f| f.record_id == record.id) {
            let Some((action, method)) = self.plan(&current, flag) else {
                continue;
            };
            let field = match &action {
                Action::Assign(c) => candidate_field(c),
                Action::Clear(field) | Action::Reject(field) => *field,
                Action::TagOutlier => flag.field,
            };
            let original_value = current.field_text(field);

            let target = current.to_mut();
            match action {
                Action::Assign(c) => assign(target, c),
                Action::Clear(Field::ResolutionTimeMinutes) => {
                    target.resolution_time_minutes = FieldValue::Absent
                }
                Action::Clear(Field::Date) => target.date = FieldValue::Absent,
                Action::Clear(Field::Team) => target.team = FieldValue::Absent,
                Action::Clear(Field::Status) => target.status = FieldValue::Absent,
                Action::Reject(field) => {
                    target.quality.rejected.insert(field);
                }
                Action::TagOutlier => target.quality.flagged_outlier = true,
            }

            tracing::debug!(id = %record.id, %field, method = method.as_str(), "correction applied");
            entries.push(CorrectionAuditEntry {
                record_id: record.id.clone(),
                field,
                original_value,
                corrected_value: current.field_text(field),
                method,
                flag_kind: flag.kind,
                confidence: flag.confidence,
                timestamp: at,
            });
        }

        CorrectionOutcome {
            record: current,
            entries,
        }
    }

    fn plan(&self, record: &DemandRecord, flag: &AnomalyFlag) -> Option<(Action, CorrectionMethod)> {
        let confident = flag.confidence >= self.config.min_auto_correct_confidence;
        let reject = |method: CorrectionMethod| {
            (!record.quality.rejected.contains(&flag.field))
                .then_some((Action::Reject(flag.field), method))
        };

        match (flag.kind, flag.field) {
            (FlagKind::Missing, _) => match flag.candidate {
                Some(c) if confident => Some((Action::Assign(c), CorrectionMethod::RosterLookup)),
                _ => reject(CorrectionMethod::RejectedMissing),
            },
            (FlagKind::UnknownEnumValue, _) => match flag.candidate {
                Some(c) if confident => Some((Action::Assign(c), CorrectionMethod::FuzzyMatch)),
                _ => reject(CorrectionMethod::RejectedUnknownValue),
            },
            (FlagKind::OutOfRange, Field::ResolutionTimeMinutes) => Some((
                Action::Clear(Field::ResolutionTimeMinutes),
                CorrectionMethod::ClearedUnparseable,
            )),
            (FlagKind::OutOfRange, _) => match flag.candidate {
                Some(c) if confident => Some((Action::Assign(c), CorrectionMethod::DateRepair)),
                _ => reject(CorrectionMethod::RejectedOutOfRange),
            },
            (FlagKind::InconsistentWithStatus, _) => Some((
                Action::Clear(Field::ResolutionTimeMinutes),
                CorrectionMethod::StatusPriority,
            )),
            (FlagKind::StatisticalOutlier, _) => (!record.quality.flagged_outlier)
                .then_some((Action::TagOutlier, CorrectionMethod::FlaggedOutlier)),
        }
    }
}

fn candidate_field(candidate: &Candidate) -> Field {
    match candidate {
        Candidate::Date(_) => Field::Date,
        Candidate::Team(_) => Field::Team,
        Candidate::Status(_) => Field::Status,
    }
}

fn assign(record: &mut DemandRecord, candidate: Candidate) {
    match candidate {
        Candidate::Date(d) => record.date = FieldValue::Parsed(d),
        Candidate::Team(t) => record.team = FieldValue::Parsed(t),
        Candidate::Status(s) => record.status = FieldValue::Parsed(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use demandas_core::{AliasTable, DetectorConfig, Normalizer, Status, Team};

    use crate::audit::AuditLog;
    use crate::cohort::CohortStats;
    use crate::detector::Detector;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap()
    }

    fn complete(id: &str, minutes: f64) -> DemandRecord {
        let mut r = DemandRecord::new(id, 0);
        r.date = FieldValue::Parsed(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        r.team = FieldValue::Parsed(Team::Julio);
        r.status = FieldValue::Parsed(Status::Resolved);
        r.resolution_time_minutes = FieldValue::Parsed(minutes);
        r
    }

    struct Harness {
        aliases: AliasTable,
        detector: DetectorConfig,
        corrector: CorrectorConfig,
        cohorts: CohortStats,
    }

    impl Harness {
        fn new(batch: &[DemandRecord]) -> Self {
            let aliases = AliasTable::builtin();
            let detector = DetectorConfig::default();
            let cohorts = CohortStats::build(batch, &aliases, &detector);
            Self {
                aliases,
                detector,
                corrector: CorrectorConfig::default(),
                cohorts,
            }
        }

        fn run<'r>(&self, record: &'r DemandRecord) -> CorrectionOutcome<'r> {
            let flags = Detector::new(&self.aliases, &self.detector, &self.cohorts).detect(record);
            Corrector::new(&self.corrector).correct(record, &flags, at())
        }
    }

    #[test]
    fn clean_record_is_borrowed() {
        let r = complete("1", 90.0);
        let out = Harness::new(&[]).run(&r);
        assert!(!out.is_changed());
        assert!(out.entries.is_empty());
    }

    #[test]
    fn fuzzy_team_is_corrected() {
        let mut r = complete("1", 90.0);
        r.team = FieldValue::Malformed("Julho".into());
        let out = Harness::new(&[]).run(&r);

        assert_eq!(out.record.team, FieldValue::Parsed(Team::Julio));
        assert_eq!(out.entries.len(), 1);
        let e = &out.entries[0];
        assert_eq!(e.method, CorrectionMethod::FuzzyMatch);
        assert_eq!(e.confidence, 0.8);
        assert_eq!(e.original_value.as_deref(), Some("Julho"));
        assert_eq!(e.corrected_value.as_deref(), Some("JULIO"));
        assert_eq!(e.timestamp, at());
        // Input untouched.
        assert_eq!(r.team, FieldValue::Malformed("Julho".into()));
    }

    #[test]
    fn negative_time_is_cleared_by_status_priority() {
        let r = complete("1", -5.0);
        let out = Harness::new(&[]).run(&r);
        assert!(out.record.resolution_time_minutes.is_absent());
        assert_eq!(out.record.status, FieldValue::Parsed(Status::Resolved));
        let e = &out.entries[0];
        assert_eq!(e.method, CorrectionMethod::StatusPriority);
        assert_eq!(e.flag_kind, FlagKind::InconsistentWithStatus);
        assert_eq!(e.original_value.as_deref(), Some("-5"));
        assert_eq!(e.corrected_value, None);
    }

    #[test]
    fn unknown_team_is_rejected() {
        let mut r = complete("1", 90.0);
        r.team = FieldValue::Malformed("UNKNOWN_TEAM_X".into());
        let out = Harness::new(&[]).run(&r);
        assert!(out.record.is_unresolved());
        assert!(out.record.valid().is_none());
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].method, CorrectionMethod::RejectedUnknownValue);
        assert_eq!(out.entries[0].corrected_value.as_deref(), Some("UNKNOWN_TEAM_X"));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut r = complete("1", 90.0);
        r.status = FieldValue::Absent;
        r.date = FieldValue::Absent;
        let out = Harness::new(&[]).run(&r);
        let methods: Vec<_> = out.entries.iter().map(|e| (e.field, e.method)).collect();
        assert_eq!(
            methods,
            vec![
                (Field::Date, CorrectionMethod::RejectedMissing),
                (Field::Status, CorrectionMethod::RejectedMissing),
            ]
        );
        assert!(out.record.quality.rejected.contains(&Field::Status));
    }

    #[test]
    fn missing_team_is_filled_from_roster() {
        let mut config = demandas_core::AliasConfig::default();
        config.roster.insert("Ana Lídia".into(), "JULIO".into());
        let mut h = Harness::new(&[]);
        h.aliases = AliasTable::from_config(&config).unwrap();

        let mut r = complete("1", 90.0);
        r.team = FieldValue::Absent;
        r.responsible = Some("Ana Lídia".into());
        let out = h.run(&r);
        assert_eq!(out.record.team, FieldValue::Parsed(Team::Julio));
        assert!(!out.record.is_unresolved());
        let e = &out.entries[0];
        assert_eq!((e.field, e.method), (Field::Team, CorrectionMethod::RosterLookup));
        assert_eq!(e.flag_kind, FlagKind::Missing);
        assert_eq!(e.original_value, None);
        assert_eq!(e.corrected_value.as_deref(), Some("JULIO"));

        let corrected = out.record.into_owned();
        assert!(h.run(&corrected).entries.is_empty());

        let mut log = AuditLog::new();
        log.merge([out.entries]);
        let reverted = log.revert(&corrected, &Normalizer::new(h.aliases.clone()));
        assert_eq!(reverted, r);

        r.responsible = Some("Nobody".into());
        let out = h.run(&r);
        assert_eq!(out.entries[0].method, CorrectionMethod::RejectedMissing);
        assert!(out.record.is_unresolved());
    }

    #[test]
    fn dates_are_repaired_or_rejected() {
        let h = Harness::new(&[]);
        let mut r = complete("1", 90.0);
        r.date = FieldValue::Malformed("05/01/25".into());
        let out = h.run(&r);
        assert_eq!(
            out.record.date,
            FieldValue::Parsed(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap())
        );
        assert_eq!(out.entries[0].method, CorrectionMethod::DateRepair);
        assert_eq!(out.entries[0].corrected_value.as_deref(), Some("2025-01-05"));

        r.date = FieldValue::Malformed("someday".into());
        let out = h.run(&r);
        assert_eq!(out.entries[0].method, CorrectionMethod::RejectedOutOfRange);
        assert!(out.record.is_unresolved());
    }

    #[test]
    fn unparseable_time_is_cleared() {
        let mut r = complete("1", 0.0);
        r.resolution_time_minutes = FieldValue::Malformed("ninety".into());
        let out = Harness::new(&[]).run(&r);
        assert!(out.record.resolution_time_minutes.is_absent());
        assert_eq!(out.entries[0].method, CorrectionMethod::ClearedUnparseable);
        assert!(!out.record.is_unresolved());
    }

    #[test]
    fn low_confidence_candidate_is_rejected() {
        let mut r = complete("1", 90.0);
        r.team = FieldValue::Malformed("Julho".into());
        let mut h = Harness::new(&[]);
        h.corrector.min_auto_correct_confidence = 0.95;
        let out = h.run(&r);
        assert_eq!(out.entries[0].method, CorrectionMethod::RejectedUnknownValue);
        assert!(out.record.is_unresolved());
    }

    #[test]
    fn outlier_is_tagged_not_altered() {
        let cohort: Vec<_> = [10.0, 20.0, 30.0, 40.0]
            .iter()
            .enumerate()
            .map(|(i, &m)| complete(&i.to_string(), m))
            .collect();
        let h = Harness::new(&cohort);
        let r = complete("big", 500.0);
        let out = h.run(&r);
        assert_eq!(out.record.resolution_time_minutes, FieldValue::Parsed(500.0));
        assert!(out.record.quality.flagged_outlier);
        assert!(!out.record.is_unresolved());
        let e = &out.entries[0];
        assert_eq!(e.method, CorrectionMethod::FlaggedOutlier);
        assert_eq!(e.original_value, e.corrected_value);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let h = Harness::new(&[]);
        let mut r = complete("1", -5.0);
        r.team = FieldValue::Malformed("Julho".into());
        r.status = FieldValue::Malformed("???".into());
        r.date = FieldValue::Malformed("05.01.2025".into());

        let first = h.run(&r);
        assert!(!first.entries.is_empty());
        let corrected = first.record.into_owned();

        let second = h.run(&corrected);
        assert!(second.entries.is_empty());
        assert!(!second.is_changed());
    }

    #[test]
    fn revert_undoes_every_correction() {
        let h = Harness::new(&[]);
        let mut r = complete("1", -5.0);
        r.team = FieldValue::Malformed("Julho".into());
        r.date = FieldValue::Malformed("05.01.2025".into());
        r.status = FieldValue::Absent;

        let (corrected, entries) = h.run(&r).into_owned();
        let mut log = AuditLog::new();
        log.merge([entries]);

        let reverted = log.revert(&corrected, &Normalizer::default());
        assert_eq!(reverted, r);
    }
}
