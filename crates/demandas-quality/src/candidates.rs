//! Repair candidates for malformed fields.
//!
//! The detector attaches these to flags and the cohort pass uses them to see
//! a record the way it will look once corrected, so both passes agree on the
//! record's effective date, team, and status.

use chrono::{Datelike, Days, NaiveDate};

use demandas_core::normalize::{CONFLICT_SEPARATOR, pending_for_origin};
use demandas_core::{AliasTable, DemandRecord, DetectorConfig, FieldValue, FuzzyMatch, Status, Team};

/// Day zero of spreadsheet serial dates.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

pub fn in_year_window(date: NaiveDate, config: &DetectorConfig) -> bool {
    (config.min_year..=config.max_year).contains(&date.year())
}

/// Lenient date parse for text the strict coercion rejected.
///
/// Accepts two-digit years, `.` and `-` separators in day-first order, a
/// trailing time component, and spreadsheet serial day numbers. The result
/// must fall inside the configured year window. Joined conflicts never
/// repair.
pub fn repair_date(raw: &str, config: &DetectorConfig) -> Option<NaiveDate> {
    if raw.contains(CONFLICT_SEPARATOR) {
        return None;
    }
    let date_part = raw
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()?;

    let date = if date_part.bytes().all(|b| b.is_ascii_digit()) {
        from_serial(date_part)?
    } else {
        from_parts(date_part)?
    };
    in_year_window(date, config).then_some(date)
}

fn from_serial(digits: &str) -> Option<NaiveDate> {
    // Five digits covers 1927-2173; shorter runs are not dates.
    if digits.len() != 5 {
        return None;
    }
    let days: u64 = digits.parse().ok()?;
    let (y, m, d) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(days))
}

fn from_parts(text: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = text.split(['/', '.', '-']).collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    if ![a, b, c].iter().all(|p| !p.is_empty() && p.bytes().all(|x| x.is_ascii_digit())) {
        return None;
    }

    let (year, month, day) = if a.len() == 4 {
        (*a, *b, *c)
    } else {
        (*c, *b, *a)
    };
    if month.len() > 2 || day.len() > 2 {
        return None;
    }
    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Fuzzy team candidate for malformed text. Joined conflicts never match.
pub fn team_candidate(raw: &str, aliases: &AliasTable, config: &DetectorConfig) -> FuzzyMatch<Team> {
    if raw.contains(CONFLICT_SEPARATOR) {
        return FuzzyMatch::None;
    }
    aliases.fuzzy_team(raw, config.fuzzy_max_distance)
}

/// Fuzzy status candidate for malformed text. A bare pending match is split
/// by origin the same way the normalizer does.
pub fn status_candidate(
    raw: &str,
    origin: Option<&str>,
    aliases: &AliasTable,
    config: &DetectorConfig,
) -> FuzzyMatch<Status> {
    if raw.contains(CONFLICT_SEPARATOR) {
        return FuzzyMatch::None;
    }
    match aliases.fuzzy_status(raw, config.fuzzy_max_distance) {
        FuzzyMatch::Unique(Status::Pending) => FuzzyMatch::Unique(pending_for_origin(origin)),
        other => other,
    }
}

/// Team of the record's responsible person, from the configured roster.
pub fn roster_team(record: &DemandRecord, aliases: &AliasTable) -> Option<Team> {
    record
        .responsible
        .as_deref()
        .and_then(|name| aliases.team_for_person(name))
}

// ── Effective values ──

/// Parsed date inside the year window, or a repair of malformed text.
pub fn effective_date(record: &DemandRecord, config: &DetectorConfig) -> Option<NaiveDate> {
    match &record.date {
        FieldValue::Parsed(d) => in_year_window(*d, config).then_some(*d),
        FieldValue::Malformed(raw) => repair_date(raw, config),
        FieldValue::Absent => None,
    }
}

pub fn effective_team(
    record: &DemandRecord,
    aliases: &AliasTable,
    config: &DetectorConfig,
) -> Option<Team> {
    match &record.team {
        FieldValue::Parsed(t) => Some(*t),
        FieldValue::Malformed(raw) => match team_candidate(raw, aliases, config) {
            FuzzyMatch::Unique(t) => Some(t),
            _ => None,
        },
        FieldValue::Absent => roster_team(record, aliases),
    }
}

pub fn effective_status(
    record: &DemandRecord,
    aliases: &AliasTable,
    config: &DetectorConfig,
) -> Option<Status> {
    match &record.status {
        FieldValue::Parsed(s) => Some(*s),
        FieldValue::Malformed(raw) => {
            match status_candidate(raw, record.origin.as_deref(), aliases, config) {
                FuzzyMatch::Unique(s) => Some(s),
                _ => None,
            }
        }
        FieldValue::Absent => None,
    }
}
