//! Record Normalizer: raw string rows into canonical [`DemandRecord`]s.
//!
//! Column headers are matched through an alias table, values are trimmed and
//! coerced. A value that fails coercion is kept as [`FieldValue::Malformed`]
//! so the detector can see it; only rows with no usable id are turned into
//! [`ParseFailure`]s.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::aliases::AliasTable;
use crate::model::{DemandRecord, Field, FieldValue, Status, Team};
use crate::text::fold;

/// One raw input row: header → cell text.
pub type RawRow = BTreeMap<String, String>;

/// Separator used when duplicate columns disagree.
pub const CONFLICT_SEPARATOR: &str = " | ";

/// Marks the ordinal of a repeated header: `status`, `status#2`, ...
pub const REPEATED_HEADER_MARK: char = '#';

/// Row key for the `occurrence`-th (1-based) column named `header`.
pub fn repeated_header_key(header: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        header.to_string()
    } else {
        format!("{header}{REPEATED_HEADER_MARK}{occurrence}")
    }
}

/// Header text with any repeat ordinal removed.
fn base_header(key: &str) -> &str {
    match key.rsplit_once(REPEATED_HEADER_MARK) {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => key,
    }
}

// ── Failures ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Row has data but no id column value.
    MissingId,
    /// No recognised column carries a value.
    EmptyRow,
    /// Id already seen earlier in the batch.
    DuplicateId,
    /// Several id columns carry different values.
    ConflictingId,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingId => "missing_id",
            Self::EmptyRow => "empty_row",
            Self::DuplicateId => "duplicate_id",
            Self::ConflictingId => "conflicting_id",
        }
    }
}

/// A row that could not be structured into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub row: usize,
    pub id: Option<String>,
    pub reason: FailureReason,
}

/// Output of [`Normalizer::normalize_batch`]. Every input row lands in
/// exactly one of the two lists.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<DemandRecord>,
    pub failures: Vec<ParseFailure>,
}

impl NormalizedBatch {
    pub fn input_rows(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

// ── Column mapping ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Column {
    Id,
    Date,
    Team,
    Status,
    ResolutionTime,
    /// Date the demand was closed; stands in for a missing `Date`.
    ResolvedOn,
    Origin,
    Responsible,
}

fn column_for(header: &str) -> Option<Column> {
    let column = match fold(base_header(header)).as_str() {
        "ID" | "CTT" | "CODIGO" => Column::Id,
        "DATE" | "DATA" => Column::Date,
        "TEAM" | "EQUIPE" => Column::Team,
        "STATUS" | "SITUACAO" | "ESTADO" => Column::Status,
        "RESOLUTION TIME MINUTES" | "TEMPO RESOLUCAO" | "TEMPO DE RESOLUCAO" => {
            Column::ResolutionTime
        }
        "RESOLUCAO" | "DATA RESOLUCAO" | "RESOLVED ON" => Column::ResolvedOn,
        "ORIGIN" | "ORIGEM" | "ATIVO RECEPTIVO" => Column::Origin,
        "RESPONSIBLE" | "RESPONSAVEL" => Column::Responsible,
        _ => return None,
    };
    Some(column)
}

/// Non-empty cell values gathered per column, deduplicated by folded text.
#[derive(Default)]
struct Cells(BTreeMap<Column, Vec<String>>);

impl Cells {
    fn gather(raw: &RawRow) -> Self {
        let mut cells = Self::default();
        for (header, value) in raw {
            let Some(column) = column_for(header) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let values = cells.0.entry(column).or_default();
            let folded = fold(value);
            if !values.iter().any(|v| fold(v) == folded) {
                values.push(value.to_string());
            }
        }
        cells
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Single value, or all disagreeing values joined.
    fn get(&self, column: Column) -> Option<Cell> {
        match self.0.get(&column)?.as_slice() {
            [] => None,
            [one] => Some(Cell::Single(one.clone())),
            many => Some(Cell::Conflict(many.join(CONFLICT_SEPARATOR))),
        }
    }
}

enum Cell {
    Single(String),
    Conflict(String),
}

impl Cell {
    fn text(&self) -> &str {
        match self {
            Self::Single(s) | Self::Conflict(s) => s,
        }
    }
}

// ── Coercion ──

/// Strict date parse: `YYYY-MM-DD` or `DD/MM/YYYY`, four-digit year only.
pub fn parse_strict_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let (year, month, day) = if let Some([y, m, d]) = split3(raw, '-') {
        (y, m, d)
    } else if let Some([d, m, y]) = split3(raw, '/') {
        (y, m, d)
    } else {
        return None;
    };

    if year.len() != 4 || !(1..=2).contains(&month.len()) || !(1..=2).contains(&day.len()) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        parse_digits(year)? as i32,
        parse_digits(month)?,
        parse_digits(day)?,
    )
}

fn split3(s: &str, sep: char) -> Option<[&str; 3]> {
    let mut parts = s.split(sep);
    let out = [parts.next()?, parts.next()?, parts.next()?];
    parts.next().is_none().then_some(out)
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

pub fn coerce_date(raw: &str) -> FieldValue<NaiveDate> {
    match parse_strict_date(raw) {
        Some(date) => FieldValue::Parsed(date),
        None => FieldValue::Malformed(raw.trim().to_string()),
    }
}

/// Finite number with a decimal point or a decimal comma.
pub fn coerce_minutes(raw: &str) -> FieldValue<f64> {
    let trimmed = raw.trim();
    let text = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => FieldValue::Parsed(v),
        _ => FieldValue::Malformed(trimmed.to_string()),
    }
}

pub fn coerce_team(aliases: &AliasTable, raw: &str) -> FieldValue<Team> {
    match aliases.team(raw) {
        Some(team) => FieldValue::Parsed(team),
        None => FieldValue::Malformed(raw.trim().to_string()),
    }
}

/// Status lookup. A bare pending label is split by the origin channel.
pub fn coerce_status(aliases: &AliasTable, raw: &str, origin: Option<&str>) -> FieldValue<Status> {
    match aliases.status(raw) {
        Some(Status::Pending) => FieldValue::Parsed(pending_for_origin(origin)),
        Some(status) => FieldValue::Parsed(status),
        None => FieldValue::Malformed(raw.trim().to_string()),
    }
}

/// Pending variant implied by an origin channel (`ATIVO` / `RECEPTIVO`).
pub fn pending_for_origin(origin: Option<&str>) -> Status {
    let Some(origin) = origin else {
        return Status::Pending;
    };
    let folded = fold(origin);
    let receptive = folded.split(' ').any(|t| t == "RECEPTIVO" || t == "RECEPTIVE");
    let active = folded.split(' ').any(|t| t == "ATIVO" || t == "ACTIVE");
    match (active, receptive) {
        (true, false) => Status::PendingActive,
        (false, true) => Status::PendingReceptive,
        _ => Status::Pending,
    }
}

// ── Normalizer ──

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: AliasTable,
}

impl Normalizer {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Structure one row. Duplicate-id detection needs the batch; see
    /// [`normalize_batch`](Self::normalize_batch).
    pub fn normalize_row(&self, row: usize, raw: &RawRow) -> Result<DemandRecord, ParseFailure> {
        let cells = Cells::gather(raw);
        let failure = |id: Option<String>, reason| ParseFailure { row, id, reason };

        if cells.is_empty() {
            return Err(failure(None, FailureReason::EmptyRow));
        }
        let id = match cells.get(Column::Id) {
            None => return Err(failure(None, FailureReason::MissingId)),
            Some(Cell::Conflict(ids)) => return Err(failure(Some(ids), FailureReason::ConflictingId)),
            Some(Cell::Single(id)) => id,
        };

        let mut record = DemandRecord::new(id, row);
        record.origin = cells.get(Column::Origin).map(|c| c.text().to_string());
        record.responsible = cells.get(Column::Responsible).map(|c| c.text().to_string());

        let date = cells
            .get(Column::Date)
            .or_else(|| cells.get(Column::ResolvedOn));
        record.date = match date {
            None => FieldValue::Absent,
            Some(Cell::Conflict(raw)) => FieldValue::Malformed(raw),
            Some(Cell::Single(raw)) => coerce_date(&raw),
        };
        record.team = match cells.get(Column::Team) {
            None => FieldValue::Absent,
            Some(Cell::Conflict(raw)) => FieldValue::Malformed(raw),
            Some(Cell::Single(raw)) => coerce_team(&self.aliases, &raw),
        };
        record.status = match cells.get(Column::Status) {
            None => FieldValue::Absent,
            Some(Cell::Conflict(raw)) => FieldValue::Malformed(raw),
            Some(Cell::Single(raw)) => coerce_status(&self.aliases, &raw, record.origin.as_deref()),
        };
        record.resolution_time_minutes = match cells.get(Column::ResolutionTime) {
            None => FieldValue::Absent,
            Some(Cell::Conflict(raw)) => FieldValue::Malformed(raw),
            Some(Cell::Single(raw)) => coerce_minutes(&raw),
        };

        Ok(record)
    }

    /// Normalize every row. Later rows repeating an earlier id fail with
    /// [`FailureReason::DuplicateId`].
    pub fn normalize_batch(&self, rows: &[RawRow]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());

        for (row, raw) in rows.iter().enumerate() {
            match self.normalize_row(row, raw) {
                Ok(record) if !seen.insert(record.id.clone()) => {
                    batch.failures.push(ParseFailure {
                        row,
                        id: Some(record.id),
                        reason: FailureReason::DuplicateId,
                    });
                }
                Ok(record) => batch.records.push(record),
                Err(failure) => batch.failures.push(failure),
            }
        }

        let malformed = batch.records.iter().filter(|r| r.is_malformed()).count();
        tracing::info!(
            rows = rows.len(),
            records = batch.records.len(),
            malformed,
            failures = batch.failures.len(),
            "normalized batch"
        );
        batch
    }

    /// Re-coerce audit text back into a record field. `None` clears it.
    pub fn restore_field(&self, record: &mut DemandRecord, field: Field, text: Option<&str>) {
        match field {
            Field::Date => record.date = text.map_or(FieldValue::Absent, coerce_date),
            Field::Team => {
                record.team = text.map_or(FieldValue::Absent, |t| coerce_team(&self.aliases, t))
            }
            Field::Status => {
                let origin = record.origin.as_deref();
                record.status = text.map_or(FieldValue::Absent, |t| {
                    coerce_status(&self.aliases, t, origin)
                })
            }
            Field::ResolutionTimeMinutes => {
                record.resolution_time_minutes = text.map_or(FieldValue::Absent, coerce_minutes)
            }
        }
    }
}
