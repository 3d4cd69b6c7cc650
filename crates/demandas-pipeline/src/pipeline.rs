//! One batch run: normalize → cohort pass → parallel detect/correct → barrier
//! → aggregate.
//!
//! Cohort statistics are computed once over the whole normalized batch and
//! shared read-only with every worker. Per-record audit entries are merged
//! after the parallel stage in input order.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use demandas_core::{AliasTable, DemandRecord, Normalizer, ParseFailure, PipelineConfig, RawRow};
use demandas_quality::{AuditLog, CohortStats, CorrectionAuditEntry, Corrector, Detector};
use demandas_timeline::{Scope, TimelineReport, aggregate};

use crate::error::PipelineError;

/// Where every input row ended up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conservation {
    pub input_rows: u64,
    pub aggregated: u64,
    pub unresolved: u64,
    pub parse_failed: u64,
    pub out_of_scope: u64,
}

impl Conservation {
    /// Each row is counted in exactly one bucket.
    pub fn is_balanced(&self) -> bool {
        self.aggregated + self.unresolved + self.parse_failed + self.out_of_scope
            == self.input_rows
    }
}

/// Everything one batch run produces.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Corrected records, in input order.
    pub records: Vec<DemandRecord>,
    pub failures: Vec<ParseFailure>,
    pub audit: AuditLog,
    pub timeline: TimelineReport,
    pub counts: Conservation,
    pub elapsed_secs: f64,
}

/// Configured pipeline. Holds the alias table and, when `workers` is set, a
/// dedicated worker pool.
pub struct Pipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
    pool: Option<rayon::ThreadPool>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let aliases = AliasTable::from_config(&config.aliases)?;
        let pool = match config.workers {
            Some(n) => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };

        let (team_keys, status_keys) = aliases.key_counts();
        tracing::info!(
            team_keys,
            status_keys,
            roster = aliases.roster_len(),
            workers = ?config.workers,
            "pipeline ready"
        );

        Ok(Self {
            config,
            normalizer: Normalizer::new(aliases),
            pool,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run the full batch. Data problems never fail the run.
    pub fn run(&self, rows: &[RawRow], scope: &Scope, at: DateTime<Utc>) -> BatchReport {
        let start = Instant::now();

        let normalized = self.normalizer.normalize_batch(rows);
        let (records, audit) = self.correct(&normalized.records, at);
        let timeline = aggregate(&records, scope);

        let counts = Conservation {
            input_rows: rows.len() as u64,
            aggregated: timeline.included(),
            unresolved: timeline.data_quality.unresolved,
            parse_failed: normalized.failures.len() as u64,
            out_of_scope: timeline.data_quality.out_of_scope,
        };
        if !counts.is_balanced() {
            tracing::warn!(?counts, "row accounting does not balance");
        }

        let elapsed_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            rows = counts.input_rows,
            aggregated = counts.aggregated,
            unresolved = counts.unresolved,
            parse_failed = counts.parse_failed,
            corrections = audit.len(),
            elapsed_secs,
            "batch complete"
        );

        BatchReport {
            records,
            failures: normalized.failures,
            audit,
            timeline,
            counts,
            elapsed_secs,
        }
    }

    /// Cohort pass, then detect and correct every record in parallel.
    ///
    /// Output order matches input order; the audit log lists each record's
    /// entries together, records in input order.
    pub fn correct(&self, records: &[DemandRecord], at: DateTime<Utc>) -> (Vec<DemandRecord>, AuditLog) {
        let aliases = self.normalizer.aliases();
        let cohorts = CohortStats::build(records, aliases, &self.config.detector);
        let detector = Detector::new(aliases, &self.config.detector, &cohorts);
        let corrector = Corrector::new(&self.config.corrector);

        let stage = || -> Vec<(DemandRecord, Vec<CorrectionAuditEntry>)> {
            records
                .par_iter()
                .map(|record| {
                    let flags = detector.detect(record);
                    corrector.correct(record, &flags, at).into_owned()
                })
                .collect()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(stage),
            None => stage(),
        };

        let (corrected, parts): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        let changed = parts.iter().filter(|p| !p.is_empty()).count();
        let mut audit = AuditLog::new();
        audit.merge(parts);

        tracing::info!(
            records = corrected.len(),
            changed,
            entries = audit.len(),
            "detect/correct stage done"
        );
        (corrected, audit)
    }
}

/// Build a pipeline from `config` and run one batch.
pub fn run_batch(
    rows: &[RawRow],
    config: PipelineConfig,
    scope: &Scope,
    at: DateTime<Utc>,
) -> Result<BatchReport, PipelineError> {
    Ok(Pipeline::new(config)?.run(rows, scope, at))
}
