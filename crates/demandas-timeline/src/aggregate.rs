//! Timeline Aggregator.
//!
//! Rebuilds every metric from the full corrected record set on each run.
//! Unresolved records are excluded and counted; records outside the scope are
//! counted separately so every input record is accounted for.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use demandas_core::{DemandRecord, StatusBucket, Team, ValidDemand};

use crate::scope::Scope;

/// Metrics for one (date, team) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTeamMetric {
    pub date: NaiveDate,
    pub team: Team,
    pub total: u64,
    pub resolved: u64,
    pub pending: u64,
    /// Resolved over total; `None` when the group is empty.
    pub efficiency: Option<f64>,
    /// Mean resolution time of resolved records that carry one.
    #[serde(rename = "dailyAverage")]
    pub average_resolution_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: u64,
    pub resolved: u64,
    /// Resolved demands per calendar day of the covered span.
    pub daily_average: Option<f64>,
    pub efficiency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDetail {
    pub name: Team,
    pub total: u64,
    pub resolved: u64,
    pub pending: u64,
    pub efficiency: Option<f64>,
    pub daily_average: Option<f64>,
    pub weekly_average: Option<f64>,
}

/// One point of the per-day line chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: u64,
    pub resolved: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    /// Records excluded because a required field could not be fixed.
    pub unresolved: u64,
    /// Included records tagged as statistical outliers.
    pub flagged_outliers: u64,
    /// Valid records that fall outside the scope.
    pub out_of_scope: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineReport {
    pub summary: Summary,
    pub teams: Vec<TeamDetail>,
    pub daily: Vec<DailyTotal>,
    pub metrics: Vec<DailyTeamMetric>,
    pub data_quality: DataQuality,
}

impl TimelineReport {
    /// Records counted into the metrics.
    pub fn included(&self) -> u64 {
        self.summary.total
    }
}

// ── Accumulation ──

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    total: u64,
    resolved: u64,
    minutes_sum: f64,
    minutes_count: u64,
}

impl Tally {
    fn add(&mut self, demand: &ValidDemand<'_>) {
        self.total += 1;
        if demand.status.bucket() == StatusBucket::Resolved {
            self.resolved += 1;
            if let Some(m) = demand.resolution_time_minutes {
                self.minutes_sum += m;
                self.minutes_count += 1;
            }
        }
    }

    fn pending(&self) -> u64 {
        self.total - self.resolved
    }

    fn efficiency(&self) -> Option<f64> {
        ratio(self.resolved, self.total)
    }

    fn average_minutes(&self) -> Option<f64> {
        (self.minutes_count > 0).then(|| self.minutes_sum / self.minutes_count as f64)
    }
}

fn ratio(num: u64, den: u64) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// Aggregate corrected records within `scope`.
pub fn aggregate(records: &[DemandRecord], scope: &Scope) -> TimelineReport {
    let mut quality = DataQuality::default();
    let mut groups: BTreeMap<(NaiveDate, Team), Tally> = BTreeMap::new();
    let mut by_team: BTreeMap<Team, Tally> = BTreeMap::new();
    let mut by_day: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    let mut overall = Tally::default();

    for record in records {
        // Unresolved, or a required field never reached its closed set.
        let Some(demand) = record.valid() else {
            quality.unresolved += 1;
            continue;
        };
        if !scope.contains(demand.date, demand.team) || !scope.admits(demand.status) {
            quality.out_of_scope += 1;
            continue;
        }
        if demand.flagged_outlier {
            quality.flagged_outliers += 1;
        }

        groups.entry((demand.date, demand.team)).or_default().add(&demand);
        by_team.entry(demand.team).or_default().add(&demand);
        by_day.entry(demand.date).or_default().add(&demand);
        overall.add(&demand);
    }

    // Inclusive day count between the first and last included dates.
    let span_days = match (by_day.keys().next(), by_day.keys().next_back()) {
        (Some(first), Some(last)) => Some((*last - *first).num_days() as u64 + 1),
        _ => None,
    };
    let per_day = |resolved: u64| span_days.map(|days| resolved as f64 / days as f64);

    let metrics: Vec<DailyTeamMetric> = groups
        .iter()
        .map(|(&(date, team), t)| DailyTeamMetric {
            date,
            team,
            total: t.total,
            resolved: t.resolved,
            pending: t.pending(),
            efficiency: t.efficiency(),
            average_resolution_minutes: t.average_minutes(),
        })
        .collect();

    let teams = by_team
        .iter()
        .map(|(&name, t)| {
            let daily_average = per_day(t.resolved);
            TeamDetail {
                name,
                total: t.total,
                resolved: t.resolved,
                pending: t.pending(),
                efficiency: t.efficiency(),
                daily_average,
                weekly_average: daily_average.map(|d| d * 7.0),
            }
        })
        .collect();

    let daily = by_day
        .iter()
        .map(|(&date, t)| DailyTotal {
            date,
            total: t.total,
            resolved: t.resolved,
        })
        .collect();

    let summary = Summary {
        total: overall.total,
        resolved: overall.resolved,
        daily_average: per_day(overall.resolved),
        efficiency: overall.efficiency(),
    };

    tracing::info!(
        included = summary.total,
        metrics = metrics.len(),
        unresolved = quality.unresolved,
        out_of_scope = quality.out_of_scope,
        "aggregated timeline"
    );

    TimelineReport {
        summary,
        teams,
        daily,
        metrics,
        data_quality: quality,
    }
}
