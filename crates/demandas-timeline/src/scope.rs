//! Aggregation scope: an inclusive date range, a team filter, and an
//! optional status bucket.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use demandas_core::{Status, StatusBucket, Team};

use crate::error::TimelineError;

/// Which records an aggregation covers. Unbounded by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    /// `None` means every team.
    teams: Option<BTreeSet<Team>>,
    /// `None` means both buckets.
    bucket: Option<StatusBucket>,
}

impl Scope {
    pub fn all() -> Self {
        Self::default()
    }

    /// Validated scope. An empty team list selects every team.
    pub fn new(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        teams: impl IntoIterator<Item = Team>,
    ) -> Result<Self, TimelineError> {
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(TimelineError::InvertedScope { start, end });
        }
        let teams: BTreeSet<Team> = teams.into_iter().collect();
        Ok(Self {
            start,
            end,
            teams: (!teams.is_empty()).then_some(teams),
            bucket: None,
        })
    }

    /// Keep only statuses counting towards `bucket`.
    pub fn with_bucket(mut self, bucket: Option<StatusBucket>) -> Self {
        self.bucket = bucket;
        self
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn teams(&self) -> Option<&BTreeSet<Team>> {
        self.teams.as_ref()
    }

    pub fn bucket(&self) -> Option<StatusBucket> {
        self.bucket
    }

    /// Whether `status` passes the bucket filter.
    pub fn admits(&self, status: Status) -> bool {
        self.bucket.is_none_or(|b| status.bucket() == b)
    }

    pub fn contains(&self, date: NaiveDate, team: Team) -> bool {
        self.start.is_none_or(|s| date >= s)
            && self.end.is_none_or(|e| date <= e)
            && self.teams.as_ref().is_none_or(|t| t.contains(&team))
    }
}
