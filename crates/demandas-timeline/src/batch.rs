//! Arrow export of aggregated metrics, for tabular display.

use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::Date32Type;
use arrow::record_batch::RecordBatch;

use demandas_core::tables;

use crate::aggregate::{DailyTeamMetric, TeamDetail};
use crate::error::TimelineError;

pub fn metrics_to_batch(metrics: &[DailyTeamMetric]) -> Result<RecordBatch, TimelineError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from(
            metrics
                .iter()
                .map(|m| Date32Type::from_naive_date(m.date))
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            metrics.iter().map(|m| m.team.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            metrics.iter().map(|m| m.total).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            metrics.iter().map(|m| m.resolved).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            metrics.iter().map(|m| m.pending).collect::<Vec<_>>(),
        )),
        Arc::new(metrics.iter().map(|m| m.efficiency).collect::<Float64Array>()),
        Arc::new(
            metrics
                .iter()
                .map(|m| m.average_resolution_minutes)
                .collect::<Float64Array>(),
        ),
    ];
    Ok(RecordBatch::try_new(
        Arc::new(tables::daily_metric_schema()),
        columns,
    )?)
}

pub fn teams_to_batch(teams: &[TeamDetail]) -> Result<RecordBatch, TimelineError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            teams.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            teams.iter().map(|t| t.total).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            teams.iter().map(|t| t.resolved).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            teams.iter().map(|t| t.pending).collect::<Vec<_>>(),
        )),
        Arc::new(teams.iter().map(|t| t.efficiency).collect::<Float64Array>()),
        Arc::new(teams.iter().map(|t| t.daily_average).collect::<Float64Array>()),
        Arc::new(teams.iter().map(|t| t.weekly_average).collect::<Float64Array>()),
    ];
    Ok(RecordBatch::try_new(
        Arc::new(tables::team_detail_schema()),
        columns,
    )?)
}
