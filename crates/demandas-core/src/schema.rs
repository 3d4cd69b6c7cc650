use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Date32Array, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::Date32Type;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::model::DemandRecord;

/// Arrow schemas for corrected records and derived metrics.
pub mod tables {
    use arrow::datatypes::{DataType, Field, Schema};

    /// Schema for corrected demand records.
    pub fn record_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("row", DataType::UInt64, false),
            Field::new("date", DataType::Date32, true),
            Field::new("team", DataType::Utf8, true),
            Field::new("status", DataType::Utf8, true),
            Field::new("resolution_time_minutes", DataType::Float64, true),
            Field::new("origin", DataType::Utf8, true),
            Field::new("responsible", DataType::Utf8, true),
            Field::new("rejected", DataType::Utf8, true),
            Field::new("flagged_outlier", DataType::Boolean, false),
        ])
    }

    /// Schema for per-(date, team) metrics.
    pub fn daily_metric_schema() -> Schema {
        Schema::new(vec![
            Field::new("date", DataType::Date32, false),
            Field::new("team", DataType::Utf8, false),
            Field::new("total", DataType::UInt64, false),
            Field::new("resolved", DataType::UInt64, false),
            Field::new("pending", DataType::UInt64, false),
            Field::new("efficiency", DataType::Float64, true),
            Field::new("average_resolution_minutes", DataType::Float64, true),
        ])
    }

    /// Schema for the per-team summary table.
    pub fn team_detail_schema() -> Schema {
        Schema::new(vec![
            Field::new("team", DataType::Utf8, false),
            Field::new("total", DataType::UInt64, false),
            Field::new("resolved", DataType::UInt64, false),
            Field::new("pending", DataType::UInt64, false),
            Field::new("efficiency", DataType::Float64, true),
            Field::new("daily_average", DataType::Float64, true),
            Field::new("weekly_average", DataType::Float64, true),
        ])
    }
}

/// Columnar view of records. Malformed team/status cells show their raw text.
pub fn records_to_batch(records: &[DemandRecord]) -> Result<RecordBatch, ArrowError> {
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let rows: Vec<u64> = records.iter().map(|r| r.row as u64).collect();
    let dates: Date32Array = records
        .iter()
        .map(|r| r.date.value().map(Date32Type::from_naive_date))
        .collect();
    let teams: StringArray = records.iter().map(|r| r.team.text()).collect();
    let statuses: StringArray = records.iter().map(|r| r.status.text()).collect();
    let minutes: Float64Array = records
        .iter()
        .map(|r| r.resolution_time_minutes.value())
        .collect();
    let origins: StringArray = records.iter().map(|r| r.origin.as_deref()).collect();
    let responsible: StringArray = records.iter().map(|r| r.responsible.as_deref()).collect();
    let rejected: StringArray = records
        .iter()
        .map(|r| {
            (!r.quality.rejected.is_empty()).then(|| {
                r.quality
                    .rejected
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
        })
        .collect();
    let outliers: BooleanArray = records
        .iter()
        .map(|r| Some(r.quality.flagged_outlier))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(UInt64Array::from(rows)),
        Arc::new(dates),
        Arc::new(teams),
        Arc::new(statuses),
        Arc::new(minutes),
        Arc::new(origins),
        Arc::new(responsible),
        Arc::new(rejected),
        Arc::new(outliers),
    ];
    RecordBatch::try_new(Arc::new(tables::record_schema()), columns)
}
