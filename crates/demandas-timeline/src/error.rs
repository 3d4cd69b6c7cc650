use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("scope start {start} is after end {end}")]
    InvertedScope { start: NaiveDate, end: NaiveDate },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
