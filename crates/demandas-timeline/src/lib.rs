pub mod aggregate;
pub mod batch;
pub mod error;
pub mod scope;

pub use aggregate::{
    DailyTeamMetric, DailyTotal, DataQuality, Summary, TeamDetail, TimelineReport, aggregate,
};
pub use batch::{metrics_to_batch, teams_to_batch};
pub use error::TimelineError;
pub use scope::Scope;
