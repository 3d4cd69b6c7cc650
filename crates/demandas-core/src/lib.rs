pub mod aliases;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod schema;
pub mod text;

pub use aliases::{AliasTable, FuzzyMatch};
pub use config::{AliasConfig, CorrectorConfig, DetectorConfig, PipelineConfig};
pub use error::ConfigError;
pub use model::{
    DemandRecord, Field, FieldValue, QualityState, Status, StatusBucket, Team, ValidDemand,
};
pub use normalize::{FailureReason, NormalizedBatch, Normalizer, ParseFailure, RawRow};
pub use schema::{records_to_batch, tables};
pub use text::fold;
