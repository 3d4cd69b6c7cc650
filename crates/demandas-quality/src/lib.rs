pub mod audit;
pub mod candidates;
pub mod cohort;
pub mod corrector;
pub mod detector;

pub use audit::{AuditLog, CorrectionAuditEntry, CorrectionMethod};
pub use cohort::{Bounds, CohortKey, CohortStats};
pub use corrector::{CorrectionOutcome, Corrector};
pub use detector::{AnomalyFlag, Candidate, Detector, FlagKind};
