//! Status Normalization
//!
//! Maps noisy vendor status strings onto a small canonical set and classifies
//! deployment outcomes, commit messages and service log lines.

mod commit;
mod deploy;
mod error;
mod logs;
mod normalizer;
mod status;

pub use commit::{classify_commit, ChangeKind};
pub use deploy::{classify_deploy_status, DeployOutcome};
pub use error::StatusParseError;
pub use logs::{classify_log_line, LogSeverity};
pub use normalizer::{normalize, Match, StatusRule, STATUS_RULES};
pub use status::CanonicalStatus;
