//! Deploy Outcome Classification

use crate::normalizer::normalize;
use crate::status::CanonicalStatus;
use serde::{Deserialize, Serialize};

/// Deploy statuses reported as a successful finish
const SUCCESS_TERMS: &[&str] = &["succeeded", "success", "completed", "deployed", "live"];

/// Deploy statuses reported as an unsuccessful finish
const FAILURE_TERMS: &[&str] = &["failed", "error", "canceled", "cancelled", "aborted"];

/// Terminal result of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployOutcome {
    Succeeded,
    Failed,
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeployOutcome::Succeeded)
    }
}

/// Classify a deploy status as terminal.
///
/// Returns `None` while the deploy is still in progress (or the status is
/// unrecognized), so the caller re-checks on the next cycle.
pub fn classify_deploy_status(status: &str) -> Option<DeployOutcome> {
    let status = status.trim().to_lowercase();

    if SUCCESS_TERMS.contains(&status.as_str()) {
        return Some(DeployOutcome::Succeeded);
    }
    // Vendor phase failures such as "build_failed" or "update_failed"
    if FAILURE_TERMS.contains(&status.as_str()) || status.ends_with("_failed") {
        return Some(DeployOutcome::Failed);
    }

    match normalize(Some(&status)) {
        CanonicalStatus::Online => Some(DeployOutcome::Succeeded),
        CanonicalStatus::Offline => Some(DeployOutcome::Failed),
        CanonicalStatus::Deploying | CanonicalStatus::Unknown => None,
    }
}
