//! Vendor Status Normalization
//!
//! Raw statuses are matched against an ordered rule table. All exact rules
//! are tried before any substring rule, and within each group the order is
//! online, offline, deploying. The first matching rule decides.

use crate::status::CanonicalStatus;
use crate::status::CanonicalStatus::{Deploying, Offline, Online};
use tracing::trace;

/// How a rule matches a lowercased, trimmed raw status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Whole-string equality
    Exact(&'static str),
    /// Substring anywhere in the status
    Contains(&'static str),
}

impl Match {
    fn matches(&self, status: &str) -> bool {
        match self {
            Match::Exact(term) => status == *term,
            Match::Contains(term) => status.contains(term),
        }
    }
}

/// A single (predicate, result) row of the normalization table
#[derive(Debug, Clone, Copy)]
pub struct StatusRule {
    pub pattern: Match,
    pub status: CanonicalStatus,
}

const fn exact(term: &'static str, status: CanonicalStatus) -> StatusRule {
    StatusRule {
        pattern: Match::Exact(term),
        status,
    }
}

const fn contains(term: &'static str, status: CanonicalStatus) -> StatusRule {
    StatusRule {
        pattern: Match::Contains(term),
        status,
    }
}

/// Ordered normalization rules; earlier rows win
pub static STATUS_RULES: &[StatusRule] = &[
    // exact, online
    exact("running", Online),
    exact("deployed", Online),
    exact("active", Online),
    exact("healthy", Online),
    exact("succeeded", Online),
    exact("success", Online),
    exact("completed", Online),
    exact("finished", Online),
    // exact, offline
    exact("suspended", Offline),
    exact("stopped", Offline),
    exact("failed", Offline),
    exact("error", Offline),
    exact("crashed", Offline),
    exact("canceled", Offline),
    exact("cancelled", Offline),
    exact("aborted", Offline),
    exact("unavailable", Offline),
    exact("not_ready", Offline),
    // exact, deploying
    exact("deploying", Deploying),
    exact("building", Deploying),
    exact("starting", Deploying),
    exact("restarting", Deploying),
    // substring, online
    contains("live", Online),
    contains("ready", Online),
    contains("ok", Online),
    contains("available", Online),
    // substring, offline
    contains("unhealthy", Offline),
    contains("inactive", Offline),
    contains("down", Offline),
    // substring, deploying
    contains("deploy", Deploying),
    contains("build", Deploying),
    contains("start", Deploying),
    contains("progress", Deploying),
    contains("provision", Deploying),
    contains("pending", Deploying),
    contains("queue", Deploying),
];

/// Map a raw vendor status to its canonical form.
///
/// Total: empty, missing and unclassifiable input all yield
/// [`CanonicalStatus::Unknown`].
pub fn normalize(raw: Option<&str>) -> CanonicalStatus {
    let Some(raw) = raw else {
        return CanonicalStatus::Unknown;
    };

    let status = raw.trim().to_lowercase();
    if status.is_empty() {
        return CanonicalStatus::Unknown;
    }

    let result = STATUS_RULES
        .iter()
        .find(|rule| rule.pattern.matches(&status))
        .map(|rule| rule.status)
        .unwrap_or(CanonicalStatus::Unknown);

    trace!(raw = %raw, canonical = %result, "Normalized status");
    result
}
