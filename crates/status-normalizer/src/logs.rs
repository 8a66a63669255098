//! Log Line Classification

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// How bad an error line in a service log is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Error,
    /// Alerted on its own, regardless of the per-service threshold
    Critical,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

static ERROR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\berror\b",
        r"(?i)\bexception\b",
        r"(?i)\bfailed\b",
        r"(?i)\bcrash\b",
        r"(?i)\bfatal\b",
        r"(?i)traceback",
        r"(?i)stack trace",
        // HTTP 4xx/5xx status codes
        r"\b[45]\d{2}\b",
        r"(?i)uncaught",
        r"(?i)unhandled",
    ])
});

static CRITICAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)fatal",
        r"(?i)segmentation fault",
        r"(?i)out of memory",
        r"(?i)disk full",
        r"(?i)database.*(down|unreachable)",
        r"(?i)connection refused",
        r"(?i)timeout",
    ])
});

/// Lines that mention errors without reporting one
static IGNORE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"(?i)error:\s*0\b", r"(?i)no error", r"(?i)errorless"])
});

/// Classify one log line; `None` when it does not report an error.
///
/// Only lines that match an error pattern can be critical.
pub fn classify_log_line(text: &str) -> Option<LogSeverity> {
    if IGNORE_PATTERNS.iter().any(|re| re.is_match(text)) {
        return None;
    }
    if !ERROR_PATTERNS.iter().any(|re| re.is_match(text)) {
        return None;
    }
    if CRITICAL_PATTERNS.iter().any(|re| re.is_match(text)) {
        Some(LogSeverity::Critical)
    } else {
        Some(LogSeverity::Error)
    }
}
