//! Alert Rendering

use alerting::TransitionKind;
use serde::{Deserialize, Serialize};
use status_normalizer::{CanonicalStatus, ChangeKind, DeployOutcome, LogSeverity};

/// Longest commit message carried in a deploy alert, in characters
pub const MAX_COMMIT_CHARS: usize = 200;

/// Error lines quoted in a log alert
pub const MAX_LOG_SAMPLES: usize = 3;

/// Longest quoted log line, in characters
pub const MAX_LOG_LINE_CHARS: usize = 200;

/// An alert ready to be rendered and delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    StatusChange {
        service_id: String,
        name: String,
        old: CanonicalStatus,
        new: CanonicalStatus,
        kind: TransitionKind,
    },
    Deploy {
        service_id: String,
        name: String,
        deploy_id: String,
        status: String,
        outcome: DeployOutcome,
        change: ChangeKind,
        commit_message: Option<String>,
    },
    LogErrors {
        service_id: String,
        name: String,
        severity: LogSeverity,
        /// New error lines found by the scan
        count: usize,
        /// Oldest first, at most [`MAX_LOG_SAMPLES`]
        samples: Vec<String>,
    },
}

impl Alert {
    pub fn service_id(&self) -> &str {
        match self {
            Alert::StatusChange { service_id, .. }
            | Alert::Deploy { service_id, .. }
            | Alert::LogErrors { service_id, .. } => service_id,
        }
    }

    /// Label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::StatusChange { .. } => "status_change",
            Alert::Deploy { .. } => "deploy",
            Alert::LogErrors { .. } => "log_errors",
        }
    }

    /// Plain-text message body
    pub fn render(&self) -> String {
        match self {
            Alert::StatusChange {
                service_id,
                name,
                old,
                new,
                kind,
            } => format!("{} ({}) {}: {} -> {}", name, service_id, kind, old, new),
            Alert::Deploy {
                service_id,
                name,
                deploy_id,
                status,
                outcome,
                change,
                commit_message,
            } => {
                let verdict = if outcome.is_success() { "succeeded" } else { "failed" };
                let mut text = format!(
                    "{} ({}) deploy {} {} [{}]",
                    name, service_id, deploy_id, verdict, status
                );
                if *change == ChangeKind::DependencyUpdate {
                    text.push_str("\nDependency update");
                }
                if let Some(message) = commit_message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
                    text.push_str("\nCommit: ");
                    text.push_str(&truncate_chars(message, MAX_COMMIT_CHARS));
                }
                text
            }
            Alert::LogErrors {
                service_id,
                name,
                severity,
                count,
                samples,
            } => {
                let label = match severity {
                    LogSeverity::Critical => "critical log errors",
                    LogSeverity::Error => "log errors",
                };
                let mut text = format!("{} ({}) {}: {} new", name, service_id, label, count);
                for (i, sample) in samples.iter().take(MAX_LOG_SAMPLES).enumerate() {
                    text.push_str(&format!("\n{}. {}", i + 1, truncate_chars(sample.trim(), MAX_LOG_LINE_CHARS)));
                }
                if *count > MAX_LOG_SAMPLES {
                    text.push_str(&format!("\n...and {} more", count - MAX_LOG_SAMPLES));
                }
                text
            }
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy(commit_message: Option<&str>, change: ChangeKind) -> Alert {
        Alert::Deploy {
            service_id: "srv-a".to_string(),
            name: "api".to_string(),
            deploy_id: "dep-1".to_string(),
            status: "live".to_string(),
            outcome: DeployOutcome::Succeeded,
            change,
            commit_message: commit_message.map(str::to_string),
        }
    }

    #[test]
    fn test_status_change_text() {
        let alert = Alert::StatusChange {
            service_id: "srv-a".to_string(),
            name: "api".to_string(),
            old: CanonicalStatus::Online,
            new: CanonicalStatus::Offline,
            kind: TransitionKind::WentDown,
        };
        assert_eq!(alert.render(), "api (srv-a) went down: online -> offline");
        assert_eq!(alert.kind(), "status_change");
    }

    #[test]
    fn test_deploy_text_flags_dependency_updates() {
        let text = deploy(Some("chore(deps): bump serde"), ChangeKind::DependencyUpdate).render();
        assert!(text.starts_with("api (srv-a) deploy dep-1 succeeded [live]"));
        assert!(text.contains("Dependency update"));
        assert!(text.ends_with("Commit: chore(deps): bump serde"));
    }

    #[test]
    fn test_commit_message_truncated() {
        let long = "x".repeat(500);
        let text = deploy(Some(&long), ChangeKind::Regular).render();
        let commit = text.split("Commit: ").nth(1).unwrap();
        assert_eq!(commit.chars().count(), MAX_COMMIT_CHARS + 3);
        assert!(!text.contains("Dependency update"));
    }

    #[test]
    fn test_log_alert_quotes_first_lines() {
        let alert = Alert::LogErrors {
            service_id: "srv-a".to_string(),
            name: "api".to_string(),
            severity: LogSeverity::Critical,
            count: 5,
            samples: vec!["FATAL: out of memory".to_string(), "error: disk full".to_string()],
        };
        let text = alert.render();
        assert!(text.starts_with("api (srv-a) critical log errors: 5 new"));
        assert!(text.contains("\n1. FATAL: out of memory"));
        assert!(text.contains("\n2. error: disk full"));
        assert!(text.ends_with("...and 2 more"));
        assert_eq!(alert.kind(), "log_errors");
    }

    #[test]
    fn test_blank_commit_omitted() {
        assert!(!deploy(Some("   "), ChangeKind::Regular).render().contains("Commit"));
        assert!(!deploy(None, ChangeKind::Regular).render().contains("Commit"));
    }
}
