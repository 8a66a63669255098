//! Significance Classifier

use serde::{Deserialize, Serialize};
use status_normalizer::CanonicalStatus::{self, Deploying, Offline, Online};
use std::fmt;

/// Per-service switches that affect significance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificanceConfig {
    pub notify_on_deploy_enabled: bool,
}

/// What a transition means to a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    WentDown,
    Recovered,
    DeploySucceeded,
    DeployFailed,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::WentDown => "went down",
            TransitionKind::Recovered => "recovered",
            TransitionKind::DeploySucceeded => "deploy succeeded",
            TransitionKind::DeployFailed => "deploy failed",
        }
    }

    /// A deploy finishing rather than a running service flapping
    pub fn is_deploy_outcome(&self) -> bool {
        matches!(self, TransitionKind::DeploySucceeded | TransitionKind::DeployFailed)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name the transition, if it is one of the four alertable pairs
pub fn classify_transition(old: CanonicalStatus, new: CanonicalStatus) -> Option<TransitionKind> {
    match (old, new) {
        (Online, Offline) => Some(TransitionKind::WentDown),
        (Offline, Online) => Some(TransitionKind::Recovered),
        (Deploying, Online) => Some(TransitionKind::DeploySucceeded),
        (Deploying, Offline) => Some(TransitionKind::DeployFailed),
        _ => None,
    }
}

/// Whether `old -> new` warrants an alert.
///
/// `old == None` is the baseline observation and never alerts. Deploy
/// outcomes only count when deploy notifications are enabled.
pub fn is_significant(
    old: Option<CanonicalStatus>,
    new: CanonicalStatus,
    config: SignificanceConfig,
) -> bool {
    let Some(old) = old else {
        return false;
    };
    match classify_transition(old, new) {
        Some(kind) if kind.is_deploy_outcome() => config.notify_on_deploy_enabled,
        Some(_) => true,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use status_normalizer::CanonicalStatus::Unknown;

    const DEPLOY_ON: SignificanceConfig = SignificanceConfig {
        notify_on_deploy_enabled: true,
    };
    const DEPLOY_OFF: SignificanceConfig = SignificanceConfig {
        notify_on_deploy_enabled: false,
    };

    fn any_status() -> impl Strategy<Value = CanonicalStatus> {
        prop::sample::select(CanonicalStatus::ALL.to_vec())
    }

    fn any_config() -> impl Strategy<Value = SignificanceConfig> {
        any::<bool>().prop_map(|notify_on_deploy_enabled| SignificanceConfig {
            notify_on_deploy_enabled,
        })
    }

    #[test]
    fn test_flaps_always_significant() {
        for cfg in [DEPLOY_ON, DEPLOY_OFF] {
            assert!(is_significant(Some(Online), Offline, cfg));
            assert!(is_significant(Some(Offline), Online, cfg));
        }
    }

    #[test]
    fn test_deploy_outcomes_follow_flag() {
        assert!(is_significant(Some(Deploying), Online, DEPLOY_ON));
        assert!(is_significant(Some(Deploying), Offline, DEPLOY_ON));
        assert!(!is_significant(Some(Deploying), Online, DEPLOY_OFF));
        assert!(!is_significant(Some(Deploying), Offline, DEPLOY_OFF));
    }

    #[test]
    fn test_entering_deploy_and_unknown_are_quiet() {
        assert!(!is_significant(Some(Online), Deploying, DEPLOY_ON));
        assert!(!is_significant(Some(Unknown), Online, DEPLOY_ON));
        assert!(!is_significant(Some(Offline), Unknown, DEPLOY_ON));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(classify_transition(Online, Offline), Some(TransitionKind::WentDown));
        assert_eq!(TransitionKind::DeployFailed.to_string(), "deploy failed");
        assert!(!TransitionKind::Recovered.is_deploy_outcome());
    }

    proptest! {
        #[test]
        fn prop_no_op_never_significant(status in any_status(), cfg in any_config()) {
            prop_assert!(!is_significant(Some(status), status, cfg));
        }

        #[test]
        fn prop_baseline_never_significant(status in any_status(), cfg in any_config()) {
            prop_assert!(!is_significant(None, status, cfg));
        }

        #[test]
        fn prop_unknown_never_significant(status in any_status(), cfg in any_config()) {
            prop_assert!(!is_significant(Some(Unknown), status, cfg));
            prop_assert!(!is_significant(Some(status), Unknown, cfg));
        }

        #[test]
        fn prop_enabling_deploys_only_adds(
            old in any_status(),
            new in any_status(),
        ) {
            if is_significant(Some(old), new, DEPLOY_OFF) {
                prop_assert!(is_significant(Some(old), new, DEPLOY_ON));
            }
        }
    }
}
