//! Suppression Policy
//!
//! Independent vetoes applied after significance and before dispatch. Any
//! single veto holds the alert back; bookkeeping is never affected.

use crate::classifier::{classify_transition, TransitionKind};
use crate::manual_actions::ManualActionCache;
use crate::mute::MuteSwitch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use status_normalizer::CanonicalStatus;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Suppression windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionConfig {
    /// How long our own lifecycle action masks flaps (default: 300s)
    pub manual_action_window: Duration,
    /// How long a build/deploy observation masks flaps (default: 600s)
    pub transient_window: Duration,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            manual_action_window: Duration::from_secs(300),
            transient_window: Duration::from_secs(600),
        }
    }
}

/// Reason an alert was held back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Veto {
    GlobalMute,
    ManualAction,
    DeployWindow,
    TransientStatus,
}

impl Veto {
    pub fn as_str(&self) -> &'static str {
        match self {
            Veto::GlobalMute => "global_mute",
            Veto::ManualAction => "manual_action",
            Veto::DeployWindow => "deploy_window",
            Veto::TransientStatus => "transient_status",
        }
    }
}

impl fmt::Display for Veto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the policy needs to know about one candidate alert
#[derive(Debug, Clone)]
pub struct SuppressionContext<'a> {
    pub service_id: &'a str,
    pub old: CanonicalStatus,
    pub new: CanonicalStatus,
    /// Durable counterpart of the in-memory manual-action mark
    pub last_our_action_at: Option<DateTime<Utc>>,
    pub last_transient_status_at: Option<DateTime<Utc>>,
    pub deploy_window_until: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    /// Monotonic clock for the manual-action cache
    pub instant: Instant,
}

/// Layers of vetoes over significant transitions
#[derive(Debug, Clone, Default)]
pub struct SuppressionPolicy {
    config: SuppressionConfig,
}

/// `at` lies within `window` before `now`; future stamps count as recent
fn within(at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    match (now - at).to_std() {
        Ok(elapsed) => elapsed < window,
        Err(_) => true,
    }
}

impl SuppressionPolicy {
    pub fn new(config: SuppressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuppressionConfig {
        &self.config
    }

    /// First veto that applies, or `None` when the alert may go out
    pub fn check(
        &self,
        ctx: &SuppressionContext<'_>,
        marks: &ManualActionCache,
        mute: &MuteSwitch,
    ) -> Option<Veto> {
        let veto = self.first_veto(ctx, marks, mute);
        if let Some(veto) = veto {
            debug!(
                service_id = ctx.service_id,
                old = %ctx.old,
                new = %ctx.new,
                veto = %veto,
                "Alert suppressed"
            );
        }
        veto
    }

    fn first_veto(
        &self,
        ctx: &SuppressionContext<'_>,
        marks: &ManualActionCache,
        mute: &MuteSwitch,
    ) -> Option<Veto> {
        if mute.is_muted(ctx.now) {
            return Some(Veto::GlobalMute);
        }

        let kind = classify_transition(ctx.old, ctx.new);
        let deploy_outcome = kind.is_some_and(|k| k.is_deploy_outcome());

        // A finished deploy is news even right after we resumed the service
        if !deploy_outcome && self.manual_action_recent(ctx, marks) {
            return Some(Veto::ManualAction);
        }

        if matches!(kind, Some(TransitionKind::WentDown | TransitionKind::Recovered)) {
            if ctx.deploy_window_until.is_some_and(|until| until > ctx.now) {
                return Some(Veto::DeployWindow);
            }
            if ctx
                .last_transient_status_at
                .is_some_and(|at| within(at, ctx.now, self.config.transient_window))
            {
                return Some(Veto::TransientStatus);
            }
        }

        None
    }

    fn manual_action_recent(&self, ctx: &SuppressionContext<'_>, marks: &ManualActionCache) -> bool {
        marks.is_active(ctx.service_id, ctx.instant)
            || ctx
                .last_our_action_at
                .is_some_and(|at| within(at, ctx.now, self.config.manual_action_window))
    }
}
