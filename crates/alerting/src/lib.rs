//! Alerting Rules
//!
//! Decides whether a status transition is worth an alert and whether an
//! otherwise significant alert must be held back. Also remembers which log
//! error lines were already alerted on.

mod classifier;
mod manual_actions;
mod mute;
mod seen_logs;
mod suppression;

pub use classifier::{classify_transition, is_significant, SignificanceConfig, TransitionKind};
pub use manual_actions::ManualActionCache;
pub use mute::{MuteError, MuteSwitch};
pub use seen_logs::{SeenLogCache, DEFAULT_SEEN_LOG_CAPACITY};
pub use suppression::{SuppressionConfig, SuppressionContext, SuppressionPolicy, Veto};
