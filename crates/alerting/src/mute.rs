//! Global Mute

use chrono::{DateTime, Utc};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MuteError {
    #[error("Mute duration out of range: {0:?}")]
    OutOfRange(Duration),
}

/// Process-wide "muted until" switch; an expired mute reads as unmuted
#[derive(Debug, Default)]
pub struct MuteSwitch {
    until: RwLock<Option<DateTime<Utc>>>,
}

impl MuteSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mute_until(&self, until: DateTime<Utc>) {
        info!(until = %until, "Alerts muted");
        *self.until.write().unwrap_or_else(|e| e.into_inner()) = Some(until);
    }

    /// Mute for `duration` from `now`; returns the expiry
    pub fn mute_for(&self, duration: Duration, now: DateTime<Utc>) -> Result<DateTime<Utc>, MuteError> {
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(MuteError::OutOfRange(duration))?;
        self.mute_until(until);
        Ok(until)
    }

    pub fn unmute(&self) {
        info!("Alerts unmuted");
        *self.until.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Expiry of the mute in force at `now`, if any
    pub fn muted_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let until = *self.until.read().unwrap_or_else(|e| e.into_inner());
        until.filter(|until| *until > now)
    }

    pub fn is_muted(&self, now: DateTime<Utc>) -> bool {
        self.muted_until(now).is_some()
    }
}
