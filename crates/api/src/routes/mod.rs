//! Route Handlers

pub mod deploy_hooks;
pub mod mute;
pub mod services;
