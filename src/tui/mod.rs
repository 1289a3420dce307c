//! Terminal User Interface module for lookout
//!
//! This module provides the keyboard-driven front end for `lookout serve`.
//! It presents pending agent interactions (questions and approvals), the
//! session's progress, and a log of what the agent has been doing.

#[cfg(feature = "tui")]
mod activity;
#[cfg(feature = "tui")]
mod app;
#[cfg(feature = "tui")]
mod views;

#[cfg(feature = "tui")]
pub use activity::{ActivityLevel, ActivityLog};
#[cfg(feature = "tui")]
pub use app::run_tui;
