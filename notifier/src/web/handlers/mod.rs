//! HTTP request handlers for the notifier API.
//!
//! - `common` - response envelope shared by all handlers
//! - `health` - liveness and store reachability
//! - `push` - VAPID public key and subscription registration
//! - `reminders` - reminder statistics

pub mod common;
pub mod health;
pub mod push;
pub mod reminders;

pub use health::*;
pub use push::*;
pub use reminders::*;
