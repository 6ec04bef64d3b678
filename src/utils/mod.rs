//! Utility helpers
//!
//! Currently only the user notification queue.

pub mod notify;

pub use notify::{Notification, Notifier, Variant};
