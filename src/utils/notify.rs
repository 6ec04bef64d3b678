//! Non-blocking user notifications
//!
//! Failures that must not propagate to the caller end up here instead. Each
//! notification is logged and queued; the presentation layer drains the
//! queue whenever it renders.

use log::{info, warn};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

/// Shared, cloneable notification queue
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    queue: Arc<Mutex<Vec<Notification>>>,
}

impl Notifier {
    pub fn new() -> Notifier {
        Notifier::default()
    }

    pub fn push(&self, title: &str, description: &str, variant: Variant) {
        match variant {
            Variant::Default => info!("{title}: {description}"),
            Variant::Destructive => warn!("{title}: {description}"),
        }
        let notification = Notification {
            title: title.to_string(),
            description: description.to_string(),
            variant,
        };
        match self.queue.lock() {
            Ok(mut queue) => queue.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }

    pub fn success(&self, title: &str, description: &str) {
        self.push(title, description, Variant::Default);
    }

    pub fn failure(&self, title: &str, description: &str) {
        self.push(title, description, Variant::Destructive);
    }

    /// Take every pending notification, oldest first
    pub fn drain(&self) -> Vec<Notification> {
        match self.queue.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_in_order_and_empties() {
        let notifier = Notifier::new();
        notifier.success("Funded", "ok");
        notifier.failure("Transaction Failed", "nope");

        let drained = notifier.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].variant, Variant::Default);
        assert_eq!(drained[1].title, "Transaction Failed");
        assert!(notifier.drain().is_empty());
    }

    #[test]
    fn test_clones_share_the_queue() {
        let notifier = Notifier::new();
        let clone = notifier.clone();
        clone.failure("Withdrawal Failed", "reverted");
        assert_eq!(notifier.drain().len(), 1);
    }
}
