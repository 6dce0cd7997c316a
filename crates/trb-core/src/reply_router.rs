//! Routing of owner/admin replies back to the original sender.
//!
//! A binding is created when a relayed message lands in the relay chat and maps
//! that outbound message to the agent who wrote it. Bindings live in a bounded
//! concurrent cache: capacity and time-to-live keep memory flat over long uptime,
//! and an evicted binding behaves exactly like one that never existed.

use std::time::Duration;

use moka::sync::Cache;

use crate::domain::{MessageRef, UserId};

#[derive(Clone)]
pub struct ReplyRouter {
    bindings: Cache<MessageRef, UserId>,
}

impl ReplyRouter {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let bindings = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { bindings }
    }

    /// Register `forwarded -> sender`. Last write wins.
    pub fn bind(&self, forwarded: MessageRef, sender: UserId) {
        self.bindings.insert(forwarded, sender);
    }

    /// Pure lookup; the binding stays in place for repeat replies.
    pub fn resolve(&self, forwarded: MessageRef) -> Option<UserId> {
        self.bindings.get(&forwarded)
    }

    /// Approximate number of live bindings.
    pub fn len(&self) -> u64 {
        self.bindings.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn sync(&self) {
        self.bindings.run_pending_tasks();
    }
}
