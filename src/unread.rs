//! Unread accounting
//!
//! Two cooperating counters: the global unread total and the per-sender
//! breakdown. The store's query surface offers no server-side grouping, so
//! the client fetches the flat unread set and tallies locally. Counters
//! are always recomputed from scratch after any mutation that could move
//! them; incremental patching would drift on missed events.

use crate::store::{Store, UserId};
use crate::Result;
use std::collections::HashMap;

/// Unread-message counters for one viewer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnreadCounts {
    /// Count of all unread messages addressed to the viewer
    pub total: usize,
    /// Unread counts grouped by sending user
    pub by_sender: HashMap<UserId, usize>,
}

impl UnreadCounts {
    /// Recompute counters from the store
    pub async fn fetch(store: &Store, viewer: &UserId) -> Result<Self> {
        let senders = store.unread_senders(viewer).await?;

        let mut by_sender: HashMap<UserId, usize> = HashMap::new();
        for sender in &senders {
            *by_sender.entry(sender.clone()).or_insert(0) += 1;
        }

        Ok(Self {
            total: senders.len(),
            by_sender,
        })
    }

    /// Unread count from one specific sender
    pub fn from_sender(&self, sender: &str) -> usize {
        self.by_sender.get(sender).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_group_by_sender() {
        let store = Store::new_in_memory().expect("store");
        store.insert_message("alice", "me", "one").await.expect("send");
        store.insert_message("alice", "me", "two").await.expect("send");
        store.insert_message("carol", "me", "three").await.expect("send");
        // Addressed to someone else; must not count
        store.insert_message("alice", "bob", "four").await.expect("send");

        let counts = UnreadCounts::fetch(&store, &"me".to_string())
            .await
            .expect("fetch");

        assert_eq!(counts.total, 3);
        assert_eq!(counts.from_sender("alice"), 2);
        assert_eq!(counts.from_sender("carol"), 1);
        assert_eq!(counts.from_sender("bob"), 0);
    }

    #[tokio::test]
    async fn test_recompute_after_mark_read() {
        let store = Store::new_in_memory().expect("store");
        let first = store.insert_message("alice", "me", "one").await.expect("send");
        let second = store.insert_message("alice", "me", "two").await.expect("send");

        let before = UnreadCounts::fetch(&store, &"me".to_string())
            .await
            .expect("fetch");
        assert_eq!(before.total, 2);

        store
            .mark_read(&[first.id, second.id], "me")
            .await
            .expect("mark read");

        let after = UnreadCounts::fetch(&store, &"me".to_string())
            .await
            .expect("fetch");
        assert_eq!(after.total, 0);
        assert!(after.by_sender.is_empty());
    }
}
