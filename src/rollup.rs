//! Conversation rollup maintenance
//!
//! Each pair of users has one denormalized summary row (last message, last
//! message time, activity flag) feeding the conversation-list views. The
//! lookup-then-write here is not atomic with the message insert: two
//! near-simultaneous first sends can each miss the other's insert and leave
//! two rollup rows behind. That race is tolerated, not prevented; the next
//! write finds the extras and deletes them before updating the survivor.

use crate::store::{ChatSession, Store, UserId};
use crate::Result;
use chrono::Utc;
use tracing::{debug, info};

/// Record a sent message in the pair's rollup row
///
/// Queries candidate rows with the store's single-column OR filter (which
/// over-selects rows involving third parties), confirms the unordered pair
/// client-side, then updates the surviving row or inserts a fresh one.
pub async fn record_message(
    store: &Store,
    sender: &UserId,
    receiver: &UserId,
    last_message: &str,
) -> Result<()> {
    let candidates = store.sessions_touching(sender, receiver).await?;
    let mut matching = candidates
        .into_iter()
        .filter(|session| session.covers_pair(sender, receiver));

    match matching.next() {
        None => {
            let session = ChatSession::new(
                sender.clone(),
                receiver.clone(),
                last_message.to_string(),
            );
            store.insert_session(&session).await?;
            info!("created rollup {} for pair {} / {}", session.id, sender, receiver);
            Ok(())
        }
        Some(survivor) => {
            for extra in matching {
                debug!(
                    "removing duplicate rollup {} for pair {} / {}",
                    extra.id, sender, receiver
                );
                store.delete_session(&extra.id).await?;
            }
            store
                .update_session(
                    &survivor.id,
                    last_message,
                    Utc::now().timestamp_millis(),
                    true,
                )
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pair_rollups(store: &Store, a: &str, b: &str) -> Vec<ChatSession> {
        store
            .sessions_touching(a, b)
            .await
            .expect("sessions")
            .into_iter()
            .filter(|s| s.covers_pair(a, b))
            .collect()
    }

    #[tokio::test]
    async fn test_first_send_creates_rollup() {
        let store = Store::new_in_memory().expect("store");

        record_message(&store, &"1".to_string(), &"2".to_string(), "hi")
            .await
            .expect("rollup");

        let rollups = pair_rollups(&store, "1", "2").await;
        assert_eq!(rollups.len(), 1);
        assert_eq!(rollups[0].last_message, "hi");
        assert!(rollups[0].is_active);
    }

    #[tokio::test]
    async fn test_later_sends_update_in_place() {
        let store = Store::new_in_memory().expect("store");

        record_message(&store, &"1".to_string(), &"2".to_string(), "hi")
            .await
            .expect("rollup");
        // The peer answers; same row, either orientation
        record_message(&store, &"2".to_string(), &"1".to_string(), "hello back")
            .await
            .expect("rollup");

        let rollups = pair_rollups(&store, "1", "2").await;
        assert_eq!(rollups.len(), 1);
        assert_eq!(rollups[0].last_message, "hello back");
    }

    #[tokio::test]
    async fn test_duplicate_rollups_converge_on_next_write() {
        let store = Store::new_in_memory().expect("store");

        // Both members raced past the lookup and inserted
        let first = ChatSession::new("1".to_string(), "2".to_string(), "hi".to_string());
        let second = ChatSession::new("2".to_string(), "1".to_string(), "hey".to_string());
        store.insert_session(&first).await.expect("insert");
        store.insert_session(&second).await.expect("insert");

        record_message(&store, &"1".to_string(), &"2".to_string(), "converged")
            .await
            .expect("rollup");

        let rollups = pair_rollups(&store, "1", "2").await;
        assert_eq!(rollups.len(), 1);
        assert_eq!(rollups[0].id, first.id);
        assert_eq!(rollups[0].last_message, "converged");
    }

    #[tokio::test]
    async fn test_third_party_rollups_are_untouched() {
        let store = Store::new_in_memory().expect("store");

        // Shares a member with the pair below; the OR filter will surface it
        let other = ChatSession::new("1".to_string(), "3".to_string(), "elsewhere".to_string());
        store.insert_session(&other).await.expect("insert");

        record_message(&store, &"1".to_string(), &"2".to_string(), "hi")
            .await
            .expect("rollup");

        let untouched = pair_rollups(&store, "1", "3").await;
        assert_eq!(untouched.len(), 1);
        assert_eq!(untouched[0].last_message, "elsewhere");
        assert_eq!(pair_rollups(&store, "1", "2").await.len(), 1);
    }
}
