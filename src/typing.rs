//! Typing presence channel
//!
//! Per directed pair, the sender's client runs a small state machine:
//! Idle -> Typing on the first keystroke, Typing -> Idle when a trailing
//! 2-second timer elapses without further input, or immediately when a
//! message is sent. Writes are emitted only on state transitions, never
//! per keystroke. Every write path reconciles duplicate rows for the pair
//! (keep the oldest, delete the rest) before updating the survivor.

use crate::store::{Store, TypingStatus, UserId};
use crate::Result;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Trailing idle window after the last keystroke
pub const TYPING_IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Read-side staleness bound for typing rows (Unix milliseconds)
///
/// A crashed sender can leave `is_typing = true` behind forever; rows not
/// refreshed within this window are treated as idle by readers.
pub const TYPING_STALE_AFTER_MS: i64 = 10_000;

struct TimerState {
    /// Last broadcast state: true means a Typing write is on the wire
    broadcasting: bool,
    /// Bumped on every re-arm and cancel; an expiry task whose generation
    /// is stale must not write
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    store: Arc<Store>,
    user: UserId,
    peer: UserId,
    state: Mutex<TimerState>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, TimerState> {
        // Poisoning only means a panicking thread held the lock; the state
        // itself is still coherent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sender-side typing presence for one directed pair
///
/// At most one idle timer is outstanding at any time; re-arming aborts the
/// previous one. Dropping the channel cancels the timer without a write.
pub struct TypingChannel {
    shared: Arc<Shared>,
}

impl TypingChannel {
    /// Create a channel for `user` typing to `peer`
    pub fn new(store: Arc<Store>, user: UserId, peer: UserId) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                user,
                peer,
                state: Mutex::new(TimerState {
                    broadcasting: false,
                    generation: 0,
                    timer: None,
                }),
            }),
        }
    }

    /// Record an input-change event
    ///
    /// Broadcasts Typing on the Idle -> Typing edge only, then (re)arms the
    /// trailing idle timer.
    pub async fn note_keystroke(&self) {
        let needs_write = {
            let mut state = self.shared.lock_state();
            if state.broadcasting {
                false
            } else {
                state.broadcasting = true;
                true
            }
        };

        if needs_write {
            if let Err(e) = write_status(&self.shared, true).await {
                warn!(
                    "typing update failed ({} -> {}): {}",
                    self.shared.user, self.shared.peer, e
                );
                // Not broadcast after all; the next keystroke retries
                self.shared.lock_state().broadcasting = false;
            }
        }

        let shared = self.shared.clone();
        let mut state = self.shared.lock_state();
        state.generation += 1;
        let generation = state.generation;
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        state.timer = Some(tokio::spawn(idle_expiry(shared, generation)));
    }

    /// Record that a message was sent
    ///
    /// Cancels any pending idle timer and writes Idle immediately.
    pub async fn note_sent(&self) {
        {
            let mut state = self.shared.lock_state();
            state.generation += 1;
            if let Some(handle) = state.timer.take() {
                handle.abort();
            }
            state.broadcasting = false;
        }
        if let Err(e) = write_status(&self.shared, false).await {
            warn!(
                "typing reset failed ({} -> {}): {}",
                self.shared.user, self.shared.peer, e
            );
        }
    }

    /// Cancel any pending idle timer without writing
    pub fn shutdown(&self) {
        let mut state = self.shared.lock_state();
        state.generation += 1;
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for TypingChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn idle_expiry(shared: Arc<Shared>, generation: u64) {
    tokio::time::sleep(TYPING_IDLE_TIMEOUT).await;
    {
        let mut state = shared.lock_state();
        if state.generation != generation {
            // Superseded by a later keystroke, send or shutdown
            return;
        }
        state.broadcasting = false;
        state.timer = None;
    }
    if let Err(e) = write_status(&shared, false).await {
        warn!(
            "typing idle write failed ({} -> {}): {}",
            shared.user, shared.peer, e
        );
    }
}

/// Reconciling upsert of the directed pair's typing row
///
/// The store enforces no uniqueness on the pair, so concurrent sessions can
/// leave duplicates behind; every write keeps the oldest row, deletes the
/// rest and updates the survivor.
async fn write_status(shared: &Shared, is_typing: bool) -> Result<()> {
    let rows = shared.store.typing_rows(&shared.user, &shared.peer).await?;
    match rows.split_first() {
        None => {
            let row = TypingStatus::new(shared.user.clone(), shared.peer.clone(), is_typing);
            shared.store.insert_typing(&row).await
        }
        Some((survivor, extras)) => {
            for extra in extras {
                debug!(
                    "removing duplicate typing row {} ({} -> {})",
                    extra.id, shared.user, shared.peer
                );
                shared.store.delete_typing(&extra.id).await?;
            }
            shared
                .store
                .update_typing(&survivor.id, is_typing, Utc::now().timestamp_millis())
                .await
        }
    }
}

/// Whether a fresh row says `user` is typing to `viewer`
///
/// Used when a conversation opens, before live events arrive. Stale rows
/// (older than [`TYPING_STALE_AFTER_MS`]) read as idle.
pub async fn peer_is_typing(store: &Store, user: &UserId, viewer: &UserId) -> Result<bool> {
    let rows = store.typing_rows(user, viewer).await?;
    let now = Utc::now().timestamp_millis();
    Ok(rows
        .iter()
        .any(|row| row.is_typing && now - row.last_updated <= TYPING_STALE_AFTER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChangeEvent, EventFilter};
    use std::time::Duration;

    fn test_store() -> Arc<Store> {
        Arc::new(Store::new_in_memory().expect("store"))
    }

    async fn next_typing(feed: &mut crate::store::ChangeFeed) -> TypingStatus {
        match feed.next().await.expect("feed open") {
            ChangeEvent::TypingChanged(status) => status,
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_keystrokes_emit_one_typing_then_one_idle() {
        let store = test_store();
        let mut feed = store
            .subscribe(EventFilter::TypingBy("alice".to_string()))
            .expect("subscribe");
        let channel = TypingChannel::new(store.clone(), "alice".to_string(), "bob".to_string());

        // Keystrokes at t=0, 500ms, 1000ms
        channel.note_keystroke().await;
        let first = next_typing(&mut feed).await;
        assert!(first.is_typing);

        tokio::time::advance(Duration::from_millis(500)).await;
        channel.note_keystroke().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        channel.note_keystroke().await;

        // Silence; the trailing timer fires 2s after the last keystroke
        tokio::time::advance(Duration::from_millis(2000)).await;
        let idle = next_typing(&mut feed).await;
        assert!(!idle.is_typing);

        // The intermediate keystrokes produced no writes and no duplicates
        let rows = store.typing_rows("alice", "bob").await.expect("rows");
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_typing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_cancels_pending_idle_timer() {
        let store = test_store();
        let mut feed = store
            .subscribe(EventFilter::TypingBy("alice".to_string()))
            .expect("subscribe");
        let channel = TypingChannel::new(store.clone(), "alice".to_string(), "bob".to_string());

        channel.note_keystroke().await;
        assert!(next_typing(&mut feed).await.is_typing);

        // Typing for 1.5s, then the message goes out
        tokio::time::advance(Duration::from_millis(1500)).await;
        channel.note_sent().await;
        let idle = next_typing(&mut feed).await;
        assert!(!idle.is_typing);

        // The cancelled debounce timer must not produce a stray write later
        let settled = store.typing_rows("alice", "bob").await.expect("rows");
        tokio::time::advance(Duration::from_millis(5000)).await;
        tokio::task::yield_now().await;
        let after = store.typing_rows("alice", "bob").await.expect("rows");
        assert_eq!(settled, after);
    }

    #[tokio::test]
    async fn test_duplicate_rows_self_heal_on_write() {
        let store = test_store();

        // Two uncoordinated sessions left duplicate rows behind
        let first = TypingStatus::new("alice".to_string(), "bob".to_string(), true);
        let second = TypingStatus::new("alice".to_string(), "bob".to_string(), true);
        store.insert_typing(&first).await.expect("insert");
        store.insert_typing(&second).await.expect("insert");

        let channel = TypingChannel::new(store.clone(), "alice".to_string(), "bob".to_string());
        channel.note_sent().await;

        let rows = store.typing_rows("alice", "bob").await.expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first.id);
        assert!(!rows[0].is_typing);
    }

    #[tokio::test]
    async fn test_stale_typing_row_reads_as_idle() {
        let store = test_store();

        let mut row = TypingStatus::new("alice".to_string(), "bob".to_string(), true);
        row.last_updated = Utc::now().timestamp_millis() - TYPING_STALE_AFTER_MS - 1_000;
        store.insert_typing(&row).await.expect("insert");

        let typing = peer_is_typing(&store, &"alice".to_string(), &"bob".to_string())
            .await
            .expect("read");
        assert!(!typing);

        // A fresh write flips it back
        store
            .update_typing(&row.id, true, Utc::now().timestamp_millis())
            .await
            .expect("update");
        let typing = peer_is_typing(&store, &"alice".to_string(), &"bob".to_string())
            .await
            .expect("read");
        assert!(typing);
    }
}
