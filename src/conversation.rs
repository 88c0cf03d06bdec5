//! Conversation view model and realtime dispatch
//!
//! One `Conversation` is the live view of a direct-message thread between
//! the signed-in user and one peer. Opening it resolves the peer, loads
//! ordered history, reconciles inbound unread messages, and spawns a
//! dispatcher task fed by the store's change feed. Two delivery paths can
//! hand the view the same message (the optimistic local append and the
//! realtime echo), so all merging is keyed by message id and ordered by the
//! store-assigned timestamp, never by arrival order.

use crate::auth::AuthSession;
use crate::notify::Notifier;
use crate::resolve::{resolve_peer, PeerLink};
use crate::rollup;
use crate::store::{ChangeEvent, ChangeFeed, EventFilter, FeedError, Message, Store, UserId};
use crate::typing::{peer_is_typing, TypingChannel};
use crate::unread::UnreadCounts;
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ViewState {
    messages: Vec<Message>,
    peer_typing: bool,
    loading: bool,
    live: bool,
    unread: UnreadCounts,
}

fn lock_view(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Merge a message into an ordered view, keyed by id
///
/// Returns false when the id is already present (second delivery path).
/// Insertion position follows `(created_at, id)`, so the result is sorted
/// regardless of the order the two paths fired in.
fn merge_sorted(messages: &mut Vec<Message>, message: Message) -> bool {
    if messages.iter().any(|m| m.id == message.id) {
        return false;
    }
    let position = messages.partition_point(|m| {
        (m.created_at, m.id.as_str()) <= (message.created_at, message.id.as_str())
    });
    messages.insert(position, message);
    true
}

struct DispatchCtx {
    store: Arc<Store>,
    viewer: UserId,
    peer_id: UserId,
    peer_name: String,
    state: Arc<Mutex<ViewState>>,
    notifier: Arc<dyn Notifier>,
}

/// Live view of a direct-message thread with one peer
///
/// Dropping (or closing) the view tears down the dispatcher task and the
/// typing idle timer; stale events can never leak into a view opened later
/// for another pair.
pub struct Conversation {
    store: Arc<Store>,
    viewer: UserId,
    peer: PeerLink,
    state: Arc<Mutex<ViewState>>,
    typing: TypingChannel,
    dispatcher: Option<JoinHandle<()>>,
}

impl Conversation {
    /// Open the conversation between the signed-in user and `target`
    ///
    /// `target` may be a peer user id, a contact row id, or a raw profile
    /// id. Loads history, marks inbound unread messages read, computes
    /// unread counters and subscribes to live updates. When the change
    /// feed cannot be established the view still opens with loaded history
    /// only ([`Conversation::is_live`] returns false).
    pub async fn open(
        store: Arc<Store>,
        auth: &AuthSession,
        target: &str,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Conversation> {
        let viewer = auth.require()?;
        let peer = resolve_peer(&store, &viewer, target).await?;
        info!("opening conversation {} <-> {}", viewer, peer.user_id);

        // Subscribe before loading so nothing falls between the snapshot
        // and the first live event; id-keyed merging absorbs the overlap
        let message_feed = store.subscribe(EventFilter::MessageInserts);
        let typing_feed = store.subscribe(EventFilter::TypingBy(peer.user_id.clone()));

        let messages = load_messages(&store, &viewer, &peer.user_id).await?;

        let peer_typing = match peer_is_typing(&store, &peer.user_id, &viewer).await {
            Ok(typing) => typing,
            Err(e) => {
                warn!("typing lookup failed ({}): {}", peer.user_id, e);
                false
            }
        };

        let unread = match UnreadCounts::fetch(&store, &viewer).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("unread recount failed ({}): {}", viewer, e);
                UnreadCounts::default()
            }
        };

        let state = Arc::new(Mutex::new(ViewState {
            messages,
            peer_typing,
            loading: false,
            live: false,
            unread,
        }));

        let dispatcher = match (message_feed, typing_feed) {
            (Ok(message_feed), Ok(typing_feed)) => {
                lock_view(&state).live = true;
                let ctx = DispatchCtx {
                    store: store.clone(),
                    viewer: viewer.clone(),
                    peer_id: peer.user_id.clone(),
                    peer_name: peer.name.clone(),
                    state: state.clone(),
                    notifier,
                };
                Some(tokio::spawn(dispatch_events(ctx, message_feed, typing_feed)))
            }
            (Err(e), _) | (_, Err(e)) => {
                // Degraded mode: loaded history only, no live updates
                warn!(
                    "realtime channel unavailable ({} <-> {}): {}",
                    viewer, peer.user_id, e
                );
                None
            }
        };

        let typing = TypingChannel::new(store.clone(), viewer.clone(), peer.user_id.clone());

        Ok(Conversation {
            store,
            viewer,
            peer,
            state,
            typing,
            dispatcher,
        })
    }

    /// Send a message to the peer
    ///
    /// Rejects empty or whitespace-only content. On success the message is
    /// appended to the local view immediately; the realtime echo dedups
    /// against it by id. Rollup and typing-reset writes are best-effort
    /// once the message itself is stored. On failure local state is left
    /// untouched and the caller re-triggers the send.
    pub async fn send(&self, content: &str) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }

        let message = match self
            .store
            .insert_message(&self.viewer, &self.peer.user_id, content)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "send failed ({} -> {}): {}",
                    self.viewer, self.peer.user_id, e
                );
                return Err(e);
            }
        };
        info!("sent message {} to {}", message.id, self.peer.user_id);

        // Optimistic append; arrival order vs. the echo is arbitrary
        merge_sorted(&mut lock_view(&self.state).messages, message.clone());

        if let Err(e) =
            rollup::record_message(&self.store, &self.viewer, &self.peer.user_id, &message.content)
                .await
        {
            warn!(
                "rollup update failed ({} <-> {}): {}",
                self.viewer, self.peer.user_id, e
            );
        }

        self.typing.note_sent().await;

        match UnreadCounts::fetch(&self.store, &self.viewer).await {
            Ok(counts) => lock_view(&self.state).unread = counts,
            Err(e) => warn!("unread recount failed ({}): {}", self.viewer, e),
        }

        Ok(message)
    }

    /// Record an input-change event, driving the typing indicator
    pub async fn input_changed(&self) {
        self.typing.note_keystroke().await;
    }

    /// Snapshot of the ordered message list
    pub fn messages(&self) -> Vec<Message> {
        lock_view(&self.state).messages.clone()
    }

    /// Whether the peer is currently typing to the viewer
    pub fn peer_typing(&self) -> bool {
        lock_view(&self.state).peer_typing
    }

    /// Whether a full reload is in progress
    pub fn is_loading(&self) -> bool {
        lock_view(&self.state).loading
    }

    /// Whether live updates are flowing
    pub fn is_live(&self) -> bool {
        lock_view(&self.state).live
    }

    /// Current unread counters for the viewer
    pub fn unread(&self) -> UnreadCounts {
        lock_view(&self.state).unread.clone()
    }

    /// The resolved peer
    pub fn peer(&self) -> &PeerLink {
        &self.peer
    }

    /// The signed-in user this view belongs to
    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    /// Tear down the dispatcher task and typing timer
    pub fn close(&mut self) {
        if let Some(handle) = self.dispatcher.take() {
            handle.abort();
        }
        self.typing.shutdown();
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        self.close();
    }
}

/// Load ordered history and reconcile inbound unread messages
async fn load_messages(store: &Store, viewer: &UserId, peer_id: &str) -> Result<Vec<Message>> {
    let mut messages = store.messages_between(viewer, peer_id).await?;

    let unread_ids: Vec<String> = messages
        .iter()
        .filter(|m| m.receiver_id == *viewer && !m.is_read)
        .map(|m| m.id.clone())
        .collect();
    if !unread_ids.is_empty() {
        match store.mark_read(&unread_ids, viewer).await {
            Ok(count) => {
                debug!("marked {} inbound messages read for {}", count, viewer);
                for message in &mut messages {
                    if message.receiver_id == *viewer {
                        message.is_read = true;
                    }
                }
            }
            // Rows stay unread locally too; the next load retries
            Err(e) => warn!("mark-read failed ({}): {}", viewer, e),
        }
    }

    Ok(messages)
}

async fn dispatch_events(ctx: DispatchCtx, mut messages: ChangeFeed, mut typing: ChangeFeed) {
    loop {
        tokio::select! {
            event = messages.next() => match event {
                Ok(ChangeEvent::MessageInserted(message)) => {
                    handle_inbound_message(&ctx, message).await;
                }
                Ok(_) => {}
                Err(FeedError::Lagged) => {
                    warn!(
                        "message feed lagged ({} <-> {}); reloading",
                        ctx.viewer, ctx.peer_id
                    );
                    reload(&ctx).await;
                }
                Err(FeedError::Closed) => {
                    lock_view(&ctx.state).live = false;
                    break;
                }
            },
            event = typing.next() => match event {
                Ok(ChangeEvent::TypingChanged(status)) => {
                    // The feed is scoped to the peer's rows; only those
                    // addressed to the viewer are ours
                    if status.chat_with_user_id == ctx.viewer {
                        lock_view(&ctx.state).peer_typing = status.is_typing;
                    }
                }
                Ok(_) => {}
                Err(FeedError::Lagged) => {
                    let typing = peer_is_typing(&ctx.store, &ctx.peer_id, &ctx.viewer)
                        .await
                        .unwrap_or(false);
                    lock_view(&ctx.state).peer_typing = typing;
                }
                Err(FeedError::Closed) => {
                    lock_view(&ctx.state).live = false;
                    break;
                }
            },
        }
    }
}

async fn handle_inbound_message(ctx: &DispatchCtx, message: Message) {
    // The subscription filter is coarser than the pair; re-check before
    // touching view state
    if !message.belongs_to_pair(&ctx.viewer, &ctx.peer_id) {
        return;
    }

    let inserted = merge_sorted(&mut lock_view(&ctx.state).messages, message.clone());
    if !inserted {
        debug!("suppressed duplicate delivery of message {}", message.id);
        return;
    }

    if message.receiver_id == ctx.viewer {
        match ctx.store.mark_read(&[message.id.clone()], &ctx.viewer).await {
            Ok(_) => {
                let mut state = lock_view(&ctx.state);
                if let Some(seen) = state.messages.iter_mut().find(|m| m.id == message.id) {
                    seen.is_read = true;
                }
            }
            Err(e) => warn!("mark-read failed ({}): {}", ctx.viewer, e),
        }

        if !ctx.notifier.is_focused() {
            ctx.notifier.notify(&ctx.peer_name, &message.content);
        }
    }

    match UnreadCounts::fetch(&ctx.store, &ctx.viewer).await {
        Ok(counts) => lock_view(&ctx.state).unread = counts,
        Err(e) => warn!("unread recount failed ({}): {}", ctx.viewer, e),
    }
}

/// Full reload after lost events; counters and history are recomputed, not
/// patched
async fn reload(ctx: &DispatchCtx) {
    lock_view(&ctx.state).loading = true;
    match load_messages(&ctx.store, &ctx.viewer, &ctx.peer_id).await {
        Ok(messages) => {
            let mut state = lock_view(&ctx.state);
            state.messages = messages;
            state.loading = false;
        }
        Err(e) => {
            warn!(
                "reload failed ({} <-> {}): {}",
                ctx.viewer, ctx.peer_id, e
            );
            lock_view(&ctx.state).loading = false;
        }
    }
    match UnreadCounts::fetch(&ctx.store, &ctx.viewer).await {
        Ok(counts) => lock_view(&ctx.state).unread = counts,
        Err(e) => warn!("unread recount failed ({}): {}", ctx.viewer, e),
    }
}
