//! Change feed delivered by the storage collaborator
//!
//! Every successful write publishes the affected row's post-image as a
//! [`ChangeEvent`]. Consumers open a [`ChangeFeed`] with an [`EventFilter`];
//! filters may be coarser than what a consumer actually wants (the message
//! feed in particular admits every insert), so consumers re-check pair
//! membership on delivery.

use crate::store::types::{ChatSession, ContactRequest, Message, TypingStatus, UserId};
use tokio::sync::broadcast;

/// A storage mutation, tagged with the affected row's post-image
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// A new message row was inserted
    MessageInserted(Message),
    /// A message transitioned to read
    MessageRead(Message),
    /// A typing-status row was inserted or updated
    TypingChanged(TypingStatus),
    /// A rollup row was inserted or updated
    SessionUpserted(ChatSession),
    /// A contact request was inserted or its status changed
    RequestChanged(ContactRequest),
}

/// Subscription scope for a [`ChangeFeed`]
///
/// The filter surface mirrors the collaborator's: single-column equality at
/// most. Pair-level scoping is not expressible here and is done by the
/// consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum EventFilter {
    /// Every message insert, regardless of pair
    MessageInserts,
    /// Message inserts and read transitions addressed to a user
    MessagesTo(UserId),
    /// Typing rows authored by a user
    TypingBy(UserId),
    /// Contact requests addressed to a user
    RequestsTo(UserId),
    /// Everything (diagnostics and tests)
    Any,
}

impl EventFilter {
    /// Whether an event falls inside this subscription's scope
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            EventFilter::MessageInserts => matches!(event, ChangeEvent::MessageInserted(_)),
            EventFilter::MessagesTo(user) => match event {
                ChangeEvent::MessageInserted(m) | ChangeEvent::MessageRead(m) => {
                    m.receiver_id == *user
                }
                _ => false,
            },
            EventFilter::TypingBy(user) => match event {
                ChangeEvent::TypingChanged(t) => t.user_id == *user,
                _ => false,
            },
            EventFilter::RequestsTo(user) => match event {
                ChangeEvent::RequestChanged(r) => r.receiver_id == *user,
                _ => false,
            },
            EventFilter::Any => true,
        }
    }
}

/// Error delivered by [`ChangeFeed::next`]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedError {
    /// The consumer fell behind and missed events; reload and continue
    #[error("change feed lagged; events were dropped")]
    Lagged,
    /// The feed shut down; no further events will arrive
    #[error("change feed closed")]
    Closed,
}

/// A filtered view of the store's change stream
///
/// Wraps a broadcast receiver; events outside the filter's scope are
/// skipped silently.
#[derive(Debug)]
pub struct ChangeFeed {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: EventFilter,
}

impl ChangeFeed {
    pub(crate) fn new(rx: broadcast::Receiver<ChangeEvent>, filter: EventFilter) -> Self {
        Self { rx, filter }
    }

    /// Wait for the next in-scope event
    ///
    /// A [`FeedError::Lagged`] return leaves the feed usable; the consumer
    /// should reload whatever state the lost events would have touched and
    /// keep listening.
    pub async fn next(&mut self) -> std::result::Result<ChangeEvent, FeedError> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return Err(FeedError::Lagged),
                Err(broadcast::error::RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }
}
