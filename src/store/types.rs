//! Row types stored by the storage collaborator

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque user identifier issued by the auth collaborator
pub type UserId = String;

/// Profile record owned by the auth/profile collaborator
///
/// Read-only from this crate: the resolver falls back to it when a
/// conversation target is not a contact, and the directory searches it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    /// User identifier this profile belongs to
    pub user_id: UserId,
    /// Display name
    pub name: String,
    /// Public handle, without the leading `@`
    pub username: Option<String>,
    /// Public avatar image URL
    pub avatar_url: Option<String>,
}

/// A directed contact relationship: owner -> peer
///
/// Each side of a relationship owns its own row; the relationship is not
/// symmetric. At most one row exists per (owner_id, peer_id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    /// Row identifier
    pub id: String,
    /// The viewing user who owns this row
    pub owner_id: UserId,
    /// The contact's underlying user identifier
    pub peer_id: UserId,
    /// Display name snapshot
    pub name: String,
    /// Handle snapshot
    pub username: Option<String>,
    /// Avatar URL snapshot
    pub avatar_url: Option<String>,
    /// Favorite flag
    pub is_favorite: bool,
    /// Blocked flag
    pub is_blocked: bool,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Contact {
    /// Create a new contact row from a profile snapshot
    pub fn new(owner_id: UserId, profile: &Profile) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            peer_id: profile.user_id.clone(),
            name: profile.name.clone(),
            username: profile.username.clone(),
            avatar_url: profile.avatar_url.clone(),
            is_favorite: false,
            is_blocked: false,
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Status of a contact request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting a response from the receiver
    Pending,
    /// Accepted; the receiver created a contact row
    Accepted,
    /// Declined by the receiver
    Declined,
}

impl RequestStatus {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }

    /// Parse the database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "declined" => Some(RequestStatus::Declined),
            _ => None,
        }
    }
}

/// A contact request from one user to another
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactRequest {
    /// Row identifier
    pub id: String,
    /// Requesting user
    pub sender_id: UserId,
    /// Requested user
    pub receiver_id: UserId,
    /// Current status
    pub status: RequestStatus,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl ContactRequest {
    /// Create a new pending request
    pub fn new(sender_id: UserId, receiver_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id,
            receiver_id,
            status: RequestStatus::Pending,
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

/// A direct message between two users
///
/// Immutable once stored except for `is_read`, which transitions
/// false -> true exactly once, driven by the receiver's client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Row identifier
    pub id: String,
    /// Sending user
    pub sender_id: UserId,
    /// Receiving user
    pub receiver_id: UserId,
    /// Message text
    pub content: String,
    /// Store-assigned creation timestamp (Unix milliseconds); the ordering key
    pub created_at: i64,
    /// Whether the receiver has observed this message in an open conversation
    pub is_read: bool,
}

impl Message {
    /// True when this message belongs to the unordered pair `{a, b}`
    pub fn belongs_to_pair(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// Denormalized per-pair conversation summary (rollup)
///
/// One row is intended per unordered pair `{user1_id, user2_id}`. Writers
/// race without coordination, so duplicates can exist transiently; the
/// rollup maintainer removes extras on its next write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    /// Row identifier
    pub id: String,
    /// First member of the pair (insertion order, not significant)
    pub user1_id: UserId,
    /// Second member of the pair
    pub user2_id: UserId,
    /// Content of the most recent message
    pub last_message: String,
    /// Timestamp of the most recent message (Unix milliseconds)
    pub last_message_time: i64,
    /// Whether the conversation has recent activity
    pub is_active: bool,
}

impl ChatSession {
    /// Create a fresh rollup row for a pair
    pub fn new(user1_id: UserId, user2_id: UserId, last_message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user1_id,
            user2_id,
            last_message,
            last_message_time: Utc::now().timestamp_millis(),
            is_active: true,
        }
    }

    /// True when this rollup covers the unordered pair `{a, b}`
    pub fn covers_pair(&self, a: &str, b: &str) -> bool {
        (self.user1_id == a && self.user2_id == b)
            || (self.user1_id == b && self.user2_id == a)
    }
}

/// Ephemeral typing-presence row for a directed pair
///
/// "user_id is currently typing to chat_with_user_id". One row is intended
/// per directed pair; duplicates are tolerated and self-healed on write.
/// Rows are toggled false on idle, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypingStatus {
    /// Row identifier
    pub id: String,
    /// The user doing the typing
    pub user_id: UserId,
    /// The user being typed to
    pub chat_with_user_id: UserId,
    /// Whether `user_id` is currently typing
    pub is_typing: bool,
    /// Last write timestamp (Unix milliseconds)
    pub last_updated: i64,
}

impl TypingStatus {
    /// Create a new typing row for a directed pair
    pub fn new(user_id: UserId, chat_with_user_id: UserId, is_typing: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            chat_with_user_id,
            is_typing,
            last_updated: Utc::now().timestamp_millis(),
        }
    }
}
