//! Conversation identity resolution
//!
//! A conversation can be opened against a peer user id, a contact row id,
//! or a raw profile id. Resolution collapses all three into one canonical
//! peer identity plus a display snapshot, without writing anything.

use crate::store::{Contact, Profile, Store, UserId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Resolved peer identity with a display-metadata snapshot
///
/// `contact_id` is present only when the viewer has a persisted contact
/// row for the peer; a profile fallback yields a transient view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerLink {
    /// Canonical peer user id
    pub user_id: UserId,
    /// Display name
    pub name: String,
    /// Handle
    pub username: Option<String>,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// The viewer's contact row for this peer, when one exists
    pub contact_id: Option<String>,
}

impl PeerLink {
    fn from_contact(contact: Contact) -> Self {
        Self {
            user_id: contact.peer_id,
            name: contact.name,
            username: contact.username,
            avatar_url: contact.avatar_url,
            contact_id: Some(contact.id),
        }
    }

    fn from_profile(profile: Profile) -> Self {
        Self {
            user_id: profile.user_id,
            name: profile.name,
            username: profile.username,
            avatar_url: profile.avatar_url,
            contact_id: None,
        }
    }
}

/// Resolve a conversation target to a canonical peer
///
/// Tried in order: a contact owned by the viewer whose peer id matches the
/// target, then a contact row whose own id matches, then the target as a
/// raw profile id (synthesized into a transient view, never persisted).
/// Fails with [`Error::NotFound`] when none resolve; callers redirect away
/// from the dead conversation.
pub async fn resolve_peer(store: &Store, viewer: &UserId, target: &str) -> Result<PeerLink> {
    if let Some(contact) = store.contact_by_peer(viewer, target).await? {
        return Ok(PeerLink::from_contact(contact));
    }

    if let Some(contact) = store.contact_by_id(viewer, target).await? {
        return Ok(PeerLink::from_contact(contact));
    }

    if let Some(profile) = store.profile(target).await? {
        return Ok(PeerLink::from_profile(profile));
    }

    Err(Error::NotFound(format!("conversation target {}", target)))
}
