//! Contact directory view model
//!
//! The list-side surface around the messaging core: the owner's contacts
//! with favorite/blocked filtering, conversation-list previews enriched
//! with unread tallies, profile search, and the contact-request flow that
//! turns an accepted request into a contact row.

use crate::auth::AuthSession;
use crate::store::{
    ChangeFeed, Contact, ContactRequest, EventFilter, Profile, RequestStatus, Store, UserId,
};
use crate::unread::UnreadCounts;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Placeholder preview for pairs with no message history yet
const NO_MESSAGES_PREVIEW: &str = "No messages yet";

/// Contact list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactFilter {
    /// Every contact
    All,
    /// Favorites only
    Favorites,
    /// Blocked only
    Blocked,
}

/// A contact enriched with its conversation preview
#[derive(Debug, Clone, PartialEq)]
pub struct RecentChat {
    /// The contact row
    pub contact: Contact,
    /// Last message content, or a placeholder when none exists
    pub last_message: String,
    /// Last message time, falling back to the contact's creation time
    pub last_message_time: i64,
    /// Unread messages from this contact
    pub unread: usize,
}

/// A profile search hit annotated with relationship state
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatch {
    /// The matching profile
    pub profile: Profile,
    /// Whether the searcher already has a contact row for this user
    pub is_contact: bool,
    /// Whether a contact request is pending in either direction
    pub request_pending: bool,
}

/// A pending inbound request joined with the sender's profile
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    /// The request row
    pub request: ContactRequest,
    /// The sender's profile, when one exists
    pub sender: Option<Profile>,
}

/// Directory of the signed-in user's contacts
pub struct ContactDirectory {
    store: Arc<Store>,
    owner: UserId,
}

impl ContactDirectory {
    /// Open the directory for the signed-in user
    pub fn open(store: Arc<Store>, auth: &AuthSession) -> Result<Self> {
        let owner = auth.require()?;
        Ok(Self { store, owner })
    }

    /// The owner's contacts under a filter, ordered by name
    pub async fn list(&self, filter: ContactFilter) -> Result<Vec<Contact>> {
        match filter {
            ContactFilter::All => self.store.contacts_for(&self.owner).await,
            ContactFilter::Favorites => self.store.favorite_contacts(&self.owner).await,
            ContactFilter::Blocked => self.store.blocked_contacts(&self.owner).await,
        }
    }

    /// Contacts enriched with last-message previews and unread tallies,
    /// newest activity first
    pub async fn recent_chats(&self) -> Result<Vec<RecentChat>> {
        let contacts = self.store.contacts_for(&self.owner).await?;
        let unread = UnreadCounts::fetch(&self.store, &self.owner).await?;

        let mut chats = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let last = self
                .store
                .last_message_between(&self.owner, &contact.peer_id)
                .await?;
            let (last_message, last_message_time) = match last {
                Some(message) => (message.content, message.created_at),
                None => (NO_MESSAGES_PREVIEW.to_string(), contact.created_at),
            };
            let count = unread.from_sender(&contact.peer_id);
            chats.push(RecentChat {
                contact,
                last_message,
                last_message_time,
                unread: count,
            });
        }

        chats.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(chats)
    }

    /// A change feed that fires when the owner's conversation list may be
    /// stale (new inbound messages, read transitions)
    pub fn updates(&self) -> Result<ChangeFeed> {
        self.store
            .subscribe(EventFilter::MessagesTo(self.owner.clone()))
    }

    /// A change feed that fires when the owner's request queue changes
    pub fn request_updates(&self) -> Result<ChangeFeed> {
        self.store
            .subscribe(EventFilter::RequestsTo(self.owner.clone()))
    }

    /// Flip a contact's favorite flag; returns the new value
    pub async fn toggle_favorite(&self, contact_id: &str) -> Result<bool> {
        let contact = self
            .store
            .contact_by_id(&self.owner, contact_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contact {}", contact_id)))?;
        let value = !contact.is_favorite;
        self.store.set_contact_favorite(contact_id, value).await?;
        Ok(value)
    }

    /// Flip a contact's blocked flag; returns the new value
    pub async fn toggle_blocked(&self, contact_id: &str) -> Result<bool> {
        let contact = self
            .store
            .contact_by_id(&self.owner, contact_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contact {}", contact_id)))?;
        let value = !contact.is_blocked;
        self.store.set_contact_blocked(contact_id, value).await?;
        Ok(value)
    }

    /// Delete a contact row
    pub async fn remove(&self, contact_id: &str) -> Result<()> {
        let contact = self
            .store
            .contact_by_id(&self.owner, contact_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contact {}", contact_id)))?;
        self.store.delete_contact(&contact.id).await?;
        info!("removed contact {} ({})", contact.id, contact.peer_id);
        Ok(())
    }

    /// Search profiles by name or handle, annotated with relationship state
    pub async fn search_profiles(&self, query: &str) -> Result<Vec<ProfileMatch>> {
        let profiles = self.store.search_profiles(query, &self.owner).await?;

        let mut matches = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let is_contact = self
                .store
                .contact_by_peer(&self.owner, &profile.user_id)
                .await?
                .is_some();
            let request_pending = self
                .store
                .pending_request_between(&self.owner, &profile.user_id)
                .await?
                .is_some();
            matches.push(ProfileMatch {
                profile,
                is_contact,
                request_pending,
            });
        }
        Ok(matches)
    }

    /// Send a contact request to another user
    ///
    /// Idempotent against an already-pending request (either direction);
    /// fails with [`Error::AlreadyContact`] when a contact row exists.
    pub async fn send_request(&self, peer: &UserId) -> Result<ContactRequest> {
        if self
            .store
            .contact_by_peer(&self.owner, peer)
            .await?
            .is_some()
        {
            return Err(Error::AlreadyContact(peer.clone()));
        }
        if let Some(pending) = self.store.pending_request_between(&self.owner, peer).await? {
            debug!("request between {} and {} already pending", self.owner, peer);
            return Ok(pending);
        }
        self.store
            .profile(peer)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {}", peer)))?;

        let request = ContactRequest::new(self.owner.clone(), peer.clone());
        self.store.insert_request(&request).await?;
        info!("sent contact request {} to {}", request.id, peer);
        Ok(request)
    }

    /// Pending requests addressed to the owner, joined with sender profiles
    pub async fn incoming_requests(&self) -> Result<Vec<IncomingRequest>> {
        let requests = self.store.pending_requests_for(&self.owner).await?;

        let mut incoming = Vec::with_capacity(requests.len());
        for request in requests {
            let sender = self.store.profile(&request.sender_id).await?;
            incoming.push(IncomingRequest { request, sender });
        }
        Ok(incoming)
    }

    /// Accept a pending request, creating the owner's contact row from the
    /// sender's profile snapshot
    pub async fn accept_request(&self, request_id: &str) -> Result<Contact> {
        let request = self.pending_addressed_to_owner(request_id).await?;

        let sender = self
            .store
            .profile(&request.sender_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {}", request.sender_id)))?;

        // A contact row may already exist (e.g. added via search while the
        // request sat pending); accepting is then just the status flip
        let contact = match self
            .store
            .contact_by_peer(&self.owner, &request.sender_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let contact = Contact::new(self.owner.clone(), &sender);
                self.store.insert_contact(&contact).await?;
                contact
            }
        };

        self.store
            .set_request_status(&request.id, RequestStatus::Accepted)
            .await?;
        info!(
            "accepted contact request {} from {}",
            request.id, request.sender_id
        );
        Ok(contact)
    }

    /// Decline a pending request addressed to the owner
    pub async fn decline_request(&self, request_id: &str) -> Result<()> {
        let request = self.pending_addressed_to_owner(request_id).await?;
        self.store
            .set_request_status(&request.id, RequestStatus::Declined)
            .await?;
        info!(
            "declined contact request {} from {}",
            request.id, request.sender_id
        );
        Ok(())
    }

    async fn pending_addressed_to_owner(&self, request_id: &str) -> Result<ContactRequest> {
        let request = self
            .store
            .request(request_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contact request {}", request_id)))?;
        if request.receiver_id != self.owner || request.status != RequestStatus::Pending {
            return Err(Error::NotFound(format!(
                "pending contact request {}",
                request_id
            )));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthProvider;

    fn profile(user_id: &str, name: &str) -> Profile {
        Profile {
            user_id: user_id.to_string(),
            name: name.to_string(),
            username: Some(name.to_lowercase()),
            avatar_url: None,
        }
    }

    async fn directory_for(store: &Arc<Store>, owner: &str) -> ContactDirectory {
        let auth = AuthProvider::signed_in(owner.to_string());
        ContactDirectory::open(store.clone(), &auth.session()).expect("directory")
    }

    async fn seeded_store() -> Arc<Store> {
        let store = Arc::new(Store::new_in_memory().expect("store"));
        for (user_id, name) in [("me", "Me"), ("alice", "Alice"), ("bob", "Bob")] {
            store.upsert_profile(&profile(user_id, name)).await.expect("profile");
        }
        store
    }

    #[tokio::test]
    async fn test_list_filters_by_flag() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;

        let alice = Contact::new("me".to_string(), &profile("alice", "Alice"));
        let mut bob = Contact::new("me".to_string(), &profile("bob", "Bob"));
        bob.is_favorite = true;
        store.insert_contact(&alice).await.expect("insert");
        store.insert_contact(&bob).await.expect("insert");

        assert_eq!(directory.list(ContactFilter::All).await.expect("list").len(), 2);
        let favorites = directory.list(ContactFilter::Favorites).await.expect("list");
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].peer_id, "bob");
        assert!(directory
            .list(ContactFilter::Blocked)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn test_toggles_flip_and_report() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;
        let contact = Contact::new("me".to_string(), &profile("alice", "Alice"));
        store.insert_contact(&contact).await.expect("insert");

        assert!(directory.toggle_favorite(&contact.id).await.expect("toggle"));
        assert!(!directory.toggle_favorite(&contact.id).await.expect("toggle"));
        assert!(directory.toggle_blocked(&contact.id).await.expect("toggle"));

        let blocked = directory.list(ContactFilter::Blocked).await.expect("list");
        assert_eq!(blocked.len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_unknown_contact_is_not_found() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;
        assert!(matches!(
            directory.toggle_favorite("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recent_chats_order_and_counts() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;
        store
            .insert_contact(&Contact::new("me".to_string(), &profile("alice", "Alice")))
            .await
            .expect("insert");
        store
            .insert_contact(&Contact::new("me".to_string(), &profile("bob", "Bob")))
            .await
            .expect("insert");

        store.insert_message("alice", "me", "old").await.expect("send");
        store.insert_message("bob", "me", "newer").await.expect("send");
        store.insert_message("bob", "me", "newest").await.expect("send");

        let chats = directory.recent_chats().await.expect("chats");
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].contact.peer_id, "bob");
        assert_eq!(chats[0].last_message, "newest");
        assert_eq!(chats[0].unread, 2);
        assert_eq!(chats[1].contact.peer_id, "alice");
        assert_eq!(chats[1].unread, 1);
    }

    #[tokio::test]
    async fn test_recent_chats_placeholder_without_history() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;
        let contact = Contact::new("me".to_string(), &profile("alice", "Alice"));
        store.insert_contact(&contact).await.expect("insert");

        let chats = directory.recent_chats().await.expect("chats");
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].last_message, NO_MESSAGES_PREVIEW);
        assert_eq!(chats[0].last_message_time, contact.created_at);
        assert_eq!(chats[0].unread, 0);
    }

    #[tokio::test]
    async fn test_request_flow_creates_contact_on_accept() {
        let store = seeded_store().await;
        let alice = directory_for(&store, "alice").await;
        let me = directory_for(&store, "me").await;

        let request = alice.send_request(&"me".to_string()).await.expect("send");

        let incoming = me.incoming_requests().await.expect("incoming");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].request.id, request.id);
        assert_eq!(
            incoming[0].sender.as_ref().map(|p| p.name.as_str()),
            Some("Alice")
        );

        let contact = me.accept_request(&request.id).await.expect("accept");
        assert_eq!(contact.owner_id, "me");
        assert_eq!(contact.peer_id, "alice");
        assert_eq!(contact.name, "Alice");

        // Accepted requests leave the pending queue
        assert!(me.incoming_requests().await.expect("incoming").is_empty());
    }

    #[tokio::test]
    async fn test_send_request_is_idempotent_while_pending() {
        let store = seeded_store().await;
        let alice = directory_for(&store, "alice").await;

        let first = alice.send_request(&"me".to_string()).await.expect("send");
        let second = alice.send_request(&"me".to_string()).await.expect("send");
        assert_eq!(first.id, second.id);

        // And the reverse direction sees the same pending request
        let me = directory_for(&store, "me").await;
        let mirrored = me.send_request(&"alice".to_string()).await.expect("send");
        assert_eq!(mirrored.id, first.id);
    }

    #[tokio::test]
    async fn test_send_request_to_existing_contact_fails() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;
        store
            .insert_contact(&Contact::new("me".to_string(), &profile("alice", "Alice")))
            .await
            .expect("insert");

        assert!(matches!(
            directory.send_request(&"alice".to_string()).await,
            Err(Error::AlreadyContact(_))
        ));
    }

    #[tokio::test]
    async fn test_decline_request_removes_it_from_queue() {
        let store = seeded_store().await;
        let alice = directory_for(&store, "alice").await;
        let me = directory_for(&store, "me").await;

        let request = alice.send_request(&"me".to_string()).await.expect("send");
        me.decline_request(&request.id).await.expect("decline");

        assert!(me.incoming_requests().await.expect("incoming").is_empty());
        // Only the receiver of a pending request can act on it again
        assert!(matches!(
            me.decline_request(&request.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_accept_is_receiver_only() {
        let store = seeded_store().await;
        let alice = directory_for(&store, "alice").await;
        let request = alice.send_request(&"me".to_string()).await.expect("send");

        // The sender cannot accept their own request
        assert!(matches!(
            alice.accept_request(&request.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_annotates_relationship_state() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;
        store
            .insert_contact(&Contact::new("me".to_string(), &profile("alice", "Alice")))
            .await
            .expect("insert");
        directory.send_request(&"bob".to_string()).await.expect("send");

        let mut matches = directory.search_profiles("o").await.expect("search");
        matches.sort_by(|a, b| a.profile.user_id.cmp(&b.profile.user_id));

        // "o" hits bob only; "li" hits alice
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].profile.user_id, "bob");
        assert!(!matches[0].is_contact);
        assert!(matches[0].request_pending);

        let matches = directory.search_profiles("li").await.expect("search");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].profile.user_id, "alice");
        assert!(matches[0].is_contact);
        assert!(!matches[0].request_pending);
    }

    #[tokio::test]
    async fn test_update_feeds_signal_list_refreshes() {
        let store = seeded_store().await;
        let me = directory_for(&store, "me").await;
        let alice = directory_for(&store, "alice").await;
        let mut messages = me.updates().expect("subscribe");
        let mut requests = me.request_updates().expect("subscribe");

        store.insert_message("alice", "me", "ping").await.expect("send");
        let request = alice.send_request(&"me".to_string()).await.expect("send");

        match messages.next().await.expect("event") {
            crate::store::ChangeEvent::MessageInserted(m) => assert_eq!(m.content, "ping"),
            other => panic!("unexpected event: {:?}", other),
        }
        match requests.next().await.expect("event") {
            crate::store::ChangeEvent::RequestChanged(r) => assert_eq!(r.id, request.id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_contact() {
        let store = seeded_store().await;
        let directory = directory_for(&store, "me").await;
        let contact = Contact::new("me".to_string(), &profile("alice", "Alice"));
        store.insert_contact(&contact).await.expect("insert");

        directory.remove(&contact.id).await.expect("remove");
        assert!(directory.list(ContactFilter::All).await.expect("list").is_empty());
    }
}
