//! Row-store client for the storage collaborator
//!
//! This module provides the query surface the messaging core consumes:
//! point lookups, single-column OR filters, timestamp ordering, inserts,
//! updates and deletes, plus a change feed publishing each write's
//! post-image. The backing store enforces no uniqueness constraint on
//! typing-status or rollup pair keys; single-row-per-key is an invariant
//! the write paths reconcile, not one the store guarantees.

use crate::{
    store::changes::{ChangeEvent, ChangeFeed, EventFilter},
    store::types::{
        ChatSession, Contact, ContactRequest, Message, Profile, RequestStatus, TypingStatus,
    },
    Result,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Buffered change events per subscriber before the feed reports a lag
const CHANGE_FEED_CAPACITY: usize = 256;

/// Storage collaborator client
///
/// Wraps the row store and fans out change notifications to subscribers.
pub struct Store {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Store {
    /// Open a store backed by a database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Initialize the schema
    ///
    /// Pair keys on `chat_sessions` and `typing_status` are intentionally
    /// unconstrained: concurrent writers can and do insert duplicates.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                username TEXT,
                avatar_url TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                peer_id TEXT NOT NULL,
                name TEXT NOT NULL,
                username TEXT,
                avatar_url TEXT,
                is_favorite INTEGER NOT NULL,
                is_blocked INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS contact_requests (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                is_read INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                user1_id TEXT NOT NULL,
                user2_id TEXT NOT NULL,
                last_message TEXT NOT NULL,
                last_message_time INTEGER NOT NULL,
                is_active INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS typing_status (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                chat_with_user_id TEXT NOT NULL,
                is_typing INTEGER NOT NULL,
                last_updated INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(receiver_id, is_read)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contacts_owner ON contacts(owner_id)",
            [],
        )?;

        Ok(())
    }

    /// Open a change feed scoped by `filter`
    ///
    /// Local feeds always establish; the `Result` is part of the
    /// collaborator contract, since a remote change channel can fail to
    /// come up. Consumers degrade to loaded-state-only on error.
    pub fn subscribe(&self, filter: EventFilter) -> Result<ChangeFeed> {
        Ok(ChangeFeed::new(self.changes.subscribe(), filter))
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers is fine; events are fire-and-forget
        let _ = self.changes.send(event);
    }

    // ========== Profiles ==========

    /// Insert or replace a profile record
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO profiles (user_id, name, username, avatar_url)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &profile.user_id,
                &profile.name,
                &profile.username,
                &profile.avatar_url,
            ],
        )?;
        Ok(())
    }

    /// Look up a profile by user id
    pub async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.conn.lock().await;
        let profile = conn
            .query_row(
                "SELECT user_id, name, username, avatar_url FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(Profile {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        username: row.get(2)?,
                        avatar_url: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Search profiles by name or handle, excluding one user (the searcher)
    pub async fn search_profiles(&self, query: &str, exclude: &str) -> Result<Vec<Profile>> {
        let pattern = format!("%{}%", query);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT user_id, name, username, avatar_url FROM profiles
             WHERE user_id != ?1 AND (name LIKE ?2 OR username LIKE ?2)
             ORDER BY name",
        )?;
        let profiles = stmt
            .query_map(params![exclude, pattern], |row| {
                Ok(Profile {
                    user_id: row.get(0)?,
                    name: row.get(1)?,
                    username: row.get(2)?,
                    avatar_url: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    // ========== Contacts ==========

    /// Insert a contact row
    pub async fn insert_contact(&self, contact: &Contact) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO contacts (id, owner_id, peer_id, name, username, avatar_url,
                                   is_favorite, is_blocked, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &contact.id,
                &contact.owner_id,
                &contact.peer_id,
                &contact.name,
                &contact.username,
                &contact.avatar_url,
                contact.is_favorite as i32,
                contact.is_blocked as i32,
                contact.created_at,
            ],
        )?;
        Ok(())
    }

    /// Look up the owner's contact row for a peer user id
    pub async fn contact_by_peer(&self, owner: &str, peer: &str) -> Result<Option<Contact>> {
        let conn = self.conn.lock().await;
        let contact = conn
            .query_row(
                "SELECT id, owner_id, peer_id, name, username, avatar_url,
                        is_favorite, is_blocked, created_at
                 FROM contacts WHERE owner_id = ?1 AND peer_id = ?2",
                params![owner, peer],
                row_to_contact,
            )
            .optional()?;
        Ok(contact)
    }

    /// Look up a contact row by its own id, scoped to the owner
    pub async fn contact_by_id(&self, owner: &str, id: &str) -> Result<Option<Contact>> {
        let conn = self.conn.lock().await;
        let contact = conn
            .query_row(
                "SELECT id, owner_id, peer_id, name, username, avatar_url,
                        is_favorite, is_blocked, created_at
                 FROM contacts WHERE owner_id = ?1 AND id = ?2",
                params![owner, id],
                row_to_contact,
            )
            .optional()?;
        Ok(contact)
    }

    /// All contacts owned by a user, ordered by name
    pub async fn contacts_for(&self, owner: &str) -> Result<Vec<Contact>> {
        self.contacts_where(owner, "1 = 1").await
    }

    /// The owner's favorite contacts, ordered by name
    pub async fn favorite_contacts(&self, owner: &str) -> Result<Vec<Contact>> {
        self.contacts_where(owner, "is_favorite = 1").await
    }

    /// The owner's blocked contacts, ordered by name
    pub async fn blocked_contacts(&self, owner: &str) -> Result<Vec<Contact>> {
        self.contacts_where(owner, "is_blocked = 1").await
    }

    async fn contacts_where(&self, owner: &str, predicate: &str) -> Result<Vec<Contact>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT id, owner_id, peer_id, name, username, avatar_url,
                    is_favorite, is_blocked, created_at
             FROM contacts WHERE owner_id = ?1 AND {} ORDER BY name",
            predicate
        );
        let mut stmt = conn.prepare(&sql)?;
        let contacts = stmt
            .query_map(params![owner], row_to_contact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    /// Set the favorite flag on a contact row
    pub async fn set_contact_favorite(&self, id: &str, value: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE contacts SET is_favorite = ?2 WHERE id = ?1",
            params![id, value as i32],
        )?;
        Ok(())
    }

    /// Set the blocked flag on a contact row
    pub async fn set_contact_blocked(&self, id: &str, value: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE contacts SET is_blocked = ?2 WHERE id = ?1",
            params![id, value as i32],
        )?;
        Ok(())
    }

    /// Delete a contact row
    pub async fn delete_contact(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM contacts WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ========== Contact requests ==========

    /// Insert a contact request
    pub async fn insert_request(&self, request: &ContactRequest) -> Result<()> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO contact_requests (id, sender_id, receiver_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &request.id,
                    &request.sender_id,
                    &request.receiver_id,
                    request.status.as_str(),
                    request.created_at,
                ],
            )?;
        }
        self.publish(ChangeEvent::RequestChanged(request.clone()));
        Ok(())
    }

    /// Look up a request by id
    pub async fn request(&self, id: &str) -> Result<Option<ContactRequest>> {
        let conn = self.conn.lock().await;
        let request = conn
            .query_row(
                "SELECT id, sender_id, receiver_id, status, created_at
                 FROM contact_requests WHERE id = ?1",
                params![id],
                row_to_request,
            )
            .optional()?;
        Ok(request)
    }

    /// Any pending request between two users, in either direction
    pub async fn pending_request_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<ContactRequest>> {
        let conn = self.conn.lock().await;
        let request = conn
            .query_row(
                "SELECT id, sender_id, receiver_id, status, created_at
                 FROM contact_requests
                 WHERE status = 'pending'
                   AND ((sender_id = ?1 AND receiver_id = ?2)
                     OR (sender_id = ?2 AND receiver_id = ?1))
                 LIMIT 1",
                params![a, b],
                row_to_request,
            )
            .optional()?;
        Ok(request)
    }

    /// Pending requests addressed to a user, oldest first
    pub async fn pending_requests_for(&self, receiver: &str) -> Result<Vec<ContactRequest>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, receiver_id, status, created_at
             FROM contact_requests
             WHERE receiver_id = ?1 AND status = 'pending'
             ORDER BY created_at",
        )?;
        let requests = stmt
            .query_map(params![receiver], row_to_request)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    /// Update a request's status, publishing the post-image
    pub async fn set_request_status(&self, id: &str, status: RequestStatus) -> Result<()> {
        let updated = {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE contact_requests SET status = ?2 WHERE id = ?1",
                params![id, status.as_str()],
            )?;
            conn.query_row(
                "SELECT id, sender_id, receiver_id, status, created_at
                 FROM contact_requests WHERE id = ?1",
                params![id],
                row_to_request,
            )
            .optional()?
        };
        if let Some(request) = updated {
            self.publish(ChangeEvent::RequestChanged(request));
        }
        Ok(())
    }

    // ========== Messages ==========

    /// Append a message; the store assigns the id and creation timestamp
    pub async fn insert_message(
        &self,
        sender: &str,
        receiver: &str,
        content: &str,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            content: content.to_string(),
            created_at: Utc::now().timestamp_millis(),
            is_read: false,
        };
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, created_at, is_read)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![
                    &message.id,
                    &message.sender_id,
                    &message.receiver_id,
                    &message.content,
                    message.created_at,
                ],
            )?;
        }
        self.publish(ChangeEvent::MessageInserted(message.clone()));
        Ok(message)
    }

    /// The full conversation between two users, ascending by creation time
    ///
    /// The predicate is the combined pair match: a message is included only
    /// when its `{sender, receiver}` set equals `{a, b}`.
    pub async fn messages_between(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, receiver_id, content, created_at, is_read
             FROM messages
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY created_at ASC, id ASC",
        )?;
        let messages = stmt
            .query_map(params![a, b], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// The most recent message between two users, if any
    pub async fn last_message_between(&self, a: &str, b: &str) -> Result<Option<Message>> {
        let conn = self.conn.lock().await;
        let message = conn
            .query_row(
                "SELECT id, sender_id, receiver_id, content, created_at, is_read
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![a, b],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Sender ids of every unread message addressed to `receiver`
    ///
    /// The flat set; grouping into per-sender tallies happens client-side.
    pub async fn unread_senders(&self, receiver: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT sender_id FROM messages WHERE receiver_id = ?1 AND is_read = 0",
        )?;
        let senders = stmt
            .query_map(params![receiver], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(senders)
    }

    /// Mark messages as read on behalf of their receiver
    ///
    /// Only rows addressed to `reader` and still unread are touched, so the
    /// transition is receiver-driven, monotonic and idempotent. Returns the
    /// number of rows that flipped; each post-image is published.
    pub async fn mark_read(&self, ids: &[String], reader: &str) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let flipped = {
            let conn = self.conn.lock().await;
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");

            let sql = format!(
                "SELECT id, sender_id, receiver_id, content, created_at, is_read
                 FROM messages
                 WHERE receiver_id = ? AND is_read = 0 AND id IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut bindings: Vec<&dyn rusqlite::ToSql> = vec![&reader];
            for id in ids {
                bindings.push(id);
            }
            let pending = stmt
                .query_map(bindings.as_slice(), row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let sql = format!(
                "UPDATE messages SET is_read = 1
                 WHERE receiver_id = ? AND is_read = 0 AND id IN ({})",
                placeholders
            );
            conn.execute(&sql, bindings.as_slice())?;
            pending
        };

        let count = flipped.len();
        for mut message in flipped {
            message.is_read = true;
            self.publish(ChangeEvent::MessageRead(message));
        }
        Ok(count)
    }

    // ========== Chat sessions (rollups) ==========

    /// Insert a rollup row, publishing the post-image
    pub async fn insert_session(&self, session: &ChatSession) -> Result<()> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO chat_sessions (id, user1_id, user2_id, last_message,
                                            last_message_time, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &session.id,
                    &session.user1_id,
                    &session.user2_id,
                    &session.last_message,
                    session.last_message_time,
                    session.is_active as i32,
                ],
            )?;
        }
        self.publish(ChangeEvent::SessionUpserted(session.clone()));
        Ok(())
    }

    /// Rollup rows where either pair column matches either user
    ///
    /// Single-column OR is the widest filter the collaborator offers; this
    /// over-selects rows involving third parties, and callers confirm the
    /// pair client-side. Insertion order, so the oldest row comes first.
    pub async fn sessions_touching(&self, a: &str, b: &str) -> Result<Vec<ChatSession>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user1_id, user2_id, last_message, last_message_time, is_active
             FROM chat_sessions
             WHERE user1_id IN (?1, ?2) OR user2_id IN (?1, ?2)
             ORDER BY rowid ASC",
        )?;
        let sessions = stmt
            .query_map(params![a, b], row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Update a rollup row's summary fields, publishing the post-image
    pub async fn update_session(
        &self,
        id: &str,
        last_message: &str,
        last_message_time: i64,
        is_active: bool,
    ) -> Result<()> {
        let updated = {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE chat_sessions
                 SET last_message = ?2, last_message_time = ?3, is_active = ?4
                 WHERE id = ?1",
                params![id, last_message, last_message_time, is_active as i32],
            )?;
            conn.query_row(
                "SELECT id, user1_id, user2_id, last_message, last_message_time, is_active
                 FROM chat_sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .optional()?
        };
        if let Some(session) = updated {
            self.publish(ChangeEvent::SessionUpserted(session));
        }
        Ok(())
    }

    /// Delete a rollup row (duplicate cleanup)
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM chat_sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ========== Typing status ==========

    /// Every typing row for a directed pair, oldest first
    pub async fn typing_rows(&self, user: &str, chat_with: &str) -> Result<Vec<TypingStatus>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, chat_with_user_id, is_typing, last_updated
             FROM typing_status
             WHERE user_id = ?1 AND chat_with_user_id = ?2
             ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![user, chat_with], row_to_typing)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert a typing row, publishing the post-image
    pub async fn insert_typing(&self, status: &TypingStatus) -> Result<()> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO typing_status (id, user_id, chat_with_user_id, is_typing, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &status.id,
                    &status.user_id,
                    &status.chat_with_user_id,
                    status.is_typing as i32,
                    status.last_updated,
                ],
            )?;
        }
        self.publish(ChangeEvent::TypingChanged(status.clone()));
        Ok(())
    }

    /// Update a typing row, publishing the post-image
    pub async fn update_typing(&self, id: &str, is_typing: bool, last_updated: i64) -> Result<()> {
        let updated = {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE typing_status SET is_typing = ?2, last_updated = ?3 WHERE id = ?1",
                params![id, is_typing as i32, last_updated],
            )?;
            conn.query_row(
                "SELECT id, user_id, chat_with_user_id, is_typing, last_updated
                 FROM typing_status WHERE id = ?1",
                params![id],
                row_to_typing,
            )
            .optional()?
        };
        if let Some(status) = updated {
            self.publish(ChangeEvent::TypingChanged(status));
        }
        Ok(())
    }

    /// Delete a typing row (duplicate cleanup)
    pub async fn delete_typing(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM typing_status WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        peer_id: row.get(2)?,
        name: row.get(3)?,
        username: row.get(4)?,
        avatar_url: row.get(5)?,
        is_favorite: row.get::<_, i32>(6)? != 0,
        is_blocked: row.get::<_, i32>(7)? != 0,
        created_at: row.get(8)?,
    })
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRequest> {
    let status: String = row.get(3)?;
    Ok(ContactRequest {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Pending),
        created_at: row.get(4)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        is_read: row.get::<_, i32>(5)? != 0,
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: row.get(0)?,
        user1_id: row.get(1)?,
        user2_id: row.get(2)?,
        last_message: row.get(3)?,
        last_message_time: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
    })
}

fn row_to_typing(row: &rusqlite::Row<'_>) -> rusqlite::Result<TypingStatus> {
    Ok(TypingStatus {
        id: row.get(0)?,
        user_id: row.get(1)?,
        chat_with_user_id: row.get(2)?,
        is_typing: row.get::<_, i32>(3)? != 0,
        last_updated: row.get(4)?,
    })
}
