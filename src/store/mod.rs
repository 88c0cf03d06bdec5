//! Storage collaborator module
//!
//! This module wraps the hosted row store the messaging core is built on:
//! - `types` - row types (profiles, contacts, requests, messages, rollups, typing)
//! - `db` - the store client: point lookups, OR filters, ordering, CRUD
//! - `changes` - the change feed publishing post-images of every write

// Submodules
pub mod changes;
pub mod db;
pub mod types;

// Re-export commonly used types
pub use changes::{ChangeEvent, ChangeFeed, EventFilter, FeedError};
pub use db::Store;
pub use types::{
    ChatSession, Contact, ContactRequest, Message, Profile, RequestStatus, TypingStatus, UserId,
};
