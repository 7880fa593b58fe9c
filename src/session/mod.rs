//! Session storage: one dialogue session per user, kept in memory.

pub mod locks;
pub mod memory;

use async_trait::async_trait;

use crate::dialogue::Session;
use crate::error::StoreError;

pub use locks::UserLocks;
pub use memory::InMemorySessionStore;

/// Backend-agnostic session store keyed by user id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the live session for a user.
    async fn get(&self, user_id: &str) -> Result<Option<Session>, StoreError>;

    /// Store a new session. Fails if the user already has one.
    async fn create(&self, session: Session) -> Result<(), StoreError>;

    /// Replace an existing session. Fails if the user has none.
    async fn update(&self, session: Session) -> Result<(), StoreError>;

    /// Remove a user's session. Returns whether one existed.
    async fn delete(&self, user_id: &str) -> Result<bool, StoreError>;

    /// Number of live sessions.
    async fn count(&self) -> Result<usize, StoreError>;
}
