//! In-memory session store. Sessions live for the process lifetime.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::dialogue::Session;
use crate::error::StoreError;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn create(&self, session: Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.user_id) {
            return Err(StoreError::AlreadyExists {
                user_id: session.user_id,
            });
        }
        sessions.insert(session.user_id.clone(), session);
        Ok(())
    }

    async fn update(&self, session: Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.user_id) {
            Some(slot) => {
                *slot = session;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                user_id: session.user_id,
            }),
        }
    }

    async fn delete(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(user_id).is_some())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.sessions.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::dialogue::{Selection, Step};

    #[tokio::test]
    async fn create_get_delete() {
        let store = InMemorySessionStore::new();
        assert!(store.get("1").await.unwrap().is_none());

        store.create(Session::new("1", Utc::now())).await.unwrap();
        let session = store.get("1").await.unwrap().unwrap();
        assert_eq!(session.step, Step::AwaitingMaterial);
        assert_eq!(store.count().await.unwrap(), 1);

        assert!(store.delete("1").await.unwrap());
        assert!(!store.delete("1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let store = InMemorySessionStore::new();
        store.create(Session::new("1", Utc::now())).await.unwrap();
        let err = store.create(Session::new("1", Utc::now())).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_replaces_step() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("1", Utc::now());
        store.create(session.clone()).await.unwrap();

        session.step = Step::AwaitingWidth {
            selection: Selection {
                material: "банер".into(),
                subtype: None,
            },
        };
        store.update(session.clone()).await.unwrap();
        assert_eq!(store.get("1").await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn update_missing_fails() {
        let store = InMemorySessionStore::new();
        let err = store
            .update(Session::new("ghost", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let store = InMemorySessionStore::new();
        store.create(Session::new("a", Utc::now())).await.unwrap();
        store.create(Session::new("b", Utc::now())).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());
    }
}
