use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{LobbyEntity, LobbyTicket, MatchmakingPolicy, UserEntity, plan_join},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

/// Process-local store used when no database is configured.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    users: Arc<DashMap<Uuid, UserEntity>>,
    lobbies: Arc<Mutex<Vec<LobbyEntity>>>,
}

impl MemorySessionStore {
    /// Empty store with no users and no lobbies.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn create_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let users = self.users.clone();
        Box::pin(async move {
            users.insert(user.id, user);
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let users = self.users.clone();
        Box::pin(async move { Ok(users.get(&id).map(|entry| entry.value().clone())) })
    }

    fn join_or_create_lobby(
        &self,
        topic: String,
        user_id: Uuid,
        policy: MatchmakingPolicy,
    ) -> BoxFuture<'static, StorageResult<LobbyTicket>> {
        let store = self.clone();
        Box::pin(async move {
            if store.find_user(user_id).await?.is_none() {
                return Err(StorageError::not_found("user", user_id));
            }

            let now = SystemTime::now();
            let mut lobbies = store.lobbies.lock().await;
            let before = lobbies.len();
            lobbies.retain(|lobby| !lobby.is_expired(&policy, now));
            if lobbies.len() != before {
                debug!(pruned = before - lobbies.len(), "pruned expired lobbies");
            }

            let (lobby, ticket) = plan_join(&lobbies, &topic, user_id, &policy, now);
            match lobbies.iter_mut().find(|existing| existing.id == lobby.id) {
                Some(existing) => *existing = lobby,
                None => lobbies.push(lobby),
            }
            Ok(ticket)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn players_share_a_lobby_per_topic() {
        let store = MemorySessionStore::new();
        let ada = UserEntity::new("Ada", SystemTime::now());
        let bob = UserEntity::new("Bob", SystemTime::now());
        let cy = UserEntity::new("Cyrus", SystemTime::now());
        for user in [&ada, &bob, &cy] {
            store.create_user(user.clone()).await.unwrap();
        }

        let policy = MatchmakingPolicy::default();
        let first = store
            .join_or_create_lobby("Science".into(), ada.id, policy)
            .await
            .unwrap();
        let second = store
            .join_or_create_lobby("Science".into(), bob.id, policy)
            .await
            .unwrap();
        let other = store
            .join_or_create_lobby("History".into(), cy.id, policy)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.match_id, second.match_id);
        assert!(second.remaining <= Duration::from_secs(60));
        assert_ne!(other.match_id, first.match_id);
    }

    #[tokio::test]
    async fn unknown_users_cannot_join() {
        let store = MemorySessionStore::new();
        let err = store
            .join_or_create_lobby("Science".into(), Uuid::new_v4(), MatchmakingPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { kind: "user", .. }));
    }

    #[tokio::test]
    async fn registered_users_are_found_and_may_join() {
        let store = MemorySessionStore::new();
        let ada = UserEntity::new("Ada", SystemTime::now());
        store.create_user(ada.clone()).await.unwrap();

        assert_eq!(store.find_user(ada.id).await.unwrap(), Some(ada.clone()));
        assert_eq!(store.find_user(Uuid::new_v4()).await.unwrap(), None);
        let ticket = store
            .join_or_create_lobby("Science".into(), ada.id, MatchmakingPolicy::default())
            .await
            .unwrap();
        assert!(ticket.created);
    }

    #[tokio::test]
    async fn full_lobby_spills_into_a_new_one() {
        let store = MemorySessionStore::new();
        let policy = MatchmakingPolicy {
            window: Duration::from_secs(60),
            player_cap: 1,
        };
        let ada = UserEntity::new("Ada", SystemTime::now());
        let bob = UserEntity::new("Bob", SystemTime::now());
        store.create_user(ada.clone()).await.unwrap();
        store.create_user(bob.clone()).await.unwrap();

        let first = store
            .join_or_create_lobby("Science".into(), ada.id, policy)
            .await
            .unwrap();
        let second = store
            .join_or_create_lobby("Science".into(), bob.id, policy)
            .await
            .unwrap();
        assert_ne!(first.match_id, second.match_id);
        assert!(second.created);
    }
}
