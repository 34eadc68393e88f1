#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{LobbyTicket, MatchmakingPolicy, UserEntity},
    storage::StorageResult,
};

/// Abstraction over the persistence layer for players and matchmaking lobbies.
pub trait SessionStore: Send + Sync {
    /// Persist a newly registered player.
    fn create_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a player, `None` when the id is unknown.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Place a registered player in an open lobby for `topic`, creating one when none accepts them.
    ///
    /// Fails with [`crate::dao::storage::StorageError::NotFound`] for unknown players.
    fn join_or_create_lobby(
        &self,
        topic: String,
        user_id: Uuid,
        policy: MatchmakingPolicy,
    ) -> BoxFuture<'static, StorageResult<LobbyTicket>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
