use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier handed back to the client.
    pub id: Uuid,
    /// Trimmed display name.
    pub name: String,
    /// Registration time.
    pub created_at: SystemTime,
}

impl UserEntity {
    /// Create a user with a fresh identifier.
    pub fn new(name: &str, created_at: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            created_at,
        }
    }
}

/// Matchmaking lobby gathering players for one topic during a join window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LobbyEntity {
    /// Identifier of the match this lobby feeds.
    pub id: Uuid,
    /// Topic every player in the lobby asked for.
    pub topic: String,
    /// Start of the join window.
    pub created_at: SystemTime,
    /// Joined players with their join time, in join order.
    pub users: IndexMap<Uuid, SystemTime>,
}

/// Rules deciding whether a lobby still accepts players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchmakingPolicy {
    /// How long a lobby accepts players after creation.
    pub window: Duration,
    /// Maximum number of players per lobby.
    pub player_cap: usize,
}

impl Default for MatchmakingPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            player_cap: 20,
        }
    }
}

/// Pairing handed back to a player joining matchmaking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyTicket {
    /// Match the player was paired into.
    pub match_id: Uuid,
    /// Topic of the lobby, echoed back.
    pub topic: String,
    /// Time left in the join window.
    pub remaining: Duration,
    /// Whether the lobby was created by this join.
    pub created: bool,
}

impl LobbyEntity {
    /// Open a new lobby for `topic`.
    pub fn new(topic: &str, created_at: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            created_at,
            users: IndexMap::new(),
        }
    }

    /// Time since creation. A creation time in the future counts as zero.
    pub fn elapsed(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at).unwrap_or_default()
    }

    /// Whether the join window has closed.
    pub fn is_expired(&self, policy: &MatchmakingPolicy, now: SystemTime) -> bool {
        self.elapsed(now) >= policy.window
    }

    /// Whether `user_id` may join this lobby for `topic`.
    pub fn accepts(
        &self,
        topic: &str,
        user_id: Uuid,
        policy: &MatchmakingPolicy,
        now: SystemTime,
    ) -> bool {
        self.topic == topic
            && !self.is_expired(policy, now)
            && (self.users.len() < policy.player_cap || self.users.contains_key(&user_id))
    }

    /// Time left in the join window.
    pub fn remaining(&self, policy: &MatchmakingPolicy, now: SystemTime) -> Duration {
        policy.window.saturating_sub(self.elapsed(now))
    }
}

/// Decide which lobby `user_id` lands in.
///
/// Picks the oldest lobby accepting the player, or opens a new one. The
/// returned lobby already contains the player and must be written back by the
/// caller. Rejoining keeps the original join time.
pub fn plan_join(
    lobbies: &[LobbyEntity],
    topic: &str,
    user_id: Uuid,
    policy: &MatchmakingPolicy,
    now: SystemTime,
) -> (LobbyEntity, LobbyTicket) {
    let existing = lobbies
        .iter()
        .filter(|lobby| lobby.accepts(topic, user_id, policy, now))
        .min_by_key(|lobby| lobby.created_at);

    let (mut lobby, created) = match existing {
        Some(lobby) => (lobby.clone(), false),
        None => (LobbyEntity::new(topic, now), true),
    };
    lobby.users.entry(user_id).or_insert(now);

    let ticket = LobbyTicket {
        match_id: lobby.id,
        topic: lobby.topic.clone(),
        remaining: lobby.remaining(policy, now),
        created,
    };
    (lobby, ticket)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 + secs)
    }

    #[test]
    fn first_join_opens_a_lobby_with_full_window() {
        let user = Uuid::new_v4();
        let (lobby, ticket) = plan_join(&[], "Science", user, &MatchmakingPolicy::default(), at(0));

        assert!(ticket.created);
        assert_eq!(ticket.remaining, Duration::from_millis(60_000));
        assert_eq!(ticket.match_id, lobby.id);
        assert!(lobby.users.contains_key(&user));
    }

    #[test]
    fn joins_oldest_open_lobby_of_same_topic() {
        let policy = MatchmakingPolicy::default();
        let older = LobbyEntity::new("Science", at(0));
        let newer = LobbyEntity::new("Science", at(10));
        let other_topic = LobbyEntity::new("History", at(0));
        let lobbies = vec![newer, other_topic, older.clone()];

        let (_, ticket) = plan_join(&lobbies, "Science", Uuid::new_v4(), &policy, at(15));
        assert!(!ticket.created);
        assert_eq!(ticket.match_id, older.id);
        assert_eq!(ticket.remaining, Duration::from_secs(45));
    }

    #[test]
    fn expired_or_full_lobbies_are_skipped() {
        let policy = MatchmakingPolicy {
            window: Duration::from_secs(60),
            player_cap: 2,
        };
        let expired = LobbyEntity::new("Science", at(0));
        let mut full = LobbyEntity::new("Science", at(30));
        full.users.insert(Uuid::new_v4(), at(30));
        full.users.insert(Uuid::new_v4(), at(31));

        let (_, ticket) = plan_join(
            &[expired.clone(), full.clone()],
            "Science",
            Uuid::new_v4(),
            &policy,
            at(60),
        );
        assert!(ticket.created);
        assert_ne!(ticket.match_id, expired.id);
        assert_ne!(ticket.match_id, full.id);
    }

    #[test]
    fn rejoining_keeps_original_join_time() {
        let policy = MatchmakingPolicy::default();
        let user = Uuid::new_v4();
        let (lobby, _) = plan_join(&[], "Art", user, &policy, at(0));
        let (lobby, ticket) = plan_join(&[lobby], "Art", user, &policy, at(20));

        assert!(!ticket.created);
        assert_eq!(lobby.users.len(), 1);
        assert_eq!(lobby.users[&user], at(0));
    }
}
