use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::{LobbyEntity, MatchmakingPolicy, UserEntity};

use super::error::CouchDaoError;

pub const USER_PREFIX: &str = "user::";
pub const LOBBY_PREFIX: &str = "lobby::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchUserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub name: String,
    pub created_at: SystemTime,
}

impl From<UserEntity> for CouchUserDocument {
    fn from(user: UserEntity) -> Self {
        Self {
            id: user_doc_id(user.id),
            rev: None,
            name: user.name,
            created_at: user.created_at,
        }
    }
}

impl CouchUserDocument {
    pub fn try_into_entity(self) -> Result<UserEntity, CouchDaoError> {
        Ok(UserEntity {
            id: parse_doc_id(&self.id, USER_PREFIX)?,
            name: self.name,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchLobbyDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub topic: String,
    pub created_at: SystemTime,
    /// Joined players in join order.
    pub users: IndexMap<Uuid, SystemTime>,
}

impl CouchLobbyDocument {
    pub fn from_entity(lobby: LobbyEntity, rev: Option<String>) -> Self {
        Self {
            id: lobby_doc_id(lobby.id),
            rev,
            topic: lobby.topic,
            created_at: lobby.created_at,
            users: lobby.users,
        }
    }

    pub fn try_into_entity(self) -> Result<LobbyEntity, CouchDaoError> {
        Ok(LobbyEntity {
            id: parse_doc_id(&self.id, LOBBY_PREFIX)?,
            topic: self.topic,
            created_at: self.created_at,
            users: self.users,
        })
    }
}

/// Deletion marker sent through `_bulk_docs`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CouchTombstone {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

/// Body of a `_bulk_docs` request.
#[derive(Debug, Serialize)]
pub struct BulkDocsRequest<'a, T> {
    pub docs: &'a [T],
}

/// Split lobby documents into those whose join window is still open and
/// tombstones for the expired ones.
pub fn split_expired_lobbies(
    documents: Vec<CouchLobbyDocument>,
    policy: &MatchmakingPolicy,
    now: SystemTime,
) -> (Vec<CouchLobbyDocument>, Vec<CouchTombstone>) {
    let mut open = Vec::with_capacity(documents.len());
    let mut tombstones = Vec::new();
    for document in documents {
        let elapsed = now.duration_since(document.created_at).unwrap_or_default();
        if elapsed < policy.window {
            open.push(document);
            continue;
        }
        // never-written documents have nothing to delete
        if let Some(rev) = document.rev {
            tombstones.push(CouchTombstone {
                id: document.id,
                rev,
                deleted: true,
            });
        }
    }
    (open, tombstones)
}

pub fn user_doc_id(id: Uuid) -> String {
    format!("{USER_PREFIX}{id}")
}

pub fn lobby_doc_id(id: Uuid) -> String {
    format!("{LOBBY_PREFIX}{id}")
}

fn parse_doc_id(doc_id: &str, prefix: &str) -> Result<Uuid, CouchDaoError> {
    let raw = doc_id
        .strip_prefix(prefix)
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "unexpected prefix",
        })?;
    Uuid::parse_str(raw).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "not a UUID",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_document_round_trips_through_entity() {
        let mut lobby = LobbyEntity::new("Science", SystemTime::UNIX_EPOCH);
        lobby.users.insert(Uuid::new_v4(), SystemTime::UNIX_EPOCH);

        let doc = CouchLobbyDocument::from_entity(lobby.clone(), Some("1-abc".into()));
        assert_eq!(doc.id, format!("lobby::{}", lobby.id));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_rev"], "1-abc");

        let back: CouchLobbyDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back.try_into_entity().unwrap(), lobby);
    }

    #[test]
    fn expired_lobbies_become_tombstones() {
        use std::time::Duration;

        let policy = MatchmakingPolicy::default();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let old = LobbyEntity::new("Science", start);
        let fresh = LobbyEntity::new("Science", start + Duration::from_secs(90));
        let documents = vec![
            CouchLobbyDocument::from_entity(old.clone(), Some("3-old".into())),
            CouchLobbyDocument::from_entity(fresh.clone(), Some("1-new".into())),
        ];

        let (open, tombstones) =
            split_expired_lobbies(documents, &policy, start + Duration::from_secs(100));

        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, lobby_doc_id(fresh.id));
        assert_eq!(
            tombstones,
            vec![CouchTombstone {
                id: lobby_doc_id(old.id),
                rev: "3-old".into(),
                deleted: true,
            }]
        );
        assert_eq!(
            serde_json::to_value(BulkDocsRequest { docs: &tombstones }).unwrap(),
            serde_json::json!({
                "docs": [{ "_id": lobby_doc_id(old.id), "_rev": "3-old", "_deleted": true }]
            })
        );
    }

    #[test]
    fn doc_ids_must_carry_prefix_and_uuid() {
        assert!(matches!(
            parse_doc_id("lobby::nope", LOBBY_PREFIX),
            Err(CouchDaoError::InvalidDocId {
                kind: "not a UUID",
                ..
            })
        ));
        assert!(matches!(
            parse_doc_id(&user_doc_id(Uuid::nil()), LOBBY_PREFIX),
            Err(CouchDaoError::InvalidDocId {
                kind: "unexpected prefix",
                ..
            })
        ));
    }
}
