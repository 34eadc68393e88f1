use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::{
    models::{LobbyTicket, MatchmakingPolicy, UserEntity, plan_join},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BulkDocsRequest, CouchLobbyDocument, CouchTombstone, CouchUserDocument,
        END_SUFFIX, LOBBY_PREFIX, lobby_doc_id, split_expired_lobbies, user_doc_id,
    },
};

const MAX_JOIN_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchSessionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorized(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorized(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    debug!(database = %database, "created CouchDB database");
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::RevisionConflict {
                path: doc_id.to_string(),
            }),
            status => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })
            })
            .collect()
    }

    /// Delete expired lobbies. Failures only cost a retry on the next join.
    async fn purge_lobbies(&self, tombstones: &[CouchTombstone]) {
        const BULK_DOCS: &str = "_bulk_docs";
        if tombstones.is_empty() {
            return;
        }

        let result = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs: tombstones })
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(purged = tombstones.len(), "purged expired lobbies");
            }
            Ok(response) => {
                warn!(status = %response.status(), "failed to purge expired lobbies");
            }
            Err(err) => warn!(error = %err, "failed to purge expired lobbies"),
        }
    }

    /// One optimistic join attempt. Fails with a revision conflict when
    /// another writer touched the chosen lobby in the meantime.
    async fn join_once(
        &self,
        topic: &str,
        user_id: Uuid,
        policy: &MatchmakingPolicy,
    ) -> CouchResult<LobbyTicket> {
        let now = SystemTime::now();
        let (documents, expired) = split_expired_lobbies(
            self.list_documents::<CouchLobbyDocument>(LOBBY_PREFIX).await?,
            policy,
            now,
        );
        self.purge_lobbies(&expired).await;

        let mut revisions = Vec::with_capacity(documents.len());
        let mut lobbies = Vec::with_capacity(documents.len());
        for document in documents {
            revisions.push(document.rev.clone());
            lobbies.push(document.try_into_entity()?);
        }

        let (lobby, ticket) = plan_join(&lobbies, topic, user_id, policy, now);
        let rev = lobbies
            .iter()
            .position(|existing| existing.id == lobby.id)
            .and_then(|index| revisions[index].clone());

        let doc_id = lobby_doc_id(lobby.id);
        let document = CouchLobbyDocument::from_entity(lobby, rev);
        self.put_document(&doc_id, &document).await?;
        Ok(ticket)
    }
}

impl SessionStore for CouchSessionStore {
    fn create_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = user_doc_id(user.id);
            let document = CouchUserDocument::from(user);
            store
                .put_document(&doc_id, &document)
                .await
                .map_err(Into::into)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = user_doc_id(id);
            let maybe_doc = store.get_document::<CouchUserDocument>(&doc_id).await?;
            maybe_doc
                .map(CouchUserDocument::try_into_entity)
                .transpose()
                .map_err(Into::into)
        })
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

            let mut attempt = 1;
            loop {
                match store.join_once(&topic, user_id, &policy).await {
                    Ok(ticket) => return Ok(ticket),
                    Err(CouchDaoError::RevisionConflict { path })
                        if attempt < MAX_JOIN_ATTEMPTS =>
                    {
                        warn!(attempt, path = %path, "lobby update conflicted; retrying");
                        attempt += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorized(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
