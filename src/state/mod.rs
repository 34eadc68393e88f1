pub mod match_state;
mod sse;
pub mod state_machine;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tracing::info;

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    error::ServiceError,
    match_engine::driver::MatchRegistry,
    services::{question_service::QuestionProvider, sse_events},
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const PUBLIC_EVENT_CAPACITY: usize = 16;

/// Central application state: storage handle, running matches and shared services.
pub struct AppState {
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    public_sse: SseHub,
    matches: MatchRegistry,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
    questions: Arc<QuestionProvider>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a session store is installed.
    pub fn new(config: AppConfig, questions: QuestionProvider) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            session_store: RwLock::new(None),
            public_sse: SseHub::new(PUBLIC_EVENT_CAPACITY),
            matches: MatchRegistry::default(),
            degraded: degraded_tx,
            config: Arc::new(config),
            questions: Arc::new(questions),
        })
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`AppState::session_store`] but fails with [`ServiceError::Degraded`] when absent.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install or remove the session store and update the degraded flag accordingly.
    pub async fn set_session_store(&self, store: Option<Arc<dyn SessionStore>>) {
        let degraded = store.is_none();
        {
            let mut guard = self.session_store.write().await;
            *guard = store;
        }
        self.update_degraded(degraded);
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });

        if changed {
            info!(degraded = value, "degraded mode changed");
            sse_events::broadcast_system_status(&self.public_sse, value);
        }
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }

    /// Running matches keyed by identifier.
    pub fn matches(&self) -> &MatchRegistry {
        &self.matches
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared question provider handed to every match.
    pub fn questions(&self) -> Arc<QuestionProvider> {
        self.questions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::session_store::memory::MemorySessionStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default(), QuestionProvider::offline());
        let mut events = state.public_sse().subscribe();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_session_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_session_store(Some(Arc::new(MemorySessionStore::new())))
            .await;
        assert!(!state.is_degraded());
        assert!(state.require_session_store().await.is_ok());

        let event = events.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some("system_status"));
        assert_eq!(event.data, r#"{"degraded":false}"#);

        state
            .set_session_store(Some(Arc::new(MemorySessionStore::new())))
            .await;
        assert!(events.try_recv().is_err());
    }
}
