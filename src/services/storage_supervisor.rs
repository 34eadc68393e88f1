use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{session_store::SessionStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
///
/// Running matches never touch storage, so they keep going while degraded.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SessionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_session_store(Some(store.clone())).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;

                state.set_session_store(None).await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until reconnection attempts are exhausted.
async fn supervise(state: &SharedState, store: &dyn SessionStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!("storage reconnection succeeded after health check failure");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %err,
                            "storage reconnect first attempt failed; entering degraded mode"
                        );
                        state.update_degraded(true);
                    } else {
                        warn!(attempt, error = %err, "storage reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            warn!("exhausted storage reconnect attempts; staying in degraded mode");
            return;
        }
        state.update_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        config::AppConfig, dao::session_store::memory::MemorySessionStore,
        match_engine::TaskGuard, services::question_service::QuestionProvider, state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn failed_connections_are_retried_until_storage_is_up() {
        let state = AppState::new(AppConfig::default(), QuestionProvider::offline());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let _supervisor = TaskGuard::spawn(run(state.clone(), move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(StorageError::unavailable(
                        "refused".into(),
                        std::io::Error::other("connection refused"),
                    ))
                } else {
                    Ok(Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>)
                }
            }
        }));

        let mut degraded = state.degraded_watcher();
        degraded.wait_for(|degraded| !degraded).await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(state.require_session_store().await.is_ok());
    }
}
