//! The match engine: question normalization, round timing, the simulated
//! opponent, answer resolution and the per-match actor tying them together.

pub mod countdown;
pub mod driver;
pub mod opponent;
pub mod question;
pub mod resolver;
pub mod session;

use std::future::Future;

use tokio::task::JoinHandle;

/// Spawned task that is aborted when the guard is dropped.
#[derive(Debug)]
pub struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    /// Spawn `future` on the current runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn dropping_the_guard_aborts_the_task() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let guard = TaskGuard::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        });

        drop(guard);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
