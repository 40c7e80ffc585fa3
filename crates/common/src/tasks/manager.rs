use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Keeps track of spawned background tasks so they can be cancelled together.
///
/// Every task receives a child of the manager's cancellation token; loops are
/// expected to exit their `select!` once the token fires so in-flight store
/// writes finish before the process goes down.
pub struct TaskManager<T: Send> {
    handles: Vec<JoinHandle<T>>,
    cancellation_token: CancellationToken,
}

impl<T: Send + 'static> Default for TaskManager<T> {
    fn default() -> Self {
        Self {
            handles: vec![],
            cancellation_token: CancellationToken::new(),
        }
    }
}

impl<T: Send + 'static> TaskManager<T> {
    /// Spawn a supervised task. The callback receives a child cancellation
    /// token it must honor.
    pub fn spawn<F, Fut>(&mut self, callback: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let handle = tokio::spawn(callback(self.child_token()));
        self.handles.push(handle);
    }

    /// A child token for tasks spawned outside the manager that should still
    /// stop with it.
    pub fn child_token(&self) -> CancellationToken {
        self.cancellation_token.child_token()
    }

    /// Cancels the root token, then grants tasks a grace period to finish
    /// their current work. Tasks still running afterwards are detached and
    /// reported.
    pub async fn abort(&mut self) {
        self.cancellation_token.cancel();

        let drain = async {
            for handle in self.handles.drain(..) {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "some tasks did not finish within the shutdown grace period"
            );
        }
    }

    /// Blocks until a termination signal arrives, then cancels all tasks.
    pub async fn wait_shutdown(&mut self) {
        wait_termination_signal().await;
        self.abort().await;
    }
}

/// Completes once SIGINT or SIGTERM is delivered.
pub async fn wait_termination_signal() {
    let mut term_signal =
        signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut interrupt_signal =
        signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

    tokio::select! {
        _ = signal::ctrl_c() => {}
        _ = term_signal.recv() => {}
        _ = interrupt_signal.recv() => {}
    }
}
