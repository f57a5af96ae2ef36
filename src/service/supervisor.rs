//! Background loop supervision.
//!
//! Every long-running subsystem runs as one task on a shared
//! [`TaskTracker`]. A loop that ends with an error cancels the root token so
//! the process notices instead of running on with a dead subsystem.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, info_span, Instrument};

use crate::error::Result;

/// Owns the root cancellation token and the set of running loops.
#[derive(Debug)]
pub struct Supervisor {
    tracker: TaskTracker,
    shutdown: CancellationToken,
    failure: Mutex<Option<String>>,
}

impl Supervisor {
    #[must_use]
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown,
            failure: Mutex::new(None),
        }
    }

    /// Root token. Loops select on children of it.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Spawn a named loop.
    ///
    /// The first loop error is kept and cancels every other loop.
    pub fn spawn<F>(self: &Arc<Self>, name: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let supervisor = Arc::clone(self);
        self.tracker.spawn(
            async move {
                match fut.await {
                    Ok(()) => info!("Loop stopped"),
                    Err(e) => {
                        error!(error = %e, "Loop failed, shutting down");
                        supervisor
                            .failure
                            .lock()
                            .get_or_insert_with(|| format!("{name}: {e}"));
                        supervisor.shutdown.cancel();
                    }
                }
            }
            .instrument(info_span!("loop", name)),
        );
    }

    /// Number of loops still running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.tracker.len()
    }

    /// First loop failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    /// Wait for every spawned loop to finish. No loop can be spawned after.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
