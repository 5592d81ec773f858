//! Supervised background tasks.
//!
//! Every task spawned through [`Supervisor::spawn`] hands its `JoinHandle`
//! to a single monitor, which logs how each one ended (completed, failed or
//! panicked). [`SupervisorHandle::shutdown`] stops accepting work and drains
//! what is still running.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    futures::{StreamExt, stream::FuturesUnordered},
    tokio::{
        sync::mpsc,
        task::{JoinError, JoinHandle},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

/// How a supervised task ended, as reported by the task itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The task handled an error (and told the user about it).
    Failed { kind: &'static str, message: String },
}

struct Supervised {
    label: String,
    handle: JoinHandle<TaskOutcome>,
}

/// Spawns tasks whose outcome is always observed.
#[derive(Clone)]
pub struct Supervisor {
    tx: mpsc::UnboundedSender<Supervised>,
    in_flight: Arc<AtomicUsize>,
}

/// Owner side of a [`Supervisor`]: stops the monitor.
pub struct SupervisorHandle {
    stop: CancellationToken,
    monitor: JoinHandle<()>,
    in_flight: Arc<AtomicUsize>,
}

impl Supervisor {
    /// Start the monitor task. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start() -> (Self, SupervisorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let stop = CancellationToken::new();
        let monitor = tokio::spawn(monitor(rx, stop.clone(), Arc::clone(&in_flight)));
        (
            Self {
                tx,
                in_flight: Arc::clone(&in_flight),
            },
            SupervisorHandle {
                stop,
                monitor,
                in_flight,
            },
        )
    }

    /// Spawn `task` under supervision.
    pub fn spawn<F>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = TaskOutcome> + Send + 'static,
    {
        let label = label.into();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(task);
        if let Err(mpsc::error::SendError(task)) = self.tx.send(Supervised { label, handle }) {
            // Monitor is gone: the task still runs, nobody reports on it.
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(label = %task.label, "supervisor stopped; task runs unmonitored");
        }
    }

    /// Tasks spawned and not yet reported.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl SupervisorHandle {
    /// Stop accepting tasks and wait up to `grace` for running ones.
    /// Returns `true` when everything finished in time.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let pending = self.in_flight.load(Ordering::SeqCst);
        info!(pending, grace_secs = grace.as_secs(), "draining supervised tasks");
        self.stop.cancel();
        match tokio::time::timeout(grace, self.monitor).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "supervisor monitor crashed");
                false
            },
            Err(_) => {
                warn!(
                    abandoned = self.in_flight.load(Ordering::SeqCst),
                    "grace period elapsed with tasks still running"
                );
                false
            },
        }
    }
}

async fn watch(task: Supervised) -> (String, Result<TaskOutcome, JoinError>) {
    (task.label, task.handle.await)
}

async fn monitor(
    mut rx: mpsc::UnboundedReceiver<Supervised>,
    stop: CancellationToken,
    in_flight: Arc<AtomicUsize>,
) {
    let mut running = FuturesUnordered::new();
    let report = |label: String, result: Result<TaskOutcome, JoinError>| {
        in_flight.fetch_sub(1, Ordering::SeqCst);
        match result {
            Ok(TaskOutcome::Completed) => debug!(%label, "task completed"),
            Ok(TaskOutcome::Failed { kind, message }) => {
                warn!(%label, kind, %message, "task finished with an error");
            },
            Err(e) if e.is_panic() => error!(%label, error = %e, "task panicked"),
            Err(e) => warn!(%label, error = %e, "task cancelled"),
        }
    };

    loop {
        tokio::select! {
            Some(task) = rx.recv() => running.push(watch(task)),
            Some((label, result)) = running.next(), if !running.is_empty() => report(label, result),
            () = stop.cancelled() => break,
        }
    }

    rx.close();
    while let Ok(task) = rx.try_recv() {
        running.push(watch(task));
    }
    while let Some((label, result)) = running.next().await {
        report(label, result);
    }
    debug!("supervisor monitor stopped");
}
