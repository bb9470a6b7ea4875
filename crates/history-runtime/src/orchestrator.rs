//! Async view orchestrator.
//!
//! Holds the match table behind an `Arc` and serves [`ViewRequest`]s from
//! a tokio task. Each request is computed on the blocking pool and its
//! [`ViewSnapshot`] is sent back over an `mpsc` channel. A newer request
//! supersedes one still in flight; the superseded result is never sent.

use std::sync::Arc;

use history_core::models::Match;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::views::{compute_view, ViewRequest, ViewSnapshot};

// ── ViewOrchestrator ──────────────────────────────────────────────────────────

/// Background view server over one immutable match table.
pub struct ViewOrchestrator {
    matches: Arc<Vec<Match>>,
}

impl ViewOrchestrator {
    pub fn new(matches: Vec<Match>) -> Self {
        Self {
            matches: Arc::new(matches),
        }
    }

    /// Number of rows in the table being served, byes included.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Start the request loop.
    ///
    /// Returns a [`ViewClient`] for submitting requests and receiving
    /// snapshots, plus a [`ViewHandle`] that aborts the loop. The loop
    /// exits once every request sender has been dropped and the last
    /// request has been answered.
    pub fn start(self) -> (ViewClient, ViewHandle) {
        // Requests are cheap; snapshots buffer so a slow consumer does not
        // stall computation.
        let (request_tx, request_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.request_loop(request_rx, snapshot_tx).await;
        });

        (
            ViewClient {
                requests: request_tx,
                snapshots: snapshot_rx,
            },
            ViewHandle { handle },
        )
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn request_loop(
        self,
        mut requests: mpsc::Receiver<ViewRequest>,
        tx: mpsc::Sender<ViewSnapshot>,
    ) {
        let mut in_flight: Option<JoinHandle<()>> = None;

        while let Some(request) = requests.recv().await {
            if let Some(previous) = in_flight.take() {
                if !previous.is_finished() {
                    tracing::debug!(request_id = request.id, "superseding in-flight view request");
                    previous.abort();
                }
            }

            let matches = Arc::clone(&self.matches);
            let tx = tx.clone();
            in_flight = Some(tokio::spawn(async move {
                let request_id = request.id;
                let computed =
                    tokio::task::spawn_blocking(move || compute_view(&matches, &request)).await;

                match computed {
                    Ok(snapshot) => {
                        if let Err(e) = tx.send(snapshot).await {
                            tracing::warn!(error = %e, "failed to send view snapshot; receiver dropped");
                        }
                    }
                    Err(e) => tracing::warn!(request_id, error = %e, "view computation failed"),
                }
            }));
        }

        tracing::debug!("view request channel closed; draining");
        if let Some(last) = in_flight {
            if let Err(e) = last.await {
                tracing::warn!(error = %e, "final view request failed");
            }
        }
    }
}

// ── ViewClient ────────────────────────────────────────────────────────────────

/// The caller's side of a running [`ViewOrchestrator`].
pub struct ViewClient {
    requests: mpsc::Sender<ViewRequest>,
    snapshots: mpsc::Receiver<ViewSnapshot>,
}

impl ViewClient {
    /// Submit a request without waiting for its snapshot. Returns `false`
    /// when the orchestrator has stopped.
    pub async fn submit(&self, request: ViewRequest) -> bool {
        self.requests.send(request).await.is_ok()
    }

    /// Next snapshot, or `None` once the orchestrator has stopped.
    pub async fn next_snapshot(&mut self) -> Option<ViewSnapshot> {
        self.snapshots.recv().await
    }

    /// Submit a request and wait for the snapshot answering it. Snapshots
    /// for earlier requests are discarded.
    pub async fn request(&mut self, request: ViewRequest) -> Option<ViewSnapshot> {
        let id = request.id;
        if !self.submit(request).await {
            return None;
        }
        while let Some(snapshot) = self.snapshots.recv().await {
            if snapshot.request_id == id {
                return Some(snapshot);
            }
        }
        None
    }
}

// ── ViewHandle ────────────────────────────────────────────────────────────────

/// A handle to the background request loop.
pub struct ViewHandle {
    handle: JoinHandle<()>,
}

impl ViewHandle {
    /// Immediately abort the request loop.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
