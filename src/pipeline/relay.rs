//! Stream relay between the upstream completion and the client response
//!
//! A producer task reads upstream chunks and hands each non-empty delta to the
//! response body through a one-slot channel. The producer reserves the slot
//! before pulling the next upstream chunk, so a slow client suspends upstream
//! reads. Dropping the [`StreamRelay`] (client disconnect) cancels its token;
//! the producer then stops and drops the upstream stream, which closes the
//! upstream connection. An optional deadline ends the stream with an upstream
//! timeout error. The chat request outcome is recorded when the producer stops.

use crate::error::AppError;
use crate::metrics::{Endpoint, Metrics, Outcome};
use crate::upstream::ChunkStream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why the producer loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Completed,
    Cancelled,
    Failed,
}

/// Client-facing stream of relayed text deltas
pub struct StreamRelay {
    rx: mpsc::Receiver<Result<Bytes, AppError>>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl StreamRelay {
    /// Start relaying `upstream` on a new task
    pub fn spawn(upstream: ChunkStream, metrics: Metrics) -> Self {
        Self::start(upstream, metrics, CancellationToken::new(), None)
    }

    /// Start relaying, failing the stream if it is still open at `deadline`
    pub fn spawn_until(upstream: ChunkStream, metrics: Metrics, deadline: Instant) -> Self {
        Self::start(upstream, metrics, CancellationToken::new(), Some(deadline))
    }

    /// Start relaying with a caller-supplied cancellation token
    ///
    /// Cancelling the token from outside stops the producer exactly like a
    /// client disconnect does.
    pub fn spawn_with_token(
        upstream: ChunkStream,
        metrics: Metrics,
        cancel: CancellationToken,
    ) -> Self {
        Self::start(upstream, metrics, cancel, None)
    }

    fn start(
        upstream: ChunkStream,
        metrics: Metrics,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(produce(upstream, tx, cancel.clone(), deadline, metrics));

        Self {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Token that stops the producer when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for StreamRelay {
    type Item = Result<Bytes, AppError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Resolves at `deadline`, or never without one
async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn produce(
    mut upstream: ChunkStream,
    tx: mpsc::Sender<Result<Bytes, AppError>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    metrics: Metrics,
) {
    let mut relayed = 0usize;
    let mut bytes_relayed = 0usize;

    let finish = loop {
        // Wait for the slot to free up before reading more from upstream
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Finish::Cancelled,
            permit = tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => break Finish::Cancelled,
            },
        };

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Finish::Cancelled,
            _ = expired(deadline) => {
                tracing::warn!(
                    chunks_relayed = relayed,
                    bytes_relayed,
                    "Request deadline reached while streaming"
                );
                permit.send(Err(AppError::upstream("Upstream request timed out")));
                break Finish::Failed;
            }
            next = upstream.next() => next,
        };

        match next {
            None => break Finish::Completed,
            Some(Ok(chunk)) => {
                if chunk.delta.is_empty() {
                    continue;
                }
                relayed += 1;
                bytes_relayed += chunk.delta.len();
                metrics.stream_chunk();
                permit.send(Ok(Bytes::from(chunk.delta)));
            }
            Some(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    chunks_relayed = relayed,
                    bytes_relayed,
                    "Upstream stream failed mid-response"
                );
                permit.send(Err(e));
                break Finish::Failed;
            }
        }
    };

    // Release the upstream connection before reporting
    drop(upstream);

    match finish {
        Finish::Completed => {
            metrics.record_request(Endpoint::Chat, Outcome::Success);
            tracing::debug!(
                chunks_relayed = relayed,
                bytes_relayed,
                "Upstream stream completed"
            );
        }
        Finish::Cancelled => {
            metrics.record_request(Endpoint::Chat, Outcome::Cancelled);
            metrics.stream_cancelled();
            tracing::info!(
                chunks_relayed = relayed,
                bytes_relayed,
                "Client disconnected, upstream stream cancelled"
            );
        }
        Finish::Failed => {
            metrics.record_request(Endpoint::Chat, Outcome::Error);
            metrics.mid_stream_failure();
        }
    }
}
