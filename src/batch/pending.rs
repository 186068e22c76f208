//! Queued queries and the futures handed back to callers.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::status::{QueryError, StatusResult};

/// A name waiting for the next batch, with every caller asking for it.
#[derive(Debug)]
pub struct PendingQuery {
    pub name: String,
    pub enqueued_at: Instant,
    pub waiters: Vec<oneshot::Sender<StatusResult>>,
}

impl PendingQuery {
    pub fn new(name: String, waiter: oneshot::Sender<StatusResult>) -> Self {
        Self {
            name,
            enqueued_at: Instant::now(),
            waiters: vec![waiter],
        }
    }

    /// Coalesce another caller onto this query.
    pub fn attach(&mut self, waiter: oneshot::Sender<StatusResult>) {
        self.waiters.push(waiter);
    }

    /// Resolve every waiter with the same result. Returns how many callers
    /// were still listening.
    pub fn complete(self, result: StatusResult) -> usize {
        let mut delivered = 0;
        for waiter in self.waiters {
            if waiter.send(result.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[derive(Debug)]
enum State {
    Ready(Option<StatusResult>),
    Waiting(oneshot::Receiver<StatusResult>),
}

/// Result of a status request.
///
/// Already resolved for cache hits and invalid names; otherwise completes
/// when the batch carrying the name finishes. Dropping it does not cancel
/// the underlying query.
#[derive(Debug)]
#[must_use = "a status future does nothing unless awaited"]
pub struct StatusFuture {
    state: State,
}

impl StatusFuture {
    pub fn ready(result: StatusResult) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    pub fn waiting(rx: oneshot::Receiver<StatusResult>) -> Self {
        Self {
            state: State::Waiting(rx),
        }
    }

    /// Whether the result is available without waiting for a batch.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }
}

impl Future for StatusFuture {
    type Output = StatusResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Ready(slot) => Poll::Ready(slot.take().unwrap_or(Err(QueryError::Closed))),
            State::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(QueryError::Closed))),
        }
    }
}
