// src/core/watcher/handle.rs

//! The caller's side of a watcher: a future that resolves exactly once.

use crate::core::MudlinkError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// What a watcher resolves with: the matched text or an error.
pub type WatchResult = Result<String, MudlinkError>;

/// Returned by `watch`. Awaiting it suspends the caller until a matching line
/// arrives or the watcher expires; it never blocks the dispatch flow.
///
/// Dropping the handle does not remove the watcher. It stays outstanding and
/// still consumes its matching line, or expires at its deadline.
#[derive(Debug)]
pub struct WatchHandle {
    id: u64,
    pattern: String,
    rx: oneshot::Receiver<WatchResult>,
}

impl WatchHandle {
    pub(super) fn new(id: u64, pattern: String, rx: oneshot::Receiver<WatchResult>) -> Self {
        Self { id, pattern, rx }
    }

    /// The unique id allocated to this watcher.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the result if the watcher has already resolved, without waiting.
    pub fn try_result(&mut self) -> Option<WatchResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(MudlinkError::WatcherDropped(self.pattern.clone())))
            }
        }
    }
}

impl Future for WatchHandle {
    type Output = WatchResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(MudlinkError::WatcherDropped(this.pattern.clone())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
