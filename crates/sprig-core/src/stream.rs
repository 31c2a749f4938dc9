// ── Reactive view stream ──
//
// Subscription to coordinator state for consumers that poll or want a
// `Stream` (the CLI `watch` command).

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::ViewState;

/// Point-in-time state plus change notification.
pub struct ViewStream {
    current: ViewState,
    receiver: watch::Receiver<ViewState>,
}

impl ViewStream {
    pub(crate) fn new(receiver: watch::Receiver<ViewState>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// State captured at creation or at the last `changed()`.
    pub fn current(&self) -> &ViewState {
        &self.current
    }

    /// Latest state (may have changed since creation).
    pub fn latest(&self) -> ViewState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<ViewState> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        self.current = state.clone();
        Some(state)
    }

    /// Convert into a `Stream` that yields the current state first.
    pub fn into_stream(self) -> ViewWatchStream {
        ViewWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct ViewWatchStream {
    inner: WatchStream<ViewState>,
}

impl Stream for ViewWatchStream {
    type Item = ViewState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
