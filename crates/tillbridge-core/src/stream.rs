// ── Terminal event streams ──
//
// Every stream the facade hands out is fed by a background task through an
// mpsc channel. The stream owns a drop guard on that task's cancellation
// token: dropping the stream tears the producer down along with every
// backend listener it holds.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::CoreError;

/// Subscription to a terminal event source.
///
/// Yields `Ok` items as events arrive and `Err` items for payloads that
/// could not be normalized. Ends when the source completes or fails.
pub struct TerminalStream<T> {
    inner: ReceiverStream<Result<T, CoreError>>,
    _guard: DropGuard,
}

impl<T> TerminalStream<T> {
    pub(crate) fn new(rx: mpsc::Receiver<Result<T, CoreError>>, cancel: CancellationToken) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
            _guard: cancel.drop_guard(),
        }
    }

    /// Wait for the next item. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<T, CoreError>> {
        self.inner.next().await
    }
}

impl<T> std::fmt::Debug for TerminalStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalStream").finish_non_exhaustive()
    }
}

impl<T> Stream for TerminalStream<T> {
    type Item = Result<T, CoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[test]
    fn items_arrive_in_order_then_end() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = TerminalStream::<u8>::new(rx, CancellationToken::new());

        let mut next = task::spawn(stream.recv());
        assert_pending!(next.poll());
        tx.try_send(Ok(1)).unwrap();
        assert!(next.is_woken());
        assert_eq!(assert_ready!(next.poll()).unwrap().unwrap(), 1);
        drop(next);

        drop(tx);
        let mut next = task::spawn(stream.recv());
        assert!(assert_ready!(next.poll()).is_none());
    }

    #[test]
    fn dropping_the_stream_cancels_the_producer() {
        let (_tx, rx) = mpsc::channel::<Result<u8, CoreError>>(1);
        let cancel = CancellationToken::new();
        let stream = TerminalStream::new(rx, cancel.clone());
        assert!(!cancel.is_cancelled());

        drop(stream);
        assert!(cancel.is_cancelled());
    }
}
