// ── Event relay ──
//
// Forwards a backend event channel to a `TerminalStream`. Every configured
// backend is subscribed, but an emission only goes through when the backend
// that raised it is authoritative at that moment, so a stale backend can
// never leak events into the session.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use tillbridge_api::{BackendKind, Channel, Listener};

use crate::error::CoreError;
use crate::selector::Selector;
use crate::stream::TerminalStream;

/// Current value fetched before following a channel.
pub(crate) type InitialFetch = BoxFuture<'static, Result<Value, tillbridge_api::Error>>;

/// Relay `channel` through `transform`.
///
/// A transform failure is yielded as an `Err` item; the stream keeps going.
pub(crate) fn relay<T, F>(
    selector: &Arc<Selector>,
    channel: Channel,
    buffer: usize,
    parent: &CancellationToken,
    transform: F,
) -> TerminalStream<T>
where
    T: Send + 'static,
    F: Fn(Value) -> Result<T, CoreError> + Send + 'static,
{
    relay_with_initial(selector, channel, buffer, parent, None, transform)
}

/// Like [`relay`], but first emits the result of `initial` unless an event
/// got there first. A failed initial fetch ends the stream with the error.
pub(crate) fn relay_with_initial<T, F>(
    selector: &Arc<Selector>,
    channel: Channel,
    buffer: usize,
    parent: &CancellationToken,
    initial: Option<InitialFetch>,
    transform: F,
) -> TerminalStream<T>
where
    T: Send + 'static,
    F: Fn(Value) -> Result<T, CoreError> + Send + 'static,
{
    let (mut primary, mut secondary) = {
        let mut slots = selector
            .backends()
            .map(|backend| (backend.kind(), backend.add_listener(channel)));
        (slots.next(), slots.next())
    };

    let cancel = parent.child_token();
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let selector = Arc::clone(selector);
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        let mut initial = initial;
        let mut event_seen = false;

        loop {
            if primary.is_none() && secondary.is_none() && initial.is_none() {
                break;
            }

            let (kind, payload) = tokio::select! {
                biased;

                () = task_cancel.cancelled() => break,

                event = next_event(&mut primary) => match event {
                    Some(event) => event,
                    None => {
                        primary = None;
                        continue;
                    }
                },

                event = next_event(&mut secondary) => match event {
                    Some(event) => event,
                    None => {
                        secondary = None;
                        continue;
                    }
                },

                result = fetch(&mut initial), if initial.is_some() => {
                    initial = None;
                    match result {
                        Ok(value) if !event_seen => {
                            if tx.send(transform(value)).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e.into())).await;
                            break;
                        }
                    }
                    continue;
                }
            };

            let active = selector.active_kind();
            if kind != active {
                trace!(%channel, from = %kind, %active, "dropping event from inactive backend");
                continue;
            }
            event_seen = true;
            if tx.send(transform(payload)).await.is_err() {
                break;
            }
        }
    });

    TerminalStream::new(rx, cancel)
}

async fn next_event(slot: &mut Option<(BackendKind, Listener)>) -> Option<(BackendKind, Value)> {
    match slot {
        Some((kind, listener)) => listener.recv().await.map(|payload| (*kind, payload)),
        None => std::future::pending().await,
    }
}

async fn fetch(initial: &mut Option<InitialFetch>) -> Result<Value, tillbridge_api::Error> {
    match initial {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use tillbridge_api::{MockBackend, TerminalBackend};

    use super::*;
    use crate::config::Platform;
    use crate::selector::Backends;
    use crate::session::SessionState;

    fn dual() -> (Arc<MockBackend>, Arc<MockBackend>, Arc<SessionState>, Arc<Selector>) {
        let native = Arc::new(MockBackend::new(BackendKind::Native));
        let web = Arc::new(MockBackend::new(BackendKind::Web));
        let state = Arc::new(SessionState::new());
        state.mark_initialized();
        let selector = Selector::new(
            Platform::Android,
            Backends::dual(
                Arc::clone(&native) as Arc<dyn TerminalBackend>,
                Arc::clone(&web) as Arc<dyn TerminalBackend>,
            ),
            Arc::clone(&state),
        )
        .unwrap();
        (native, web, state, Arc::new(selector))
    }

    #[tokio::test]
    async fn only_authoritative_events_pass() {
        let (native, web, state, selector) = dual();
        let cancel = CancellationToken::new();
        let mut stream = relay(&selector, Channel::DidStartReaderReconnect, 8, &cancel, Ok);

        web.emit(Channel::DidStartReaderReconnect, json!({ "from": "web" }));
        native.emit(Channel::DidStartReaderReconnect, json!({ "from": "native" }));
        assert_eq!(stream.recv().await.unwrap().unwrap()["from"], "native");

        state.select(BackendKind::Web);
        native.emit(Channel::DidStartReaderReconnect, json!({ "from": "native" }));
        web.emit(Channel::DidStartReaderReconnect, json!({ "from": "web" }));
        assert_eq!(stream.recv().await.unwrap().unwrap()["from"], "web");
    }

    #[tokio::test]
    async fn transform_errors_do_not_end_stream() {
        let (native, _web, _state, selector) = dual();
        let cancel = CancellationToken::new();
        let mut stream = relay(&selector, Channel::DidRequestReaderInput, 8, &cancel, |v| {
            crate::convert::reader_input_options(&v)
        });

        native.emit(Channel::DidRequestReaderInput, json!({ "value": "nope" }));
        native.emit(Channel::DidRequestReaderInput, json!({ "value": 4 }));
        assert!(stream.recv().await.unwrap().is_err());
        assert_eq!(stream.recv().await.unwrap().unwrap().bits(), 4);
    }

    #[tokio::test]
    async fn dropping_stream_detaches_listeners() {
        let (native, web, _state, selector) = dual();
        let cancel = CancellationToken::new();
        let stream = relay(&selector, Channel::DidFailReaderReconnect, 8, &cancel, Ok);
        assert_eq!(native.listener_count(Channel::DidFailReaderReconnect), 1);
        assert_eq!(web.listener_count(Channel::DidFailReaderReconnect), 1);

        drop(stream);
        while native.listener_count(Channel::DidFailReaderReconnect) > 0
            || web.listener_count(Channel::DidFailReaderReconnect) > 0
        {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn initial_value_is_emitted_first() {
        let (_native, _web, _state, selector) = dual();
        let cancel = CancellationToken::new();
        let initial: InitialFetch = Box::pin(async { Ok(json!({ "status": 1 })) });
        let mut stream = relay_with_initial(
            &selector,
            Channel::DidChangeConnectionStatus,
            8,
            &cancel,
            Some(initial),
            Ok,
        );
        assert_eq!(stream.recv().await.unwrap().unwrap(), json!({ "status": 1 }));
    }

    #[tokio::test]
    async fn failed_initial_fetch_ends_stream() {
        let (_native, _web, _state, selector) = dual();
        let cancel = CancellationToken::new();
        let initial: InitialFetch =
            Box::pin(async { Err(tillbridge_api::Error::rejected("bridge gone")) });
        let mut stream = relay_with_initial(
            &selector,
            Channel::DidChangeConnectionStatus,
            8,
            &cancel,
            Some(initial),
            Ok,
        );
        assert!(stream.recv().await.unwrap().is_err());
        assert!(stream.recv().await.is_none());
    }
}
