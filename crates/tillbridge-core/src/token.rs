// ── Connection-token rendezvous ──
//
// A backend that needs a connection token emits `requestConnectionToken`.
// The rendezvous task answers every such request by calling the host's
// provider and handing the outcome back through `set_connection_token`.
// A request is never left pending: a failed or empty fetch is delivered as
// an error message instead of a token.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tillbridge_api::{Channel, TerminalBackend};

/// Delivered when the provider fails without saying why.
pub const DEFAULT_TOKEN_ERROR: &str = "Error in user-supplied `fetchConnectionToken`.";

/// Delivered when the provider succeeds with an empty token.
pub const EMPTY_TOKEN_ERROR: &str =
    "User-supplied `fetchConnectionToken` resolved successfully, but no token was returned.";

/// Failure reported by a [`ConnectionTokenProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", .message.as_deref().unwrap_or(DEFAULT_TOKEN_ERROR))]
pub struct TokenFetchError {
    pub message: Option<String>,
}

impl TokenFetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Host callback that fetches a fresh connection token from the host's
/// own server.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<String,
/// TokenFetchError>>`, so a closure is enough:
///
/// ```ignore
/// let provider = || async { Ok::<_, TokenFetchError>(fetch_from_server().await) };
/// ```
#[async_trait]
pub trait ConnectionTokenProvider: Send + Sync {
    async fn fetch_connection_token(&self) -> Result<String, TokenFetchError>;
}

#[async_trait]
impl<F, Fut> ConnectionTokenProvider for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, TokenFetchError>> + Send,
{
    async fn fetch_connection_token(&self) -> Result<String, TokenFetchError> {
        (self)().await
    }
}

/// Fetch a token and deliver the outcome to `backend`.
pub(crate) async fn answer_token_request(
    backend: &dyn TerminalBackend,
    provider: &dyn ConnectionTokenProvider,
) {
    let (token, error) = match provider.fetch_connection_token().await {
        Ok(token) if !token.is_empty() => (Some(token), None),
        Ok(_) => (None, Some(EMPTY_TOKEN_ERROR.to_owned())),
        Err(err) => {
            let message = err
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_ERROR.to_owned());
            (None, Some(message))
        }
    };

    if let Some(message) = &error {
        debug!(backend = %backend.kind(), message = %message, "connection token fetch failed");
    }
    if let Err(e) = backend.set_connection_token(token, error).await {
        warn!(backend = %backend.kind(), error = %e, "backend refused connection token");
    }
}

/// Serve `requestConnectionToken` for one backend until `cancel` fires.
///
/// The listener is registered before this returns, so no request emitted
/// after the call can be missed. Each request is answered on its own task.
pub(crate) fn spawn_rendezvous(
    backend: Arc<dyn TerminalBackend>,
    provider: Arc<dyn ConnectionTokenProvider>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut requests = backend.add_listener(Channel::RequestConnectionToken);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                request = requests.recv() => {
                    if request.is_none() {
                        break;
                    }
                    debug!(backend = %backend.kind(), "connection token requested");
                    let backend = Arc::clone(&backend);
                    let provider = Arc::clone(&provider);
                    tokio::spawn(async move {
                        answer_token_request(backend.as_ref(), provider.as_ref()).await;
                    });
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tillbridge_api::{BackendKind, MockBackend};

    use super::*;

    #[tokio::test]
    async fn token_is_delivered() {
        let backend = MockBackend::new(BackendKind::Native);
        let provider = || async { Ok::<_, TokenFetchError>("pst_test_1".to_string()) };
        answer_token_request(&backend, &provider).await;
        assert_eq!(
            backend.token_deliveries(),
            vec![(Some("pst_test_1".to_string()), None)]
        );
    }

    #[tokio::test]
    async fn failure_without_message_uses_default() {
        let backend = MockBackend::new(BackendKind::Native);
        let provider = || async { Err::<String, _>(TokenFetchError::default()) };
        answer_token_request(&backend, &provider).await;
        assert_eq!(
            backend.token_deliveries(),
            vec![(None, Some(DEFAULT_TOKEN_ERROR.to_string()))]
        );
    }

    #[tokio::test]
    async fn failure_message_is_forwarded() {
        let backend = MockBackend::new(BackendKind::Web);
        let provider = || async { Err::<String, _>(TokenFetchError::new("server down")) };
        answer_token_request(&backend, &provider).await;
        assert_eq!(
            backend.token_deliveries(),
            vec![(None, Some("server down".to_string()))]
        );
    }

    #[tokio::test]
    async fn empty_token_is_an_error() {
        let backend = MockBackend::new(BackendKind::Native);
        let provider = || async { Ok::<_, TokenFetchError>(String::new()) };
        answer_token_request(&backend, &provider).await;
        assert_eq!(
            backend.token_deliveries(),
            vec![(None, Some(EMPTY_TOKEN_ERROR.to_string()))]
        );
    }

    #[tokio::test]
    async fn every_request_is_answered() {
        let backend = Arc::new(MockBackend::new(BackendKind::Native));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider: Arc<dyn ConnectionTokenProvider> = Arc::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, TokenFetchError>(format!("pst_{n}")) }
        });
        let cancel = CancellationToken::new();
        let task = spawn_rendezvous(backend.clone(), provider, cancel.clone());

        backend.emit(Channel::RequestConnectionToken, json!({}));
        backend.emit(Channel::RequestConnectionToken, json!({}));
        backend.wait_for_calls("setConnectionToken", 2).await;

        let mut tokens: Vec<_> = backend
            .token_deliveries()
            .into_iter()
            .filter_map(|(token, _)| token)
            .collect();
        tokens.sort();
        assert_eq!(tokens, ["pst_0", "pst_1"]);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(backend.listener_count(Channel::RequestConnectionToken), 0);
    }
}
