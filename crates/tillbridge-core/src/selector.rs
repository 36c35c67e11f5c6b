// ── Backend selector ──
//
// Owns the configured backends and answers "which one is authoritative right
// now" from the shared session state. Callers always get a reference to one
// concrete `TerminalBackend`; there is no combined handle.

use std::sync::Arc;

use tillbridge_api::{BackendKind, TerminalBackend};

use crate::config::Platform;
use crate::error::CoreError;
use crate::session::SessionState;

/// The backends a terminal is built over.
#[derive(Clone)]
pub enum Backends {
    /// Mobile host: the native bridge, plus the browser SDK when internet
    /// readers should be reachable.
    Native {
        native: Arc<dyn TerminalBackend>,
        web: Option<Arc<dyn TerminalBackend>>,
    },
    /// Browser host: the browser SDK is the only backend.
    Browser(Arc<dyn TerminalBackend>),
}

impl Backends {
    pub fn native(native: Arc<dyn TerminalBackend>) -> Self {
        Self::Native { native, web: None }
    }

    pub fn dual(native: Arc<dyn TerminalBackend>, web: Arc<dyn TerminalBackend>) -> Self {
        Self::Native {
            native,
            web: Some(web),
        }
    }

    pub fn browser(web: Arc<dyn TerminalBackend>) -> Self {
        Self::Browser(web)
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native { web, .. } => f
                .debug_struct("Native")
                .field("web", &web.is_some())
                .finish_non_exhaustive(),
            Self::Browser(_) => f.write_str("Browser"),
        }
    }
}

pub(crate) struct Selector {
    platform: Platform,
    /// Native bridge on mobile hosts, browser SDK on browser hosts.
    primary: Arc<dyn TerminalBackend>,
    /// Browser SDK alongside the native bridge.
    web: Option<Arc<dyn TerminalBackend>>,
    state: Arc<SessionState>,
}

impl Selector {
    pub(crate) fn new(
        platform: Platform,
        backends: Backends,
        state: Arc<SessionState>,
    ) -> Result<Self, CoreError> {
        let (primary, web) = match backends {
            Backends::Native { native, web } if platform.is_native() => {
                expect_kind(&native, BackendKind::Native)?;
                if let Some(web) = &web {
                    expect_kind(web, BackendKind::Web)?;
                }
                (native, web)
            }
            Backends::Browser(web) if !platform.is_native() => {
                expect_kind(&web, BackendKind::Web)?;
                (web, None)
            }
            other => {
                return Err(CoreError::Config {
                    message: format!("platform {platform} cannot host {other:?} backends"),
                });
            }
        };

        Ok(Self {
            platform,
            primary,
            web,
            state,
        })
    }

    /// The backend whose results and events are authoritative right now.
    pub(crate) fn active(&self) -> &Arc<dyn TerminalBackend> {
        match &self.web {
            Some(web)
                if self.state.selected() == BackendKind::Web && self.state.is_initialized() =>
            {
                web
            }
            _ => &self.primary,
        }
    }

    pub(crate) fn active_kind(&self) -> BackendKind {
        if self.platform.is_native() {
            self.active().kind()
        } else {
            BackendKind::Web
        }
    }

    /// The browser SDK running alongside the native bridge, if any.
    pub(crate) fn secondary_web(&self) -> Option<&Arc<dyn TerminalBackend>> {
        self.web.as_ref()
    }

    /// Every configured backend, primary first.
    pub(crate) fn backends(&self) -> impl Iterator<Item = &Arc<dyn TerminalBackend>> {
        std::iter::once(&self.primary).chain(self.web.iter())
    }

    pub(crate) fn pin(&self, kind: BackendKind) {
        self.state.select(kind);
    }
}

fn expect_kind(backend: &Arc<dyn TerminalBackend>, kind: BackendKind) -> Result<(), CoreError> {
    if backend.kind() == kind {
        Ok(())
    } else {
        Err(CoreError::Config {
            message: format!("expected a {kind} backend, got {}", backend.kind()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tillbridge_api::MockBackend;

    use super::*;

    fn mock(kind: BackendKind) -> Arc<dyn TerminalBackend> {
        Arc::new(MockBackend::new(kind))
    }

    #[test]
    fn browser_platform_is_always_web() {
        let state = Arc::new(SessionState::new());
        let selector = Selector::new(
            Platform::Web,
            Backends::browser(mock(BackendKind::Web)),
            Arc::clone(&state),
        )
        .unwrap();
        assert_eq!(selector.active_kind(), BackendKind::Web);
        selector.pin(BackendKind::Native);
        assert_eq!(selector.active_kind(), BackendKind::Web);
        assert_eq!(selector.backends().count(), 1);
    }

    #[test]
    fn web_pin_needs_web_backend_and_initialization() {
        let state = Arc::new(SessionState::new());
        let selector = Selector::new(
            Platform::Ios,
            Backends::dual(mock(BackendKind::Native), mock(BackendKind::Web)),
            Arc::clone(&state),
        )
        .unwrap();

        selector.pin(BackendKind::Web);
        assert_eq!(selector.active_kind(), BackendKind::Native);

        state.mark_initialized();
        assert_eq!(selector.active_kind(), BackendKind::Web);

        selector.pin(BackendKind::Native);
        assert_eq!(selector.active_kind(), BackendKind::Native);
    }

    #[test]
    fn native_only_ignores_web_pin() {
        let state = Arc::new(SessionState::new());
        state.mark_initialized();
        let selector = Selector::new(
            Platform::Android,
            Backends::native(mock(BackendKind::Native)),
            Arc::clone(&state),
        )
        .unwrap();
        selector.pin(BackendKind::Web);
        assert_eq!(selector.active_kind(), BackendKind::Native);
    }

    #[test]
    fn mismatched_backends_are_rejected() {
        let state = Arc::new(SessionState::new());
        let wrong_platform = Selector::new(
            Platform::Web,
            Backends::native(mock(BackendKind::Native)),
            Arc::clone(&state),
        );
        assert!(matches!(wrong_platform, Err(CoreError::Config { .. })));

        let wrong_kind = Selector::new(
            Platform::Ios,
            Backends::native(mock(BackendKind::Web)),
            state,
        );
        assert!(matches!(wrong_kind, Err(CoreError::Config { .. })));
    }
}
