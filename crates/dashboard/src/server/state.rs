//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use axum::http::Uri;

use crate::auth::{Access, Authorizer};
use crate::render::{Composer, Dispatcher, HelperContext, MemoryAssets, RenderPolicy};
use crate::server::mode::ServerMode;
use crate::snapshot::CoreStore;

/// Application state shared across all request handlers.
///
/// Every field is built once before the listener accepts and only read
/// afterwards. Cloning is cheap: the heavy parts are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Authorizer,
    pub dispatcher: Dispatcher,
    pub core: CoreStore,
    pub use_cdn: bool,
}

impl AppState {
    pub fn new(
        authorizer: Authorizer,
        dispatcher: Dispatcher,
        core: CoreStore,
        use_cdn: bool,
    ) -> Self {
        Self {
            authorizer,
            dispatcher,
            core,
            use_cdn,
        }
    }

    /// Per-request helper context for a caller holding `access`.
    pub fn helper_context(&self, access: Access, uri: &Uri) -> HelperContext {
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        HelperContext::new(
            access,
            url,
            self.core.current(),
            self.authorizer.secrets(),
            self.use_cdn,
        )
    }
}

impl Default for AppState {
    /// Unconfigured state with empty asset stores, suitable for tests.
    fn default() -> Self {
        let composer = Composer::new(
            Arc::new(MemoryAssets::new()),
            Arc::new(MemoryAssets::new()),
        );
        Self::new(
            Authorizer::new(None, None, false),
            Dispatcher::new(composer, ServerMode::Plaintext, RenderPolicy::BestEffort),
            CoreStore::default(),
            false,
        )
    }
}
