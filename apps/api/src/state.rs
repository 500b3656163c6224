use std::sync::Arc;

use crate::config::Config;
use crate::store::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// The store handle here is unauthenticated; per-request authenticated
/// handles are derived from it by the `CurrentUser` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    /// Runtime configuration, kept on the state for handlers that need it.
    #[allow(dead_code)]
    pub config: Config,
}
