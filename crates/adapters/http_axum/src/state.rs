//! Shared application state for axum handlers.

use std::sync::Arc;

use housectl_domain::status::SystemStatus;
use tokio::sync::watch;

/// Application state shared across all axum handlers.
///
/// `Clone` is implemented manually so the publisher itself does not need to
/// be `Clone`; only the `Arc` wrapper is cloned.
pub struct AppState<P> {
    /// Broker session used by `POST /send`.
    pub publisher: Arc<P>,
    /// Latest aggregate snapshot.
    pub status: watch::Receiver<SystemStatus>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            publisher: Arc::clone(&self.publisher),
            status: self.status.clone(),
        }
    }
}

impl<P> AppState<P> {
    pub fn new(publisher: Arc<P>, status: watch::Receiver<SystemStatus>) -> Self {
        Self { publisher, status }
    }
}
