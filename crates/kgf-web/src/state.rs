//! Application state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kgf_core::{KgfError, KgfResult};
use kgf_federation::{CancellationToken, FederationGateway};
use serde::{Deserialize, Serialize};

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Whole-request budget; expiry cancels every in-flight backend call.
    pub request_timeout_ms: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            request_timeout_ms: 10_000,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<FederationGateway>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(gateway: Arc<FederationGateway>, config: &WebConfig, shutdown: CancellationToken) -> Self {
        Self {
            gateway,
            request_timeout: Duration::from_millis(config.request_timeout_ms.max(1)),
            shutdown,
        }
    }

    /// Token for one request, cancelled on shutdown as well.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Bound a gateway call by the request timeout.
    pub async fn bounded<T>(&self, fut: impl Future<Output = KgfResult<T>>) -> KgfResult<T> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .unwrap_or(Err(KgfError::Cancelled))
    }
}
