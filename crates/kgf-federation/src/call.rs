//! Guarded backend calls.
//!
//! Every adapter call made on behalf of a request runs under its own
//! timeout and races the request's cancellation token. A timeout becomes
//! `StoreUnavailable` for that backend; cancellation becomes `Cancelled`
//! and drops the in-flight call.

use std::future::Future;
use std::time::Duration;

use kgf_core::{EntityStore, FederationConfig, GraphStore, KgfError, KgfResult, Provenance};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Await `fut` for at most `limit`, or until `cancel` fires.
pub async fn guarded<T, F>(
    cancel: &CancellationToken,
    store: Provenance,
    limit: Duration,
    op: &'static str,
    fut: F,
) -> KgfResult<T>
where
    F: Future<Output = KgfResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(KgfError::Cancelled);
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(%store, op, "Backend call cancelled");
            Err(KgfError::Cancelled)
        }
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(result) => result,
            Err(_) => {
                warn!(%store, op, timeout_ms = limit.as_millis() as u64, "Backend call timed out");
                Err(KgfError::unavailable(
                    store,
                    format!("{} timed out after {}ms", op, limit.as_millis()),
                ))
            }
        }
    }
}

/// Both adapters plus the per-request guard settings.
#[derive(Clone, Copy)]
pub(crate) struct Calls<'a> {
    pub entity: &'a dyn EntityStore,
    pub graph: &'a dyn GraphStore,
    entity_timeout: Duration,
    graph_timeout: Duration,
    cancel: &'a CancellationToken,
}

impl<'a> Calls<'a> {
    pub fn new(
        entity: &'a dyn EntityStore,
        graph: &'a dyn GraphStore,
        config: &FederationConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            entity,
            graph,
            entity_timeout: config.entity_timeout(),
            graph_timeout: config.graph_timeout(),
            cancel,
        }
    }

    pub async fn on_entity<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = KgfResult<T>>,
    ) -> KgfResult<T> {
        guarded(self.cancel, Provenance::EntityStore, self.entity_timeout, op, fut).await
    }

    pub async fn on_graph<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = KgfResult<T>>,
    ) -> KgfResult<T> {
        guarded(self.cancel, Provenance::GraphStore, self.graph_timeout, op, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_becomes_store_unavailable() {
        let cancel = CancellationToken::new();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, KgfError>(1)
        };
        let err = guarded(&cancel, Provenance::GraphStore, Duration::from_millis(20), "search_nodes", slow)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KgfError::StoreUnavailable { store: Provenance::GraphStore, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancellation_wins_over_pending_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, KgfError>(1)
        };
        let err = guarded(&cancel, Provenance::EntityStore, Duration::from_secs(10), "search", slow)
            .await
            .unwrap_err();
        assert_eq!(err, KgfError::Cancelled);
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let cancel = CancellationToken::new();
        let value = guarded(&cancel, Provenance::EntityStore, Duration::from_secs(1), "get_by_id", async {
            Ok::<_, KgfError>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }
}
