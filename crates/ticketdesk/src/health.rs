// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Liveness probe for process supervisors.
//!
//! `GET /health` reports ready while the store answers its health check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use ticketdesk_config::model::HealthConfig;
use ticketdesk_core::{DeskError, HealthStatus, PluginAdapter, StorageAdapter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn router(store: Arc<dyn StorageAdapter>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .with_state(store)
}

pub async fn get_health(
    State(store): State<Arc<dyn StorageAdapter>>,
) -> (StatusCode, Json<Value>) {
    match store.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Ok(status) => {
            warn!(?status, "health probe: store not ready");
            not_ready()
        }
        Err(e) => {
            warn!(error = %e, "health probe failed");
            not_ready()
        }
    }
}

fn not_ready() -> (StatusCode, Json<Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "not_ready" })),
    )
}

/// Serve the probe until `cancel` fires.
pub async fn serve(
    config: &HealthConfig,
    store: Arc<dyn StorageAdapter>,
    cancel: CancellationToken,
) -> Result<(), DeskError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DeskError::Channel {
            message: format!("failed to bind health endpoint to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("health endpoint listening on {addr}");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| DeskError::Channel {
            message: format!("health endpoint error: {e}"),
            source: Some(Box::new(e)),
        })
}

#[cfg(test)]
mod tests {
    use ticketdesk_test_utils::MemoryStorage;

    use super::*;

    #[tokio::test]
    async fn healthy_store_is_ready() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());
        let (status, Json(body)) = get_health(State(store)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn failing_store_is_not_ready() {
        let memory = Arc::new(MemoryStorage::new());
        memory.fail_on("health_check");
        let (status, Json(body)) = get_health(State(memory as Arc<dyn StorageAdapter>)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let config = HealthConfig {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 0,
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { serve(&config, Arc::new(MemoryStorage::new()), cancel).await }
        });
        cancel.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
