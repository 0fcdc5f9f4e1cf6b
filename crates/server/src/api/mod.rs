use crate::config::AppState;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the HTTP server and run until Ctrl-C
pub async fn serve(addr: &str, state: AppState, mcp_path: &str) -> Result<()> {
    let app = create_router(state, mcp_path);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("MCP endpoint listening on http://{}{}", addr, mcp_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Create the HTTP router
fn create_router(state: AppState, mcp_path: &str) -> Router {
    Router::new()
        .route(mcp_path, post(handlers::mcp_endpoint))
        .route("/health", get(handlers::health_check))
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use catalog_core::config::StoreConfig;
    use catalog_core::error::CatalogError;
    use catalog_core::storage::{open_store, ProductStore, QuerySpec, StoreInfo};
    use catalog_core::types::{ETag, PartitionKey, Product, ProductKey};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let store = open_store(&StoreConfig::new("memory:")).unwrap();
        create_router(AppState::with_store(store, None).unwrap(), "/mcp")
    }

    /// Store whose backend is unreachable
    struct UnreachableStore {
        partition_key: PartitionKey,
    }

    impl UnreachableStore {
        fn down() -> CatalogError {
            CatalogError::store("connection refused")
        }
    }

    impl ProductStore for UnreachableStore {
        fn read_item(&self, _key: &ProductKey) -> Result<Product, CatalogError> {
            Err(Self::down())
        }

        fn create_item(&self, _product: Product) -> Result<Product, CatalogError> {
            Err(Self::down())
        }

        fn replace_item(
            &self,
            _key: &ProductKey,
            _product: Product,
            _if_match: Option<&ETag>,
        ) -> Result<Product, CatalogError> {
            Err(Self::down())
        }

        fn delete_item(&self, _key: &ProductKey) -> Result<(), CatalogError> {
            Err(Self::down())
        }

        fn query_items(&self, _spec: &QuerySpec) -> Result<Vec<Product>, CatalogError> {
            Err(Self::down())
        }

        fn ping(&self) -> Result<(), CatalogError> {
            Err(Self::down())
        }

        fn partition_key(&self) -> &PartitionKey {
            &self.partition_key
        }

        fn describe(&self) -> StoreInfo {
            StoreInfo {
                backend: "unreachable",
                database: "products-db".to_string(),
                container: "products".to_string(),
                partition_key: self.partition_key.field().to_string(),
            }
        }
    }

    async fn post_json(app: Router, body: String) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_health_reports_connected_store() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"status": "healthy", "cosmos_db": "connected"}));
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_store() {
        let store = Arc::new(UnreachableStore {
            partition_key: PartitionKey::default(),
        });
        let app = create_router(AppState::with_store(store, None).unwrap(), "/mcp");

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            json!({"status": "unhealthy", "error": "Store error: connection refused"})
        );
    }

    #[tokio::test]
    async fn test_tool_call_over_http() {
        let app = router();

        let create = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {
            "name": "create_product",
            "arguments": {"product": {"id": "p1", "category": "Electronics", "name": "Widget", "price": 9.99}}
        }});
        let (status, body) = post_json(app.clone(), create.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["result"]["content"][0]["text"],
            "Product 'Widget' created successfully with ID: p1"
        );

        let search = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
            "name": "search_products", "arguments": {"query": "widg"}
        }});
        let (_, body) = post_json(app, search.to_string()).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["result"]["structuredContent"]["count"], 1);
    }

    #[tokio::test]
    async fn test_notifications_and_malformed_bodies() {
        let (status, body) = post_json(
            router(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_empty());

        let (status, body) = post_json(router(), "{oops".to_string()).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }
}
