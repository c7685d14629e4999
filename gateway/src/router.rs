//! HTTP entry point
//!
//! Routes `POST /proxy/:service_name/:method_name` to the [`Dispatcher`] and
//! `GET /health` to a liveness probe. The routes can be merged into an
//! existing router or nested under any mount point.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::FutureExt;
use serde_json::json;

use crate::dispatch::{Dispatcher, ProxyResponse, RequestIds, StatusPolicy};
use crate::request::ProxyBody;
use crate::rpc::RpcError;

/// Shared state for the proxy routes
pub struct ProxyState {
    pub dispatcher: Dispatcher,
    pub ids: RequestIds,
    /// Debug default for requests that do not set `debug`
    pub debug: bool,
}

impl ProxyState {
    pub fn new(dispatcher: Dispatcher, debug: bool) -> Self {
        Self {
            dispatcher,
            ids: RequestIds::new(),
            debug,
        }
    }
}

/// Build the proxy routes.
pub fn proxy_routes(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/proxy/:service_name/:method_name", post(handle_proxy))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Attach `routes` to `router` under `mount_point`.
///
/// `/` and the empty string merge the routes at the root.
pub fn mount(router: Router, mount_point: &str, routes: Router) -> Router {
    let trimmed = mount_point.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return router.merge(routes);
    }
    if trimmed.starts_with('/') {
        router.nest(trimmed, routes)
    } else {
        router.nest(&format!("/{}", trimmed), routes)
    }
}

async fn handle_proxy(
    State(state): State<Arc<ProxyState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let policy = state.dispatcher.status_policy();

    // Extractor rejections still get a JSON envelope
    let Path((service_name, method_name)) = match path {
        Ok(path) => path,
        Err(rejection) => return reject(rejection.body_text(), policy),
    };
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return reject(rejection.body_text(), policy),
    };

    let handled = AssertUnwindSafe(proxy_call(&state, service_name, method_name, &headers, &body))
        .catch_unwind()
        .await;

    match handled {
        Ok(response) => response.into_response(),
        Err(_) => {
            tracing::error!("Proxy handler panicked");
            ProxyResponse::failure(RpcError::internal("Internal"), policy).into_response()
        }
    }
}

fn reject(details: String, policy: StatusPolicy) -> Response {
    tracing::warn!("Rejected request: {}", details);
    ProxyResponse::failure(RpcError::invalid_argument(details), policy).into_response()
}

async fn proxy_call(
    state: &ProxyState,
    service_name: String,
    method_name: String,
    headers: &HeaderMap,
    body: &[u8],
) -> ProxyResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let parsed = match ProxyBody::parse(content_type, body) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!(
                "Rejected body for {}.{}: {}",
                service_name,
                method_name,
                error.details()
            );
            return ProxyResponse::failure(error, state.dispatcher.status_policy());
        }
    };

    let ctx = state.ids.context(parsed.debug_flag(), state.debug);
    let request = parsed.into_request(service_name, method_name);
    state.dispatcher.dispatch(&ctx, request).await
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
