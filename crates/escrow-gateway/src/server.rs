//! Axum HTTP server: the middleware adapter bridging the engine to HTTP.
//!
//! Every inbound request flows through the fallback handler, which builds an
//! engine-facing `EscrowRequest`, asks the engine for a decision, and either
//! serves an escrowed response, forwards-then-stores, or passes the request
//! through to the downstream application verbatim.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::EngineError;
use crate::escrow::engine::{Decision, EscrowEngine, EscrowRequest};
use crate::escrow::entry::EscrowResponse;
use crate::routes::RouteTable;
use crate::store::MemoryStore;

/// Headers that should NOT be forwarded (hop-by-hop headers).
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
];

/// Bodies are fully buffered; escrowed responses must be serializable whole.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub engine: Arc<EscrowEngine<MemoryStore, RouteTable>>,
    pub client: reqwest::Client,
}

/// Build and run the HTTP server.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen_address.clone();

    let app = Router::new()
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Escrow gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Escrow gateway shut down gracefully");
    Ok(())
}

/// The single request handler: three-way dispatch per the engine's decision.
async fn handle_request(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let escrow_request = EscrowRequest {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        cookie: request
            .headers()
            .get(http::header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    let decision = match state.engine.decide(&escrow_request).await {
        Ok(decision) => decision,
        Err(error) => return engine_error_response(&error),
    };

    match decision {
        Decision::ServeFromEscrow(token) => match state.engine.serve_from_escrow(&token).await {
            Ok(Some(response)) => into_http_response(response),
            // The entry vanished between decide and take (consumed by a
            // racing request or expired): ordinary pass-through.
            Ok(None) => forward(&state, request).await,
            Err(error) => engine_error_response(&error),
        },
        Decision::StoreAndRedirect => {
            let downstream = match forward_buffered(&state, request).await {
                Ok(response) => response,
                Err(error_response) => return error_response,
            };
            match state
                .engine
                .store_and_redirect(&escrow_request, downstream)
                .await
            {
                Ok(redirect) => into_http_response(redirect),
                Err(error) => engine_error_response(&error),
            }
        }
        Decision::PassThrough => forward(&state, request).await,
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    let name = name.to_lowercase();
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Forward a request to the downstream application and relay the response
/// byte-for-byte. Used for pass-through traffic.
async fn forward(state: &Arc<AppState>, request: Request) -> Response {
    let upstream = match send_downstream(state, request).await {
        Ok(upstream) => upstream,
        Err(error_response) => return error_response,
    };

    let status = upstream.status();
    let mut builder = Response::builder().status(status);
    for (name, value) in upstream.headers() {
        if is_hop_by_hop(name.as_str()) || name.as_str() == "content-length" {
            continue;
        }
        builder = builder.header(name, value);
    }

    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(error = %error, "Failed to read downstream response body");
            return (StatusCode::BAD_GATEWAY, "downstream request failed").into_response();
        }
    };

    builder
        .body(Body::from(body))
        .unwrap_or_else(|error| {
            tracing::error!(error = %error, "Failed to assemble pass-through response");
            (StatusCode::INTERNAL_SERVER_ERROR, "").into_response()
        })
}

/// Convert response headers into the stored mapping. Hop-by-hop headers are
/// skipped; a value that cannot be represented as text fails closed, since
/// the stored copy must reproduce the response as-is.
fn escrow_headers(headers: &http::HeaderMap) -> Result<BTreeMap<String, String>, EngineError> {
    let mut map = BTreeMap::new();
    for (name, value) in headers {
        if is_hop_by_hop(name.as_str()) || name.as_str() == "content-length" {
            continue;
        }
        let value = value.to_str().map_err(|_| EngineError::HeaderNotText)?;
        map.insert(name.as_str().to_string(), value.to_string());
    }
    Ok(map)
}

/// Forward a request downstream and buffer the response into the engine's
/// representation, for escrow storage. Non-UTF-8 bodies and non-text
/// headers cannot be carried in the stored format and fail closed.
async fn forward_buffered(
    state: &Arc<AppState>,
    request: Request,
) -> Result<EscrowResponse, Response> {
    let upstream = send_downstream(state, request).await?;

    let status = upstream.status().as_u16();
    let headers = match escrow_headers(upstream.headers()) {
        Ok(headers) => headers,
        Err(error) => return Err(engine_error_response(&error)),
    };

    let bytes = upstream.bytes().await.map_err(|error| {
        tracing::error!(error = %error, "Failed to read downstream response body");
        (StatusCode::BAD_GATEWAY, "downstream request failed").into_response()
    })?;

    let body = if bytes.is_empty() {
        Vec::new()
    } else {
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => vec![text],
            Err(_) => return Err(engine_error_response(&EngineError::BodyNotText)),
        }
    };

    Ok(EscrowResponse {
        status,
        headers,
        body,
    })
}

/// Build and send the downstream request, stripping hop-by-hop headers.
async fn send_downstream(
    state: &Arc<AppState>,
    request: Request,
) -> Result<reqwest::Response, Response> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request
        .uri()
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    let url = format!("{}{path}{query}", state.config.upstream.base_url);

    let headers = request.headers().clone();
    let body: Bytes = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(error = %error, "Failed to read request body");
            return Err(
                (StatusCode::BAD_REQUEST, "failed to read request body").into_response()
            );
        }
    };

    let mut req_builder = state.client.request(method, &url).body(body);
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        req_builder = req_builder.header(name, value);
    }

    req_builder.send().await.map_err(|error| {
        tracing::error!(error = %error, url = %url, "Downstream request failed");
        (StatusCode::BAD_GATEWAY, "downstream request failed").into_response()
    })
}

/// Convert an engine response into an axum response. Unassemblable header
/// data from a stored document fails closed as a 500.
fn into_http_response(response: EscrowResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(response.body_text()))
        .unwrap_or_else(|error| {
            tracing::error!(error = %error, "Failed to assemble escrowed response");
            (StatusCode::INTERNAL_SERVER_ERROR, "").into_response()
        })
}

/// Map engine failures to server errors. Store trouble and corrupt entries
/// are fatal for the request, never retried here.
fn engine_error_response(error: &EngineError) -> Response {
    tracing::error!(error = %error, "Escrow engine failure");
    let status = match error {
        EngineError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::CorruptEntry(_) | EngineError::BodyNotText | EngineError::HeaderNotText => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, "escrow processing failed").into_response()
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, draining connections...");
}
