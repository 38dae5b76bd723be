//! Forwarding proxy for the generation API
//!
//! Requests under `/google-api/` are replayed against the upstream with the
//! prefix removed. Method, headers (except `Host`), query and body pass
//! through; so do the upstream status, headers and body.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{CONNECTION, HOST, TRANSFER_ENCODING};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::Result;

pub const DEFAULT_UPSTREAM: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BIND: &str = "127.0.0.1:8788";
pub const PROXY_PREFIX: &str = "/google-api";

/// Request bodies carry base64 photos
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
  client: Client,
  upstream: Arc<str>,
}

impl ProxyState {
  pub fn new(upstream: &str) -> Result<Self> {
    let client = Client::builder().build()?;
    Ok(Self { client, upstream: Arc::from(upstream.trim_end_matches('/')) })
  }

  pub fn upstream(&self) -> &str {
    &self.upstream
  }
}

/// Upstream URL for a proxied path, or `None` when the path is outside the
/// proxy prefix
pub fn rewrite_target(upstream: &str, path: &str, query: Option<&str>) -> Option<String> {
  let rest = path.strip_prefix(PROXY_PREFIX)?;
  if !rest.starts_with('/') {
    return None;
  }

  let mut target = format!("{}{}", upstream.trim_end_matches('/'), rest);
  if let Some(query) = query.filter(|q| !q.is_empty()) {
    target.push('?');
    target.push_str(query);
  }
  Some(target)
}

pub fn create_router(state: ProxyState) -> Router {
  Router::new().fallback(forward).with_state(state).layer(TraceLayer::new_for_http())
}

async fn forward(State(state): State<ProxyState>, request: Request) -> Response {
  let uri = request.uri();
  let Some(target) = rewrite_target(&state.upstream, uri.path(), uri.query()) else {
    return StatusCode::NOT_FOUND.into_response();
  };

  let (parts, body) = request.into_parts();
  let body = match to_bytes(body, MAX_BODY_BYTES).await {
    Ok(bytes) => bytes,
    Err(e) => {
      warn!(error = %e, "could not read request body");
      return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
    }
  };

  let mut headers = parts.headers;
  headers.remove(HOST);

  debug!(method = %parts.method, target = %target, "forwarding");
  let upstream = state.client.request(parts.method, &target).headers(headers).body(body).send().await;

  let upstream = match upstream {
    Ok(response) => response,
    Err(e) => {
      warn!(error = %e, target = %target, "upstream unreachable");
      return (StatusCode::BAD_GATEWAY, format!("upstream unreachable: {e}")).into_response();
    }
  };

  let status = upstream.status();
  let mut headers = upstream.headers().clone();
  // The body is re-framed below
  headers.remove(TRANSFER_ENCODING);
  headers.remove(CONNECTION);

  match upstream.bytes().await {
    Ok(bytes) => {
      let mut response = Response::new(Body::from(bytes));
      *response.status_mut() = status;
      *response.headers_mut() = headers;
      response
    }
    Err(e) => {
      warn!(error = %e, target = %target, "upstream body interrupted");
      (StatusCode::BAD_GATEWAY, format!("upstream body interrupted: {e}")).into_response()
    }
  }
}

/// Serve on an already bound listener until the process stops
pub async fn serve_on(listener: TcpListener, state: ProxyState) -> Result<()> {
  let app = create_router(state);
  axum::serve(listener, app).await?;
  Ok(())
}

pub async fn serve(bind: SocketAddr, upstream: &str) -> Result<()> {
  let state = ProxyState::new(upstream)?;
  let listener = TcpListener::bind(bind).await?;
  info!(%bind, upstream = state.upstream(), "proxy listening");
  serve_on(listener, state).await
}
