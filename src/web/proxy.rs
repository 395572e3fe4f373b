//! Development server pass-through
//!
//! In dev mode every non-API request is forwarded to the front-end dev
//! server so the window and the API share one origin.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, uri::{Authority, PathAndQuery, Scheme}, HeaderMap, HeaderValue, Uri, Version},
    response::{IntoResponse, Response},
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use tracing::{debug, warn};

use super::response::{ApiError, MSG_UPSTREAM};
use super::routes::AppState;

/// Proxy errors
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid dev server origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("invalid upstream URI: {0}")]
    InvalidUri(#[from] axum::http::Error),

    #[error("dev server request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Forwards requests to a fixed `http://host:port` origin
#[derive(Debug, Clone)]
pub struct DevProxy {
    scheme: Scheme,
    authority: Authority,
    client: Client<HttpConnector, Body>,
}

impl DevProxy {
    /// Create a proxy for `origin`, e.g. `http://localhost:3000`
    pub fn new(origin: &str) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidOrigin {
            origin: origin.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = origin.parse().map_err(|_| invalid("not a URI"))?;
        let scheme = uri.scheme().cloned().ok_or_else(|| invalid("missing scheme"))?;
        if scheme != Scheme::HTTP {
            return Err(invalid("only http origins are supported"));
        }
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| invalid("missing host"))?;

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            scheme,
            authority,
            client,
        })
    }

    /// Upstream origin as a string
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Forward a request, keeping its path and query
    pub async fn forward(&self, mut req: Request) -> Result<Response, ProxyError> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        *req.uri_mut() = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?;
        *req.version_mut() = Version::HTTP_11;

        strip_hop_by_hop(req.headers_mut());
        if let Ok(host) = HeaderValue::from_str(self.authority.as_str()) {
            req.headers_mut().insert(header::HOST, host);
        }

        debug!(uri = %req.uri(), method = %req.method(), "proxying to dev server");
        let response = self.client.request(req).await?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
    ] {
        headers.remove(name);
    }
}

/// Fallback handler used in dev mode
pub async fn proxy_to_dev_server(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let Some(proxy) = state.dev_proxy.as_ref() else {
        return ApiError::NotFound("Not found").into_response();
    };

    match proxy.forward(req).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, origin = %proxy.origin(), "dev server unreachable");
            ApiError::BadGateway(MSG_UPSTREAM).into_response()
        }
    }
}
