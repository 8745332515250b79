//! Request forwarding to runners
//!
//! Each forwarded request is rewritten to the runner's scheme, host and
//! path (minus the runner's prefix) and sent synchronously; the runner's
//! response is relayed verbatim. Transport failures become `500` responses
//! carrying the error text, and any panic while handling a request is caught
//! at the per-request [`fault_boundary`].

use crate::config::ServerSettings;
use crate::proxy::headers::HOST;
use crate::proxy::types::*;
use crate::routes::RequestHandler;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, Uri, Version},
    response::{IntoResponse, Response},
    routing::any,
};
use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

/// Outbound HTTP client, able to reach both `http` and `https` runners
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Builds a request handler that forwards to one runner
pub trait Forward {
    fn forward_request(
        &self,
        host: &TargetHost,
        path_prefix: &RunnerPath,
        scheme: TargetScheme,
    ) -> RequestHandler;
}

/// Bounds applied to every forwarded request
#[derive(Clone, Copy, Debug)]
pub struct ForwardLimits {
    /// Time allowed to read the inbound body
    pub read_timeout: Duration,
    /// Time allowed for the runner to answer
    pub write_timeout: Duration,
    pub max_request_bytes: usize,
}

impl From<&ServerSettings> for ForwardLimits {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            read_timeout: settings.read_timeout(),
            write_timeout: settings.write_timeout(),
            max_request_bytes: settings.max_request_bytes,
        }
    }
}

impl Default for ForwardLimits {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

/// Per-request record, alive for exactly one request/response cycle
pub struct ProxyRequest {
    pub received: Instant,
    pub request: Request<Body>,
}

/// Gateway service producing forwarding handlers that share one client
#[derive(Clone)]
pub struct GatewayService {
    client: HttpClient,
    limits: ForwardLimits,
}

impl GatewayService {
    pub fn new(limits: ForwardLimits) -> Self {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .http1_title_case_headers(true)
            .http1_preserve_header_case(true)
            .build(connector);

        Self { client, limits }
    }
}

impl Forward for GatewayService {
    fn forward_request(
        &self,
        host: &TargetHost,
        path_prefix: &RunnerPath,
        scheme: TargetScheme,
    ) -> RequestHandler {
        let target = ForwardTarget {
            host: host.clone(),
            path_prefix: path_prefix.clone(),
            scheme,
            client: self.client.clone(),
            limits: self.limits,
        };
        any(forward_handler).with_state(Arc::new(target))
    }
}

struct ForwardTarget {
    host: TargetHost,
    path_prefix: RunnerPath,
    scheme: TargetScheme,
    client: HttpClient,
    limits: ForwardLimits,
}

async fn forward_handler(State(target): State<Arc<ForwardTarget>>, request: Request) -> Response {
    let received = Instant::now();
    fault_boundary(received, target.proxy(ProxyRequest { received, request })).await
}

/// Path sent to the runner once its prefix has been removed
pub fn target_path(path_prefix: &RunnerPath, path: &str) -> String {
    let stripped = if path_prefix.is_strippable() {
        trace!(prefix = %path_prefix, path, "Trimming prefix from path");
        path.strip_prefix(path_prefix.as_ref()).unwrap_or(path)
    } else {
        path
    };

    if stripped.is_empty() {
        DEFAULT_PATH.to_string()
    } else if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    }
}

impl ForwardTarget {
    fn target_uri(&self, path: &str, query: Option<&str>) -> ProxyResult<Uri> {
        let path_and_query = match query {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };

        Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.host.as_ref())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ProxyError::InvalidTargetUri(e.to_string()))
    }

    async fn proxy(&self, proxy_request: ProxyRequest) -> Response {
        let ProxyRequest { received, request } = proxy_request;
        let (parts, body) = request.into_parts();

        let original_host = parts
            .uri
            .host()
            .or_else(|| parts.headers.get(HOST).and_then(|h| h.to_str().ok()))
            .unwrap_or_default()
            .to_string();
        let original_path = parts.uri.path().to_string();
        let original_scheme = parts
            .uri
            .scheme_str()
            .unwrap_or(DEFAULT_INBOUND_SCHEME)
            .to_string();
        let target_path = target_path(&self.path_prefix, &original_path);

        let target_uri = match self.target_uri(&target_path, parts.uri.query()) {
            Ok(uri) => uri,
            Err(error) => {
                error!(
                    error = %error,
                    target_host = %self.host,
                    target_path = %target_path,
                    "Failed to build target URI"
                );
                return error.into_response();
            }
        };

        // the inbound request is copied, never mutated in place
        let mut outbound = axum::http::request::Builder::new()
            .method(parts.method.clone())
            .uri(target_uri.clone())
            .version(Version::HTTP_11);
        if let Some(headers) = outbound.headers_mut() {
            headers.extend(parts.headers.clone());
            headers.remove(HOST);
        }

        match self.send(outbound, body).await {
            Ok(response) => {
                info!(
                    duration = ?received.elapsed(),
                    original_host = %original_host,
                    original_path = %original_path,
                    original_scheme = %original_scheme,
                    target_host = %self.host,
                    target_path = %target_path,
                    target_scheme = %self.scheme,
                    status = response.status().as_u16(),
                    "Successfully proxied request"
                );
                response
            }
            Err(error) => {
                error!(
                    duration = ?received.elapsed(),
                    error = %error,
                    uri = %target_uri,
                    "Failed to proxy request"
                );
                error.into_response()
            }
        }
    }

    async fn send(
        &self,
        outbound: axum::http::request::Builder,
        body: Body,
    ) -> ProxyResult<Response> {
        let max_size = self.limits.max_request_bytes;
        let body: Bytes = tokio::time::timeout(
            self.limits.read_timeout,
            Limited::new(body, max_size).collect(),
        )
        .await
        .map_err(|_| ProxyError::RequestTimeout(self.limits.read_timeout))?
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                ProxyError::RequestTooLarge { max_size }
            } else {
                ProxyError::Body(e.to_string())
            }
        })?
        .to_bytes();

        let request = outbound
            .body(Body::from(body))
            .map_err(|e| ProxyError::InvalidTargetUri(e.to_string()))?;

        let response = tokio::time::timeout(self.limits.write_timeout, self.client.request(request))
            .await
            .map_err(|_| ProxyError::RequestTimeout(self.limits.write_timeout))?
            .map_err(|e| ProxyError::upstream(&e))?;

        Ok(relay(response))
    }
}

/// Runner response, status and headers and body, passed through unchanged
fn relay(response: hyper::Response<Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}

/// Run one request's handling, converting a panic into a `500` response
pub async fn fault_boundary<F>(received: Instant, handling: F) -> Response
where
    F: Future<Output = Response>,
{
    match AssertUnwindSafe(handling).catch_unwind().await {
        Ok(response) => response,
        Err(fault) => {
            let message = fault_message(fault.as_ref());
            error!(
                duration = ?received.elapsed(),
                panic = message.as_deref().unwrap_or("<non-string panic payload>"),
                stacktrace = %Backtrace::force_capture(),
                "Recovered from panic"
            );

            let body = message.unwrap_or_else(|| INTERNAL_SERVER_ERROR_BODY.to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

fn fault_message(fault: &(dyn Any + Send)) -> Option<String> {
    fault
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| fault.downcast_ref::<String>().cloned())
}
