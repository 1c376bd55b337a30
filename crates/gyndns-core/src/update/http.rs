//! HTTP binding of the update endpoint
//!
//! Routes `/` and `/nic/update` accept `GET` and `POST`. Credentials come
//! from `Authorization: Basic`; `hostname` and `myip` come from the query
//! string or a form-encoded body, the body taking precedence.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use super::{Credentials, HOSTNAME_PARAM, MYIP_PARAM, REAL_IP_HEADER, UpdateRequest, UpdateService};
use crate::error::{Error, Result};
use crate::traits::Frontend;

/// Upper bound on a single request, including reading the body
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const LISTENER: &str = "http";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Error response of the update endpoint: status code and a short text body
#[derive(Debug)]
pub struct UpdateError(pub Error);

impl From<Error> for UpdateError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl UpdateError {
    /// Status code for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::InvalidCredentials(_) | Error::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UpdateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, message).into_response()
    }
}

/// Build the update router
pub fn router(service: UpdateService) -> Router {
    Router::new()
        .route("/", get(update).post(update))
        .route("/nic/update", get(update).post(update))
        .with_state(service)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
}

async fn update(
    State(service): State<UpdateService>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> std::result::Result<StatusCode, UpdateError> {
    let form = Form::parse(query.as_deref(), &headers, &body);

    let request = UpdateRequest {
        credentials: basic_credentials(&headers),
        hostname: form.value(HOSTNAME_PARAM),
        myip: form.value(MYIP_PARAM),
        real_ip: headers
            .get(REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        remote_addr: Some(peer),
    };

    service.handle(request).await?;
    Ok(StatusCode::OK)
}

/// Decode `Authorization: Basic <base64(user:password)>`
///
/// Anything malformed counts as no credentials.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials::new(username, password))
}

/// Form values from the query string and a form-encoded body
#[derive(Debug, Default)]
struct Form {
    body: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl Form {
    fn parse(query: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Self {
        let query = query.map(parse_pairs).unwrap_or_default();

        let is_form = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim_start().starts_with(FORM_CONTENT_TYPE));
        let body = if is_form && !body.is_empty() {
            match std::str::from_utf8(body) {
                Ok(text) => parse_pairs(text),
                Err(_) => {
                    debug!("form body is not UTF-8, ignoring it");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Self { body, query }
    }

    /// First value for `key`, body before query
    fn value(&self, key: &str) -> Option<String> {
        self.body
            .iter()
            .chain(&self.query)
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

fn parse_pairs(text: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(text).unwrap_or_else(|e| {
        debug!(error = %e, "ignoring malformed form data");
        Vec::new()
    })
}

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// Update endpoint listener
pub struct HttpFrontend {
    bind: Bind,
    service: UpdateService,
}

impl HttpFrontend {
    /// Listener that binds `addr` when it starts serving
    pub fn new(addr: SocketAddr, service: UpdateService) -> Self {
        Self {
            bind: Bind::Addr(addr),
            service,
        }
    }

    /// Listener over an already bound socket
    pub fn with_listener(listener: TcpListener, service: UpdateService) -> Self {
        Self {
            bind: Bind::Listener(listener),
            service,
        }
    }
}

#[async_trait]
impl Frontend for HttpFrontend {
    fn name(&self) -> &'static str {
        LISTENER
    }

    async fn serve(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        let Self { bind, service } = *self;
        let listener = match bind {
            Bind::Listener(listener) => listener,
            Bind::Addr(addr) => TcpListener::bind(addr)
                .await
                .map_err(|e| Error::fatal(LISTENER, format!("cannot bind {}: {}", addr, e)))?,
        };
        let local = listener
            .local_addr()
            .map_err(|e| Error::fatal(LISTENER, e.to_string()))?;
        info!(listener = LISTENER, address = %local, "Starting HTTP server at {}", local);

        let app = router(service).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| {
                error!(listener = LISTENER, error = %e, "HTTP server failed");
                Error::fatal(LISTENER, e.to_string())
            })?;

        info!(listener = LISTENER, "HTTP server stopped");
        Ok(())
    }
}
