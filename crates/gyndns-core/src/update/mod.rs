//! Update endpoint
//!
//! [`UpdateService`] is the transport-independent half of the endpoint:
//! it takes an already-decoded [`UpdateRequest`] and runs the checks in a
//! fixed order, each one terminal for the request.
//!
//! 1. Credentials present and non-empty, else [`Error::Unauthenticated`]
//! 2. Credentials valid, else [`Error::InvalidCredentials`]
//! 3. `hostname` present, else [`Error::BadRequest`]
//! 4. An address resolved from `myip`, `X-Real-IP` or the peer, else
//!    [`Error::BadRequest`]
//! 5. Hostname owned by the user, else [`Error::Unauthorized`]
//! 6. Address written under the fully-qualified hostname
//!
//! The HTTP binding lives in [`http`].

pub mod http;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing::{info, warn};

use crate::access::UserTable;
use crate::error::{Error, Result};
use crate::store::{RecordStore, fully_qualified};

/// Form parameter naming the hostname to update
pub const HOSTNAME_PARAM: &str = "hostname";

/// Form parameter carrying an explicit address
pub const MYIP_PARAM: &str = "myip";

/// Header set by reverse proxies with the client address
pub const REAL_IP_HEADER: &str = "X-Real-IP";

/// Username and password from the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create a credentials pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A decoded update request
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Basic credentials, if the request carried any
    pub credentials: Option<Credentials>,
    /// `hostname` form parameter
    pub hostname: Option<String>,
    /// `myip` form parameter
    pub myip: Option<String>,
    /// `X-Real-IP` header
    pub real_ip: Option<String>,
    /// Observed peer address
    pub remote_addr: Option<SocketAddr>,
}

/// Outcome of a successful update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    /// Fully-qualified hostname
    pub hostname: String,
    /// Address now stored for the hostname
    pub address: IpAddr,
    /// User who published it
    pub username: String,
}

/// Pick the address to publish
///
/// Sources are tried in strict priority order and the first one that parses
/// wins; a source that is present but unparseable falls through. IPv4-mapped
/// IPv6 addresses (`::ffff:a.b.c.d`) are published as plain IPv4.
pub fn resolve_address(
    myip: Option<&str>,
    real_ip: Option<&str>,
    remote_addr: Option<SocketAddr>,
) -> Option<IpAddr> {
    [myip, real_ip]
        .into_iter()
        .flatten()
        .find_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
        .or_else(|| remote_addr.map(|addr| addr.ip()))
        .map(|ip| ip.to_canonical())
}

/// Authenticates, authorizes and publishes address updates
#[derive(Debug, Clone)]
pub struct UpdateService {
    users: Arc<UserTable>,
    store: RecordStore,
}

impl UpdateService {
    /// Create the service over a user table and a record store
    pub fn new(users: Arc<UserTable>, store: RecordStore) -> Self {
        Self { users, store }
    }

    /// Run one update request to completion
    pub async fn handle(&self, request: UpdateRequest) -> Result<PublishedRecord> {
        let credentials = request
            .credentials
            .filter(|c| !c.username.is_empty() && !c.password.is_empty())
            .ok_or(Error::Unauthenticated)?;

        let user = self
            .users
            .authenticate(&credentials.username, &credentials.password)
            .map_err(|e| {
                warn!(username = %credentials.username, "{}", e);
                Error::from(e)
            })?;

        let hostname = request
            .hostname
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::bad_request(format!("Missing '{}' parameter", HOSTNAME_PARAM)))?;

        let address = resolve_address(
            request.myip.as_deref(),
            request.real_ip.as_deref(),
            request.remote_addr,
        )
        .ok_or_else(|| {
            Error::bad_request(format!(
                "Missing '{}' parameter ({})",
                MYIP_PARAM,
                request.myip.as_deref().unwrap_or_default()
            ))
        })?;

        if !user.authorize(&hostname) {
            warn!(username = %user.username(), hostname = %hostname, "hostname not owned by user");
            return Err(Error::unauthorized(user.username(), hostname));
        }

        let hostname = fully_qualified(&hostname);
        info!(
            hostname = %hostname,
            address = %address,
            username = %user.username(),
            "Updating {} to -> {} via request from {}",
            hostname,
            address,
            user.username()
        );

        self.store.set(&hostname, address).await?;

        Ok(PublishedRecord {
            hostname,
            address,
            username: user.username().to_string(),
        })
    }
}
