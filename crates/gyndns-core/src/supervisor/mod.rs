//! Service supervisor
//!
//! Runs every [`Frontend`] as its own task and waits for whichever comes
//! first: the shutdown signal or a fatal error from any listener. Either
//! way all listeners are cancelled, drained, and the record store is
//! flushed. Listeners are never restarted.
//!
//! ```text
//!            shutdown signal ──┐
//!                              ▼
//! ┌──────────┐  fatal   ┌────────────┐  cancel  ┌──────────┐
//! │   dns    │ ───────▶ │ Supervisor │ ───────▶ │   http   │
//! └──────────┘          └────────────┘          └──────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::access::UserTable;
use crate::config::ServiceConfig;
use crate::dns::DnsResponder;
use crate::dns::udp::DnsFrontend;
use crate::error::{Error, Result};
use crate::store::RecordStore;
use crate::traits::Frontend;
use crate::update::UpdateService;
use crate::update::http::HttpFrontend;

/// Owns the lifecycle of the listeners
pub struct Supervisor {
    frontends: Vec<Box<dyn Frontend>>,
    store: RecordStore,
}

impl Supervisor {
    /// Create a supervisor with no listeners
    pub fn new(store: RecordStore) -> Self {
        Self {
            frontends: Vec::new(),
            store,
        }
    }

    /// Wire the DNS and HTTP listeners described by `config`
    ///
    /// Opens the configured store backend; listeners bind when the
    /// supervisor runs.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let users = Arc::new(UserTable::from_config(&config.users)?);
        let store = RecordStore::new(config.store.open().await?);
        info!(
            users = users.len(),
            store = config.store.type_name(),
            "service configured"
        );

        let dns = DnsFrontend::new(config.dns.socket_addr()?, DnsResponder::new(store.clone()));
        let http = HttpFrontend::new(
            config.http.socket_addr()?,
            UpdateService::new(users, store.clone()),
        );

        Ok(Self::new(store)
            .with_frontend(Box::new(dns))
            .with_frontend(Box::new(http)))
    }

    /// Add a listener
    pub fn with_frontend(mut self, frontend: Box<dyn Frontend>) -> Self {
        self.frontends.push(frontend);
        self
    }

    /// Names of the registered listeners
    pub fn frontend_names(&self) -> Vec<&'static str> {
        self.frontends.iter().map(|f| f.name()).collect()
    }

    /// Run until `shutdown_signal` resolves or a listener fails
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shut down on signal
    /// - `Err(Error::Fatal)`: The first listener failure
    /// - `Err(Error::StoreUnavailable)`: Shut down cleanly but the final
    ///   store flush failed
    pub async fn run<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let root = CancellationToken::new();
        let tracker = TaskTracker::new();
        let (errors_tx, mut errors_rx) = mpsc::channel::<Error>(self.frontends.len().max(1));

        for frontend in self.frontends {
            let name = frontend.name();
            let token = root.child_token();
            let errors = errors_tx.clone();

            tracker.spawn(async move {
                let failure = match tokio::spawn(frontend.serve(token.clone())).await {
                    Ok(Ok(())) if token.is_cancelled() => return,
                    Ok(Ok(())) => Error::fatal(name, "listener stopped unexpectedly"),
                    Ok(Err(e)) if e.is_fatal() => e,
                    Ok(Err(e)) => Error::fatal(name, e.to_string()),
                    Err(e) => Error::fatal(name, format!("listener task failed: {}", e)),
                };
                // Capacity covers one error per listener.
                let _ = errors.send(failure).await;
            });
        }
        drop(errors_tx);
        tracker.close();

        let fatal = tokio::select! {
            _ = shutdown_signal => {
                info!("Shutdown signal received, stopping listeners");
                None
            }
            Some(err) = errors_rx.recv() => {
                error!(error = %err, "Listener failed, shutting down");
                Some(err)
            }
        };

        root.cancel();
        tracker.wait().await;
        debug!("all listeners drained");

        while let Ok(err) = errors_rx.try_recv() {
            warn!(error = %err, "additional listener error during shutdown");
        }

        let flushed = self.store.flush().await;
        if let Err(e) = &flushed {
            error!(error = %e, "Failed to flush record store");
        }

        match fatal {
            Some(err) => Err(err),
            None => {
                info!("Shutdown complete");
                flushed
            }
        }
    }
}
