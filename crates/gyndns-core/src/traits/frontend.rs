// # Frontend Trait
//
// A network listener owned by the supervisor.
//
// A frontend binds, serves until its shutdown token is cancelled, drains
// in-flight work and returns. Returning an error means the listener cannot
// keep serving; the supervisor treats it as fatal for the whole process.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Error;

/// Trait for supervised listeners
#[async_trait]
pub trait Frontend: Send {
    /// Short listener name used in logs and fatal errors ("dns", "http")
    fn name(&self) -> &'static str;

    /// Serve until `shutdown` is cancelled
    ///
    /// Must stop accepting new work once the token fires and return after
    /// outstanding requests have completed. Bind and accept failures are
    /// returned as [`Error::Fatal`].
    async fn serve(self: Box<Self>, shutdown: CancellationToken) -> Result<(), Error>;
}
