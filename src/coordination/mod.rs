//! Session with the coordination service that publishes election results.
//!
//! The harness only ever reads from it. Reads and existence checks are point in
//! time: a `read` that reports [`CoordinationError::NotFound`] right after a
//! successful `exists` means the ack node was deleted in between (typically a
//! re-election in progress), not that something is broken.

mod zookeeper;

pub use zookeeper::*;

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::CoordinationError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    async fn exists(
        &self,
        path: &str,
    ) -> std::result::Result<bool, CoordinationError>;

    async fn read(
        &self,
        path: &str,
    ) -> std::result::Result<Vec<u8>, CoordinationError>;

    /// Ends the session. Further calls fail with `SessionClosed`.
    fn close(&mut self);
}

/// Opens the single long-lived session an environment keeps for its lifetime.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CoordinationConnector: Send + Sync {
    async fn connect(
        &self,
        servers: &str,
        timeout: Duration,
    ) -> std::result::Result<Box<dyn CoordinationClient>, CoordinationError>;
}
