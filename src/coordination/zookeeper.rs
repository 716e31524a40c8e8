use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use zookeeper_client as zk;

use super::CoordinationClient;
use super::CoordinationConnector;
use crate::CoordinationError;

/// [`CoordinationClient`] backed by a ZooKeeper session.
pub struct ZkCoordinationClient {
    servers: String,
    session: Option<zk::Client>,
}

impl ZkCoordinationClient {
    pub async fn connect(
        servers: &str,
        timeout: Duration,
    ) -> std::result::Result<Self, CoordinationError> {
        debug!(%servers, ?timeout, "connecting to zookeeper");
        let client = tokio::time::timeout(timeout, zk::Client::connect(servers))
            .await
            .map_err(|_| CoordinationError::ConnectTimeout {
                servers: servers.to_string(),
                timeout,
            })??;
        info!(%servers, "zookeeper session established");

        Ok(Self {
            servers: servers.to_string(),
            session: Some(client),
        })
    }

    fn session(&self) -> std::result::Result<&zk::Client, CoordinationError> {
        self.session.as_ref().ok_or(CoordinationError::SessionClosed)
    }
}

#[async_trait]
impl CoordinationClient for ZkCoordinationClient {
    async fn exists(
        &self,
        path: &str,
    ) -> std::result::Result<bool, CoordinationError> {
        let stat = self.session()?.check_stat(path).await?;
        Ok(stat.is_some())
    }

    async fn read(
        &self,
        path: &str,
    ) -> std::result::Result<Vec<u8>, CoordinationError> {
        match self.session()?.get_data(path).await {
            Ok((data, _stat)) => Ok(data),
            Err(zk::Error::NoNode) => Err(CoordinationError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        // The session ends once its last client handle is dropped.
        if self.session.take().is_some() {
            info!(servers = %self.servers, "zookeeper session closed");
        }
    }
}

/// Connects [`ZkCoordinationClient`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZkConnector;

#[async_trait]
impl CoordinationConnector for ZkConnector {
    async fn connect(
        &self,
        servers: &str,
        timeout: Duration,
    ) -> std::result::Result<Box<dyn CoordinationClient>, CoordinationError> {
        let client = ZkCoordinationClient::connect(servers, timeout).await?;
        Ok(Box::new(client))
    }
}
