//! Resolves the current primary of a node set from its election ack path.
//!
//! Election results converge with some delay, so a missing ack node, a value
//! that names a node outside the set, and an ack node deleted between the
//! existence check and the read all mean the same thing: not elected yet.
//! Each consumes one attempt and the loop polls again after `poll_interval`.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use crate::config::DiscoveryConfig;
use crate::coordination::CoordinationClient;
use crate::CoordinationError;
use crate::DiscoveryError;

/// Bounded, backoff-free retry budget for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    pub max_attempts: usize,
    pub poll_interval: Duration,
}

impl From<&DiscoveryConfig> for DiscoveryPolicy {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Outcome of a successful resolution, borrowed from the set it was resolved
/// against.
#[derive(Debug)]
pub struct Primary<'a, H> {
    pub address: &'a str,
    pub handle: &'a H,
    pub others: Vec<&'a H>,
}

/// What a single probe of the ack path observed.
#[derive(Debug, PartialEq, Eq)]
enum Probe {
    Absent,
    Raced,
    Announced(String),
}

/// Polls `ack_path` until it names a member of `node_set` or the attempt
/// budget runs out.
///
/// Exactly one ack value is trusted per successful call.
pub async fn resolve<'a, H>(
    client: &dyn CoordinationClient,
    ack_path: &str,
    node_set: &'a BTreeMap<String, H>,
    policy: DiscoveryPolicy,
) -> std::result::Result<Primary<'a, H>, DiscoveryError> {
    for attempt in 1..=policy.max_attempts {
        match probe(client, ack_path).await {
            Probe::Announced(addr) => {
                if let Some((address, handle)) = node_set.get_key_value(addr.as_str()) {
                    debug!("select {} as primary of {}.", address, ack_path);
                    let others = node_set
                        .iter()
                        .filter(|(k, _)| k.as_str() != address.as_str())
                        .map(|(_, v)| v)
                        .collect();
                    return Ok(Primary {
                        address: address.as_str(),
                        handle,
                        others,
                    });
                }
                debug!(attempt, %addr, ack_path, "ack names a node outside the current set");
            }
            Probe::Raced => {
                debug!(attempt, ack_path, "ack node deleted between exists and read");
            }
            Probe::Absent => {
                debug!(attempt, ack_path, "no primary announced yet");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    Err(DiscoveryError::PrimaryNotFound {
        ack_path: ack_path.to_string(),
        attempts: policy.max_attempts,
    })
}

async fn probe(
    client: &dyn CoordinationClient,
    ack_path: &str,
) -> Probe {
    match client.exists(ack_path).await {
        Ok(true) => {}
        Ok(false) => return Probe::Absent,
        Err(e) => {
            warn!("exists({}) failed: {}", ack_path, e);
            return Probe::Absent;
        }
    }

    match client.read(ack_path).await {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(addr) => Probe::Announced(addr),
            Err(e) => {
                warn!("ack value at {} is not utf-8: {}", ack_path, e);
                Probe::Absent
            }
        },
        Err(CoordinationError::NotFound(_)) => Probe::Raced,
        Err(e) => {
            warn!("read({}) failed: {}", ack_path, e);
            Probe::Absent
        }
    }
}
