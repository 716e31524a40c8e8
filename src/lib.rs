//! Failover harness for a master/datanode cluster.
//!
//! Boots the cluster, finds each set's elected primary through ZooKeeper,
//! kills primaries on cue from an external test program and verifies the
//! cluster recovers.

mod constants;
mod errors;

pub mod config;
pub mod coordination;
pub mod discovery;
pub mod environment;
pub mod fault;
pub mod harness;
pub mod node;
pub mod registry;
pub mod scenario;
pub mod utils;

pub use constants::*;
pub use errors::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
