//! Shared helpers for unit tests: logger setup, idle node processes and a
//! harness config wired to fake node binaries.
mod mock;

pub use common::*;
pub use mock::*;
