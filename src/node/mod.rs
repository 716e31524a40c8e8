//! Node processes under test: their immutable launch configuration, the handle
//! that owns a running process, and the launcher that spawns them.

mod config;
mod handle;
mod launcher;

pub use config::*;
pub use handle::*;
pub use launcher::*;
