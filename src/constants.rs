/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Prefix of configuration overrides, e.g. `HARNESS__DISCOVERY__MAX_ATTEMPTS`
pub(crate) const ENV_PREFIX: &str = "HARNESS";
pub(crate) const ENV_SEPARATOR: &str = "__";

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "debug";
