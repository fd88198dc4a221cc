//! # kdbg Utilities
//!
//! Shared utilities for the kdbg workspace. At the moment that is the
//! logging setup used by the `kdbg` binary, built on `tracing`.

pub mod logging;

pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
