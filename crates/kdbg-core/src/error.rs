//! # Error Types
//!
//! The monitor has no fatal error path. Framing errors are absorbed inside
//! the command loop and protocol errors are answered with error packets, so
//! the only failure that escapes is the debug link itself going away.

use thiserror::Error;

/// Failure that ends a command loop without a `CONTINUE`
#[derive(Error, Debug)]
pub enum MonitorError
{
    /// The transport failed while sending or receiving.
    ///
    /// A polled UART never reports this; stream transports do when the
    /// debugger disconnects.
    #[error("debug link failed: {0}")]
    Transport(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, MonitorError>`
pub type Result<T> = std::result::Result<T, MonitorError>;
