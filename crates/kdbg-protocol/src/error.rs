//! # Error Types
//!
//! Errors raised while framing packets, decoding bodies, and talking to a
//! target from the host side.
//!
//! Framing errors ([`CodecError::OversizedPacket`],
//! [`CodecError::ChecksumMismatch`]) are per-packet and recoverable: the
//! receiver drops the packet and scans for the next signature. Only
//! [`CodecError::Io`] means the link itself is gone.

use thiserror::Error;

use crate::codes::ErrorCode;

/// Failure to receive one packet
#[derive(Error, Debug)]
pub enum CodecError
{
    /// The header announced a body longer than the receiver accepts.
    ///
    /// No body bytes were consumed.
    #[error("oversized packet: length {length} exceeds maximum {max}")]
    OversizedPacket
    {
        /// Length field as received
        length: u32,
        /// Configured maximum body length
        max: usize,
    },

    /// Header and body bytes do not sum to zero.
    #[error("checksum mismatch: packet sums to 0x{sum:02x}")]
    ChecksumMismatch
    {
        /// The nonzero 8-bit sum that was computed
        sum: u8,
    },

    /// The transport failed.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError
{
    /// True for per-packet framing failures the receiver should skip past.
    #[must_use]
    pub fn is_framing(&self) -> bool
    {
        matches!(self, Self::OversizedPacket { .. } | Self::ChecksumMismatch { .. })
    }
}

/// A packet body does not match the layout expected for its code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError
{
    /// The body ended before a field could be read.
    #[error("body truncated: needed {needed} more bytes at offset {offset}")]
    Truncated
    {
        /// Offset of the field being read
        offset: usize,
        /// Bytes the field needed
        needed: usize,
    },

    /// A count field exceeds what the body can hold.
    #[error("count {count} does not fit in body")]
    BadCount
    {
        /// The offending count
        count: u32,
    },

    /// Output text or a module name is not valid UTF-8.
    #[error("invalid UTF-8 in body")]
    InvalidText,

    /// The code is not one this decoder understands.
    #[error("unexpected packet code 0x{0:02x}")]
    UnexpectedCode(u8),
}

impl From<BodyError> for ErrorCode
{
    fn from(_: BodyError) -> Self
    {
        ErrorCode::InvalidCommand
    }
}

/// Host-side request failure
#[derive(Error, Debug)]
pub enum ClientError
{
    /// Sending or receiving a packet failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The target rejected the request.
    #[error("target rejected request: {0}")]
    Remote(#[from] ErrorCode),

    /// The reply body could not be decoded.
    #[error("malformed reply: {0}")]
    Body(#[from] BodyError),

    /// A reply arrived for a different request.
    #[error("reply id {got} does not match request id {expected}")]
    UnexpectedId
    {
        /// Id of the outstanding request
        expected: u8,
        /// Id carried by the reply
        got: u8,
    },

    /// The reply code does not belong to the outstanding request.
    #[error("unexpected reply code 0x{got:02x}, expected 0x{expected:02x}")]
    UnexpectedReply
    {
        /// Reply code of the outstanding request
        expected: u8,
        /// Code carried by the reply
        got: u8,
    },
}

impl From<std::io::Error> for ClientError
{
    fn from(err: std::io::Error) -> Self
    {
        Self::Codec(CodecError::Io(err))
    }
}

/// Convenience alias for codec results
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Convenience alias for host-side client results
pub type ClientResult<T> = std::result::Result<T, ClientError>;
