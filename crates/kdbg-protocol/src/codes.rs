//! # Code Space
//!
//! Every packet carries a one-byte command field. The byte space is split
//! into four disjoint ranges:
//!
//! | range         | meaning                                   |
//! |---------------|-------------------------------------------|
//! | `0x00..0x20`  | requests issued by the debugger           |
//! | `0x20..0x40`  | unsolicited events raised by the target   |
//! | `0x40..0x80`  | replies (request code with [`REPLY_MARKER`]) |
//! | `0x80..`      | error replies                             |
//!
//! Request codes all sit below [`REPLY_MARKER`], so a reply code is always
//! the request code with that single high bit set.

use std::fmt;

use thiserror::Error;

/// First byte of every packet. The receiver discards input until it sees it.
pub const SIGNATURE: u8 = 0xDB;

/// Protocol revision negotiated by `CONNECT`.
pub const PROTOCOL_VERSION: u32 = 3;

/// Bit set on a request code to form the matching reply code.
pub const REPLY_MARKER: u8 = 0x40;

/// Largest memory range a single read or write may transfer.
pub const MAX_CHUNK_SIZE: usize = 4096;

/// Room reserved for the fixed part of the largest body next to a memory chunk.
pub const MAX_BODY_OVERHEAD: usize = 64;

/// Largest body length accepted by the codec.
pub const MAX_PACKET_LEN: usize = MAX_CHUNK_SIZE + MAX_BODY_OVERHEAD;

/// Per-entry result written into a thread batch when the thread does not exist.
pub const NO_SUCH_ENTITY: i32 = -2;

/// Request issued by the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command
{
    /// Negotiate the protocol version and fetch the last trap.
    Connect = 0x00,
    /// Leave the command loop and let the target run.
    Continue = 0x01,
    /// Copy bytes out of target memory.
    ReadMemory = 0x02,
    /// Copy bytes into target memory.
    WriteMemory = 0x03,
    /// Suspend a batch of threads.
    SuspendThread = 0x04,
    /// Resume a batch of threads.
    ResumeThread = 0x05,
    /// Fetch the stored register context of a halted thread.
    GetThreadContext = 0x06,
    /// Replace the stored register context of a halted thread.
    SetThreadContext = 0x07,
    /// Fetch a raw segment descriptor.
    GetSelector = 0x08,
    /// Enumerate loaded kernel and process modules.
    GetModules = 0x09,
    /// Enumerate every thread.
    GetThreads = 0x0A,
}

impl Command
{
    /// Raw wire value of this request.
    #[must_use]
    pub const fn code(self) -> u8
    {
        self as u8
    }

    /// Wire value of the reply to this request.
    #[must_use]
    pub const fn reply_code(self) -> u8
    {
        self as u8 | REPLY_MARKER
    }

    /// Human-readable name, used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str
    {
        match self {
            Self::Connect => "connect",
            Self::Continue => "continue",
            Self::ReadMemory => "read-memory",
            Self::WriteMemory => "write-memory",
            Self::SuspendThread => "suspend-thread",
            Self::ResumeThread => "resume-thread",
            Self::GetThreadContext => "get-thread-context",
            Self::SetThreadContext => "set-thread-context",
            Self::GetSelector => "get-selector",
            Self::GetModules => "get-modules",
            Self::GetThreads => "get-threads",
        }
    }
}

impl TryFrom<u8> for Command
{
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error>
    {
        Ok(match code {
            0x00 => Self::Connect,
            0x01 => Self::Continue,
            0x02 => Self::ReadMemory,
            0x03 => Self::WriteMemory,
            0x04 => Self::SuspendThread,
            0x05 => Self::ResumeThread,
            0x06 => Self::GetThreadContext,
            0x07 => Self::SetThreadContext,
            0x08 => Self::GetSelector,
            0x09 => Self::GetModules,
            0x0A => Self::GetThreads,
            other => return Err(other),
        })
    }
}

impl fmt::Display for Command
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}

/// Unsolicited notification raised by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventCode
{
    /// The target took a CPU trap.
    Trap = 0x20,
    /// A thread was created.
    CreateThread = 0x21,
    /// A thread exited.
    ExitThread = 0x22,
    /// A module was loaded.
    LoadModule = 0x23,
    /// A module was unloaded.
    UnloadModule = 0x24,
    /// The target produced text output.
    Output = 0x25,
}

impl EventCode
{
    /// Raw wire value of this event.
    #[must_use]
    pub const fn code(self) -> u8
    {
        self as u8
    }
}

impl TryFrom<u8> for EventCode
{
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error>
    {
        Ok(match code {
            0x20 => Self::Trap,
            0x21 => Self::CreateThread,
            0x22 => Self::ExitThread,
            0x23 => Self::LoadModule,
            0x24 => Self::UnloadModule,
            0x25 => Self::Output,
            other => return Err(other),
        })
    }
}

/// Protocol-tier failure, sent back as a zero-length packet carrying this code.
///
/// A request rejected with one of these leaves the target untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode
{
    /// `CONNECT` carried a protocol version the target does not speak.
    #[error("protocol version mismatch")]
    VersionMismatch = 0x80,
    /// The requested memory range is not mapped (or too large to transfer).
    #[error("invalid address")]
    InvalidAddress = 0x81,
    /// No thread with the requested id exists.
    #[error("invalid thread")]
    InvalidThread = 0x82,
    /// The thread is not halted at a trap, so it has no stored context.
    #[error("thread has no context")]
    NoContext = 0x83,
    /// The selector indexes past the end of the descriptor table.
    #[error("invalid selector")]
    InvalidSelector = 0x84,
    /// Unknown command code, or a body too short for its command.
    #[error("invalid command")]
    InvalidCommand = 0x85,
}

impl ErrorCode
{
    /// Raw wire value of this error.
    #[must_use]
    pub const fn code(self) -> u8
    {
        self as u8
    }
}

impl TryFrom<u8> for ErrorCode
{
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error>
    {
        Ok(match code {
            0x80 => Self::VersionMismatch,
            0x81 => Self::InvalidAddress,
            0x82 => Self::InvalidThread,
            0x83 => Self::NoContext,
            0x84 => Self::InvalidSelector,
            0x85 => Self::InvalidCommand,
            other => return Err(other),
        })
    }
}
