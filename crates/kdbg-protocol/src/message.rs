//! # Message Bodies
//!
//! Typed forms of every body the protocol carries. Each body knows how to
//! write itself into a [`BodyWriter`] and read itself back from a
//! [`BodyReader`]; the layouts are fixed per command code.
//!
//! Thread batches and module lists are variable-length and are usually
//! streamed straight into the writer by the monitor, so only their decoders
//! live here.

use crate::codes::EventCode;
use crate::context::{Context, Descriptor};
use crate::error::BodyError;
use crate::types::{Address, ModuleHandle, ThreadId};
use crate::wire::{BodyReader, BodyWriter};

/// A body that can be written to the wire
pub trait WireEncode
{
    /// Append this body's fields.
    fn encode(&self, w: &mut BodyWriter<'_>);
}

/// A body that can be read from the wire
pub trait WireDecode: Sized
{
    /// Read this body's fields.
    ///
    /// ## Errors
    ///
    /// Returns a [`BodyError`] when the bytes are too short or inconsistent.
    fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>;
}

/// Decode a whole body. Trailing bytes are ignored.
///
/// ## Errors
///
/// Returns a [`BodyError`] when the body does not fit `T`'s layout.
pub fn decode_body<T: WireDecode>(body: &[u8]) -> Result<T, BodyError>
{
    T::decode(&mut BodyReader::new(body))
}

/// Encode a body into a fresh buffer.
#[must_use]
pub fn encode_body<T: WireEncode>(body: &T) -> Vec<u8>
{
    let mut buf = Vec::new();
    body.encode(&mut BodyWriter::new(&mut buf));
    buf
}

/// Why the target last stopped
///
/// Recorded on every trap entry and reported both in the `TRAP` event and
/// in the `CONNECT` reply, so a debugger attaching late still learns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrapSnapshot
{
    /// Thread that trapped
    pub thread: ThreadId,
    /// Interrupt vector
    pub trap_type: u32,
    /// CPU error code
    pub error_code: u32,
    /// Instruction pointer at the trap
    pub eip: Address,
    /// Faulting address (page faults), otherwise whatever the trap path supplied
    pub fault_address: Address,
}

impl WireEncode for TrapSnapshot
{
    fn encode(&self, w: &mut BodyWriter<'_>)
    {
        w.put_u32(self.thread.raw());
        w.put_u32(self.trap_type);
        w.put_u32(self.error_code);
        w.put_u32(self.eip.value());
        w.put_u32(self.fault_address.value());
    }
}

impl WireDecode for TrapSnapshot
{
    fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>
    {
        Ok(Self {
            thread: ThreadId(r.u32()?),
            trap_type: r.u32()?,
            error_code: r.u32()?,
            eip: Address::new(r.u32()?),
            fault_address: Address::new(r.u32()?),
        })
    }
}

/// `CONNECT` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest
{
    /// Protocol version spoken by the debugger
    pub version: u32,
}

impl WireEncode for ConnectRequest
{
    fn encode(&self, w: &mut BodyWriter<'_>)
    {
        w.put_u32(self.version);
    }
}

impl WireDecode for ConnectRequest
{
    fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>
    {
        Ok(Self { version: r.u32()? })
    }
}

/// `CONNECT` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectReply
{
    /// Protocol version spoken by the target
    pub version: u32,
    /// Last recorded trap
    pub trap: TrapSnapshot,
}

impl WireEncode for ConnectReply
{
    fn encode(&self, w: &mut BodyWriter<'_>)
    {
        w.put_u32(self.version);
        self.trap.encode(w);
    }
}

impl WireDecode for ConnectReply
{
    fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>
    {
        Ok(Self {
            version: r.u32()?,
            trap: TrapSnapshot::decode(r)?,
        })
    }
}

/// Fixed part of `READ_MEMORY` / `WRITE_MEMORY` requests
///
/// A write request is followed by `size` raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequest
{
    /// First byte of the range
    pub address: Address,
    /// Length of the range in bytes
    pub size: u32,
}

impl WireEncode for MemoryRequest
{
    fn encode(&self, w: &mut BodyWriter<'_>)
    {
        w.put_u32(self.address.value());
        w.put_u32(self.size);
    }
}

impl WireDecode for MemoryRequest
{
    fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>
    {
        Ok(Self {
            address: Address::new(r.u32()?),
            size: r.u32()?,
        })
    }
}

/// Write a thread batch (`count` then one word per entry).
pub fn encode_thread_list(w: &mut BodyWriter<'_>, entries: impl ExactSizeIterator<Item = i32>)
{
    w.put_u32(entries.len() as u32);
    for entry in entries {
        w.put_i32(entry);
    }
}

/// Read a thread batch: ids in a request, per-entry results in a reply.
///
/// ## Errors
///
/// Returns `BadCount` when the count exceeds the entries present.
pub fn decode_thread_list(body: &[u8]) -> Result<Vec<i32>, BodyError>
{
    let mut r = BodyReader::new(body);
    let count = r.count(4)?;
    (0..count).map(|_| r.i32()).collect()
}

/// `GET_THREAD_CONTEXT` reply and `SET_THREAD_CONTEXT` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBody
{
    /// Thread the context belongs to
    pub thread: ThreadId,
    /// Register record
    pub context: Context,
}

impl WireEncode for ContextBody
{
    fn encode(&self, w: &mut BodyWriter<'_>)
    {
        w.put_u32(self.thread.raw());
        self.context.encode(w);
    }
}

impl WireDecode for ContextBody
{
    fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>
    {
        Ok(Self {
            thread: ThreadId(r.u32()?),
            context: Context::decode(r)?,
        })
    }
}

/// `GET_SELECTOR` reply (the request carries only the selector word)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorBody
{
    /// Selector as requested
    pub selector: u32,
    /// Raw descriptor
    pub descriptor: Descriptor,
}

impl WireEncode for SelectorBody
{
    fn encode(&self, w: &mut BodyWriter<'_>)
    {
        w.put_u32(self.selector);
        w.put_bytes(&self.descriptor.0);
    }
}

impl WireDecode for SelectorBody
{
    fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>
    {
        let selector = r.u32()?;
        let mut raw = [0u8; Descriptor::SIZE];
        raw.copy_from_slice(r.bytes(Descriptor::SIZE)?);
        Ok(Self {
            selector,
            descriptor: Descriptor(raw),
        })
    }
}

/// One entry of a `GET_MODULES` reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo
{
    /// Module handle (image base)
    pub handle: ModuleHandle,
    /// Module file name
    pub name: String,
}

/// Bytes one module entry occupies on the wire.
#[must_use]
pub const fn module_entry_size(name: &str) -> usize
{
    8 + name.len()
}

/// Append one module entry.
pub fn encode_module_entry(w: &mut BodyWriter<'_>, handle: ModuleHandle, name: &str)
{
    w.put_u32(handle.raw());
    w.put_u32(name.len() as u32);
    w.put_bytes(name.as_bytes());
}

/// Read a `GET_MODULES` reply.
///
/// ## Errors
///
/// Returns a [`BodyError`] for truncated entries or names that are not UTF-8.
pub fn decode_module_list(body: &[u8]) -> Result<Vec<ModuleInfo>, BodyError>
{
    let mut r = BodyReader::new(body);
    // Entries are at least 8 bytes each.
    let count = r.count(8)?;
    let mut modules = Vec::with_capacity(count);
    for _ in 0..count {
        let handle = ModuleHandle(r.u32()?);
        let len = r.u32()? as usize;
        let name = std::str::from_utf8(r.bytes(len)?).map_err(|_| BodyError::InvalidText)?;
        modules.push(ModuleInfo {
            handle,
            name: name.to_string(),
        });
    }
    Ok(modules)
}

/// Unsolicited notification from the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent
{
    /// The target trapped and is now halted.
    Trap(TrapSnapshot),
    /// A thread was created.
    CreateThread
    {
        /// New thread
        thread: ThreadId,
        /// Address of its thread information block
        tib: Address,
        /// Entry point
        start_address: Address,
    },
    /// A thread exited.
    ExitThread
    {
        /// Exiting thread
        thread: ThreadId,
        /// Its exit code
        exit_code: i32,
    },
    /// A module was mapped.
    LoadModule(ModuleHandle),
    /// A module was unmapped.
    UnloadModule(ModuleHandle),
    /// Text written by the target.
    Output(String),
}

impl TargetEvent
{
    /// Wire code of this event.
    #[must_use]
    pub const fn code(&self) -> EventCode
    {
        match self {
            Self::Trap(_) => EventCode::Trap,
            Self::CreateThread { .. } => EventCode::CreateThread,
            Self::ExitThread { .. } => EventCode::ExitThread,
            Self::LoadModule(_) => EventCode::LoadModule,
            Self::UnloadModule(_) => EventCode::UnloadModule,
            Self::Output(_) => EventCode::Output,
        }
    }

    /// Decode an event body received with `code`.
    ///
    /// ## Errors
    ///
    /// `UnexpectedCode` if `code` is not an event, otherwise any body error.
    pub fn decode(code: u8, body: &[u8]) -> Result<Self, BodyError>
    {
        let code = EventCode::try_from(code).map_err(BodyError::UnexpectedCode)?;
        let mut r = BodyReader::new(body);
        Ok(match code {
            EventCode::Trap => Self::Trap(TrapSnapshot::decode(&mut r)?),
            EventCode::CreateThread => Self::CreateThread {
                thread: ThreadId(r.u32()?),
                tib: Address::new(r.u32()?),
                start_address: Address::new(r.u32()?),
            },
            EventCode::ExitThread => Self::ExitThread {
                thread: ThreadId(r.u32()?),
                exit_code: r.i32()?,
            },
            EventCode::LoadModule => Self::LoadModule(ModuleHandle(r.u32()?)),
            EventCode::UnloadModule => Self::UnloadModule(ModuleHandle(r.u32()?)),
            EventCode::Output => {
                let len = r.u32()? as usize;
                let text = std::str::from_utf8(r.bytes(len)?).map_err(|_| BodyError::InvalidText)?;
                Self::Output(text.to_string())
            }
        })
    }
}

impl WireEncode for TargetEvent
{
    fn encode(&self, w: &mut BodyWriter<'_>)
    {
        match self {
            Self::Trap(snapshot) => snapshot.encode(w),
            Self::CreateThread {
                thread,
                tib,
                start_address,
            } => {
                w.put_u32(thread.raw());
                w.put_u32(tib.value());
                w.put_u32(start_address.value());
            }
            Self::ExitThread { thread, exit_code } => {
                w.put_u32(thread.raw());
                w.put_i32(*exit_code);
            }
            Self::LoadModule(handle) | Self::UnloadModule(handle) => w.put_u32(handle.raw()),
            Self::Output(text) => {
                w.put_u32(text.len() as u32);
                w.put_bytes(text.as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_connect_reply_layout()
    {
        let reply = ConnectReply {
            version: 3,
            trap: TrapSnapshot {
                thread: ThreadId(7),
                trap_type: 14,
                error_code: 2,
                eip: Address::new(0x8000_2000),
                fault_address: Address::new(0xDEAD_0000),
            },
        };
        let bytes = encode_body(&reply);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[4..8], &7u32.to_le_bytes());
        assert_eq!(decode_body::<ConnectReply>(&bytes), Ok(reply));
    }

    #[test]
    fn test_thread_list_rejects_short_body()
    {
        let mut buf = Vec::new();
        let mut w = BodyWriter::new(&mut buf);
        w.put_u32(3);
        w.put_i32(1);
        assert_eq!(decode_thread_list(&buf), Err(BodyError::BadCount { count: 3 }));
    }

    #[test]
    fn test_module_list_decodes_names()
    {
        let mut buf = Vec::new();
        let mut w = BodyWriter::new(&mut buf);
        w.put_u32(2);
        encode_module_entry(&mut w, ModuleHandle(0x8000_0000), "krnl.dll");
        encode_module_entry(&mut w, ModuleHandle(0x0040_0000), "sh.exe");
        assert_eq!(buf.len(), 4 + module_entry_size("krnl.dll") + module_entry_size("sh.exe"));

        let modules = decode_module_list(&buf).unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].name, "krnl.dll");
        assert_eq!(modules[1].handle, ModuleHandle(0x0040_0000));
    }

    #[test]
    fn test_output_event_carries_text()
    {
        let event = TargetEvent::Output("hello\n".to_string());
        let bytes = encode_body(&event);
        assert_eq!(&bytes[..4], &6u32.to_le_bytes());
        assert_eq!(TargetEvent::decode(EventCode::Output.code(), &bytes), Ok(event));
    }

    #[test]
    fn test_decode_rejects_non_event_code()
    {
        assert_eq!(TargetEvent::decode(0x41, &[]), Err(BodyError::UnexpectedCode(0x41)));
    }
}
