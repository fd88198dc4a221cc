//! # Host-Side Client
//!
//! A blocking debugger front end for the protocol. Each method sends one
//! request and waits for its reply; the protocol never pipelines, so there
//! is at most one outstanding request.
//!
//! Events the target raises while a request is outstanding (for example a
//! fault triggered by a memory write) are queued and handed out by
//! [`Client::wait_event`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::net::TcpStream;
//!
//! use kdbg_protocol::{Client, StreamTransport};
//!
//! let stream = TcpStream::connect("127.0.0.1:4000")?;
//! let mut client = Client::new(StreamTransport::new(stream));
//! let hello = client.connect()?;
//! println!("target stopped by trap {}", hello.trap.trap_type);
//! client.continue_execution()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::VecDeque;

use tracing::debug;

use crate::codec::{self, Packet};
use crate::codes::{Command, ErrorCode, EventCode, MAX_PACKET_LEN, PROTOCOL_VERSION};
use crate::context::{Context, Descriptor};
use crate::error::{ClientError, ClientResult};
use crate::message::{
    decode_body, decode_module_list, decode_thread_list, encode_thread_list, ConnectReply, ConnectRequest,
    ContextBody, MemoryRequest, ModuleInfo, SelectorBody, TargetEvent, WireEncode,
};
use crate::transport::Transport;
use crate::types::{Address, ThreadId};
use crate::wire::BodyWriter;

/// Blocking protocol client
pub struct Client<T: Transport>
{
    transport: T,
    next_id: u8,
    max_len: usize,
    request: Vec<u8>,
    events: VecDeque<TargetEvent>,
}

impl<T: Transport> Client<T>
{
    /// Create a client over an established transport.
    pub fn new(transport: T) -> Self
    {
        Self {
            transport,
            next_id: 1,
            max_len: MAX_PACKET_LEN,
            request: Vec::with_capacity(MAX_PACKET_LEN),
            events: VecDeque::new(),
        }
    }

    /// Get back the transport.
    pub fn into_inner(self) -> T
    {
        self.transport
    }

    /// Negotiate the protocol version and fetch the last trap.
    ///
    /// ## Errors
    ///
    /// `Remote(VersionMismatch)` if the target speaks a different revision.
    pub fn connect(&mut self) -> ClientResult<ConnectReply>
    {
        let body = self.encode(&ConnectRequest {
            version: PROTOCOL_VERSION,
        });
        let reply = self.request(Command::Connect, &body)?;
        Ok(decode_body(&reply)?)
    }

    /// Let the target run.
    ///
    /// ## Errors
    ///
    /// Transport failures only.
    pub fn continue_execution(&mut self) -> ClientResult<()>
    {
        self.request(Command::Continue, &[])?;
        Ok(())
    }

    /// Read `size` bytes at `address`.
    ///
    /// ## Errors
    ///
    /// `Remote(InvalidAddress)` if the range is not mapped.
    pub fn read_memory(&mut self, address: Address, size: u32) -> ClientResult<Vec<u8>>
    {
        let body = self.encode(&MemoryRequest { address, size });
        self.request(Command::ReadMemory, &body)
    }

    /// Write `data` at `address`.
    ///
    /// ## Errors
    ///
    /// `Remote(InvalidAddress)` if the range is not mapped.
    pub fn write_memory(&mut self, address: Address, data: &[u8]) -> ClientResult<()>
    {
        let mut body = self.encode(&MemoryRequest {
            address,
            size: data.len() as u32,
        });
        body.extend_from_slice(data);
        self.request(Command::WriteMemory, &body)?;
        Ok(())
    }

    /// Suspend each thread; returns one result per thread (new suspend
    /// count, or [`NO_SUCH_ENTITY`](crate::codes::NO_SUCH_ENTITY)).
    ///
    /// ## Errors
    ///
    /// Transport or decoding failures; unknown threads fail per entry.
    pub fn suspend_threads(&mut self, threads: &[ThreadId]) -> ClientResult<Vec<i32>>
    {
        self.thread_batch(Command::SuspendThread, threads)
    }

    /// Resume each thread; results as for [`Client::suspend_threads`].
    ///
    /// ## Errors
    ///
    /// Transport or decoding failures; unknown threads fail per entry.
    pub fn resume_threads(&mut self, threads: &[ThreadId]) -> ClientResult<Vec<i32>>
    {
        self.thread_batch(Command::ResumeThread, threads)
    }

    /// Fetch the stored register context of a halted thread.
    ///
    /// ## Errors
    ///
    /// `Remote(InvalidThread)` or `Remote(NoContext)`.
    pub fn thread_context(&mut self, thread: ThreadId) -> ClientResult<Context>
    {
        let mut body = Vec::new();
        BodyWriter::new(&mut body).put_u32(thread.raw());
        let reply = self.request(Command::GetThreadContext, &body)?;
        Ok(decode_body::<ContextBody>(&reply)?.context)
    }

    /// Replace the stored register context of a halted thread.
    ///
    /// ## Errors
    ///
    /// `Remote(InvalidThread)` or `Remote(NoContext)`.
    pub fn set_thread_context(&mut self, thread: ThreadId, context: &Context) -> ClientResult<()>
    {
        let body = self.encode(&ContextBody {
            thread,
            context: *context,
        });
        self.request(Command::SetThreadContext, &body)?;
        Ok(())
    }

    /// Fetch the raw descriptor for `selector`.
    ///
    /// ## Errors
    ///
    /// `Remote(InvalidSelector)` when the selector is past the table.
    pub fn selector(&mut self, selector: u32) -> ClientResult<Descriptor>
    {
        let mut body = Vec::new();
        BodyWriter::new(&mut body).put_u32(selector);
        let reply = self.request(Command::GetSelector, &body)?;
        Ok(decode_body::<SelectorBody>(&reply)?.descriptor)
    }

    /// List loaded modules, kernel modules first.
    ///
    /// ## Errors
    ///
    /// Transport or decoding failures.
    pub fn modules(&mut self) -> ClientResult<Vec<ModuleInfo>>
    {
        let reply = self.request(Command::GetModules, &[])?;
        Ok(decode_module_list(&reply)?)
    }

    /// List every thread id in scheduler order.
    ///
    /// ## Errors
    ///
    /// Transport or decoding failures.
    pub fn threads(&mut self) -> ClientResult<Vec<ThreadId>>
    {
        let reply = self.request(Command::GetThreads, &[])?;
        Ok(decode_thread_list(&reply)?
            .into_iter()
            .map(|id| ThreadId(id as u32))
            .collect())
    }

    /// Block until the target raises an event.
    ///
    /// ## Errors
    ///
    /// Transport failures, or a packet that is not an event.
    pub fn wait_event(&mut self) -> ClientResult<TargetEvent>
    {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        let packet = self.recv()?;
        Ok(TargetEvent::decode(packet.header.command, &packet.body)?)
    }

    fn thread_batch(&mut self, command: Command, threads: &[ThreadId]) -> ClientResult<Vec<i32>>
    {
        let mut body = Vec::new();
        encode_thread_list(
            &mut BodyWriter::new(&mut body),
            threads.iter().map(|thread| thread.raw() as i32),
        );
        let reply = self.request(command, &body)?;
        Ok(decode_thread_list(&reply)?)
    }

    fn encode<B: WireEncode>(&mut self, body: &B) -> Vec<u8>
    {
        body.encode(&mut BodyWriter::new(&mut self.request));
        self.request.clone()
    }

    fn recv(&mut self) -> ClientResult<Packet>
    {
        let mut body = Vec::new();
        let header = codec::recv_packet(&mut self.transport, &mut body, self.max_len)?;
        Ok(Packet { header, body })
    }

    /// Send one request and wait for the packet answering it.
    fn request(&mut self, command: Command, body: &[u8]) -> ClientResult<Vec<u8>>
    {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        debug!(%command, id, len = body.len(), "request");
        codec::send_packet(&mut self.transport, command.code(), id, body)?;

        loop {
            let packet = self.recv()?;
            let code = packet.header.command;

            if EventCode::try_from(code).is_ok() {
                debug!(code, "queueing event received while waiting for reply");
                self.events.push_back(TargetEvent::decode(code, &packet.body)?);
                continue;
            }
            if packet.header.id != id {
                return Err(ClientError::UnexpectedId {
                    expected: id,
                    got: packet.header.id,
                });
            }
            if let Ok(error) = ErrorCode::try_from(code) {
                return Err(ClientError::Remote(error));
            }
            if code != command.reply_code() {
                return Err(ClientError::UnexpectedReply {
                    expected: command.reply_code(),
                    got: code,
                });
            }
            return Ok(packet.body);
        }
    }
}
