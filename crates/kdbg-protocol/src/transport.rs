//! # Byte Transport
//!
//! The protocol runs over any blocking, byte-exact duplex channel: a polled
//! UART inside a kernel, a TCP stream on the host, or an in-memory script in
//! tests.
//!
//! There is no timeout. A silent peer blocks the receiver indefinitely.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::codec::{self, Packet};
use crate::error::CodecError;

/// Blocking byte channel the codec sends and receives through
pub trait Transport
{
    /// Bring the channel up. Called once, before the first packet.
    ///
    /// The default does nothing; a UART implementation programs baud rate
    /// and line control here.
    fn init(&mut self) -> io::Result<()>
    {
        Ok(())
    }

    /// Send every byte of `bytes`, blocking until done.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Fill `buf` completely, blocking until done.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T
{
    fn init(&mut self) -> io::Result<()>
    {
        (**self).init()
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()>
    {
        (**self).send(bytes)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<()>
    {
        (**self).recv(buf)
    }
}

/// Adapts any `Read + Write` stream (e.g. `TcpStream`) to a [`Transport`]
#[derive(Debug)]
pub struct StreamTransport<S>
{
    stream: S,
}

impl<S> StreamTransport<S>
{
    /// Wrap a stream
    pub fn new(stream: S) -> Self
    {
        Self { stream }
    }

    /// Get back the wrapped stream
    pub fn into_inner(self) -> S
    {
        self.stream
    }
}

impl<S: Read + Write> Transport for StreamTransport<S>
{
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>
    {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<()>
    {
        self.stream.read_exact(buf)
    }
}

/// In-memory transport for driving one side of the protocol without a peer
///
/// Inbound bytes are queued up front; everything sent is captured. Running
/// out of inbound bytes is reported as `UnexpectedEof`, which stands in for
/// a debugger that went away.
///
/// ## Example
///
/// ```rust
/// use kdbg_protocol::codes::Command;
/// use kdbg_protocol::transport::{ScriptedLink, Transport};
///
/// let mut link = ScriptedLink::new();
/// link.push_packet(Command::Continue.code(), 1, &[]);
/// let mut header = [0u8; 8];
/// link.recv(&mut header).unwrap();
/// assert_eq!(header[0], kdbg_protocol::codes::SIGNATURE);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedLink
{
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    init_calls: usize,
}

impl ScriptedLink
{
    /// Empty link
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Queue raw inbound bytes
    pub fn push_bytes(&mut self, bytes: &[u8])
    {
        self.inbound.extend(bytes);
    }

    /// Queue a well-formed inbound packet
    pub fn push_packet(&mut self, command: u8, id: u8, body: &[u8])
    {
        let bytes = codec::encode_packet(command, id, body);
        self.push_bytes(&bytes);
    }

    /// Inbound bytes not yet consumed
    #[must_use]
    pub fn pending_inbound(&self) -> usize
    {
        self.inbound.len()
    }

    /// Everything sent so far
    #[must_use]
    pub fn outbound(&self) -> &[u8]
    {
        &self.outbound
    }

    /// Number of times [`Transport::init`] ran
    #[must_use]
    pub fn init_calls(&self) -> usize
    {
        self.init_calls
    }

    /// Drain and decode every packet sent so far
    ///
    /// ## Errors
    ///
    /// Returns the first framing error found in the captured output.
    pub fn take_sent_packets(&mut self) -> Result<Vec<Packet>, CodecError>
    {
        let mut replay = ScriptedLink::new();
        replay.push_bytes(&std::mem::take(&mut self.outbound));

        let mut packets = Vec::new();
        while replay.pending_inbound() > 0 {
            let mut body = Vec::new();
            let header = codec::recv_packet(&mut replay, &mut body, usize::MAX)?;
            packets.push(Packet { header, body });
        }
        Ok(packets)
    }
}

impl Transport for ScriptedLink
{
    fn init(&mut self) -> io::Result<()>
    {
        self.init_calls += 1;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()>
    {
        self.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<()>
    {
        if self.inbound.len() < buf.len() {
            self.inbound.clear();
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "scripted link exhausted"));
        }
        for byte in buf.iter_mut() {
            // Length checked above.
            *byte = self.inbound.pop_front().unwrap_or_default();
        }
        Ok(())
    }
}
