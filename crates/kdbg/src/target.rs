//! The `target` command: a simulated kernel halted at a trap, served over
//! TCP.
//!
//! Host commands connect once per request, so the link accepts a new
//! connection whenever the current debugger hangs up. Packets are written
//! whole; one that cannot be delivered goes to the next debugger instead.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use kdbg_core::sim::{SimKernel, SimThread};
use kdbg_core::Monitor;
use kdbg_protocol::codec::HEADER_SIZE;
use kdbg_protocol::{Address, Context, ModuleHandle, Transport};
use kdbg_utils::{info, warn};

/// How long an idle debugger has to hang up before an unsolicited packet is
/// sent to it.
const HANG_UP_GRACE: Duration = Duration::from_millis(250);

/// Listening socket that behaves as one long-lived link
pub(crate) struct ListenerLink
{
    listener: TcpListener,
    stream: Option<TcpStream>,
    /// Packet being assembled from header and body sends.
    outgoing: Vec<u8>,
    /// A request was read and its answer has not gone out yet.
    awaiting_reply: bool,
    grace: Duration,
}

impl ListenerLink
{
    pub(crate) fn bind(address: &str) -> io::Result<Self>
    {
        let listener = TcpListener::bind(address)?;
        info!(address = %listener.local_addr()?, "listening for debugger");
        Ok(Self {
            listener,
            stream: None,
            outgoing: Vec::new(),
            awaiting_reply: false,
            grace: HANG_UP_GRACE,
        })
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream>
    {
        if self.stream.is_none() {
            let (stream, peer) = self.listener.accept()?;
            stream.set_nodelay(true)?;
            info!(%peer, "debugger connected");
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no debugger connection"))
    }

    fn hang_up(&mut self)
    {
        self.awaiting_reply = false;
        if self.stream.take().is_some() {
            info!("debugger disconnected");
        }
    }

    /// Length of the buffered packet once its header is complete.
    fn packet_len(&self) -> Option<usize>
    {
        let length = self.outgoing.get(4..HEADER_SIZE)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(length);
        Some(HEADER_SIZE + u32::from_le_bytes(word) as usize)
    }

    /// Drop the current connection if its debugger has hung up or does so
    /// within the grace period.
    fn drop_if_gone(&mut self)
    {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        if peer_gone(stream, self.grace) {
            self.hang_up();
        }
    }

    fn flush_packet(&mut self) -> io::Result<()>
    {
        let packet = std::mem::take(&mut self.outgoing);
        if !std::mem::take(&mut self.awaiting_reply) {
            self.drop_if_gone();
        }
        loop {
            let stream = self.stream()?;
            match stream.write_all(&packet).and_then(|()| stream.flush()) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "debugger link lost, resending to the next debugger");
                    self.hang_up();
                }
            }
        }
    }
}

/// Wait up to `grace` for the peer to close. Data or silence means it is
/// still there.
fn peer_gone(stream: &TcpStream, grace: Duration) -> bool
{
    if stream.set_read_timeout(Some(grace)).is_err() {
        return true;
    }
    let mut byte = [0u8; 1];
    let gone = match stream.peek(&mut byte) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => !matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut),
    };
    gone || stream.set_read_timeout(None).is_err()
}

impl Transport for ListenerLink
{
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>
    {
        self.outgoing.extend_from_slice(bytes);
        match self.packet_len() {
            Some(len) if self.outgoing.len() >= len => self.flush_packet(),
            _ => Ok(()),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<()>
    {
        loop {
            match self.stream()?.read_exact(buf) {
                Ok(()) => {
                    self.awaiting_reply = true;
                    return Ok(());
                }
                // A partial packet is dropped; the codec resynchronizes.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => self.hang_up(),
                Err(e) => {
                    self.hang_up();
                    return Err(e);
                }
            }
        }
    }
}

pub(crate) fn serve(listen: &str, trap_type: u32, eip: u32, notify: bool) -> Result<(), Box<dyn std::error::Error>>
{
    let mut kernel = SimKernel::demo();
    let mut monitor = Monitor::new(ListenerLink::bind(listen)?);

    let mut frame = Context {
        trap_type,
        eip,
        cs: 0x08,
        ds: 0x10,
        es: 0x10,
        ss: 0x10,
        eflags: 0x202,
        esp: 0x8009_F000,
        ..Context::default()
    };
    monitor.on_trap(&mut kernel, &mut frame, Address::ZERO);
    println!("Target resumed with:\n{frame}");

    if notify {
        let thread = kernel.threads.spawn(SimThread::new(5, Address::ZERO));
        monitor.on_thread_created(&mut kernel, thread, Address::new(0x0040_1000));
        monitor.on_module_loaded(&mut kernel, ModuleHandle(0x7FE0_0000));
        monitor.on_output(&mut kernel, "init: started\n");
        monitor.on_thread_exited(&mut kernel, thread);
    }
    Ok(())
}
