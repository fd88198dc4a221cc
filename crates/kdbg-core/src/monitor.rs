//! # Debug Monitor
//!
//! [`Monitor`] owns the debug link and the session state and runs the
//! command loop: receive a packet, route it to its handler, send exactly one
//! reply or error packet, repeat until `CONTINUE`.
//!
//! ## Error tiers
//!
//! - **Framing** (bad checksum, oversized length): logged and skipped. No
//!   reply is sent; the debugger times out and resends, and the codec
//!   resynchronizes on the next signature byte.
//! - **Protocol** (bad version, address, thread, selector, command): answered
//!   with an error packet echoing the request id. Target state is unchanged.
//! - **Link** (transport I/O): ends the loop with [`MonitorError::Transport`].
//!
//! ## Execution model
//!
//! The loop is strictly single-threaded and only blocks inside the
//! transport. While it runs the kernel is not scheduling, which is what lets
//! handlers touch thread and module lists without locks.

use kdbg_protocol::codec::{self, PacketHeader};
use kdbg_protocol::error::CodecError;
use kdbg_protocol::wire::BodyWriter;
use kdbg_protocol::message::WireEncode;
use kdbg_protocol::{Command, ErrorCode, TargetEvent, Transport};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::handlers::{self, HandlerContext};
use crate::session::Session;
use crate::target::Kernel;

/// Where the monitor is in the trap lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState
{
    /// No trap or notification in progress.
    Idle,
    /// A trap was just taken; state is being captured.
    Entering,
    /// The command loop is running.
    Halted,
    /// `CONTINUE` was received; control is going back to the kernel.
    Resuming,
    /// The trapping thread was left suspended and yielded to the scheduler.
    Suspended,
}

/// Whether the loop keeps serving after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow
{
    Stay,
    Leave,
}

/// Target-side debug monitor
///
/// One instance lives for the whole kernel lifetime. Construct it early with
/// the debug transport; the link itself is only brought up on the first trap.
///
/// ## Example
///
/// ```rust
/// use kdbg_core::sim::SimKernel;
/// use kdbg_core::Monitor;
/// use kdbg_protocol::codes::Command;
/// use kdbg_protocol::{Address, Context, ScriptedLink};
///
/// let mut link = ScriptedLink::new();
/// link.push_packet(Command::Continue.code(), 1, &[]);
///
/// let mut kernel = SimKernel::new();
/// let mut monitor = Monitor::new(&mut link);
/// let mut frame = Context { trap_type: 3, ..Context::default() };
/// monitor.on_trap(&mut kernel, &mut frame, Address::ZERO);
/// assert!(monitor.session().is_debugging());
/// ```
pub struct Monitor<T: Transport>
{
    transport: T,
    config: MonitorConfig,
    session: Session,
    state: MonitorState,
    request: Vec<u8>,
    reply: Vec<u8>,
}

impl<T: Transport> Monitor<T>
{
    /// Create a monitor with the default configuration.
    pub fn new(transport: T) -> Self
    {
        Self::with_config(transport, MonitorConfig::default())
    }

    /// Create a monitor with explicit tunables.
    ///
    /// Packet buffers are allocated here, once, at their maximum size. A
    /// `max_chunk_size` larger than `max_packet_len` is clamped so memory
    /// reads always fit in one reply.
    pub fn with_config(transport: T, mut config: MonitorConfig) -> Self
    {
        if config.max_chunk_size > config.max_packet_len {
            warn!(
                max_chunk_size = config.max_chunk_size,
                max_packet_len = config.max_packet_len,
                "read chunk larger than a packet, clamping"
            );
            config.max_chunk_size = config.max_packet_len;
        }
        Self {
            transport,
            request: Vec::with_capacity(config.max_packet_len),
            reply: Vec::with_capacity(config.max_packet_len),
            config,
            session: Session::new(),
            state: MonitorState::Idle,
        }
    }

    /// Session state.
    pub fn session(&self) -> &Session
    {
        &self.session
    }

    /// Mutable session state.
    pub fn session_mut(&mut self) -> &mut Session
    {
        &mut self.session
    }

    /// Active configuration.
    pub fn config(&self) -> &MonitorConfig
    {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState
    {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: MonitorState)
    {
        self.state = state;
    }

    /// Borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T
    {
        &mut self.transport
    }

    /// Get back the transport.
    pub fn into_transport(self) -> T
    {
        self.transport
    }

    /// Bring the link up the first time through. Later calls do nothing.
    fn start_session(&mut self) -> Result<()>
    {
        if self.session.is_debugging() {
            return Ok(());
        }
        self.transport.init()?;
        self.session.enable();
        info!("waiting for remote debugger");
        Ok(())
    }

    /// Send an unsolicited event. Events always carry id 0.
    fn send_event(&mut self, event: &TargetEvent) -> Result<()>
    {
        event.encode(&mut BodyWriter::new(&mut self.reply));
        codec::send_packet(&mut self.transport, event.code().code(), 0, &self.reply)?;
        Ok(())
    }

    /// Send `event` if there is one, then serve commands until `CONTINUE`.
    pub(crate) fn announce(&mut self, kernel: &mut dyn Kernel, event: Option<&TargetEvent>) -> Result<()>
    {
        if let Some(event) = event {
            self.send_event(event)?;
        }
        self.command_loop(kernel)
    }

    /// Serve debugger requests until `CONTINUE`.
    ///
    /// Output notifications are suppressed for the duration. The loop can be
    /// entered again from inside a notification; the previous suppression
    /// state is restored on exit.
    ///
    /// ## Errors
    ///
    /// Returns [`MonitorError::Transport`] if the link fails. Framing and
    /// protocol errors never end the loop.
    pub fn command_loop(&mut self, kernel: &mut dyn Kernel) -> Result<()>
    {
        self.start_session()?;

        let was_driving = self.session.set_driving_output(true);
        self.state = MonitorState::Halted;
        let result = self.serve(kernel);
        self.session.set_driving_output(was_driving);
        self.state = MonitorState::Resuming;
        result
    }

    fn serve(&mut self, kernel: &mut dyn Kernel) -> Result<()>
    {
        loop {
            let header = match codec::recv_packet(&mut self.transport, &mut self.request, self.config.max_packet_len) {
                Ok(header) => header,
                Err(CodecError::Io(err)) => return Err(MonitorError::Transport(err)),
                Err(err) => {
                    warn!(error = %err, "error receiving debugger command");
                    continue;
                }
            };

            debug!(id = header.id, cmd = header.command, len = header.length, "debugger command");

            if self.dispatch(kernel, header)? == Flow::Leave {
                return Ok(());
            }
        }
    }

    /// Route one request and send its reply.
    fn dispatch(&mut self, kernel: &mut dyn Kernel, header: PacketHeader) -> Result<Flow>
    {
        let Ok(command) = Command::try_from(header.command) else {
            warn!(cmd = header.command, "unknown debugger command");
            codec::send_error(&mut self.transport, ErrorCode::InvalidCommand, header.id)?;
            return Ok(Flow::Stay);
        };

        let outcome = {
            let mut reply = BodyWriter::new(&mut self.reply);
            let mut cx = HandlerContext {
                kernel: &mut *kernel,
                session: &self.session,
                config: &self.config,
            };
            handlers::handle(command, &mut cx, &self.request, &mut reply)
        };

        match outcome {
            Ok(()) => codec::send_packet(&mut self.transport, command.reply_code(), header.id, &self.reply)?,
            Err(code) => {
                debug!(%command, error = %code, "request rejected");
                codec::send_error(&mut self.transport, code, header.id)?;
            }
        }

        Ok(if command == Command::Continue { Flow::Leave } else { Flow::Stay })
    }
}
