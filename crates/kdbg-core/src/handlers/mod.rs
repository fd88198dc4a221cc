//! # Command Handlers
//!
//! One handler per request code. A handler reads the request body, works
//! on the kernel through its collaborators, and either fills the reply body
//! or returns the [`ErrorCode`] to send instead. Handlers never touch the
//! transport; the dispatcher sends exactly one packet per request.
//!
//! A rejected request must leave the target untouched, so every handler
//! validates its whole request before mutating anything.

mod connect;
mod context;
mod memory;
mod modules;
mod selector;
mod threads;

use kdbg_protocol::wire::BodyWriter;
use kdbg_protocol::{Command, ErrorCode};

use crate::config::MonitorConfig;
use crate::session::Session;
use crate::target::Kernel;

/// What a handler may borrow while it runs
pub(crate) struct HandlerContext<'a>
{
    pub kernel: &'a mut dyn Kernel,
    pub session: &'a Session,
    pub config: &'a MonitorConfig,
}

/// `Ok` sends the reply body, `Err` sends the error packet instead.
pub(crate) type HandlerResult = Result<(), ErrorCode>;

/// Run the handler for `command`.
pub(crate) fn handle(
    command: Command,
    cx: &mut HandlerContext<'_>,
    request: &[u8],
    reply: &mut BodyWriter<'_>,
) -> HandlerResult
{
    match command {
        Command::Connect => connect::connect(cx, request, reply),
        // Empty reply; the dispatcher leaves the loop after sending it.
        Command::Continue => Ok(()),
        Command::ReadMemory => memory::read_memory(cx, request, reply),
        Command::WriteMemory => memory::write_memory(cx, request),
        Command::SuspendThread => threads::suspend_threads(cx, request, reply),
        Command::ResumeThread => threads::resume_threads(cx, request, reply),
        Command::GetThreadContext => context::get_thread_context(cx, request, reply),
        Command::SetThreadContext => context::set_thread_context(cx, request),
        Command::GetSelector => selector::get_selector(cx, request, reply),
        Command::GetModules => modules::get_modules(cx, reply),
        Command::GetThreads => threads::get_threads(cx, reply),
    }
}
