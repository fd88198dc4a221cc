//! # Trap Entry
//!
//! The kernel's trap handler calls [`Monitor::on_trap`] with the saved
//! register frame. Control stays in the monitor until the debugger sends
//! `CONTINUE`; the frame then carries whatever registers the thread should
//! resume with.

use kdbg_protocol::{Address, Context, TargetEvent, TrapSnapshot, Transport};
use tracing::{debug, error, info};

use crate::monitor::{Monitor, MonitorState};
use crate::target::Kernel;

impl<T: Transport> Monitor<T>
{
    /// Enter the debugger for a trap taken by the current thread.
    ///
    /// `frame` is the trap frame the CPU and the trap stub pushed;
    /// `fault_address` is the faulting address for page faults and
    /// [`Address::ZERO`] otherwise.
    ///
    /// 1. Attach `frame` to the current thread as its stored context and
    ///    record the trap snapshot.
    /// 2. Re-enable interrupts.
    /// 3. If a debugger is already attached, send a `TRAP` event. The very
    ///    first trap sends nothing: the debugger learns about it through
    ///    `CONNECT`.
    /// 4. Serve commands until `CONTINUE`.
    /// 5. If the debugger left the thread suspended, yield to the scheduler.
    /// 6. Copy the stored context back into `frame` and detach it.
    ///
    /// A failing link is logged and the thread resumes with whatever state
    /// the debugger had set up so far.
    pub fn on_trap(&mut self, kernel: &mut dyn Kernel, frame: &mut Context, fault_address: Address)
    {
        self.set_state(MonitorState::Entering);

        let threads = kernel.threads();
        let current = threads.current();
        threads.set_stored_context(current, Some(*frame));

        let trap = TrapSnapshot {
            thread: threads.id(current),
            trap_type: frame.trap_type,
            error_code: frame.error_code,
            eip: Address::new(frame.eip),
            fault_address,
        };
        info!(trap = trap.trap_type, address = %fault_address, thread = %trap.thread, "enter kernel debugger");
        debug!("registers at trap:\n{frame}");
        self.session_mut().record_trap(trap);

        kernel.enable_interrupts();

        let event = self.session().is_debugging().then_some(TargetEvent::Trap(trap));
        if let Err(err) = self.announce(kernel, event.as_ref()) {
            error!(error = %err, "debug session failed, resuming target");
        }

        let threads = kernel.threads();
        if threads.suspend_count(current) > 0 {
            self.set_state(MonitorState::Suspended);
            debug!(thread = %trap.thread, "trapping thread left suspended, yielding");
            threads.dispatch();
        }

        if let Some(context) = threads.stored_context(current) {
            *frame = context;
        }
        threads.set_stored_context(current, None);
        self.set_state(MonitorState::Idle);
    }
}
