//! # Event Notifications
//!
//! Kernel hooks for thread, module and output events. Each one is a no-op
//! until a debugger has attached (the first trap). After that, the event is
//! sent and the monitor serves commands until `CONTINUE`, so the debugger
//! can inspect the target at every notification point.
//!
//! Link failures are logged and the kernel carries on.

use kdbg_protocol::{Address, ModuleHandle, TargetEvent, Transport};
use tracing::{debug, error};

use crate::monitor::{Monitor, MonitorState};
use crate::target::{Kernel, ThreadRef};

impl<T: Transport> Monitor<T>
{
    /// A thread was created. Call after it is on the thread list.
    pub fn on_thread_created(&mut self, kernel: &mut dyn Kernel, thread: ThreadRef, start_address: Address)
    {
        if !self.session().is_debugging() {
            return;
        }
        let threads = kernel.threads();
        let event = TargetEvent::CreateThread {
            thread: threads.id(thread),
            tib: threads.tib(thread),
            start_address,
        };
        self.notify(kernel, &event);
    }

    /// A thread is exiting. Call while it is still on the thread list.
    pub fn on_thread_exited(&mut self, kernel: &mut dyn Kernel, thread: ThreadRef)
    {
        if !self.session().is_debugging() {
            return;
        }
        let threads = kernel.threads();
        let event = TargetEvent::ExitThread {
            thread: threads.id(thread),
            exit_code: threads.exit_code(thread),
        };
        self.notify(kernel, &event);
    }

    /// A module was mapped.
    pub fn on_module_loaded(&mut self, kernel: &mut dyn Kernel, handle: ModuleHandle)
    {
        self.notify(kernel, &TargetEvent::LoadModule(handle));
    }

    /// A module was unmapped.
    pub fn on_module_unloaded(&mut self, kernel: &mut dyn Kernel, handle: ModuleHandle)
    {
        self.notify(kernel, &TargetEvent::UnloadModule(handle));
    }

    /// Kernel text output.
    ///
    /// Suppressed while a command loop runs, since the output was most
    /// likely produced by the monitor itself. Text longer than one packet is
    /// cut at a character boundary.
    pub fn on_output(&mut self, kernel: &mut dyn Kernel, text: &str)
    {
        if self.session().is_driving_output() {
            return;
        }
        let room = self.config().max_packet_len.saturating_sub(4);
        let mut end = text.len().min(room);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.notify(kernel, &TargetEvent::Output(text[..end].to_string()));
    }

    fn notify(&mut self, kernel: &mut dyn Kernel, event: &TargetEvent)
    {
        if !self.session().is_debugging() {
            return;
        }
        debug!(code = ?event.code(), "notifying debugger");
        if let Err(err) = self.announce(kernel, Some(event)) {
            error!(error = %err, "debug session failed during notification");
        }
        self.set_state(MonitorState::Idle);
    }
}
