//! # Debug Session State
//!
//! What the monitor remembers between traps:
//!
//! - **debugging**: the debug link has been brought up. Set on the first
//!   trap, never cleared. Notifications are only sent once it is set.
//! - **driving output**: a command loop is running, so output notifications
//!   are suppressed rather than recursing into another loop.
//! - **last trap**: overwritten on every trap entry, never cleared, read by
//!   `CONNECT` so a late-attaching debugger learns why the target stopped.

use kdbg_protocol::TrapSnapshot;

/// Process-lifetime session state of the monitor
#[derive(Debug, Default, Clone)]
pub struct Session
{
    debugging: bool,
    driving_output: bool,
    last_trap: TrapSnapshot,
}

impl Session
{
    /// Fresh session: link down, no trap recorded.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// True once the debug link has been brought up.
    #[must_use]
    pub fn is_debugging(&self) -> bool
    {
        self.debugging
    }

    /// Mark the link as up. There is no way back.
    pub(crate) fn enable(&mut self)
    {
        self.debugging = true;
    }

    /// True while a command loop is running.
    #[must_use]
    pub fn is_driving_output(&self) -> bool
    {
        self.driving_output
    }

    /// Set the driving-output flag, returning the previous value so nested
    /// loops can restore it.
    pub fn set_driving_output(&mut self, driving: bool) -> bool
    {
        std::mem::replace(&mut self.driving_output, driving)
    }

    /// Last recorded trap.
    #[must_use]
    pub fn last_trap(&self) -> &TrapSnapshot
    {
        &self.last_trap
    }

    /// Replace the trap snapshot.
    pub(crate) fn record_trap(&mut self, trap: TrapSnapshot)
    {
        self.last_trap = trap;
    }
}
