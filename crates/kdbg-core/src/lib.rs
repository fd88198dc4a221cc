//! # kdbg-core
//!
//! Target-side debug monitor for a stop-the-world kernel debugger.
//!
//! The kernel calls into the [`Monitor`] from exactly two kinds of places:
//!
//! - **Trap entry** ([`Monitor::on_trap`]): a breakpoint, fault or other
//!   exception stops the current thread and hands control to the debugger
//!   until it sends `CONTINUE`.
//! - **Notification points** ([`Monitor::on_thread_created`],
//!   [`Monitor::on_module_loaded`], [`Monitor::on_output`], ...): once a
//!   debugger is attached, each lifecycle event is reported and the debugger
//!   gets a chance to inspect the target.
//!
//! The monitor reaches kernel state only through the collaborator traits in
//! [`target`]. [`sim::SimKernel`] implements them in memory.

pub mod config;
pub mod error;
mod handlers;
pub mod monitor;
mod notify;
pub mod ring;
pub mod session;
pub mod sim;
pub mod target;
mod trap;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitor::{Monitor, MonitorState};
pub use session::Session;
pub use target::{Descriptors, Kernel, Memory, ModuleList, ModuleRef, Modules, ThreadRef, Threads};
