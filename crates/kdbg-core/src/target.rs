//! # Kernel Collaborators
//!
//! The monitor does not own kernel state. It borrows the kernel's memory
//! map, thread table, module lists and descriptor table for the duration of
//! one handler call, through the traits in this module.
//!
//! ## Halted-kernel contract
//!
//! Every method here is called while the kernel is *not scheduling*: the
//! monitor runs on the trapping CPU with everything else stopped, or at an
//! explicit notification point where the caller cooperates. Implementations
//! therefore need no locking against the monitor, and the monitor reads and
//! mutates through them with no transactional isolation.

use kdbg_protocol::{Address, Context, Descriptor, ModuleHandle, ThreadId};

use crate::ring::RingIndex;

/// Reference to a thread in the kernel's thread table
pub type ThreadRef = RingIndex;

/// Reference to a module on one of the module lists
pub type ModuleRef = RingIndex;

/// Virtual memory as seen by the trapping CPU
pub trait Memory
{
    /// True if every byte of `[address, address + size)` is mapped and accessible.
    ///
    /// A range that wraps past the top of the address space is not mapped.
    fn is_mapped(&self, address: Address, size: u32) -> bool;

    /// Copy `buf.len()` bytes starting at `address`.
    ///
    /// Only called after [`Memory::is_mapped`] accepted the range.
    fn read(&self, address: Address, buf: &mut [u8]);

    /// Copy `data` to `address`.
    ///
    /// Only called after [`Memory::is_mapped`] accepted the range.
    fn write(&mut self, address: Address, data: &[u8]);
}

/// The scheduler's thread table
///
/// Threads sit on a circular list that always contains at least the current
/// thread, so [`Threads::head`] never fails.
pub trait Threads
{
    /// Find a thread by id.
    fn lookup(&self, id: ThreadId) -> Option<ThreadRef>;

    /// The thread running on this CPU.
    fn current(&self) -> ThreadRef;

    /// Start of the thread list.
    fn head(&self) -> ThreadRef;

    /// Thread after `thread` on the list.
    fn next(&self, thread: ThreadRef) -> ThreadRef;

    /// Id of `thread`.
    fn id(&self, thread: ThreadRef) -> ThreadId;

    /// Address of the thread information block.
    fn tib(&self, thread: ThreadRef) -> Address;

    /// Exit code, meaningful once the thread has exited.
    fn exit_code(&self, thread: ThreadRef) -> i32;

    /// Outstanding suspensions. The thread only runs when this is zero.
    fn suspend_count(&self, thread: ThreadRef) -> u32;

    /// Add a suspension; returns the new suspend count or a negative status.
    fn suspend(&mut self, thread: ThreadRef) -> i32;

    /// Remove a suspension; returns the new suspend count or a negative status.
    fn resume(&mut self, thread: ThreadRef) -> i32;

    /// Register context saved when the thread trapped, if it is halted at one.
    fn stored_context(&self, thread: ThreadRef) -> Option<Context>;

    /// Attach or detach the saved register context.
    fn set_stored_context(&mut self, thread: ThreadRef, context: Option<Context>);

    /// Give up the CPU to another thread. Returns when the current thread is
    /// scheduled again.
    fn dispatch(&mut self);
}

/// One circular module list
pub trait ModuleList
{
    /// Start of the list, `None` when empty.
    fn head(&self) -> Option<ModuleRef>;

    /// Module after `module` on the list.
    fn next(&self, module: ModuleRef) -> ModuleRef;

    /// Module handle (image base).
    fn handle(&self, module: ModuleRef) -> ModuleHandle;

    /// Module file name.
    fn name(&self, module: ModuleRef) -> &str;
}

/// Loaded code modules
pub trait Modules
{
    /// Modules loaded into the kernel.
    fn kernel_modules(&self) -> &dyn ModuleList;

    /// Modules of the current process, when a process environment is mapped
    /// and has a module table.
    fn process_modules(&self) -> Option<&dyn ModuleList>;
}

/// Global descriptor table
pub trait Descriptors
{
    /// Descriptor at `index`, `None` past the end of the table.
    fn descriptor(&self, index: usize) -> Option<Descriptor>;
}

/// Everything the monitor needs from the kernel, bundled
pub trait Kernel
{
    /// Virtual memory
    fn memory(&mut self) -> &mut dyn Memory;

    /// Thread table
    fn threads(&mut self) -> &mut dyn Threads;

    /// Module lists
    fn modules(&self) -> &dyn Modules;

    /// Descriptor table
    fn descriptors(&self) -> &dyn Descriptors;

    /// Re-enable interrupts on the trapping CPU.
    ///
    /// Called on trap entry so polling the debug port does not starve other
    /// devices. The default does nothing.
    fn enable_interrupts(&mut self) {}
}
