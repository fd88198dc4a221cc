//! # Simulated Kernel
//!
//! An in-memory [`Kernel`] for tests and for the `kdbg target` command:
//! a sparse address space, a thread ring, kernel and process module lists
//! and a flat-model GDT. Everything is plain data with public fields, so a
//! test can set up exactly the state it wants and inspect the result.

mod memory;
mod modules;
mod threads;

pub use memory::SimMemory;
pub use modules::{SimModule, SimModules};
pub use threads::{SimThread, SimThreads};

use kdbg_protocol::{Address, Descriptor};

use crate::config::OS_BASE;
use crate::target::{Descriptors, Kernel, Memory, Modules, Threads};

/// Number of GDT slots
pub const MAX_GDT: usize = 16;

/// Selector of the kernel code segment
pub const SEL_KTEXT: u32 = 0x08;
/// Selector of the kernel data segment
pub const SEL_KDATA: u32 = 0x10;
/// Selector of the user code segment
pub const SEL_UTEXT: u32 = 0x18;
/// Selector of the user data segment
pub const SEL_UDATA: u32 = 0x20;
/// Selector of the thread information block segment
pub const SEL_TIB: u32 = 0x28;

/// Address of the first thread information block
pub const TIB_BASE: u32 = 0x7FFD_F000;

/// Global descriptor table as raw entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimDescriptors(pub Vec<Descriptor>);

impl SimDescriptors
{
    /// Flat 4 GiB code and data segments for ring 0 and 3, a TIB segment,
    /// and empty slots up to [`MAX_GDT`].
    #[must_use]
    pub fn flat_model() -> Self
    {
        let flags = Descriptor::FLAG_GRANULARITY | Descriptor::FLAG_32BIT;
        let mut table = vec![
            Descriptor::default(),
            Descriptor::new(0, 0xFFFFF, 0x9A, flags),
            Descriptor::new(0, 0xFFFFF, 0x92, flags),
            Descriptor::new(0, 0xFFFFF, 0xFA, flags),
            Descriptor::new(0, 0xFFFFF, 0xF2, flags),
            Descriptor::new(TIB_BASE, 0xFFF, 0xF2, Descriptor::FLAG_32BIT),
        ];
        table.resize(MAX_GDT, Descriptor::default());
        Self(table)
    }
}

impl Descriptors for SimDescriptors
{
    fn descriptor(&self, index: usize) -> Option<Descriptor>
    {
        self.0.get(index).copied()
    }
}

/// In-memory kernel
#[derive(Debug, Clone)]
pub struct SimKernel
{
    pub memory: SimMemory,
    pub threads: SimThreads,
    pub modules: SimModules,
    pub descriptors: SimDescriptors,
    interrupts_enabled: bool,
}

impl Default for SimKernel
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl SimKernel
{
    /// Bare kernel: thread 1 running, nothing mapped, no modules.
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            memory: SimMemory::new(),
            threads: SimThreads::new(SimThread::new(1, Address::new(TIB_BASE))),
            modules: SimModules::default(),
            descriptors: SimDescriptors::flat_model(),
            interrupts_enabled: false,
        }
    }

    /// A booted-looking kernel: a mapped kernel image with its modules, an
    /// init process with its own image and a few threads.
    #[must_use]
    pub fn demo() -> Self
    {
        let mut kernel = Self::new();

        let mut image = vec![0u8; 0x1_0000];
        image[..2].copy_from_slice(b"MZ");
        image[0x3C] = 0x80;
        image[0x80..0x84].copy_from_slice(b"PE\0\0");
        kernel.memory.map(Address::new(OS_BASE), image);
        kernel.memory.map_zeroed(Address::new(0x0040_0000), 0x4000);
        kernel.memory.map_zeroed(Address::new(TIB_BASE - 0x1000), 0x2000);

        for (id, tib) in [(2, TIB_BASE - 0x1000), (3, 0), (4, 0)] {
            kernel.threads.spawn(SimThread::new(id, Address::new(tib)));
        }

        kernel.modules.load_kernel_module(SimModule::new(OS_BASE, "krnl.dll"));
        kernel.modules.load_kernel_module(SimModule::new(0x8010_0000, "3c905c.sys"));
        kernel.modules.load_process_module(SimModule::new(0x0040_0000, "init.exe"));
        kernel.modules.load_process_module(SimModule::new(0x7FF0_0000, "os.dll"));
        kernel
    }

    /// True once the monitor re-enabled interrupts.
    #[must_use]
    pub fn interrupts_enabled(&self) -> bool
    {
        self.interrupts_enabled
    }
}

impl Kernel for SimKernel
{
    fn memory(&mut self) -> &mut dyn Memory
    {
        &mut self.memory
    }

    fn threads(&mut self) -> &mut dyn Threads
    {
        &mut self.threads
    }

    fn modules(&self) -> &dyn Modules
    {
        &self.modules
    }

    fn descriptors(&self) -> &dyn Descriptors
    {
        &self.descriptors
    }

    fn enable_interrupts(&mut self)
    {
        self.interrupts_enabled = true;
    }
}
