//! Simulated module lists.

use kdbg_protocol::ModuleHandle;

use crate::ring::Ring;
use crate::target::{ModuleList, ModuleRef, Modules};

/// One loaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimModule
{
    pub handle: ModuleHandle,
    pub name: String,
}

impl SimModule
{
    /// Module loaded at `handle`.
    #[must_use]
    pub fn new(handle: u32, name: &str) -> Self
    {
        Self {
            handle: ModuleHandle(handle),
            name: name.to_string(),
        }
    }
}

impl ModuleList for Ring<SimModule>
{
    fn head(&self) -> Option<ModuleRef>
    {
        Ring::head(self)
    }

    fn next(&self, module: ModuleRef) -> ModuleRef
    {
        Ring::next(self, module)
    }

    fn handle(&self, module: ModuleRef) -> ModuleHandle
    {
        self[module].handle
    }

    fn name(&self, module: ModuleRef) -> &str
    {
        &self[module].name
    }
}

/// Kernel modules plus the optional module table of the current process
#[derive(Debug, Clone, Default)]
pub struct SimModules
{
    pub kernel: Ring<SimModule>,
    /// `None` when no process environment is mapped
    pub process: Option<Ring<SimModule>>,
}

impl SimModules
{
    /// Append to the kernel module list.
    pub fn load_kernel_module(&mut self, module: SimModule)
    {
        self.kernel.push(module);
    }

    /// Append to the process module list, creating it if needed.
    pub fn load_process_module(&mut self, module: SimModule)
    {
        self.process.get_or_insert_with(Ring::new).push(module);
    }
}

impl Modules for SimModules
{
    fn kernel_modules(&self) -> &dyn ModuleList
    {
        &self.kernel
    }

    fn process_modules(&self) -> Option<&dyn ModuleList>
    {
        self.process.as_ref().map(|ring| ring as &dyn ModuleList)
    }
}
