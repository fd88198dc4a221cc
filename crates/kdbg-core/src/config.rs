//! Monitor configuration.

use kdbg_protocol::codes::{MAX_CHUNK_SIZE, MAX_PACKET_LEN, PROTOCOL_VERSION};
use kdbg_protocol::ModuleHandle;

/// Base address the kernel image is loaded at.
pub const OS_BASE: u32 = 0x8000_0000;

/// File name of the kernel image.
pub const KERNEL_IMAGE_NAME: &str = "krnl.dll";

/// Tunables of the debug monitor
///
/// The defaults match what host debuggers expect; changing them is mostly
/// useful in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig
{
    /// Largest body accepted or produced.
    pub max_packet_len: usize,
    /// Largest memory range a single read may return. Never more than
    /// `max_packet_len`; [`Monitor::with_config`](crate::Monitor::with_config)
    /// clamps it.
    pub max_chunk_size: usize,
    /// Protocol revision required in `CONNECT`.
    pub protocol_version: u32,
    /// Handle reported for the kernel image when no module list has entries.
    pub kernel_image_handle: ModuleHandle,
    /// Name reported for the kernel image when no module list has entries.
    pub kernel_image_name: String,
}

impl Default for MonitorConfig
{
    fn default() -> Self
    {
        Self {
            max_packet_len: MAX_PACKET_LEN,
            max_chunk_size: MAX_CHUNK_SIZE,
            protocol_version: PROTOCOL_VERSION,
            kernel_image_handle: ModuleHandle(OS_BASE),
            kernel_image_name: KERNEL_IMAGE_NAME.to_string(),
        }
    }
}
