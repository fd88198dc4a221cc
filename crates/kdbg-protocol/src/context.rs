//! # Register Context and Segment Descriptors
//!
//! [`Context`] is the trap frame the kernel builds when a thread is
//! interrupted: the 16 words pushed by the CPU and the trap stub, in stack
//! order. It travels verbatim in `GET_THREAD_CONTEXT` / `SET_THREAD_CONTEXT`.
//!
//! [`Descriptor`] is one raw 8-byte GDT entry as returned by `GET_SELECTOR`.

use std::fmt;

use crate::error::BodyError;
use crate::wire::{BodyReader, BodyWriter};

/// Saved register state of an interrupted thread
///
/// ## Wire layout
///
/// Sixteen little-endian 32-bit words, in field declaration order (64 bytes).
///
/// ## Example
///
/// ```rust
/// use kdbg_protocol::context::Context;
///
/// let ctx = Context {
///     eip: 0x8000_1000,
///     trap_type: 3,
///     ..Context::default()
/// };
/// assert_eq!(Context::from_words(ctx.to_words()), ctx);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Context
{
    /// Extra data segment
    pub es: u32,
    /// Data segment
    pub ds: u32,
    /// Destination index
    pub edi: u32,
    /// Source index
    pub esi: u32,
    /// Frame pointer
    pub ebp: u32,
    /// General purpose
    pub ebx: u32,
    /// General purpose
    pub edx: u32,
    /// General purpose
    pub ecx: u32,
    /// Accumulator
    pub eax: u32,
    /// Interrupt vector that caused the trap
    pub trap_type: u32,
    /// CPU-supplied error code (0 when the vector has none)
    pub error_code: u32,
    /// Instruction pointer
    pub eip: u32,
    /// Code segment
    pub cs: u32,
    /// Flags register
    pub eflags: u32,
    /// Stack pointer
    pub esp: u32,
    /// Stack segment
    pub ss: u32,
}

impl Context
{
    /// Encoded size in bytes
    pub const SIZE: usize = 64;

    /// Flatten into wire order.
    #[must_use]
    pub const fn to_words(&self) -> [u32; 16]
    {
        [
            self.es,
            self.ds,
            self.edi,
            self.esi,
            self.ebp,
            self.ebx,
            self.edx,
            self.ecx,
            self.eax,
            self.trap_type,
            self.error_code,
            self.eip,
            self.cs,
            self.eflags,
            self.esp,
            self.ss,
        ]
    }

    /// Rebuild from wire order.
    #[must_use]
    pub const fn from_words(w: [u32; 16]) -> Self
    {
        Self {
            es: w[0],
            ds: w[1],
            edi: w[2],
            esi: w[3],
            ebp: w[4],
            ebx: w[5],
            edx: w[6],
            ecx: w[7],
            eax: w[8],
            trap_type: w[9],
            error_code: w[10],
            eip: w[11],
            cs: w[12],
            eflags: w[13],
            esp: w[14],
            ss: w[15],
        }
    }

    pub(crate) fn encode(&self, w: &mut BodyWriter<'_>)
    {
        for word in self.to_words() {
            w.put_u32(word);
        }
    }

    pub(crate) fn decode(r: &mut BodyReader<'_>) -> Result<Self, BodyError>
    {
        let mut words = [0u32; 16];
        for word in &mut words {
            *word = r.u32()?;
        }
        Ok(Self::from_words(words))
    }
}

/// Register dump, one line per register group
impl fmt::Display for Context
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        writeln!(
            f,
            "EAX  = {:08X} EBX  = {:08X} ECX  = {:08X} EDX  = {:08X}",
            self.eax, self.ebx, self.ecx, self.edx
        )?;
        writeln!(
            f,
            "EDI  = {:08X} ESI  = {:08X} EBP  = {:08X} ESP  = {:08X}",
            self.edi, self.esi, self.ebp, self.esp
        )?;
        writeln!(
            f,
            "CS   = {:08X} DS   = {:08X} ES   = {:08X} SS   = {:08X}",
            self.cs, self.ds, self.es, self.ss
        )?;
        write!(
            f,
            "EIP  = {:08X} EFLG = {:08X} TRAP = {:08X} ERR  = {:08X}",
            self.eip, self.eflags, self.trap_type, self.error_code
        )
    }
}

/// Raw 8-byte x86 segment descriptor
///
/// ```text
/// byte 0-1  limit 15:0
/// byte 2-3  base 15:0
/// byte 4    base 23:16
/// byte 5    access (present, DPL, type)
/// byte 6    flags 7:4 | limit 19:16
/// byte 7    base 31:24
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Descriptor(pub [u8; 8]);

impl Descriptor
{
    /// Encoded size in bytes, also the stride between selectors
    pub const SIZE: usize = 8;

    /// Flag: limit is counted in 4 KiB pages
    pub const FLAG_GRANULARITY: u8 = 0x80;

    /// Flag: 32-bit segment
    pub const FLAG_32BIT: u8 = 0x40;

    /// Pack a descriptor from its fields. `limit` keeps its low 20 bits.
    #[must_use]
    pub const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self
    {
        let b = base.to_le_bytes();
        Self([
            limit as u8,
            (limit >> 8) as u8,
            b[0],
            b[1],
            b[2],
            access,
            (flags & 0xF0) | ((limit >> 16) as u8 & 0x0F),
            b[3],
        ])
    }

    /// Segment base address
    #[must_use]
    pub const fn base(&self) -> u32
    {
        u32::from_le_bytes([self.0[2], self.0[3], self.0[4], self.0[7]])
    }

    /// Segment limit in bytes, with page granularity applied
    #[must_use]
    pub const fn limit(&self) -> u32
    {
        let raw = self.0[0] as u32 | (self.0[1] as u32) << 8 | ((self.0[6] & 0x0F) as u32) << 16;
        if self.0[6] & Self::FLAG_GRANULARITY != 0 {
            raw << 12 | 0xFFF
        } else {
            raw
        }
    }

    /// Access byte
    #[must_use]
    pub const fn access(&self) -> u8
    {
        self.0[5]
    }

    /// Upper flag nibble
    #[must_use]
    pub const fn flags(&self) -> u8
    {
        self.0[6] & 0xF0
    }

    /// Present bit
    #[must_use]
    pub const fn is_present(&self) -> bool
    {
        self.0[5] & 0x80 != 0
    }
}

impl fmt::Display for Descriptor
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(
            f,
            "base={:08X} limit={:08X} access={:02X} flags={:X}{}",
            self.base(),
            self.limit(),
            self.access(),
            self.flags() >> 4,
            if self.is_present() { "" } else { " (not present)" }
        )
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_flat_code_descriptor()
    {
        let desc = Descriptor::new(0, 0xFFFFF, 0x9A, Descriptor::FLAG_GRANULARITY | Descriptor::FLAG_32BIT);
        assert_eq!(desc.0, [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x9A, 0xCF, 0x00]);
        assert_eq!(desc.base(), 0);
        assert_eq!(desc.limit(), 0xFFFF_FFFF);
        assert!(desc.is_present());
    }

    #[test]
    fn test_byte_granular_descriptor()
    {
        let desc = Descriptor::new(0x7FFD_E000, 0xFFF, 0xF2, Descriptor::FLAG_32BIT);
        assert_eq!(desc.base(), 0x7FFD_E000);
        assert_eq!(desc.limit(), 0xFFF);
        assert_eq!(desc.access(), 0xF2);
    }

    #[test]
    fn test_register_dump_has_four_lines()
    {
        let ctx = Context {
            eax: 0xDEAD_BEEF,
            eip: 0x8000_1234,
            ..Context::default()
        };
        let dump = ctx.to_string();
        assert_eq!(dump.lines().count(), 4);
        assert!(dump.contains("EAX  = DEADBEEF"));
        assert!(dump.contains("EIP  = 80001234"));
    }
}
