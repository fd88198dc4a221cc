//! Sparse simulated address space.

use kdbg_protocol::Address;

use crate::target::Memory;

#[derive(Debug, Clone)]
struct Region
{
    base: u64,
    bytes: Vec<u8>,
}

impl Region
{
    fn end(&self) -> u64
    {
        self.base + self.bytes.len() as u64
    }

    fn contains(&self, address: u64) -> bool
    {
        (self.base..self.end()).contains(&address)
    }
}

/// Address space made of mapped regions; everything else is unmapped
#[derive(Debug, Clone, Default)]
pub struct SimMemory
{
    regions: Vec<Region>,
}

impl SimMemory
{
    /// Empty address space
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Map `bytes` at `base`. Regions must not overlap.
    pub fn map(&mut self, base: Address, bytes: Vec<u8>)
    {
        debug_assert!(
            u64::from(base.value()) + bytes.len() as u64 <= 1 << 32,
            "region leaves the address space"
        );
        self.regions.push(Region {
            base: u64::from(base.value()),
            bytes,
        });
    }

    /// Map `size` zero bytes at `base`.
    pub fn map_zeroed(&mut self, base: Address, size: usize)
    {
        self.map(base, vec![0; size]);
    }

    /// Byte at `address`, `None` if unmapped.
    #[must_use]
    pub fn peek(&self, address: Address) -> Option<u8>
    {
        let address = u64::from(address.value());
        self.region(address)
            .map(|region| region.bytes[(address - region.base) as usize])
    }

    fn region(&self, address: u64) -> Option<&Region>
    {
        self.regions.iter().find(|region| region.contains(address))
    }

    fn region_mut(&mut self, address: u64) -> Option<&mut Region>
    {
        self.regions.iter_mut().find(|region| region.contains(address))
    }
}

impl Memory for SimMemory
{
    fn is_mapped(&self, address: Address, size: u32) -> bool
    {
        let Some(end) = address.value().checked_add(size).map(u64::from) else {
            return false;
        };
        // Adjacent regions may together cover the range.
        let mut cursor = u64::from(address.value());
        while cursor < end {
            match self.region(cursor) {
                Some(region) => cursor = region.end(),
                None => return false,
            }
        }
        true
    }

    fn read(&self, address: Address, buf: &mut [u8])
    {
        let mut cursor = u64::from(address.value());
        for byte in buf {
            *byte = self
                .region(cursor)
                .map_or(0, |region| region.bytes[(cursor - region.base) as usize]);
            cursor += 1;
        }
    }

    fn write(&mut self, address: Address, data: &[u8])
    {
        let mut cursor = u64::from(address.value());
        for &byte in data {
            if let Some(region) = self.region_mut(cursor) {
                let offset = (cursor - region.base) as usize;
                region.bytes[offset] = byte;
            }
            cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_adjacent_regions_form_one_range()
    {
        let mut memory = SimMemory::new();
        memory.map_zeroed(Address::new(0x1000), 0x1000);
        memory.map_zeroed(Address::new(0x2000), 0x1000);
        assert!(memory.is_mapped(Address::new(0x1ff0), 0x20));
        assert!(!memory.is_mapped(Address::new(0x2ff0), 0x20));
    }

    #[test]
    fn test_wrapping_range_is_unmapped()
    {
        let mut memory = SimMemory::new();
        memory.map_zeroed(Address::new(0xFFFF_F000), 0x1000);
        assert!(memory.is_mapped(Address::new(0xFFFF_F000), 0x1000));
        assert!(!memory.is_mapped(Address::new(0xFFFF_FFF0), 0x20));
    }

    #[test]
    fn test_write_then_read()
    {
        let mut memory = SimMemory::new();
        memory.map_zeroed(Address::new(0x4000), 16);
        memory.write(Address::new(0x4004), &[1, 2, 3]);
        let mut buf = [0u8; 5];
        memory.read(Address::new(0x4003), &mut buf);
        assert_eq!(buf, [0, 1, 2, 3, 0]);
        assert_eq!(memory.peek(Address::new(0x4005)), Some(2));
        assert_eq!(memory.peek(Address::new(0x5000)), None);
    }
}
