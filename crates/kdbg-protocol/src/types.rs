//! # Target Word Types
//!
//! The debugged kernel is a 32-bit target: addresses, thread ids and module
//! handles all travel as 32-bit little-endian words. These newtypes keep
//! them from being mixed up with sizes, counts or with each other.

use std::fmt;
use std::ops::Add;

/// Strongly typed target address
///
/// ## Example
///
/// ```rust
/// use kdbg_protocol::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100;
/// assert_eq!(next_addr.value(), 0x1100);
/// assert_eq!(addr.to_string(), "0x00001000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u32);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a raw target word
    ///
    /// Usable in const contexts:
    ///
    /// ```rust
    /// use kdbg_protocol::types::Address;
    ///
    /// const OS_BASE: Address = Address::new(0x8000_0000);
    /// ```
    #[must_use]
    pub const fn new(value: u32) -> Self
    {
        Address(value)
    }

    /// Get the raw target word
    #[must_use]
    pub const fn value(self) -> u32
    {
        self.0
    }

    /// Add an offset, returning `None` if the result leaves the 32-bit address space
    ///
    /// ```rust
    /// use kdbg_protocol::types::Address;
    ///
    /// assert_eq!(Address::from(0x1000).checked_add(0x10), Some(Address::from(0x1010)));
    /// assert_eq!(Address::from(u32::MAX).checked_add(1), None);
    /// ```
    #[must_use]
    pub fn checked_add(self, offset: u32) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }
}

impl From<u32> for Address
{
    fn from(value: u32) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u32
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Add<u32> for Address
{
    type Output = Address;

    fn add(self, rhs: u32) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

/// Kernel thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ThreadId(pub u32);

impl ThreadId
{
    /// Raw wire value
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl From<u32> for ThreadId
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Handle of a loaded module (its image base address on the target)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleHandle(pub u32);

impl ModuleHandle
{
    /// Raw wire value
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl From<u32> for ModuleHandle
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ModuleHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}
