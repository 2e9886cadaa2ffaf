//! Native addresses and the raw-memory staging facility.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// Address of a region in the host process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePointer(u64);

impl NativePointer {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Wraps a raw address.
    #[must_use]
    pub const fn new(address: u64) -> Self {
        Self(address)
    }

    /// Raw address value.
    #[must_use]
    pub const fn address(self) -> u64 {
        self.0
    }

    /// Whether this is [`NativePointer::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offsets the address by `bytes`, or `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, bytes: u64) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(address) => Some(Self(address)),
            None => None,
        }
    }
}

impl FromStr for NativePointer {
    type Err = PointerParseError;

    /// Parses decimal text, or hexadecimal text with a `0x`/`0X` prefix.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed.map(Self).map_err(|source| PointerParseError {
            input: text.to_owned(),
            source,
        })
    }
}

impl fmt::Display for NativePointer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:#x}", self.0)
    }
}

impl From<u64> for NativePointer {
    fn from(address: u64) -> Self {
        Self(address)
    }
}

/// Text that does not describe a native address.
#[derive(Debug, Error)]
#[error("invalid native pointer '{input}': {source}")]
pub struct PointerParseError {
    input: String,
    #[source]
    source: ParseIntError,
}

impl PointerParseError {
    /// The rejected text.
    #[must_use]
    pub fn input(&self) -> &str {
        self.input.as_str()
    }
}

/// Raw-memory facility provided by the host.
pub trait Memory {
    /// Allocates `size` bytes and returns the new region.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError`] when the allocation cannot be satisfied.
    fn alloc(&self, size: usize) -> Result<NativePointer, MemoryError>;

    /// Copies `size` bytes from `source` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError`] when either region is inaccessible.
    fn copy(
        &self,
        destination: NativePointer,
        source: NativePointer,
        size: usize,
    ) -> Result<(), MemoryError>;
}

impl fmt::Debug for dyn Memory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Memory")
    }
}

/// Errors reported by [`Memory`] implementations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The host could not allocate the requested region.
    #[error("failed to allocate {size} byte(s)")]
    Allocation {
        /// Requested size in bytes.
        size: usize,
    },
    /// A region could not be read or written.
    #[error("memory at {address} is not accessible for {size} byte(s)")]
    Access {
        /// Start of the offending region.
        address: NativePointer,
        /// Length of the attempted access.
        size: usize,
    },
}

/// Allocates `size` bytes and fills them with a copy of `source`.
///
/// # Errors
///
/// Propagates the [`MemoryError`] from the allocation or the copy.
pub fn duplicate(
    memory: &dyn Memory,
    source: NativePointer,
    size: usize,
) -> Result<NativePointer, MemoryError> {
    let region = memory.alloc(size)?;
    memory.copy(region, source, size)?;
    Ok(region)
}
