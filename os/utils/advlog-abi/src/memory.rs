//! Byte-addressed views of memory the connector does not own.
//!
//! Everything the validator and the PRM handler look at (descriptor, context
//! buffer, static data buffer) is read through a [`MemoryReader`] at an explicit
//! address and length. Structures are never reinterpreted in place.

#![allow(unsafe_code)]

use crate::address::MemoryAddress;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MemoryError {
    #[error("attempted to read through a null address")]
    Null,
    #[error("address range starting at {0} overflows the address space")]
    Overflow(MemoryAddress),
    #[error("{len} bytes at {address} are outside the readable window")]
    Unmapped { address: MemoryAddress, len: usize },
}

/// Read-only access to a byte-addressed memory space.
pub trait MemoryReader {
    /// Fill `buf` with the bytes starting at `address`.
    ///
    /// # Errors
    /// Fails if any byte of `address..address + buf.len()` is not readable.
    fn read_bytes(&self, address: MemoryAddress, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// # Errors
    /// See [`read_bytes`](Self::read_bytes).
    #[inline]
    fn read_u16(&self, address: MemoryAddress) -> Result<u16, MemoryError> {
        let mut b = [0u8; 2];
        self.read_bytes(address, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    /// # Errors
    /// See [`read_bytes`](Self::read_bytes).
    #[inline]
    fn read_u32(&self, address: MemoryAddress) -> Result<u32, MemoryError> {
        let mut b = [0u8; 4];
        self.read_bytes(address, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    /// # Errors
    /// See [`read_bytes`](Self::read_bytes).
    #[inline]
    fn read_u64(&self, address: MemoryAddress) -> Result<u64, MemoryError> {
        let mut b = [0u8; 8];
        self.read_bytes(address, &mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    /// Read a little-endian `u32` at `base + offset`.
    ///
    /// # Errors
    /// Fails on address overflow or if the field is not readable.
    #[inline]
    fn read_u32_at(&self, base: MemoryAddress, offset: usize) -> Result<u32, MemoryError> {
        self.read_u32(field_address(base, offset)?)
    }

    /// Read a little-endian `u64` at `base + offset`.
    ///
    /// # Errors
    /// Fails on address overflow or if the field is not readable.
    #[inline]
    fn read_u64_at(&self, base: MemoryAddress, offset: usize) -> Result<u64, MemoryError> {
        self.read_u64(field_address(base, offset)?)
    }
}

impl<M: MemoryReader + ?Sized> MemoryReader for &M {
    #[inline]
    fn read_bytes(&self, address: MemoryAddress, buf: &mut [u8]) -> Result<(), MemoryError> {
        (**self).read_bytes(address, buf)
    }
}

#[inline]
fn field_address(base: MemoryAddress, offset: usize) -> Result<MemoryAddress, MemoryError> {
    base.checked_add(offset as u64).ok_or(MemoryError::Overflow(base))
}

/// A window of memory backed by a byte slice and anchored at `base`.
///
/// Reads outside `base..base + bytes.len()` fail instead of touching anything else.
#[derive(Debug, Copy, Clone)]
pub struct SliceMemory<'a> {
    base: MemoryAddress,
    bytes: &'a [u8],
}

impl<'a> SliceMemory<'a> {
    #[must_use]
    pub const fn new(base: MemoryAddress, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }

    #[must_use]
    pub const fn base(&self) -> MemoryAddress {
        self.base
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl MemoryReader for SliceMemory<'_> {
    fn read_bytes(&self, address: MemoryAddress, buf: &mut [u8]) -> Result<(), MemoryError> {
        if address.is_null() {
            return Err(MemoryError::Null);
        }

        let unmapped = MemoryError::Unmapped {
            address,
            len: buf.len(),
        };

        let start = address.offset_from(self.base).ok_or(unmapped)?;
        let start = usize::try_from(start).map_err(|_| unmapped)?;
        let end = start.checked_add(buf.len()).ok_or(unmapped)?;
        let src = self.bytes.get(start..end).ok_or(unmapped)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// Reads straight from the current address space.
///
/// This is what the firmware and the OS-mode handler actually have: a flat
/// address space in which the only check that can be made up front is for null.
#[derive(Debug)]
pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    /// # Safety
    /// Every address later passed to [`MemoryReader::read_bytes`] must be mapped and
    /// readable for the requested length in the current address space.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MemoryReader for RawMemory {
    fn read_bytes(&self, address: MemoryAddress, buf: &mut [u8]) -> Result<(), MemoryError> {
        if address.is_null() {
            return Err(MemoryError::Null);
        }

        address
            .checked_add(buf.len() as u64)
            .ok_or(MemoryError::Overflow(address))?;

        let Ok(addr) = usize::try_from(address.as_u64()) else {
            return Err(MemoryError::Overflow(address));
        };

        // SAFETY: the constructor contract guarantees the range is readable; the
        // source may be unaligned and is never held as a reference.
        unsafe {
            core::ptr::copy_nonoverlapping(
                core::ptr::with_exposed_provenance::<u8>(addr),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: MemoryAddress = MemoryAddress::new(0x8000_0000);

    #[test]
    fn slice_reads_little_endian_fields() {
        let bytes = [0x41, 0x4C, 0x4F, 0x47, 1, 0, 0, 0, 0xEF, 0xBE, 0xAD, 0xDE, 0, 0, 0, 0];
        let mem = SliceMemory::new(BASE, &bytes);
        assert_eq!(mem.read_u32(BASE), Ok(0x474F_4C41));
        assert_eq!(mem.read_u16(MemoryAddress::new(0x8000_0004)), Ok(1));
        assert_eq!(mem.read_u64_at(BASE, 8), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn slice_rejects_reads_outside_the_window() {
        let bytes = [0u8; 16];
        let mem = SliceMemory::new(BASE, &bytes);

        // below the window
        assert!(matches!(
            mem.read_u32(MemoryAddress::new(0x7FFF_FFFF)),
            Err(MemoryError::Unmapped { .. })
        ));
        // straddling the end
        assert!(matches!(
            mem.read_u64_at(BASE, 12),
            Err(MemoryError::Unmapped { len: 8, .. })
        ));
        // last full field still fits
        assert_eq!(mem.read_u64_at(BASE, 8), Ok(0));
    }

    #[test]
    fn null_is_never_readable() {
        let bytes = [0u8; 8];
        let mem = SliceMemory::new(MemoryAddress::NULL, &bytes);
        assert_eq!(mem.read_u32(MemoryAddress::NULL), Err(MemoryError::Null));

        let raw = unsafe { RawMemory::new() };
        assert_eq!(raw.read_u64(MemoryAddress::NULL), Err(MemoryError::Null));
    }

    #[test]
    fn field_offsets_that_overflow_are_reported() {
        let bytes = [0u8; 8];
        let mem = SliceMemory::new(BASE, &bytes);
        let top = MemoryAddress::new(u64::MAX - 2);
        assert_eq!(mem.read_u32_at(top, 8), Err(MemoryError::Overflow(top)));
    }

    #[test]
    fn raw_memory_reads_host_memory() {
        let value: u64 = 0x0123_4567_89AB_CDEF;
        let raw = unsafe { RawMemory::new() };
        let addr = MemoryAddress::from_ptr(&raw const value);
        assert_eq!(raw.read_u64(addr), Ok(value));
        assert_eq!(raw.read_u32_at(addr, 4), Ok(0x0123_4567));
    }
}
