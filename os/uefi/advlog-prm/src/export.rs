//! The static data buffer handed to the PRM handler.

use crate::services::AddressTranslator;
use advlog_abi::{
    MemoryAddress, PRM_DATA_BUFFER_DATA_OFFSET, PhysicalAddress, PrmDataBufferHeader,
    VirtualAddress,
};
use core::mem::offset_of;
use core::sync::atomic::{AtomicU64, Ordering};
use firmware_sync::{LatchState, OnceLatch};
use uefi::Status;

/// Declared length of an [`ExportRecord`]: the header followed by one 64-bit
/// reference to the information block.
#[allow(clippy::cast_possible_truncation)]
pub const EXPORT_DATA_LENGTH: u32 = (PrmDataBufferHeader::SIZE + size_of::<u64>()) as u32;

/// PRM static data buffer carrying a reference to the logger information block.
///
/// ```text
/// offset 0  signature  'PRMD'
///        4  length     16
///        8  logger_info (u64, physical until relocated)
///       16  relocation latch (not part of the declared length)
/// ```
///
/// The handler reads the first [`EXPORT_DATA_LENGTH`] bytes through a memory
/// view; only [`relocate`](Self::relocate) ever writes after construction.
#[repr(C)]
pub struct ExportRecord {
    header: PrmDataBufferHeader,
    logger_info: AtomicU64,
    relocation: OnceLatch,
}

const _: () = {
    assert!(offset_of!(ExportRecord, logger_info) == PRM_DATA_BUFFER_DATA_OFFSET);
    assert!(EXPORT_DATA_LENGTH == 16);
};

/// Outcome of an [`ExportRecord::relocate`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Relocation {
    /// The reference was rewritten to its runtime mapping.
    Converted {
        from: PhysicalAddress,
        to: VirtualAddress,
    },
    /// The record holds no reference; nothing was converted.
    NothingToConvert,
    /// An earlier call already ran (or is running) the relocation.
    AlreadyRelocated,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RelocationError {
    #[error("failed to convert {address} to its runtime mapping: {status:?}")]
    Convert {
        address: PhysicalAddress,
        status: Status,
    },
}

impl From<RelocationError> for Status {
    fn from(value: RelocationError) -> Self {
        match value {
            RelocationError::Convert { status, .. } => status,
        }
    }
}

impl ExportRecord {
    #[must_use]
    pub const fn new(logger_info: PhysicalAddress) -> Self {
        Self {
            header: PrmDataBufferHeader::new(EXPORT_DATA_LENGTH),
            logger_info: AtomicU64::new(logger_info.as_u64()),
            relocation: OnceLatch::new(),
        }
    }

    #[must_use]
    pub const fn header(&self) -> PrmDataBufferHeader {
        self.header
    }

    /// The current reference to the information block.
    #[must_use]
    pub fn logger_info(&self) -> MemoryAddress {
        MemoryAddress::new(self.logger_info.load(Ordering::Acquire))
    }

    /// Address of this record, as placed into the context buffer.
    #[must_use]
    pub fn address(&self) -> MemoryAddress {
        MemoryAddress::from_ptr(self)
    }

    #[must_use]
    pub fn relocation_state(&self) -> LatchState {
        self.relocation.state()
    }

    /// Rewrites the reference to its runtime mapping, at most once per record.
    ///
    /// A record without a reference is left untouched. If the translation fails
    /// the reference is cleared, so that the handler reports the log as
    /// compromised instead of following a stale physical pointer.
    ///
    /// # Errors
    /// Returns [`RelocationError::Convert`] if the translator rejects the address.
    pub fn relocate<T: AddressTranslator + ?Sized>(
        &self,
        translator: &T,
    ) -> Result<Relocation, RelocationError> {
        let outcome = self.relocation.run_once(|| {
            let from = PhysicalAddress::from(self.logger_info());
            if from.address().is_null() {
                return Ok(Relocation::NothingToConvert);
            }

            match translator.convert(from) {
                Ok(to) => {
                    self.logger_info.store(to.as_u64(), Ordering::Release);
                    Ok(Relocation::Converted { from, to })
                }
                Err(status) => {
                    self.logger_info.store(0, Ordering::Release);
                    Err(RelocationError::Convert {
                        address: from,
                        status,
                    })
                }
            }
        });

        outcome.unwrap_or(Ok(Relocation::AlreadyRelocated))
    }
}

impl core::fmt::Debug for ExportRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExportRecord")
            .field("header", &self.header)
            .field("logger_info", &self.logger_info())
            .field("relocation", &self.relocation_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advlog_abi::PRM_DATA_BUFFER_HEADER_SIGNATURE;
    use advlog_abi::memory::{MemoryReader, RawMemory};
    use core::cell::Cell;

    struct Offset {
        delta: u64,
        calls: Cell<usize>,
    }

    impl AddressTranslator for Offset {
        fn convert(&self, address: PhysicalAddress) -> Result<VirtualAddress, Status> {
            self.calls.set(self.calls.get() + 1);
            Ok(VirtualAddress::new(address.as_u64() + self.delta))
        }
    }

    struct Unmapped;

    impl AddressTranslator for Unmapped {
        fn convert(&self, _: PhysicalAddress) -> Result<VirtualAddress, Status> {
            Err(Status::NOT_FOUND)
        }
    }

    const SHIFT: u64 = 0xFFFF_8000_0000_0000;

    #[test]
    fn record_layout_matches_the_data_buffer_abi() {
        let record = ExportRecord::new(PhysicalAddress::new(0x7E00_0000));
        let memory = unsafe { RawMemory::new() };
        let at = record.address();

        assert_eq!(memory.read_u32(at), Ok(PRM_DATA_BUFFER_HEADER_SIGNATURE));
        assert_eq!(memory.read_u32_at(at, 4), Ok(16));
        assert_eq!(
            memory.read_u64_at(at, PRM_DATA_BUFFER_DATA_OFFSET),
            Ok(0x7E00_0000)
        );
        assert_eq!(record.header().length, EXPORT_DATA_LENGTH);
    }

    #[test]
    fn relocation_converts_exactly_once() {
        let record = ExportRecord::new(PhysicalAddress::new(0x7E00_0000));
        let translator = Offset {
            delta: SHIFT,
            calls: Cell::new(0),
        };
        assert_eq!(record.relocation_state(), LatchState::Pending);

        assert_eq!(
            record.relocate(&translator),
            Ok(Relocation::Converted {
                from: PhysicalAddress::new(0x7E00_0000),
                to: VirtualAddress::new(SHIFT + 0x7E00_0000),
            })
        );
        assert_eq!(record.relocate(&translator), Ok(Relocation::AlreadyRelocated));

        assert_eq!(translator.calls.get(), 1);
        assert_eq!(record.logger_info().as_u64(), SHIFT + 0x7E00_0000);
        assert_eq!(record.relocation_state(), LatchState::Done);
    }

    #[test]
    fn relocating_an_empty_record_is_a_no_op() {
        let record = ExportRecord::new(PhysicalAddress::new(0));
        let translator = Offset {
            delta: SHIFT,
            calls: Cell::new(0),
        };

        assert_eq!(record.relocate(&translator), Ok(Relocation::NothingToConvert));
        assert_eq!(translator.calls.get(), 0);
        assert!(record.logger_info().is_null());
        assert_eq!(record.relocation_state(), LatchState::Done);
    }

    #[test]
    fn failed_translation_clears_the_reference() {
        let record = ExportRecord::new(PhysicalAddress::new(0x7E00_0000));
        let err = record.relocate(&Unmapped).unwrap_err();

        assert_eq!(
            err,
            RelocationError::Convert {
                address: PhysicalAddress::new(0x7E00_0000),
                status: Status::NOT_FOUND,
            }
        );
        assert_eq!(Status::from(err), Status::NOT_FOUND);
        assert!(record.logger_info().is_null());

        // The latch is spent even though the conversion failed.
        let translator = Offset {
            delta: SHIFT,
            calls: Cell::new(0),
        };
        assert_eq!(record.relocate(&translator), Ok(Relocation::AlreadyRelocated));
        assert!(record.logger_info().is_null());
    }
}
