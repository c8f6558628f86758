//! The PRM handler the OS invokes to check the exported log.
//!
//! Each request walks the same chain and stops at the first failed check:
//!
//! ```text
//! context present ─▶ 'PRMC' ─▶ static data present ─▶ 'PRMD', length ≥ 16
//!        │              │              │                       │
//!  INVALID_PARAMETER  NOT_FOUND  INVALID_PARAMETER         NOT_FOUND
//!
//!  ─▶ logger information block valid ─▶ SUCCESS
//!                  │
//!           COMPROMISED_DATA
//! ```
//!
//! The handler never writes, never logs and keeps no state, so it may be invoked
//! any number of times from any OS context.

use crate::export::EXPORT_DATA_LENGTH;
use crate::validator::validate_logger_info;
use advlog_abi::memory::{MemoryError, MemoryReader, RawMemory};
use advlog_abi::{
    MemoryAddress, PRM_CONTEXT_BUFFER_SIGNATURE, PRM_DATA_BUFFER_DATA_OFFSET,
    PRM_DATA_BUFFER_HEADER_SIGNATURE, PrmContextBuffer, PrmDataBufferHeader,
};
use core::ffi::c_void;
use uefi::Status;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("no context buffer was supplied")]
    MissingContext,
    #[error("the context buffer signature does not match")]
    ContextSignature,
    #[error("the context carries no static data buffer")]
    MissingStaticData,
    #[error("the static data buffer signature does not match")]
    StaticDataSignature,
    #[error("the static data buffer is too short ({0} bytes)")]
    StaticDataTooShort(u32),
    #[error("a request buffer could not be read")]
    Unreadable(#[from] MemoryError),
    #[error("the logger information block failed validation")]
    LoggerInfoCompromised,
}

impl From<RequestError> for Status {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::MissingContext
            | RequestError::MissingStaticData
            | RequestError::Unreadable(_) => Self::INVALID_PARAMETER,
            RequestError::ContextSignature
            | RequestError::StaticDataSignature
            | RequestError::StaticDataTooShort(_) => Self::NOT_FOUND,
            RequestError::LoggerInfoCompromised => Self::COMPROMISED_DATA,
        }
    }
}

/// Runs the request checks against the context buffer at `context`.
///
/// On success returns the address of the validated logger information block.
///
/// # Errors
/// Returns the first check that failed.
pub fn check_request<M: MemoryReader + ?Sized>(
    memory: &M,
    context: MemoryAddress,
) -> Result<MemoryAddress, RequestError> {
    if context.is_null() {
        return Err(RequestError::MissingContext);
    }
    if memory.read_u32_at(context, PrmContextBuffer::OFFSET_SIGNATURE)?
        != PRM_CONTEXT_BUFFER_SIGNATURE
    {
        return Err(RequestError::ContextSignature);
    }

    let data = MemoryAddress::new(
        memory.read_u64_at(context, PrmContextBuffer::OFFSET_STATIC_DATA_BUFFER)?,
    );
    if data.is_null() {
        return Err(RequestError::MissingStaticData);
    }
    if memory.read_u32_at(data, PrmDataBufferHeader::OFFSET_SIGNATURE)?
        != PRM_DATA_BUFFER_HEADER_SIGNATURE
    {
        return Err(RequestError::StaticDataSignature);
    }
    let length = memory.read_u32_at(data, PrmDataBufferHeader::OFFSET_LENGTH)?;
    if length < EXPORT_DATA_LENGTH {
        return Err(RequestError::StaticDataTooShort(length));
    }

    let info = MemoryAddress::new(memory.read_u64_at(data, PRM_DATA_BUFFER_DATA_OFFSET)?);
    if validate_logger_info(memory, info) {
        Ok(info)
    } else {
        Err(RequestError::LoggerInfoCompromised)
    }
}

/// Handles one OS request. The parameter buffer is accepted and ignored.
pub fn handle_request<M: MemoryReader + ?Sized>(
    memory: &M,
    _parameters: MemoryAddress,
    context: MemoryAddress,
) -> Status {
    match check_request(memory, context) {
        Ok(_) => Status::SUCCESS,
        Err(e) => e.into(),
    }
}

/// `AdvLoggerOsConnectorPrmHandler`
///
/// # Safety
/// `context_buffer` must be null or point to a context buffer whose static data
/// buffer and referenced logger information block are mapped in the caller's
/// address space.
#[unsafe(export_name = "AdvLoggerOsConnectorPrmHandler")]
pub unsafe extern "efiapi" fn adv_logger_os_connector_prm_handler(
    parameter_buffer: *mut c_void,
    context_buffer: *const PrmContextBuffer,
) -> Status {
    // SAFETY: forwarded from the caller contract.
    let memory = unsafe { RawMemory::new() };
    handle_request(
        &memory,
        MemoryAddress::from_ptr(parameter_buffer),
        MemoryAddress::from_ptr(context_buffer),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OS_CONNECTOR_HANDLER_GUID;
    use advlog_abi::LoggerInfo;
    use advlog_abi::memory::SliceMemory;

    const BASE: u64 = 0x7F00_0000;
    const CONTEXT: MemoryAddress = MemoryAddress::new(BASE);
    const DATA: MemoryAddress = MemoryAddress::new(BASE + 0x40);
    const INFO: MemoryAddress = MemoryAddress::new(BASE + 0x100);

    /// Context, static data and logger information laid out in one window.
    struct Arena {
        bytes: Vec<u8>,
    }

    impl Arena {
        fn new() -> Self {
            let mut arena = Self {
                bytes: vec![0; 0x200],
            };
            arena.put(
                CONTEXT,
                &PrmContextBuffer::new(OS_CONNECTOR_HANDLER_GUID, DATA).to_le_bytes(),
            );
            arena.put(DATA, &PrmDataBufferHeader::new(EXPORT_DATA_LENGTH).to_le_bytes());
            arena.put(
                MemoryAddress::new(DATA.as_u64() + 8),
                &INFO.as_u64().to_le_bytes(),
            );
            arena.put(
                INFO,
                &LoggerInfo::adjacent_to(INFO, 0x80, 0x30).unwrap().to_le_bytes(),
            );
            arena
        }

        fn put(&mut self, at: MemoryAddress, bytes: &[u8]) {
            let offset = usize::try_from(at.as_u64() - BASE).unwrap();
            self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        }

        fn handle(&self, context: MemoryAddress) -> Status {
            let memory = SliceMemory::new(CONTEXT, &self.bytes);
            handle_request(&memory, MemoryAddress::NULL, context)
        }
    }

    #[test]
    fn provisioned_request_succeeds() {
        let arena = Arena::new();
        assert_eq!(arena.handle(CONTEXT), Status::SUCCESS);

        let memory = SliceMemory::new(CONTEXT, &arena.bytes);
        assert_eq!(check_request(&memory, CONTEXT), Ok(INFO));
    }

    #[test]
    fn missing_context_is_invalid_parameter() {
        assert_eq!(Arena::new().handle(MemoryAddress::NULL), Status::INVALID_PARAMETER);
    }

    #[test]
    fn wrong_context_signature_is_not_found() {
        let mut arena = Arena::new();
        arena.put(CONTEXT, b"PRMX");
        assert_eq!(arena.handle(CONTEXT), Status::NOT_FOUND);
    }

    #[test]
    fn missing_static_data_is_invalid_parameter() {
        let mut arena = Arena::new();
        arena.put(
            CONTEXT,
            &PrmContextBuffer::new(OS_CONNECTOR_HANDLER_GUID, MemoryAddress::NULL).to_le_bytes(),
        );
        assert_eq!(arena.handle(CONTEXT), Status::INVALID_PARAMETER);
    }

    #[test]
    fn wrong_static_data_signature_is_not_found() {
        for signature in [*b"PRMd", *b"ALOG", [0; 4]] {
            let mut arena = Arena::new();
            arena.put(DATA, &signature);
            assert_eq!(arena.handle(CONTEXT), Status::NOT_FOUND);
        }
    }

    #[test]
    fn short_static_data_is_not_found() {
        let mut arena = Arena::new();
        arena.put(DATA, &PrmDataBufferHeader::new(8).to_le_bytes());
        assert_eq!(arena.handle(CONTEXT), Status::NOT_FOUND);

        let memory = SliceMemory::new(CONTEXT, &arena.bytes);
        assert_eq!(
            check_request(&memory, CONTEXT),
            Err(RequestError::StaticDataTooShort(8))
        );
    }

    #[test]
    fn unreadable_buffers_are_invalid_parameter() {
        let arena = Arena::new();
        assert_eq!(
            arena.handle(MemoryAddress::new(0x1000)),
            Status::INVALID_PARAMETER
        );

        let mut arena = Arena::new();
        arena.put(
            CONTEXT,
            &PrmContextBuffer::new(OS_CONNECTOR_HANDLER_GUID, MemoryAddress::new(0x1000))
                .to_le_bytes(),
        );
        assert_eq!(arena.handle(CONTEXT), Status::INVALID_PARAMETER);
    }

    #[test]
    fn tampered_logger_info_is_compromised() {
        let mut arena = Arena::new();
        arena.put(
            MemoryAddress::new(INFO.as_u64() + LoggerInfo::OFFSET_LOG_BUFFER_SIZE as u64),
            &0u32.to_le_bytes(),
        );
        assert_eq!(arena.handle(CONTEXT), Status::COMPROMISED_DATA);

        let mut arena = Arena::new();
        arena.put(MemoryAddress::new(DATA.as_u64() + 8), &0u64.to_le_bytes());
        assert_eq!(arena.handle(CONTEXT), Status::COMPROMISED_DATA);
    }

    #[test]
    fn requests_are_repeatable() {
        let arena = Arena::new();
        for _ in 0..4 {
            assert_eq!(arena.handle(CONTEXT), Status::SUCCESS);
        }
    }

    #[test]
    fn abi_entry_rejects_a_null_context() {
        let status = unsafe {
            adv_logger_os_connector_prm_handler(core::ptr::null_mut(), core::ptr::null())
        };
        assert_eq!(status, Status::INVALID_PARAMETER);
    }
}
