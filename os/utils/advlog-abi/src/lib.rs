//! # Advanced Logger PRM ABI
//!
//! Fixed layouts shared between the firmware that publishes the Advanced Logger
//! memory log and the Platform Runtime Mechanism (PRM) handler the OS invokes to
//! check it:
//!
//! * [`LoggerInfo`], the log buffer descriptor produced by the boot-time logger.
//! * [`PrmDataBufferHeader`], the header of the static data buffer (export record).
//! * [`PrmContextBuffer`], [`PrmModuleContextBuffers`] and [`PrmConfigProtocol`],
//!   the records the PRM dispatcher uses to route a handler to its static data.
//! * [`PrmModuleExport`], the handler discovery table of a PRM module image.
//!
//! All structures are `#[repr(C)]` with pointers carried as `u64`; nothing in this
//! crate dereferences them. Reading memory is done through [`memory::MemoryReader`]
//! at explicit offsets.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod address;
pub mod memory;

pub use address::{MemoryAddress, PhysicalAddress, VirtualAddress};
pub use uefi::Guid;

use core::mem::offset_of;
use uefi::guid;

/// Build a 32-bit signature from four ASCII bytes, first byte lowest.
#[must_use]
pub const fn signature_32(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

/// Build a 64-bit signature from eight ASCII bytes, first byte lowest.
#[must_use]
pub const fn signature_64(tag: &[u8; 8]) -> u64 {
    u64::from_le_bytes(*tag)
}

/// `'ALOG'`
pub const ADVANCED_LOGGER_SIGNATURE: u32 = signature_32(b"ALOG");

/// `'PRMD'`
pub const PRM_DATA_BUFFER_HEADER_SIGNATURE: u32 = signature_32(b"PRMD");

/// `'PRMC'`
pub const PRM_CONTEXT_BUFFER_SIGNATURE: u32 = signature_32(b"PRMC");

pub const PRM_CONTEXT_BUFFER_INTERFACE_VERSION: u16 = 1;

/// `'PRM_MEDT'`
pub const PRM_MODULE_EXPORT_DESCRIPTOR_SIGNATURE: u64 = signature_64(b"PRM_MEDT");

pub const PRM_MODULE_EXPORT_REVISION: u16 = 0;

/// Handler names are NUL-terminated ASCII within a fixed field.
pub const PRM_HANDLER_NAME_MAXIMUM_LENGTH: usize = 128;

/// Protocol the boot-time logger installs; the logger info address follows it.
pub const ADVANCED_LOGGER_PROTOCOL_GUID: Guid = guid!("434f695c-ef26-4a12-9eba-ddef0097497c");

/// Protocol a PRM configuration library installs to hand its context buffers to the
/// PRM loader.
pub const PRM_CONFIG_PROTOCOL_GUID: Guid = guid!("4e5b4fea-936a-45bc-ac6a-2f8f14a6c29e");

/// `EFI_EVENT_GROUP_VIRTUAL_ADDRESS_CHANGE`
pub const VIRTUAL_ADDRESS_CHANGE_EVENT_GROUP: Guid =
    guid!("13fa7698-c831-49c7-87ea-8f43fcc25196");

/// Advanced Logger information block (`ADVANCED_LOGGER_INFO`), in the producer's
/// naturally aligned layout.
///
/// ```text
/// offset  0  signature 'ALOG'      16  log_buffer        32  discarded_size
///         4  version               24  log_current       36  log_buffer_size
///         6  reserved[3]           40  state flags[8]    48  timer_frequency
///        56  ticks_at_time         64  time (EFI_TIME)   80  hw_print_level
///        84  reserved3             88  end
/// ```
///
/// The log bytes are stored immediately after this header, so for a well-formed
/// block `log_buffer == address_of(block) + size_of::<LoggerInfo>()`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LoggerInfo {
    /// [`ADVANCED_LOGGER_SIGNATURE`].
    pub signature: u32,
    pub version: u16,
    pub reserved: [u16; 3],
    /// Address of the first byte of log storage.
    pub log_buffer: u64,
    /// Address of the next free byte of log storage.
    pub log_current: u64,
    /// Bytes of messages that did not fit.
    pub discarded_size: u32,
    /// Capacity of the log storage in bytes.
    pub log_buffer_size: u32,
    /// `InPermanentRAM`, `AtRuntime`, `GoneVirtual`, `HdwPortInitialized`,
    /// `HdwPortDisabled` and three reserved bytes.
    pub flags: [u8; 8],
    pub timer_frequency: u64,
    pub ticks_at_time: u64,
    /// `EFI_TIME` at which `ticks_at_time` was sampled.
    pub time: [u8; 16],
    pub hw_print_level: u32,
    pub reserved3: u32,
}

impl LoggerInfo {
    pub const SIZE: usize = size_of::<Self>();
    pub const OFFSET_SIGNATURE: usize = offset_of!(Self, signature);
    pub const OFFSET_LOG_BUFFER: usize = offset_of!(Self, log_buffer);
    pub const OFFSET_LOG_CURRENT: usize = offset_of!(Self, log_current);
    pub const OFFSET_LOG_BUFFER_SIZE: usize = offset_of!(Self, log_buffer_size);

    /// Version written by [`adjacent_to`](Self::adjacent_to); never checked.
    pub const VERSION: u16 = 5;

    /// Describes a log of `log_buffer_size` bytes stored right behind a header
    /// placed at `at`, with `used` bytes already written.
    ///
    /// Returns `None` if the addresses would overflow.
    #[must_use]
    pub const fn adjacent_to(at: MemoryAddress, log_buffer_size: u32, used: u32) -> Option<Self> {
        let Some(log_buffer) = at.checked_add(Self::SIZE as u64) else {
            return None;
        };
        let Some(log_current) = log_buffer.checked_add(used as u64) else {
            return None;
        };
        Some(Self {
            signature: ADVANCED_LOGGER_SIGNATURE,
            version: Self::VERSION,
            reserved: [0; 3],
            log_buffer: log_buffer.as_u64(),
            log_current: log_current.as_u64(),
            discarded_size: 0,
            log_buffer_size,
            flags: [0; 8],
            timer_frequency: 0,
            ticks_at_time: 0,
            time: [0; 16],
            hw_print_level: 0,
            reserved3: 0,
        })
    }

    /// Little-endian wire image of the header.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.signature.to_le_bytes());
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        for (i, r) in self.reserved.iter().enumerate() {
            let o = 6 + i * 2;
            out[o..o + 2].copy_from_slice(&r.to_le_bytes());
        }
        out[16..24].copy_from_slice(&self.log_buffer.to_le_bytes());
        out[24..32].copy_from_slice(&self.log_current.to_le_bytes());
        out[32..36].copy_from_slice(&self.discarded_size.to_le_bytes());
        out[36..40].copy_from_slice(&self.log_buffer_size.to_le_bytes());
        out[40..48].copy_from_slice(&self.flags);
        out[48..56].copy_from_slice(&self.timer_frequency.to_le_bytes());
        out[56..64].copy_from_slice(&self.ticks_at_time.to_le_bytes());
        out[64..80].copy_from_slice(&self.time);
        out[80..84].copy_from_slice(&self.hw_print_level.to_le_bytes());
        out[84..88].copy_from_slice(&self.reserved3.to_le_bytes());
        out
    }
}

const _: () = {
    assert!(LoggerInfo::SIZE == 88);
    assert!(LoggerInfo::OFFSET_LOG_BUFFER == 16);
    assert!(LoggerInfo::OFFSET_LOG_CURRENT == 24);
    assert!(LoggerInfo::OFFSET_LOG_BUFFER_SIZE == 36);
    assert!(offset_of!(LoggerInfo, time) == 64);
};

/// `'LOGP'`, widened into the protocol's 64-bit signature field.
pub const ADVANCED_LOGGER_PROTOCOL_SIGNATURE: u64 = signature_32(b"LOGP") as u64;

/// Public interface of the Advanced Logger protocol (`ADVANCED_LOGGER_PROTOCOL`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AdvancedLoggerProtocol {
    /// [`ADVANCED_LOGGER_PROTOCOL_SIGNATURE`].
    pub signature: u64,
    pub version: u32,
    /// `AdvancedLoggerWrite` entry point.
    pub write: usize,
}

/// The logger's private wrapper around its protocol
/// (`ADVANCED_LOGGER_PROTOCOL_CONTAINER`). Consumers holding the protocol
/// interface find the information block address right behind it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AdvancedLoggerProtocolContainer {
    pub protocol: AdvancedLoggerProtocol,
    /// Address of the [`LoggerInfo`] block.
    pub logger_info: u64,
}

impl AdvancedLoggerProtocolContainer {
    pub const OFFSET_SIGNATURE: usize =
        offset_of!(Self, protocol) + offset_of!(AdvancedLoggerProtocol, signature);
    pub const OFFSET_LOGGER_INFO: usize = offset_of!(Self, logger_info);
}

/// Header of a PRM static data buffer (`PRM_DATA_BUFFER_HEADER`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PrmDataBufferHeader {
    /// [`PRM_DATA_BUFFER_HEADER_SIGNATURE`].
    pub signature: u32,
    /// Total length of the data buffer, header included.
    pub length: u32,
}

impl PrmDataBufferHeader {
    pub const SIZE: usize = size_of::<Self>();
    pub const OFFSET_SIGNATURE: usize = offset_of!(Self, signature);
    pub const OFFSET_LENGTH: usize = offset_of!(Self, length);

    #[must_use]
    pub const fn new(length: u32) -> Self {
        Self {
            signature: PRM_DATA_BUFFER_HEADER_SIGNATURE,
            length,
        }
    }

    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.signature.to_le_bytes());
        out[4..8].copy_from_slice(&self.length.to_le_bytes());
        out
    }
}

/// Offset of the data bytes within a PRM static data buffer.
pub const PRM_DATA_BUFFER_DATA_OFFSET: usize = PrmDataBufferHeader::SIZE;

/// Per-handler context the dispatcher passes to a PRM handler (`PRM_CONTEXT_BUFFER`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PrmContextBuffer {
    /// [`PRM_CONTEXT_BUFFER_SIGNATURE`].
    pub signature: u32,
    pub version: u16,
    pub reserved: u16,
    pub handler_guid: Guid,
    /// Address of the handler's static data buffer, or 0.
    pub static_data_buffer: u64,
    /// Address of the module's runtime MMIO ranges, or 0.
    pub runtime_mmio_ranges: u64,
}

impl PrmContextBuffer {
    pub const SIZE: usize = size_of::<Self>();
    pub const OFFSET_SIGNATURE: usize = offset_of!(Self, signature);
    pub const OFFSET_STATIC_DATA_BUFFER: usize = offset_of!(Self, static_data_buffer);

    #[must_use]
    pub const fn new(handler_guid: Guid, static_data_buffer: MemoryAddress) -> Self {
        Self {
            signature: PRM_CONTEXT_BUFFER_SIGNATURE,
            version: PRM_CONTEXT_BUFFER_INTERFACE_VERSION,
            reserved: 0,
            handler_guid,
            static_data_buffer: static_data_buffer.as_u64(),
            runtime_mmio_ranges: 0,
        }
    }

    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.signature.to_le_bytes());
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..8].copy_from_slice(&self.reserved.to_le_bytes());
        out[8..24].copy_from_slice(&self.handler_guid.to_bytes());
        out[24..32].copy_from_slice(&self.static_data_buffer.to_le_bytes());
        out[32..40].copy_from_slice(&self.runtime_mmio_ranges.to_le_bytes());
        out
    }
}

const _: () = {
    assert!(PrmContextBuffer::SIZE == 40);
    assert!(PrmContextBuffer::OFFSET_STATIC_DATA_BUFFER == 24);
};

/// Context buffers of one PRM module (`PRM_MODULE_CONTEXT_BUFFERS`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PrmModuleContextBuffers {
    pub module_guid: Guid,
    pub buffer_count: u16,
    /// Address of the first of `buffer_count` [`PrmContextBuffer`]s.
    pub buffer: u64,
    pub runtime_mmio_ranges: u64,
}

/// Interface installed under [`PRM_CONFIG_PROTOCOL_GUID`] (`PRM_CONFIG_PROTOCOL`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PrmConfigProtocol {
    pub module_context_buffers: PrmModuleContextBuffers,
}

impl PrmConfigProtocol {
    /// Configuration for a module with exactly one context buffer.
    #[must_use]
    pub const fn single(module_guid: Guid, context: MemoryAddress) -> Self {
        Self {
            module_context_buffers: PrmModuleContextBuffers {
                module_guid,
                buffer_count: 1,
                buffer: context.as_u64(),
                runtime_mmio_ranges: 0,
            },
        }
    }

    /// Address of the context buffer this configuration routes to.
    #[must_use]
    pub const fn context_buffer(&self) -> MemoryAddress {
        MemoryAddress::new(self.module_context_buffers.buffer)
    }
}

/// One entry of a module's handler export table (`PRM_HANDLER_EXPORT_DESCRIPTOR_STRUCT`).
#[repr(C)]
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PrmHandlerExportDescriptor {
    pub guid: Guid,
    /// NUL-padded ASCII name of the exported handler symbol.
    pub name: [u8; PRM_HANDLER_NAME_MAXIMUM_LENGTH],
}

impl PrmHandlerExportDescriptor {
    /// Names longer than the field are truncated so that a NUL always remains.
    #[must_use]
    pub const fn new(guid: Guid, name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut out = [0u8; PRM_HANDLER_NAME_MAXIMUM_LENGTH];
        let mut i = 0;
        while i < bytes.len() && i < PRM_HANDLER_NAME_MAXIMUM_LENGTH - 1 {
            out[i] = bytes[i];
            i += 1;
        }
        Self { guid, name: out }
    }

    /// The handler name up to the first NUL, if it is valid ASCII.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        let name = &self.name[..end];
        if name.is_ascii() {
            core::str::from_utf8(name).ok()
        } else {
            None
        }
    }
}

impl core::fmt::Debug for PrmHandlerExportDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrmHandlerExportDescriptor")
            .field("guid", &self.guid)
            .field("name", &self.name())
            .finish()
    }
}

/// Header of a module's export table (`PRM_MODULE_EXPORT_DESCRIPTOR_STRUCT`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PrmModuleExportHeader {
    /// [`PRM_MODULE_EXPORT_DESCRIPTOR_SIGNATURE`].
    pub signature: u64,
    pub revision: u16,
    pub handler_count: u16,
    pub platform_guid: Guid,
    pub module_guid: Guid,
}

/// Export table of a PRM module with `N` handlers.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PrmModuleExport<const N: usize> {
    pub header: PrmModuleExportHeader,
    pub handlers: [PrmHandlerExportDescriptor; N],
}

impl<const N: usize> PrmModuleExport<N> {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(module_guid: Guid, handlers: [PrmHandlerExportDescriptor; N]) -> Self {
        assert!(N <= u16::MAX as usize, "too many PRM handlers");
        Self {
            header: PrmModuleExportHeader {
                signature: PRM_MODULE_EXPORT_DESCRIPTOR_SIGNATURE,
                revision: PRM_MODULE_EXPORT_REVISION,
                handler_count: N as u16,
                platform_guid: Guid::ZERO,
                module_guid,
            },
            handlers,
        }
    }

    /// Look up an exported handler by GUID.
    #[must_use]
    pub fn find(&self, guid: &Guid) -> Option<&PrmHandlerExportDescriptor> {
        self.handlers.iter().find(|h| h.guid == *guid)
    }
}
