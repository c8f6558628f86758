//! Firmware services the connector depends on.
//!
//! The [`Publisher`](crate::publisher::Publisher) only talks to the platform through
//! these traits, so the whole publish and relocation flow runs unchanged against
//! boot services ([`platform`](crate::platform) on UEFI targets) and in-memory
//! doubles.

use crate::export::ExportRecord;
use advlog_abi::memory::MemoryReader;
use advlog_abi::{
    ADVANCED_LOGGER_PROTOCOL_SIGNATURE, AdvancedLoggerProtocolContainer, MemoryAddress,
    PhysicalAddress, PrmConfigProtocol, VirtualAddress,
};
use log::warn;
use uefi::Status;

/// Finds the live Advanced Logger information block.
pub trait LoggerInfoLocator {
    /// # Errors
    /// Returns the firmware status if no logger is installed.
    fn locate_logger_info(&self) -> Result<PhysicalAddress, Status>;
}

/// Hands a module's context buffers to the PRM loader.
pub trait PrmConfigRegistry {
    /// Make `config` discoverable. On success, the registry may keep referring to
    /// `config` and everything it points at for the remaining lifetime of the system.
    ///
    /// # Errors
    /// Returns the firmware status if the configuration could not be installed.
    fn install(&mut self, config: &PrmConfigProtocol) -> Result<(), Status>;
}

/// Converts physical addresses to their runtime virtual mapping (`ConvertPointer`).
pub trait AddressTranslator {
    /// # Errors
    /// Returns the firmware status if `address` has no runtime mapping.
    fn convert(&self, address: PhysicalAddress) -> Result<VirtualAddress, Status>;
}

/// Arranges for an export record to be relocated when the virtual address map is set.
pub trait AddressChangeNotifier {
    /// # Errors
    /// Returns the firmware status if the notification could not be registered.
    fn notify_on_virtual_address_change(
        &mut self,
        record: &'static ExportRecord,
    ) -> Result<(), Status>;
}

impl<T: LoggerInfoLocator + ?Sized> LoggerInfoLocator for &T {
    fn locate_logger_info(&self) -> Result<PhysicalAddress, Status> {
        (**self).locate_logger_info()
    }
}

impl<T: PrmConfigRegistry + ?Sized> PrmConfigRegistry for &mut T {
    fn install(&mut self, config: &PrmConfigProtocol) -> Result<(), Status> {
        (**self).install(config)
    }
}

impl<T: AddressTranslator + ?Sized> AddressTranslator for &T {
    fn convert(&self, address: PhysicalAddress) -> Result<VirtualAddress, Status> {
        (**self).convert(address)
    }
}

impl<T: AddressChangeNotifier + ?Sized> AddressChangeNotifier for &mut T {
    fn notify_on_virtual_address_change(
        &mut self,
        record: &'static ExportRecord,
    ) -> Result<(), Status> {
        (**self).notify_on_virtual_address_change(record)
    }
}

/// Reads the information block address out of the Advanced Logger protocol
/// container whose public interface starts at `protocol`.
///
/// # Errors
/// `INVALID_PARAMETER` if `protocol` is null or unreadable, `INCOMPATIBLE_VERSION`
/// if the interface does not carry the `'LOGP'` signature.
pub fn read_logger_info_from_protocol<M: MemoryReader + ?Sized>(
    memory: &M,
    protocol: MemoryAddress,
) -> Result<PhysicalAddress, Status> {
    if protocol.is_null() {
        return Err(Status::INVALID_PARAMETER);
    }

    let signature = memory
        .read_u64_at(protocol, AdvancedLoggerProtocolContainer::OFFSET_SIGNATURE)
        .map_err(|_| Status::INVALID_PARAMETER)?;
    if signature != ADVANCED_LOGGER_PROTOCOL_SIGNATURE {
        warn!("Advanced Logger protocol signature mismatch: {signature:#018x}");
        return Err(Status::INCOMPATIBLE_VERSION);
    }

    memory
        .read_u64_at(protocol, AdvancedLoggerProtocolContainer::OFFSET_LOGGER_INFO)
        .map(PhysicalAddress::new)
        .map_err(|_| Status::INVALID_PARAMETER)
}
