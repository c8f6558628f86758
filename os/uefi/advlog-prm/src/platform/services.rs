use crate::export::ExportRecord;
use crate::publisher::relocate_export;
use crate::services::{
    AddressChangeNotifier, AddressTranslator, LoggerInfoLocator, PrmConfigRegistry,
    read_logger_info_from_protocol,
};
use advlog_abi::memory::RawMemory;
use advlog_abi::{
    Guid, MemoryAddress, PRM_CONFIG_PROTOCOL_GUID, PhysicalAddress, PrmConfigProtocol,
    VIRTUAL_ADDRESS_CHANGE_EVENT_GROUP, VirtualAddress,
};
use core::ffi::c_void;
use core::ptr::{self, NonNull};
use log::warn;
use uefi::boot::{self, EventType, OpenProtocolAttributes, OpenProtocolParams, Tpl};
use uefi::proto::unsafe_protocol;
use uefi::{Event, Status};

/// Public part of the Advanced Logger protocol.
#[repr(transparent)]
#[unsafe_protocol("434f695c-ef26-4a12-9eba-ddef0097497c")]
pub struct AdvancedLoggerProtocol(pub advlog_abi::AdvancedLoggerProtocol);

/// Finds the information block through the installed Advanced Logger protocol.
pub struct AdvancedLoggerLocator;

impl LoggerInfoLocator for AdvancedLoggerLocator {
    fn locate_logger_info(&self) -> Result<PhysicalAddress, Status> {
        let handle = boot::get_handle_for_protocol::<AdvancedLoggerProtocol>().map_err(|e| {
            warn!("Advanced Logger protocol not found: {e:?}");
            e.status()
        })?;

        // SAFETY: `GetProtocol` does not claim the interface; the logger keeps it
        // installed for the whole boot.
        let protocol = unsafe {
            boot::open_protocol::<AdvancedLoggerProtocol>(
                OpenProtocolParams {
                    handle,
                    agent: boot::image_handle(),
                    controller: None,
                },
                OpenProtocolAttributes::GetProtocol,
            )
        }
        .map_err(|e| e.status())?;

        let interface = MemoryAddress::from_ptr(ptr::from_ref::<AdvancedLoggerProtocol>(&*protocol));
        // SAFETY: a protocol carrying the 'LOGP' signature is the first field of the
        // logger's container, which stays mapped for the whole boot.
        let memory = unsafe { RawMemory::new() };
        read_logger_info_from_protocol(&memory, interface)
    }
}

/// Installs the PRM configuration protocol on a new handle.
pub struct BootServicesConfigRegistry;

impl PrmConfigRegistry for BootServicesConfigRegistry {
    fn install(&mut self, config: &PrmConfigProtocol) -> Result<(), Status> {
        // SAFETY: the publisher keeps `config` alive forever once this succeeds.
        unsafe {
            boot::install_protocol_interface(
                None,
                &PRM_CONFIG_PROTOCOL_GUID,
                ptr::from_ref(config).cast::<c_void>(),
            )
        }
        .map(|_handle| ())
        .map_err(|e| e.status())
    }
}

static ADDRESS_CHANGE_GROUP: Guid = VIRTUAL_ADDRESS_CHANGE_EVENT_GROUP;

unsafe extern "efiapi" fn on_virtual_address_change(_event: Event, context: Option<NonNull<c_void>>) {
    let Some(context) = context else {
        return;
    };
    // SAFETY: registered with a committed `&'static ExportRecord`.
    let record = unsafe { context.cast::<ExportRecord>().as_ref() };
    relocate_export(record, &RuntimeConvertPointer);
}

/// Relocates the export record from the virtual address change event group.
pub struct VirtualAddressChangeNotifier;

impl AddressChangeNotifier for VirtualAddressChangeNotifier {
    fn notify_on_virtual_address_change(
        &mut self,
        record: &'static ExportRecord,
    ) -> Result<(), Status> {
        let context = NonNull::from(record).cast::<c_void>();

        // SAFETY: the callback only reads `record`, which is never freed.
        unsafe {
            boot::create_event_ex(
                EventType::NOTIFY_SIGNAL,
                Tpl::NOTIFY,
                Some(on_virtual_address_change),
                Some(context),
                Some(NonNull::from(&ADDRESS_CHANGE_GROUP)),
            )
        }
        .map(|_event| ())
        .map_err(|e| e.status())
    }
}

/// `EFI_RUNTIME_SERVICES.ConvertPointer`.
pub struct RuntimeConvertPointer;

impl AddressTranslator for RuntimeConvertPointer {
    fn convert(&self, address: PhysicalAddress) -> Result<VirtualAddress, Status> {
        let system_table = uefi::table::system_table_raw().ok_or(Status::NOT_READY)?;
        let address = usize::try_from(address.as_u64()).map_err(|_| Status::INVALID_PARAMETER)?;
        let mut pointer = ptr::with_exposed_provenance::<c_void>(address);

        // SAFETY: the system table and its runtime services stay valid while the
        // virtual address change notification runs.
        let status = unsafe {
            let runtime_services = system_table.as_ref().runtime_services;
            ((*runtime_services).convert_pointer)(0, &raw mut pointer)
        };

        if status.is_success() {
            Ok(VirtualAddress::from_ptr(pointer))
        } else {
            Err(status)
        }
    }
}
