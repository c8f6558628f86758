//! Handler discovery table of the PRM module image.

use crate::handler::adv_logger_os_connector_prm_handler;
use crate::{OS_CONNECTOR_HANDLER_GUID, OS_CONNECTOR_HANDLER_NAME, PRM_MODULE_GUID};
use advlog_abi::{Guid, PrmContextBuffer, PrmHandlerExportDescriptor, PrmModuleExport};
use core::ffi::c_void;
use uefi::Status;

/// Signature shared by every PRM handler.
pub type PrmHandler =
    unsafe extern "efiapi" fn(parameter_buffer: *mut c_void, context: *const PrmContextBuffer) -> Status;

/// The export table the PRM loader scans the module image for.
#[unsafe(export_name = "PrmModuleExportDescriptor")]
pub static PRM_MODULE_EXPORT: PrmModuleExport<1> = PrmModuleExport::new(
    PRM_MODULE_GUID,
    [PrmHandlerExportDescriptor::new(
        OS_CONNECTOR_HANDLER_GUID,
        OS_CONNECTOR_HANDLER_NAME,
    )],
);

const HANDLERS: [(Guid, PrmHandler); 1] = [(
    OS_CONNECTOR_HANDLER_GUID,
    adv_logger_os_connector_prm_handler,
)];

/// Resolves an exported handler by GUID, as the loader does through the
/// image's export directory.
#[must_use]
pub fn resolve_handler(guid: &Guid) -> Option<(&'static str, PrmHandler)> {
    let name = PRM_MODULE_EXPORT.find(guid)?.name()?;
    HANDLERS
        .iter()
        .find(|(g, _)| g == guid)
        .map(|&(_, handler)| (name, handler))
}
