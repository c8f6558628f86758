//! Linker settings for the driver image.
//!
//! The connector's callback and handler run after `ExitBootServices`, so the
//! driver must be loaded as a runtime driver. UEFI unloads boot service driver
//! images once the entry point returns.

/// PE subsystem of the driver binary (`EFI_RUNTIME_DRIVER`, subsystem 12).
pub const DRIVER_SUBSYSTEM_LINK_ARG: &str = "/subsystem:efi_runtime_driver";

/// Linker argument for the driver binary when building for `target_os`.
#[must_use]
pub fn driver_link_arg(target_os: &str) -> Option<&'static str> {
    (target_os == "uefi").then_some(DRIVER_SUBSYSTEM_LINK_ARG)
}
