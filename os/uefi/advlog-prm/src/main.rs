//! DXE driver that publishes the Advanced Logger memory log to the PRM loader.

#![no_std]
#![no_main]

#[cfg(not(target_os = "uefi"))]
compile_error!("the advlog-prm driver only builds for UEFI targets");

use advlog_abi::memory::RawMemory;
use advlog_prm::platform::{
    AdvancedLoggerLocator, BootServicesConfigRegistry, RuntimePoolAllocator,
    VirtualAddressChangeNotifier,
};
use advlog_prm::publisher::Publisher;
use firmware_debugcon::{FirmwareLogger, debugcon_trace};
use log::LevelFilter;
use uefi::prelude::*;

#[global_allocator]
static ALLOCATOR: RuntimePoolAllocator = RuntimePoolAllocator;

static LOGGER: FirmwareLogger = FirmwareLogger::new(LevelFilter::Debug);

#[entry]
fn efi_main() -> Status {
    if LOGGER.install().is_err() {
        debugcon_trace!("advlog-prm: a logger is already installed\n");
    }

    // SAFETY: the information block and everything the publisher allocates live in
    // memory mapped for the whole boot.
    let memory = unsafe { RawMemory::new() };

    Publisher::new(
        memory,
        AdvancedLoggerLocator,
        BootServicesConfigRegistry,
        VirtualAddressChangeNotifier,
    )
    .run()
}
