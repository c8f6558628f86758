//! Boot-time publication of the logger information block.
//!
//! [`Publisher::publish`] runs the whole sequence once:
//!
//! 1. locate the information block,
//! 2. validate it,
//! 3. allocate the [`ExportRecord`], its [`PrmContextBuffer`] and the
//!    [`PrmConfigProtocol`] that routes to them,
//! 4. install the configuration,
//! 5. arm the virtual address change relocation.
//!
//! Allocations stay staged until the configuration is installed and are released
//! on every earlier failure. After installation they are owned by the PRM loader
//! for the remaining lifetime of the system.

use crate::export::{ExportRecord, Relocation};
use crate::services::{
    AddressChangeNotifier, AddressTranslator, LoggerInfoLocator, PrmConfigRegistry,
};
use crate::validator::validate_logger_info;
use crate::{OS_CONNECTOR_HANDLER_GUID, PRM_MODULE_GUID};
use advlog_abi::memory::MemoryReader;
use advlog_abi::{MemoryAddress, PhysicalAddress, PrmConfigProtocol, PrmContextBuffer};
use alloc::alloc::{Layout, alloc_zeroed};
use alloc::boxed::Box;
use core::ptr::NonNull;
use log::{debug, error, info, warn};
use uefi::Status;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PublishError {
    #[error("the Advanced Logger is not available: {0:?}")]
    LoggerUnavailable(Status),
    #[error("the logger information block at {0} failed validation")]
    InvalidLoggerInfo(PhysicalAddress),
    #[error("out of memory allocating the {0}")]
    OutOfResources(&'static str),
    #[error("failed to install the PRM configuration: {0:?}")]
    RegistrationFailed(Status),
}

impl From<PublishError> for Status {
    fn from(value: PublishError) -> Self {
        match value {
            PublishError::LoggerUnavailable(status) | PublishError::RegistrationFailed(status) => {
                status
            }
            PublishError::InvalidLoggerInfo(_) => Self::COMPROMISED_DATA,
            PublishError::OutOfResources(_) => Self::OUT_OF_RESOURCES,
        }
    }
}

/// State left behind by a successful [`Publisher::publish`].
#[derive(Debug, Copy, Clone)]
pub struct Published {
    record: &'static ExportRecord,
    context: &'static PrmContextBuffer,
    config: &'static PrmConfigProtocol,
    relocation_armed: bool,
}

impl Published {
    #[must_use]
    pub const fn record(&self) -> &'static ExportRecord {
        self.record
    }

    #[must_use]
    pub const fn context(&self) -> &'static PrmContextBuffer {
        self.context
    }

    #[must_use]
    pub const fn config(&self) -> &'static PrmConfigProtocol {
        self.config
    }

    /// Whether the virtual address change notification was registered.
    #[must_use]
    pub const fn relocation_armed(&self) -> bool {
        self.relocation_armed
    }
}

pub struct Publisher<M, L, R, N> {
    memory: M,
    locator: L,
    registry: R,
    notifier: N,
}

impl<M, L, R, N> Publisher<M, L, R, N>
where
    M: MemoryReader,
    L: LoggerInfoLocator,
    R: PrmConfigRegistry,
    N: AddressChangeNotifier,
{
    #[must_use]
    pub const fn new(memory: M, locator: L, registry: R, notifier: N) -> Self {
        Self {
            memory,
            locator,
            registry,
            notifier,
        }
    }

    /// Publishes the logger information block to the PRM loader.
    ///
    /// # Errors
    /// Fails if the logger cannot be found, its information block is malformed,
    /// memory runs out, or the configuration cannot be installed. Nothing stays
    /// allocated or registered in any of these cases. A failed event registration
    /// is not an error; see [`Published::relocation_armed`].
    pub fn publish(mut self) -> Result<Published, PublishError> {
        let logger_info = self
            .locator
            .locate_logger_info()
            .map_err(PublishError::LoggerUnavailable)?;
        debug!("Advanced Logger information block at {logger_info:?}");

        if !validate_logger_info(&self.memory, logger_info.address()) {
            return Err(PublishError::InvalidLoggerInfo(logger_info));
        }

        let record = Staged::new(ExportRecord::new(logger_info), "export record")?;
        let context = Staged::new(
            PrmContextBuffer::new(OS_CONNECTOR_HANDLER_GUID, record.address()),
            "context buffer",
        )?;
        let config = Staged::new(
            PrmConfigProtocol::single(PRM_MODULE_GUID, context.address()),
            "PRM configuration",
        )?;

        self.registry
            .install(config.get())
            .map_err(PublishError::RegistrationFailed)?;

        // The loader refers to all three from here on.
        let record = record.commit();
        let context = context.commit();
        let config = config.commit();

        let relocation_armed = match self.notifier.notify_on_virtual_address_change(record) {
            Ok(()) => true,
            Err(status) => {
                warn!(
                    "Could not register for virtual address change ({status:?}); the OS will see the physical log address"
                );
                false
            }
        };

        Ok(Published {
            record,
            context,
            config,
            relocation_armed,
        })
    }

    /// Publishes and reports the outcome. Never fails the boot.
    pub fn run(self) -> Status {
        match self.publish() {
            Ok(published) => {
                info!(
                    "Advanced Logger exported to PRM handler {OS_CONNECTOR_HANDLER_GUID} (context at {:?})",
                    MemoryAddress::from_ptr(published.context)
                );
            }
            Err(e) => {
                error!("Advanced Logger OS connector not published: {e}");
            }
        }
        Status::SUCCESS
    }
}

/// Virtual address change callback body: relocates `record` and logs the outcome.
pub fn relocate_export<T: AddressTranslator + ?Sized>(record: &ExportRecord, translator: &T) {
    match record.relocate(translator) {
        Ok(Relocation::Converted { from, to }) => {
            debug!("Relocated logger information block {from:?} -> {to:?}");
        }
        Ok(Relocation::NothingToConvert | Relocation::AlreadyRelocated) => {}
        Err(e) => error!("{e}"),
    }
}

/// A zero-initialized heap value that is released on drop unless committed.
struct Staged<T: 'static> {
    ptr: NonNull<T>,
}

impl<T: 'static> Staged<T> {
    fn new(value: T, what: &'static str) -> Result<Self, PublishError> {
        const { assert!(size_of::<T>() != 0) };
        let layout = Layout::new::<T>();

        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) }.cast::<T>();
        let ptr = NonNull::new(raw).ok_or(PublishError::OutOfResources(what))?;

        // SAFETY: freshly allocated with the layout of `T`.
        unsafe { ptr.write(value) };
        Ok(Self { ptr })
    }

    fn address(&self) -> MemoryAddress {
        MemoryAddress::from_ptr(self.ptr.as_ptr())
    }

    fn get(&self) -> &T {
        // SAFETY: initialized in `new`, only ever shared.
        unsafe { self.ptr.as_ref() }
    }

    fn commit(self) -> &'static T {
        let ptr = self.ptr;
        core::mem::forget(self);
        // SAFETY: the allocation is never freed once committed.
        unsafe { ptr.as_ref() }
    }
}

impl<T: 'static> Drop for Staged<T> {
    fn drop(&mut self) {
        // SAFETY: allocated by the global allocator with `Layout::new::<T>()` and
        // not committed.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}
