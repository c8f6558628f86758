//! Boot and runtime service bindings for the [`services`](crate::services) traits.

mod allocator;
mod services;

pub use allocator::RuntimePoolAllocator;
pub use services::{
    AdvancedLoggerLocator, BootServicesConfigRegistry, RuntimeConvertPointer,
    VirtualAddressChangeNotifier,
};
