use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use uefi::boot::{self, MemoryType};

/// Pool allocator backing the driver's heap with runtime services memory.
///
/// Everything the publisher commits (export record, context buffer and PRM
/// configuration) is read by the OS after `ExitBootServices`, so it has to live in
/// memory the firmware keeps mapped at runtime.
///
/// # Notes
/// - Allocation only works while boot services are active; afterwards it reports
///   out-of-memory.
/// - Alignments above the pool's 8 bytes are handled by over-allocating and storing
///   the pool pointer right before the aligned block.
pub struct RuntimePoolAllocator;

const HEADER: usize = size_of::<usize>();

unsafe impl GlobalAlloc for RuntimePoolAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let align = layout.align().max(HEADER);
        let Some(total) = layout
            .size()
            .max(1)
            .checked_add(align)
            .and_then(|v| v.checked_add(HEADER))
        else {
            return ptr::null_mut();
        };

        let Ok(pool) = boot::allocate_pool(MemoryType::RUNTIME_SERVICES_DATA, total) else {
            return ptr::null_mut();
        };

        let pool = pool.as_ptr();
        let offset = HEADER + pool.wrapping_add(HEADER).align_offset(align);
        // SAFETY: `offset <= HEADER + align - 1 < total`.
        let block = unsafe { pool.add(offset) };
        // SAFETY: the header slot lies within the pool allocation, before `block`.
        unsafe { block.sub(HEADER).cast::<*mut u8>().write_unaligned(pool) };
        block
    }

    unsafe fn dealloc(&self, block: *mut u8, _layout: Layout) {
        if block.is_null() {
            return;
        }

        // SAFETY: `block` came from `alloc`, which stored the pool pointer before it.
        let pool = unsafe { block.sub(HEADER).cast::<*mut u8>().read_unaligned() };
        if let Some(pool) = NonNull::new(pool) {
            // SAFETY: `pool` was returned by `allocate_pool`.
            let _ = unsafe { boot::free_pool(pool) };
        }
    }
}
