//! # Firmware Debug Console Output
//!
//! Diagnostics for firmware drivers that run before (and briefly after) the OS
//! takes over, when there is no console protocol one can rely on.
//!
//! ## Output Path
//!
//! ```text
//! log::info!(...)
//!     ↓
//! FirmwareLogger (level filter, "[LEVEL] target: message" framing)
//!     ↓
//! sink: fn(fmt::Arguments)  ── default: debugcon::write
//!     ↓
//! I/O port 0x402 (QEMU / Bochs debug console)
//! ```
//!
//! The default sink writes byte-by-byte to the debug console port on x86-64 when
//! the `enabled` feature is on, and does nothing otherwise. Any other
//! `fn(fmt::Arguments)` can be plugged in with [`FirmwareLogger::with_sink`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use firmware_debugcon::FirmwareLogger;
//! use log::{LevelFilter, info};
//!
//! static LOGGER: FirmwareLogger = FirmwareLogger::new(LevelFilter::Debug);
//!
//! LOGGER.install().expect("logger already installed");
//! info!("driver loaded");
//! ```
//!
//! Capture on the host with `qemu-system-x86_64 ... -debugcon file:debug.log`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::FirmwareLogger;

#[cfg(all(feature = "enabled", target_arch = "x86_64"))]
#[doc(hidden)]
pub mod debugcon {
    use core::fmt::{self, Write};

    /// The port number of the QEMU/Bochs debug console.
    const DEBUGCON_PORT: u16 = 0x402;

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn putc(c: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") DEBUGCON_PORT,
                in("al") c,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    struct DebugconSink;

    impl Write for DebugconSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                putc(b);
            }
            Ok(())
        }
    }

    /// Best-effort write to the debug console.
    pub fn write(args: fmt::Arguments) {
        let _ = fmt::write(&mut DebugconSink, args);
    }
}

#[cfg(not(all(feature = "enabled", target_arch = "x86_64")))]
#[doc(hidden)]
pub mod debugcon {
    use core::fmt;

    /// No debug console on this configuration.
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn write(_: fmt::Arguments) {}
}

/// Write `format!`-style arguments straight to the debug console, bypassing `log`.
#[macro_export]
macro_rules! debugcon_trace {
    ($($arg:tt)*) => {{
        $crate::debugcon::write(core::format_args!($($arg)*));
    }};
}
