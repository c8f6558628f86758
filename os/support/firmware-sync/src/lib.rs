//! # Firmware synchronization primitives
//!
//! Runtime firmware state is written during boot and by a handful of platform
//! events, then read by OS-mode callers. The primitives here make those one-shot
//! transitions explicit instead of relying on event ordering alone.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod once_latch;

pub use once_latch::{LatchState, OnceLatch};
