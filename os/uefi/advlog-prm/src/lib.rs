//! # Advanced Logger OS Connector
//!
//! Makes the firmware's Advanced Logger memory log discoverable by the operating
//! system through a Platform Runtime Mechanism (PRM) handler, without ever handing
//! the OS a descriptor pointer that untrusted boot code could have tampered with.
//!
//! ## Overview
//!
//! ```text
//! Advanced Logger (boot)            this crate                         OS
//! ─────────────────────             ──────────                         ──
//! LoggerInfo + log bytes ──locate──▶ Publisher
//!                                    • validate
//!                                    • ExportRecord ("PRMD", len 16)
//!                                    • context + config ──install──▶ PRM loader
//!                                    • arm relocation
//! SetVirtualAddressMap ─────event──▶ relocate ExportRecord pointer (once)
//!                                                                     │
//!                                    handler ◀──── context buffer ────┘
//!                                    • check context / static data
//!                                    • re-validate LoggerInfo
//!                                    • SUCCESS | COMPROMISED_DATA
//! ```
//!
//! ## Trust Boundary
//!
//! The information block is written by the boot-time logger but remains writable
//! by anything that runs before the OS. Both the [`publisher`] (at publish time)
//! and the [`handler`] (on every request) therefore run the same
//! [`validator::validate_logger_info`] over it, reading through a bounds-checked
//! [`MemoryReader`](advlog_abi::memory::MemoryReader) at explicit offsets.
//!
//! ## Failure Policy
//!
//! Publishing is best-effort: every failure is logged and discarded so that boot
//! continues without an exported log. Request handling reports a precise status:
//!
//! | Status              | Meaning                                                |
//! |---------------------|--------------------------------------------------------|
//! | `SUCCESS`           | the log region is structurally valid                   |
//! | `INVALID_PARAMETER` | the context or its static data buffer is missing       |
//! | `NOT_FOUND`         | a context or data buffer signature does not match      |
//! | `COMPROMISED_DATA`  | the information block fails validation                 |
//!
//! ## Platform Bindings
//!
//! The collaborators (logger lookup, PRM registration, address translation, event
//! registration) are traits in [`services`]. On UEFI targets [`platform`] binds
//! them to boot and runtime services, and the `advlog-prm-driver` binary (feature
//! `driver`) runs the publisher as a DXE runtime driver entry point; `build.rs`
//! links it with the [`image::DRIVER_SUBSYSTEM_LINK_ARG`] subsystem.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]
extern crate alloc;

pub mod export;
pub mod handler;
pub mod image;
pub mod module_export;
pub mod publisher;
pub mod services;
pub mod validator;

#[cfg(target_os = "uefi")]
pub mod platform;

use advlog_abi::Guid;
use uefi::guid;

/// GUID of the PRM module that hosts the connector handler.
pub const PRM_MODULE_GUID: Guid = guid!("73807ab1-cab3-40f4-85f7-7ea7146b96d9");

/// GUID the OS uses to invoke [`handler::adv_logger_os_connector_prm_handler`].
pub const OS_CONNECTOR_HANDLER_GUID: Guid = guid!("0f8aef11-77b8-4d7f-84cc-fe0cce64ac14");

/// Exported symbol name of the handler.
pub const OS_CONNECTOR_HANDLER_NAME: &str = "AdvLoggerOsConnectorPrmHandler";
