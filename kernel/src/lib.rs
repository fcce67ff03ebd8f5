//! Nostalgia OS ATA HAL
//!
//! PIO driver for ATA disks on the legacy IDE channels, targeting x86_64.
//!
//! # Architecture Overview
//!
//! - **hal::port** - `PortIo`, the register access trait drivers are written against
//! - **hal::ata** - channel control, drive identification, sector transfer
//! - **arch::x86_64** - `in`/`out` instruction backend for `PortIo`
//! - **serial** - COM1 `log` backend
//!
//! # Initialization
//!
//! - `serial::init_logger` installs the COM1 logger.
//! - `hal::ata::init` resets both channels and identifies their drives.
//!
//! The crate is `no_std`; host tests link std and run the driver against a
//! simulated controller.

#![cfg_attr(not(test), no_std)]
// Kernel-specific lint configurations:
// - missing_safety_doc: port access is unsafe by nature
// - new_without_default: register handles need explicit construction
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::new_without_default)]

pub mod arch;
pub mod hal;
pub mod serial;
