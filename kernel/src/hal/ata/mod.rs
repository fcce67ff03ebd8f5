//! ATA/IDE Driver
//!
//! Implements ATA/IDE disk access using PIO mode on the two legacy IDE
//! channels, with polling instead of interrupts.
//!
//! # I/O Ports
//! Primary channel: 0x1F0-0x1F7, control at 0x3F6
//! Secondary channel: 0x170-0x177, control at 0x376
//!
//! # Commands
//! - IDENTIFY (0xEC): Get device information
//! - READ SECTORS (0x20): Read sectors in PIO mode
//! - WRITE SECTORS (0x30): Write sectors in PIO mode
//! - FLUSH CACHE (0xE7): Flush write cache
//! - READ SECTORS EXT (0x24): 48-bit LBA read
//! - WRITE SECTORS EXT (0x34): 48-bit LBA write
//! - FLUSH CACHE EXT (0xEA): 48-bit flush
//!
//! # Layout
//! - `regs`: register offsets and bit layouts
//! - `bus`: per-channel lock, reset, select and status polling
//! - `identify`: drive probing and IDENTIFY decoding
//! - `transfer`: sector reads and writes
//! - `registry`: the four drive positions and request routing
//!
//! Packet (ATAPI) devices are detected but not driven.

pub mod bus;
pub mod config;
pub mod drive;
pub mod error;
pub mod identify;
pub mod registry;
pub mod regs;
pub mod transfer;

#[cfg(test)]
pub(crate) mod sim;

pub use bus::{BusController, BusDescriptor, BusId, BusSession, Readiness, Slot};
pub use config::AtaConfig;
pub use drive::{AddressingMode, DeviceSignature, DriveDescriptor, DriveHandle, SlotState};
pub use error::{ErrorKind, IoError, ProtocolError};
pub use identify::{identify, Identify};
pub use registry::AtaDriver;
pub use regs::SECTOR_SIZE;

#[cfg(target_arch = "x86_64")]
use crate::arch::x86_64::X86Ports;

/// Driver instance for the machine's IDE channels
#[cfg(target_arch = "x86_64")]
static ATA: spin::Once<AtaDriver<X86Ports>> = spin::Once::new();

/// Initialize ATA driver
///
/// Probes both legacy channels on the first call; later calls do nothing.
/// The probed instance is available through [`driver`].
#[cfg(target_arch = "x86_64")]
pub fn init() {
    ATA.call_once(|| {
        log::info!("[ATA] ATA/IDE driver initializing...");

        // SAFETY: runs once, in ring 0, and the driver becomes the sole
        // owner of both channels' ports.
        let (primary, secondary) = unsafe { (X86Ports::new(), X86Ports::new()) };
        let driver = AtaDriver::probe(
            BusController::new(BusId::Primary, primary),
            BusController::new(BusId::Secondary, secondary),
        );

        log::info!("[ATA] ATA/IDE driver initialized ({} devices)", driver.drives().count());
        driver
    });
}

#[cfg(target_arch = "x86_64")]
pub fn driver() -> Option<&'static AtaDriver<X86Ports>> {
    ATA.get()
}

#[cfg(target_arch = "x86_64")]
fn initialized() -> Result<&'static AtaDriver<X86Ports>, ErrorKind> {
    driver().ok_or(ErrorKind::NotInitialized)
}

/// Software reset of the channel with control block `control_base`
/// (0x3F6 or 0x376)
#[cfg(target_arch = "x86_64")]
pub fn reset(control_base: u16) -> Result<Readiness, ErrorKind> {
    initialized()?.reset_control(control_base).ok_or(ErrorKind::NoDevice)
}

#[cfg(target_arch = "x86_64")]
pub fn read_sectors(handle: DriveHandle, lba: u64, count: u32, buffer: &mut [u8]) -> Result<(), IoError> {
    initialized()?.read_sectors(handle, lba, count, buffer)
}

#[cfg(target_arch = "x86_64")]
pub fn write_sectors(handle: DriveHandle, lba: u64, count: u32, buffer: &[u8]) -> Result<(), IoError> {
    initialized()?.write_sectors(handle, lba, count, buffer)
}

#[cfg(target_arch = "x86_64")]
pub fn flush(handle: DriveHandle) -> Result<(), ErrorKind> {
    initialized()?.flush(handle)
}

/// Descriptor of an identified ATA drive, usable or not
#[cfg(target_arch = "x86_64")]
pub fn drive(handle: DriveHandle) -> Option<DriveDescriptor> {
    driver()?.slot(handle).descriptor().copied()
}
