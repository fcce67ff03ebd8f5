//! Drive registry
//!
//! [`AtaDriver`] owns both IDE channels and the state of the four drive
//! positions as found at probe time. Requests name a drive by its
//! [`DriveHandle`] and are routed to the owning channel.

use super::bus::{BusController, BusId, Readiness, Slot};
use super::drive::{AddressingMode, DriveDescriptor, DriveHandle, SlotState};
use super::error::{ErrorKind, IoError};
use super::identify::{identify_locked, Identify};
use super::transfer;
use crate::hal::port::PortIo;

/// Probed IDE channels and their drives
#[derive(Debug)]
pub struct AtaDriver<P> {
    buses: [BusController<P>; 2],
    slots: [[SlotState; 2]; 2],
}

impl<P: PortIo> AtaDriver<P> {
    /// Reset both channels and identify every drive position.
    ///
    /// A channel that floats (status reads 0xFF) or stays busy after reset
    /// is skipped. Failures on one position never stop probing of the
    /// others.
    pub fn probe(primary: BusController<P>, secondary: BusController<P>) -> Self {
        log::info!("[ATA] Detecting IDE devices...");

        let buses = [primary, secondary];
        let slots = [probe_bus(&buses[0]), probe_bus(&buses[1])];
        let driver = Self { buses, slots };

        let count = driver.drives().count();
        if count == 0 {
            log::info!("[ATA] No IDE devices detected");
        } else {
            log::info!("[ATA] Detected {} IDE device(s)", count);
        }
        driver
    }

    #[inline]
    pub fn bus(&self, id: BusId) -> &BusController<P> {
        &self.buses[id.index()]
    }

    /// Probe result for a drive position
    #[inline]
    pub fn slot(&self, handle: DriveHandle) -> SlotState {
        self.slots[handle.bus.index()][handle.slot.index()]
    }

    /// Descriptor of a drive that can take transfers
    pub fn drive(&self, handle: DriveHandle) -> Result<&DriveDescriptor, ErrorKind> {
        match &self.slots[handle.bus.index()][handle.slot.index()] {
            SlotState::Ready(drive) => Ok(drive),
            SlotState::Unusable(_) => Err(ErrorKind::Unusable),
            SlotState::NotAta(_) => Err(ErrorKind::NotAta),
            SlotState::NoDevice => Err(ErrorKind::NoDevice),
        }
    }

    /// Drives ready for transfers, in handle order
    pub fn drives(&self) -> impl Iterator<Item = &DriveDescriptor> + '_ {
        self.slots.iter().flatten().filter_map(|state| match state {
            SlotState::Ready(drive) => Some(drive),
            _ => None,
        })
    }

    pub fn read_sectors(&self, handle: DriveHandle, lba: u64, count: u32, buffer: &mut [u8]) -> Result<(), IoError> {
        if count == 0 {
            return Ok(());
        }
        let drive = self.drive(handle)?;
        transfer::read_sectors(self.bus(handle.bus), drive, lba, count, buffer)
    }

    pub fn write_sectors(&self, handle: DriveHandle, lba: u64, count: u32, buffer: &[u8]) -> Result<(), IoError> {
        if count == 0 {
            return Ok(());
        }
        let drive = self.drive(handle)?;
        transfer::write_sectors(self.bus(handle.bus), drive, lba, count, buffer)
    }

    pub fn flush(&self, handle: DriveHandle) -> Result<(), ErrorKind> {
        let drive = self.drive(handle)?;
        transfer::flush(self.bus(handle.bus), drive)
    }

    /// Software reset of one channel. Drive descriptors are kept.
    pub fn reset(&self, id: BusId) -> Readiness {
        let result = self.bus(id).reset();
        if result == Readiness::Timeout {
            log::warn!("[ATA] {} channel: reset timed out", id);
        }
        result
    }

    /// Software reset of the channel whose control block is at
    /// `control_base`; `None` if no channel has that port
    pub fn reset_control(&self, control_base: u16) -> Option<Readiness> {
        self.buses
            .iter()
            .find(|bus| bus.descriptor().control_base == control_base)
            .map(|bus| self.reset(bus.id()))
    }
}

fn probe_bus<P: PortIo>(bus: &BusController<P>) -> [SlotState; 2] {
    let id = bus.id();
    let mut session = bus.lock();

    if session.is_floating() {
        log::debug!("[ATA] {} channel: floating bus, skipped", id);
        return [SlotState::NoDevice; 2];
    }
    if session.reset(bus.config().reset_budget) == Readiness::Timeout {
        log::warn!("[ATA] {} channel: reset timed out, no usable drives", id);
        return [SlotState::NoDevice; 2];
    }

    Slot::ALL.map(|slot| {
        let handle = DriveHandle::new(id, slot);
        match identify_locked(&mut session, slot) {
            Identify::Found(drive) if drive.is_usable() => {
                log::info!(
                    "[ATA] {}: {} ({} MB, LBA48: {})",
                    handle,
                    drive.model,
                    drive.size_mb(),
                    if drive.addressing_mode == AddressingMode::Lba48 { "yes" } else { "no" }
                );
                SlotState::Ready(drive)
            }
            Identify::Found(drive) => {
                log::warn!("[ATA] {}: {} has no LBA support, ignored", handle, drive.model);
                SlotState::Unusable(drive)
            }
            Identify::NotAta(signature) => {
                log::info!("[ATA] {}: packet device ({:?}), not handled", handle, signature);
                SlotState::NotAta(signature)
            }
            Identify::Absent => SlotState::NoDevice,
        }
    })
}
