//! IDENTIFY command
//!
//! Probes one drive position and decodes the 256-word identification
//! block into a [`DriveDescriptor`].

use super::bus::{BusController, BusSession, Readiness, Slot};
use super::drive::{AddressingMode, DeviceSignature, DriveDescriptor, DriveHandle, IdString};
use super::regs::{reg, Command, DriveHead, Status, WORDS_PER_SECTOR};
use crate::hal::port::PortIo;

/// IDENTIFY DEVICE word offsets
mod word {
    pub const SERIAL: usize = 10;       // 10 words
    pub const FIRMWARE: usize = 23;     // 4 words
    pub const MODEL: usize = 27;        // 20 words
    pub const LBA28_SECTORS: usize = 60; // 2 words
    pub const COMMAND_SET_2: usize = 83;
    pub const LBA48_SECTORS: usize = 100; // 4 words

    /// Word 83 bit 10: 48-bit Address feature set supported
    pub const LBA48_SUPPORTED: u16 = 1 << 10;
}

/// Result of probing a drive position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identify {
    Found(DriveDescriptor),
    Absent,
    /// Packet device; needs IDENTIFY PACKET DEVICE, which this driver
    /// does not issue
    NotAta(DeviceSignature),
}

/// Probe `slot` on `bus`
pub fn identify<P: PortIo>(bus: &BusController<P>, slot: Slot) -> Identify {
    let mut session = bus.lock();
    identify_locked(&mut session, slot)
}

/// Probe `slot` on an already locked bus
pub fn identify_locked<P: PortIo>(session: &mut BusSession<'_, P>, slot: Slot) -> Identify {
    let handle = DriveHandle::new(session.id(), slot);
    let budget = session.config().poll_budget;

    // A drive left busy (e.g. by a failed reset) must not see register writes
    if session.poll_alt_not_busy(budget) == Readiness::Timeout {
        log::debug!("[ATA] {}: bus busy, not probed", handle);
        return Identify::Absent;
    }

    session.select(slot, DriveHead::empty());
    for offset in [reg::SECTOR_COUNT, reg::LBA_LO, reg::LBA_MID, reg::LBA_HI] {
        session.write_reg(offset, 0);
    }
    session.write_command(Command::Identify);

    // Nothing answers at this position
    if session.status().is_empty() {
        return Identify::Absent;
    }

    let status = match session.poll_not_busy(budget) {
        Readiness::Ready(status) => status,
        Readiness::Timeout => {
            log::debug!("[ATA] {}: IDENTIFY stuck busy", handle);
            return Identify::Absent;
        }
    };

    // ATAPI devices abort IDENTIFY and leave their signature behind. Some
    // leave the signature without raising ERR.
    let signature = session.signature();
    if signature.is_packet() {
        return Identify::NotAta(signature);
    }
    if status.contains(Status::ERR) || !signature.is_ata() {
        log::debug!("[ATA] {}: IDENTIFY rejected ({:?}, {:?})", handle, status, signature);
        return Identify::Absent;
    }

    match session.poll_drq(budget) {
        Readiness::Ready(status) if status.contains(Status::DRQ) && !status.has_failed() => {}
        other => {
            log::debug!("[ATA] {}: no IDENTIFY data ({:?})", handle, other);
            return Identify::Absent;
        }
    }

    let mut data = [0u16; WORDS_PER_SECTOR];
    session.read_data(&mut data);
    Identify::Found(parse_identify_data(handle, signature, &data))
}

/// Decode an IDENTIFY DEVICE block
pub fn parse_identify_data(
    handle: DriveHandle,
    signature: DeviceSignature,
    data: &[u16; WORDS_PER_SECTOR],
) -> DriveDescriptor {
    let sectors_28 = (data[word::LBA28_SECTORS + 1] as u64) << 16 | data[word::LBA28_SECTORS] as u64;
    let sectors_48 = (data[word::LBA48_SECTORS + 3] as u64) << 48
        | (data[word::LBA48_SECTORS + 2] as u64) << 32
        | (data[word::LBA48_SECTORS + 1] as u64) << 16
        | data[word::LBA48_SECTORS] as u64;
    let lba48 = data[word::COMMAND_SET_2] & word::LBA48_SUPPORTED != 0;

    let (addressing_mode, total_sectors) = if lba48 && sectors_48 > 0 {
        (AddressingMode::Lba48, sectors_48)
    } else if sectors_28 > 0 {
        (AddressingMode::Lba28, sectors_28)
    } else {
        (AddressingMode::None, 0)
    };

    DriveDescriptor {
        handle,
        present: true,
        addressing_mode,
        total_sectors,
        signature,
        model: IdString::from_words(&data[word::MODEL..word::MODEL + 20]),
        serial: IdString::from_words(&data[word::SERIAL..word::SERIAL + 10]),
        firmware: IdString::from_words(&data[word::FIRMWARE..word::FIRMWARE + 4]),
    }
}
