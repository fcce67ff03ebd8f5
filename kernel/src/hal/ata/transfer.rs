//! PIO sector transfers
//!
//! Each request holds its bus for the whole select/command/poll/transfer
//! sequence. Requests longer than one command can carry are split into
//! consecutive commands.

use super::bus::{BusController, BusSession};
use super::drive::{AddressingMode, DriveDescriptor};
use super::error::{ErrorKind, IoError};
use super::regs::{reg, Command, DriveHead, SECTOR_SIZE, WORDS_PER_SECTOR};
use crate::hal::port::PortIo;

/// Read `count` sectors starting at `lba` into `buffer`.
///
/// On failure, the first `sectors_completed` sectors of `buffer` hold
/// valid data.
pub fn read_sectors<P: PortIo>(
    bus: &BusController<P>,
    drive: &DriveDescriptor,
    lba: u64,
    count: u32,
    buffer: &mut [u8],
) -> Result<(), IoError> {
    if count == 0 {
        return Ok(());
    }
    validate(drive, lba, count, buffer.len())?;

    let mut session = bus.lock();
    for_each_command(drive, count, |done, chunk| {
        let bytes = &mut buffer[byte_range(done, chunk)];
        read_command(&mut session, drive, lba + done as u64, chunk, bytes)
    })
    .map_err(|e| {
        log::warn!("[ATA] {}: read at LBA {} failed: {}", drive.handle, lba, e);
        e
    })
}

/// Write `count` sectors from `buffer` starting at `lba`, then flush the
/// drive's write cache.
///
/// On failure, the first `sectors_completed` sectors reached the drive.
pub fn write_sectors<P: PortIo>(
    bus: &BusController<P>,
    drive: &DriveDescriptor,
    lba: u64,
    count: u32,
    buffer: &[u8],
) -> Result<(), IoError> {
    if count == 0 {
        return Ok(());
    }
    validate(drive, lba, count, buffer.len())?;

    let mut session = bus.lock();
    for_each_command(drive, count, |done, chunk| {
        let bytes = &buffer[byte_range(done, chunk)];
        write_command(&mut session, drive, lba + done as u64, chunk, bytes)
    })
    .and_then(|()| flush_locked(&mut session, drive).map_err(|kind| IoError::new(kind, count)))
    .map_err(|e| {
        log::warn!("[ATA] {}: write at LBA {} failed: {}", drive.handle, lba, e);
        e
    })
}

/// Flush the drive's write cache
pub fn flush<P: PortIo>(bus: &BusController<P>, drive: &DriveDescriptor) -> Result<(), ErrorKind> {
    check_usable(drive)?;
    let mut session = bus.lock();
    flush_locked(&mut session, drive).map_err(|e| {
        log::warn!("[ATA] {}: cache flush failed: {}", drive.handle, e);
        e
    })
}

fn check_usable(drive: &DriveDescriptor) -> Result<(), ErrorKind> {
    if !drive.present {
        Err(ErrorKind::NoDevice)
    } else if drive.addressing_mode == AddressingMode::None {
        Err(ErrorKind::Unusable)
    } else {
        Ok(())
    }
}

/// Reject a request before touching the hardware
fn validate(drive: &DriveDescriptor, lba: u64, count: u32, buffer_len: usize) -> Result<(), ErrorKind> {
    check_usable(drive)?;
    match lba.checked_add(count as u64) {
        Some(end) if end <= drive.total_sectors => {}
        _ => return Err(ErrorKind::OutOfRange),
    }
    if buffer_len < count as usize * SECTOR_SIZE {
        return Err(ErrorKind::BufferTooSmall);
    }
    Ok(())
}

fn byte_range(done: u32, chunk: u32) -> core::ops::Range<usize> {
    done as usize * SECTOR_SIZE..(done + chunk) as usize * SECTOR_SIZE
}

/// Split `count` sectors into per-command chunks. `op(done, chunk)` reports
/// failures relative to its own chunk; they are rebased onto the request.
fn for_each_command<F>(drive: &DriveDescriptor, count: u32, mut op: F) -> Result<(), IoError>
where
    F: FnMut(u32, u32) -> Result<(), IoError>,
{
    let max = drive.addressing_mode.max_sectors_per_command();
    let mut done = 0;
    while done < count {
        let chunk = (count - done).min(max);
        op(done, chunk).map_err(|e| IoError::new(e.kind, done + e.sectors_completed))?;
        done += chunk;
    }
    Ok(())
}

/// Select the drive, program the task file and issue `command`
fn issue<P: PortIo>(
    session: &mut BusSession<'_, P>,
    drive: &DriveDescriptor,
    lba: u64,
    count: u32,
    command: Command,
) -> Result<(), ErrorKind> {
    let budget = session.config().poll_budget;
    let lba48 = drive.addressing_mode == AddressingMode::Lba48;

    session.poll_not_busy(budget).status()?;
    let head = if lba48 { DriveHead::LBA } else { DriveHead::lba28(lba) };
    session.select(drive.handle.slot, head);
    session.poll_not_busy(budget).status()?;

    if lba48 {
        // Each register is a two-deep FIFO: previous write becomes the
        // high-order byte
        session.write_reg(reg::SECTOR_COUNT, (count >> 8) as u8);
        session.write_reg(reg::LBA_LO, (lba >> 24) as u8);
        session.write_reg(reg::LBA_MID, (lba >> 32) as u8);
        session.write_reg(reg::LBA_HI, (lba >> 40) as u8);
    }
    // A count of zero means 256 (65536 with the high byte)
    session.write_reg(reg::SECTOR_COUNT, count as u8);
    session.write_reg(reg::LBA_LO, lba as u8);
    session.write_reg(reg::LBA_MID, (lba >> 8) as u8);
    session.write_reg(reg::LBA_HI, (lba >> 16) as u8);

    session.write_command(command);
    session.settle();
    Ok(())
}

/// Wait for the drive to request the next data block
fn wait_data<P: PortIo>(session: &mut BusSession<'_, P>) -> Result<(), ErrorKind> {
    let budget = session.config().poll_budget;
    session.poll_not_busy(budget).status()?;
    let status = session.poll_drq(budget).status()?;
    match session.failure(status) {
        Some(kind) => Err(kind),
        None => Ok(()),
    }
}

fn read_command<P: PortIo>(
    session: &mut BusSession<'_, P>,
    drive: &DriveDescriptor,
    lba: u64,
    count: u32,
    buffer: &mut [u8],
) -> Result<(), IoError> {
    let command = match drive.addressing_mode {
        AddressingMode::Lba48 => Command::ReadSectorsExt,
        _ => Command::ReadSectors,
    };
    issue(session, drive, lba, count, command)?;

    let mut words = [0u16; WORDS_PER_SECTOR];
    for (i, sector) in buffer.chunks_exact_mut(SECTOR_SIZE).enumerate() {
        wait_data(session).map_err(|kind| IoError::new(kind, i as u32))?;
        session.read_data(&mut words);
        for (bytes, word) in sector.chunks_exact_mut(2).zip(words.iter()) {
            bytes.copy_from_slice(&word.to_le_bytes());
        }
    }
    Ok(())
}

fn write_command<P: PortIo>(
    session: &mut BusSession<'_, P>,
    drive: &DriveDescriptor,
    lba: u64,
    count: u32,
    buffer: &[u8],
) -> Result<(), IoError> {
    let command = match drive.addressing_mode {
        AddressingMode::Lba48 => Command::WriteSectorsExt,
        _ => Command::WriteSectors,
    };
    issue(session, drive, lba, count, command)?;

    // The drive reports a bad sector when asking for the next one, so a
    // failure seen before sector i means sector i-1 did not make it.
    let mut words = [0u16; WORDS_PER_SECTOR];
    for (i, sector) in buffer.chunks_exact(SECTOR_SIZE).enumerate() {
        wait_data(session).map_err(|kind| IoError::new(kind, (i as u32).saturating_sub(1)))?;
        for (word, bytes) in words.iter_mut().zip(sector.chunks_exact(2)) {
            *word = u16::from_le_bytes([bytes[0], bytes[1]]);
        }
        session.write_data(&words);
    }

    complete(session).map_err(|kind| IoError::new(kind, count - 1))
}

/// Wait for a non-data command (or the last written sector) to finish
fn complete<P: PortIo>(session: &mut BusSession<'_, P>) -> Result<(), ErrorKind> {
    let budget = session.config().poll_budget;
    let status = session.poll_not_busy(budget).status()?;
    match session.failure(status) {
        Some(kind) => Err(kind),
        None => Ok(()),
    }
}

fn flush_locked<P: PortIo>(session: &mut BusSession<'_, P>, drive: &DriveDescriptor) -> Result<(), ErrorKind> {
    let budget = session.config().poll_budget;
    let command = match drive.addressing_mode {
        AddressingMode::Lba48 => Command::CacheFlushExt,
        _ => Command::CacheFlush,
    };

    session.poll_not_busy(budget).status()?;
    session.select(drive.handle.slot, DriveHead::empty());
    session.poll_not_busy(budget).status()?;
    session.write_command(command);
    session.settle();
    complete(session)
}
