//! ATA register map
//!
//! Port offsets, command opcodes and register bit layouts for one IDE
//! channel. Offsets are relative to the channel's command block base
//! (`reg`) or control block base (`ctrl`).

use bitflags::bitflags;

use super::bus::Slot;

/// Bytes per sector. PIO transfers always move whole sectors.
pub const SECTOR_SIZE: usize = 512;

/// 16-bit data register reads per sector
pub const WORDS_PER_SECTOR: usize = SECTOR_SIZE / 2;

/// Command block register offsets
pub mod reg {
    pub const DATA: u16 = 0x0;
    pub const ERROR: u16 = 0x1;        // Read
    pub const FEATURES: u16 = 0x1;     // Write
    pub const SECTOR_COUNT: u16 = 0x2;
    pub const LBA_LO: u16 = 0x3;       // Sector number
    pub const LBA_MID: u16 = 0x4;      // Cylinder low
    pub const LBA_HI: u16 = 0x5;       // Cylinder high
    pub const DRIVE_HEAD: u16 = 0x6;
    pub const STATUS: u16 = 0x7;       // Read
    pub const COMMAND: u16 = 0x7;      // Write
}

/// Control block register offsets
pub mod ctrl {
    pub const ALT_STATUS: u16 = 0x0;     // Read
    pub const DEVICE_CONTROL: u16 = 0x0; // Write
    pub const DRIVE_ADDRESS: u16 = 0x1;  // Read
}

/// ATA commands issued by the PIO driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Identify = 0xEC,
    ReadSectors = 0x20,
    ReadSectorsExt = 0x24,
    WriteSectors = 0x30,
    WriteSectorsExt = 0x34,
    CacheFlush = 0xE7,
    CacheFlushExt = 0xEA,
}

impl Command {
    #[inline]
    pub const fn opcode(self) -> u8 {
        self as u8
    }
}

bitflags! {
    /// Status and alternate status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// Error
        const ERR = 0x01;
        /// Index
        const IDX = 0x02;
        /// Corrected data
        const CORR = 0x04;
        /// Data request
        const DRQ = 0x08;
        /// Service
        const SRV = 0x10;
        /// Drive fault
        const DF = 0x20;
        /// Ready
        const RDY = 0x40;
        /// Busy
        const BSY = 0x80;
    }
}

impl Status {
    /// Raw status of a channel with nothing attached (pulled-up bus)
    pub const FLOATING: u8 = 0xFF;

    #[inline]
    pub fn is_busy(self) -> bool {
        self.contains(Status::BSY)
    }

    /// ERR or DF raised
    #[inline]
    pub fn has_failed(self) -> bool {
        self.intersects(Status::ERR | Status::DF)
    }
}

bitflags! {
    /// Error register, valid only while ERR is set in status
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorBits: u8 {
        /// Address mark not found
        const AMNF = 0x01;
        /// Track 0 not found
        const TKZNF = 0x02;
        /// Aborted command
        const ABRT = 0x04;
        /// Media change request
        const MCR = 0x08;
        /// ID not found
        const IDNF = 0x10;
        /// Media changed
        const MC = 0x20;
        /// Uncorrectable data
        const UNC = 0x40;
        /// Bad block
        const BBK = 0x80;
    }
}

bitflags! {
    /// Device control register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceControl: u8 {
        /// Interrupts disabled (we poll)
        const NIEN = 0x02;
        /// Software reset of both drives on the channel
        const SRST = 0x04;
        /// Read back the high-order byte of 48-bit registers
        const HOB = 0x80;
    }
}

bitflags! {
    /// Drive/head register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriveHead: u8 {
        /// LBA bits 24..27 in 28-bit mode
        const ADDR_HIGH = 0x0F;
        /// Slave select
        const DRV = 0x10;
        /// Obsolete, always one
        const OBS5 = 0x20;
        /// LBA addressing
        const LBA = 0x40;
        /// Obsolete, always one
        const OBS7 = 0x80;
    }
}

impl DriveHead {
    /// Base select byte: 0xA0 for master, 0xB0 for slave
    pub const fn select(slot: Slot) -> Self {
        let base = Self::OBS7.bits() | Self::OBS5.bits();
        match slot {
            Slot::Master => Self::from_bits_retain(base),
            Slot::Slave => Self::from_bits_retain(base | Self::DRV.bits()),
        }
    }

    /// Addressing bits for a 28-bit LBA command: LBA mode plus address
    /// bits 24..27
    pub const fn lba28(lba: u64) -> Self {
        Self::from_bits_retain(Self::LBA.bits() | ((lba >> 24) as u8 & Self::ADDR_HIGH.bits()))
    }
}
