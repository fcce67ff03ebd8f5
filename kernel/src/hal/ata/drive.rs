//! Drive handles and descriptors

use core::fmt;

use super::bus::{BusId, Slot};

/// Opaque identifier for one of the four legacy drive positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriveHandle {
    pub bus: BusId,
    pub slot: Slot,
}

impl DriveHandle {
    pub const ALL: [DriveHandle; 4] = [
        DriveHandle::new(BusId::Primary, Slot::Master),
        DriveHandle::new(BusId::Primary, Slot::Slave),
        DriveHandle::new(BusId::Secondary, Slot::Master),
        DriveHandle::new(BusId::Secondary, Slot::Slave),
    ];

    pub const fn new(bus: BusId, slot: Slot) -> Self {
        Self { bus, slot }
    }
}

impl fmt::Display for DriveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bus, self.slot)
    }
}

/// LBA scheme chosen once at identification time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    None,
    Lba28,
    Lba48,
}

impl AddressingMode {
    /// Largest sector count one command can carry (a count register of
    /// zero encodes the maximum)
    pub const fn max_sectors_per_command(self) -> u32 {
        match self {
            AddressingMode::None => 0,
            AddressingMode::Lba28 => 256,
            AddressingMode::Lba48 => 65536,
        }
    }
}

/// Cylinder register signature left by reset or an aborted IDENTIFY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceSignature {
    Pata,
    Sata,
    Patapi,
    Satapi,
    Unknown { lo: u8, hi: u8 },
}

impl DeviceSignature {
    pub const fn from_cylinder(lo: u8, hi: u8) -> Self {
        match (lo, hi) {
            (0x00, 0x00) => DeviceSignature::Pata,
            (0x3C, 0xC3) => DeviceSignature::Sata,
            (0x14, 0xEB) => DeviceSignature::Patapi,
            (0x69, 0x96) => DeviceSignature::Satapi,
            _ => DeviceSignature::Unknown { lo, hi },
        }
    }

    /// ATAPI (packet) device
    pub const fn is_packet(self) -> bool {
        matches!(self, DeviceSignature::Patapi | DeviceSignature::Satapi)
    }

    pub const fn is_ata(self) -> bool {
        matches!(self, DeviceSignature::Pata | DeviceSignature::Sata)
    }
}

/// ASCII field from IDENTIFY data, stored without allocation
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdString<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> IdString<N> {
    pub const fn empty() -> Self {
        Self { bytes: [0; N], len: 0 }
    }

    /// Decode byte-swapped ASCII pairs (high byte first in each word).
    /// Surrounding blanks and NULs are trimmed; non-printable bytes
    /// become '?'.
    pub fn from_words(words: &[u16]) -> Self {
        let mut out = Self::empty();
        for (i, word) in words.iter().take(N / 2).enumerate() {
            out.bytes[i * 2] = (word >> 8) as u8;
            out.bytes[i * 2 + 1] = (word & 0xFF) as u8;
        }
        for byte in out.bytes.iter_mut() {
            if *byte == 0 {
                *byte = b' ';
            } else if !(0x20..0x7F).contains(&*byte) {
                *byte = b'?';
            }
        }

        let end = out.bytes.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        let start = out.bytes[..end].iter().position(|&b| b != b' ').unwrap_or(end);
        out.bytes.copy_within(start..end, 0);
        out.len = end - start;
        out.bytes[out.len..].fill(0);
        out
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> fmt::Debug for IdString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for IdString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ATA drive information gathered by IDENTIFY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveDescriptor {
    pub handle: DriveHandle,
    pub present: bool,
    pub addressing_mode: AddressingMode,
    pub total_sectors: u64,
    pub signature: DeviceSignature,
    pub model: IdString<40>,
    pub serial: IdString<20>,
    pub firmware: IdString<8>,
}

impl DriveDescriptor {
    pub const fn absent(handle: DriveHandle) -> Self {
        Self {
            handle,
            present: false,
            addressing_mode: AddressingMode::None,
            total_sectors: 0,
            signature: DeviceSignature::Pata,
            model: IdString::empty(),
            serial: IdString::empty(),
            firmware: IdString::empty(),
        }
    }

    /// Present and addressable by LBA
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.present && self.addressing_mode != AddressingMode::None
    }

    pub fn size_mb(&self) -> u64 {
        self.total_sectors / 2048
    }
}

/// What probing found at one drive position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    NoDevice,
    NotAta(DeviceSignature),
    /// ATA drive without LBA support
    Unusable(DriveDescriptor),
    Ready(DriveDescriptor),
}

impl SlotState {
    pub fn descriptor(&self) -> Option<&DriveDescriptor> {
        match self {
            SlotState::Ready(drive) | SlotState::Unusable(drive) => Some(drive),
            SlotState::NoDevice | SlotState::NotAta(_) => None,
        }
    }
}
