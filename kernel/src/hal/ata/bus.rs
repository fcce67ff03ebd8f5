//! IDE channel (bus) control
//!
//! A [`BusController`] owns one channel's port range. Every register access
//! goes through a [`BusSession`], which holds the channel lock, so one
//! request's select/command/poll/transfer sequence can never interleave
//! with another's. The primary and secondary channels have disjoint ports
//! and independent locks.

use core::fmt;

use spin::{Mutex, MutexGuard};

use super::config::AtaConfig;
use super::drive::DeviceSignature;
use super::error::ErrorKind;
use super::regs::{ctrl, reg, Command, DeviceControl, DriveHead, ErrorBits, Status};
use crate::hal::port::PortIo;

/// IDE channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusId {
    Primary,
    Secondary,
}

impl BusId {
    pub const ALL: [BusId; 2] = [BusId::Primary, BusId::Secondary];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Legacy ISA port assignment
    pub const fn descriptor(self) -> BusDescriptor {
        match self {
            BusId::Primary => BusDescriptor::PRIMARY,
            BusId::Secondary => BusDescriptor::SECONDARY,
        }
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BusId::Primary => "Primary",
            BusId::Secondary => "Secondary",
        })
    }
}

/// Drive position on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Master,
    Slave,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Master, Slot::Slave];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Master => "Master",
            Slot::Slave => "Slave",
        })
    }
}

/// Port bases of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusDescriptor {
    pub command_base: u16,
    pub control_base: u16,
}

impl BusDescriptor {
    /// Primary channel: 0x1F0-0x1F7, control at 0x3F6
    pub const PRIMARY: Self = Self { command_base: 0x1F0, control_base: 0x3F6 };
    /// Secondary channel: 0x170-0x177, control at 0x376
    pub const SECONDARY: Self = Self { command_base: 0x170, control_base: 0x376 };

    #[inline]
    pub const fn register(&self, offset: u16) -> u16 {
        self.command_base + offset
    }

    #[inline]
    pub const fn control(&self, offset: u16) -> u16 {
        self.control_base + offset
    }
}

/// Outcome of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The awaited condition held; carries the last status read
    Ready(Status),
    /// Budget exhausted
    Timeout,
}

impl Readiness {
    #[inline]
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready(_))
    }

    /// Status on success, `ErrorKind::Timeout` otherwise
    #[inline]
    pub fn status(self) -> Result<Status, ErrorKind> {
        match self {
            Readiness::Ready(status) => Ok(status),
            Readiness::Timeout => Err(ErrorKind::Timeout),
        }
    }
}

/// One IDE channel and the lock serializing its commands
pub struct BusController<P> {
    id: BusId,
    descriptor: BusDescriptor,
    config: AtaConfig,
    ports: Mutex<P>,
}

impl<P: PortIo> BusController<P> {
    /// Channel at its legacy ports with default tuning
    pub const fn new(id: BusId, ports: P) -> Self {
        Self::with_config(id, id.descriptor(), AtaConfig::DEFAULT, ports)
    }

    pub const fn with_config(id: BusId, descriptor: BusDescriptor, config: AtaConfig, ports: P) -> Self {
        Self {
            id,
            descriptor,
            config,
            ports: Mutex::new(ports),
        }
    }

    #[inline]
    pub fn id(&self) -> BusId {
        self.id
    }

    #[inline]
    pub fn descriptor(&self) -> &BusDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn config(&self) -> &AtaConfig {
        &self.config
    }

    /// Acquire exclusive access to the channel
    pub fn lock(&self) -> BusSession<'_, P> {
        BusSession {
            id: self.id,
            descriptor: self.descriptor,
            config: &self.config,
            ports: self.ports.lock(),
        }
    }

    /// Acquire the channel only if no request is in flight
    pub fn try_lock(&self) -> Option<BusSession<'_, P>> {
        self.ports.try_lock().map(|ports| BusSession {
            id: self.id,
            descriptor: self.descriptor,
            config: &self.config,
            ports,
        })
    }

    /// Software reset with the configured budget
    pub fn reset(&self) -> Readiness {
        let budget = self.config.reset_budget;
        self.lock().reset(budget)
    }
}

impl<P> fmt::Debug for BusController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusController")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Locked access to one channel's registers
pub struct BusSession<'a, P> {
    id: BusId,
    descriptor: BusDescriptor,
    config: &'a AtaConfig,
    ports: MutexGuard<'a, P>,
}

impl<'a, P: PortIo> BusSession<'a, P> {
    #[inline]
    pub fn id(&self) -> BusId {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &AtaConfig {
        self.config
    }

    #[inline]
    pub fn read_reg(&mut self, offset: u16) -> u8 {
        let port = self.descriptor.register(offset);
        self.ports.read_u8(port)
    }

    #[inline]
    pub fn write_reg(&mut self, offset: u16, value: u8) {
        let port = self.descriptor.register(offset);
        self.ports.write_u8(port, value);
    }

    /// Regular status; reading it acknowledges a pending interrupt
    #[inline]
    pub fn status(&mut self) -> Status {
        Status::from_bits_retain(self.read_reg(reg::STATUS))
    }

    /// Alternate status; no side effects on the drive
    #[inline]
    pub fn alt_status(&mut self) -> Status {
        let port = self.descriptor.control(ctrl::ALT_STATUS);
        Status::from_bits_retain(self.ports.read_u8(port))
    }

    #[inline]
    pub fn error(&mut self) -> ErrorBits {
        ErrorBits::from_bits_retain(self.read_reg(reg::ERROR))
    }

    #[inline]
    pub fn write_command(&mut self, command: Command) {
        self.write_reg(reg::COMMAND, command.opcode());
    }

    #[inline]
    pub fn write_device_control(&mut self, value: DeviceControl) {
        let port = self.descriptor.control(ctrl::DEVICE_CONTROL);
        self.ports.write_u8(port, value.bits());
    }

    /// Read alternate status `settle_reads` times (~400ns)
    pub fn settle(&mut self) {
        for _ in 0..self.config.settle_reads {
            let _ = self.alt_status();
        }
    }

    /// Status reads 0xFF: nothing drives the bus
    pub fn is_floating(&mut self) -> bool {
        self.status().bits() == Status::FLOATING
    }

    /// Software reset of both drives on the channel.
    ///
    /// Holds SRST for `reset_hold_reads` alternate status reads, releases
    /// it with interrupts left disabled, then polls until BSY clears.
    pub fn reset(&mut self, budget: u32) -> Readiness {
        self.write_device_control(DeviceControl::SRST | DeviceControl::NIEN);
        for _ in 0..self.config.reset_hold_reads {
            let _ = self.alt_status();
        }
        self.write_device_control(DeviceControl::NIEN);
        self.poll_not_busy(budget)
    }

    /// Select a drive. `head` carries addressing bits for the next
    /// command and is OR'd into the 0xA0/0xB0 select byte.
    pub fn select(&mut self, slot: Slot, head: DriveHead) {
        let value = DriveHead::select(slot) | head;
        self.write_reg(reg::DRIVE_HEAD, value.bits());
        self.settle();
    }

    /// Poll status until BSY clears, at most `budget` reads
    pub fn poll_not_busy(&mut self, budget: u32) -> Readiness {
        for _ in 0..budget {
            let status = self.status();
            if !status.is_busy() {
                return Readiness::Ready(status);
            }
            (self.config.relax)();
        }
        Readiness::Timeout
    }

    /// Poll alternate status until BSY clears, at most `budget` reads.
    ///
    /// Unlike [`poll_not_busy`](Self::poll_not_busy) this leaves a pending
    /// interrupt unacknowledged; use it before touching a drive whose state
    /// is unknown.
    pub fn poll_alt_not_busy(&mut self, budget: u32) -> Readiness {
        for _ in 0..budget {
            let status = self.alt_status();
            if !status.is_busy() {
                return Readiness::Ready(status);
            }
            (self.config.relax)();
        }
        Readiness::Timeout
    }

    /// Poll status until the drive requests data, at most `budget` reads.
    ///
    /// Also returns early when ERR or DF is raised with BSY clear, so the
    /// caller can decode the failure instead of waiting out the budget.
    pub fn poll_drq(&mut self, budget: u32) -> Readiness {
        for _ in 0..budget {
            let status = self.status();
            if !status.is_busy() && status.intersects(Status::DRQ | Status::ERR | Status::DF) {
                return Readiness::Ready(status);
            }
            (self.config.relax)();
        }
        Readiness::Timeout
    }

    /// Classify a polled status, reading the error register when needed
    pub fn failure(&mut self, status: Status) -> Option<ErrorKind> {
        ErrorKind::from_status(status, || self.error().bits())
    }

    /// Device signature left in the cylinder registers
    pub fn signature(&mut self) -> DeviceSignature {
        let lo = self.read_reg(reg::LBA_MID);
        let hi = self.read_reg(reg::LBA_HI);
        DeviceSignature::from_cylinder(lo, hi)
    }

    /// Read one DRQ block from the data register
    #[inline]
    pub fn read_data(&mut self, words: &mut [u16]) {
        let port = self.descriptor.register(reg::DATA);
        self.ports.read_buffer_u16(port, words);
    }

    /// Write one DRQ block to the data register
    #[inline]
    pub fn write_data(&mut self, words: &[u16]) {
        let port = self.descriptor.register(reg::DATA);
        self.ports.write_buffer_u16(port, words);
    }
}
