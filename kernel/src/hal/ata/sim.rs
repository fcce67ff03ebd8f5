//! Simulated IDE channel for host tests
//!
//! Models the register file of one channel with up to two drives closely
//! enough to run the driver's probe and PIO paths: busy countdowns, DRQ
//! data phases, the 48-bit register FIFO, software reset and device
//! signatures. Misuse of the interface (data access without DRQ, command
//! block writes while BSY) is counted rather than rejected so tests can
//! assert the driver never does it.

use std::collections::HashMap;
use std::string::String;
use std::sync::Arc;
use std::vec::Vec;

use spin::Mutex;

use super::bus::{BusDescriptor, Slot};
use super::regs::{ctrl, reg, Command, DeviceControl, DriveHead, ErrorBits, Status, WORDS_PER_SECTOR};
use crate::hal::port::PortIo;

const RDY: u8 = Status::RDY.bits();
const DRQ: u8 = Status::DRQ.bits();
const BSY: u8 = Status::BSY.bits();
const ERR: u8 = Status::ERR.bits();
const DF: u8 = Status::DF.bits();

/// Failure injected when the drive reaches a given sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// ERR with these error register bits
    Error(u8),
    /// DF (with ERR)
    DeviceFault,
    /// BSY never clears
    Stall,
}

/// A drive attached to the simulated channel
#[derive(Debug, Clone)]
pub struct SimDrive {
    packet: bool,
    quiet_abort: bool,
    lba48: bool,
    total_sectors: u64,
    model: String,
    busy_polls: u32,
    faults: HashMap<u64, SimFault>,
    sectors: HashMap<u64, [u16; WORDS_PER_SECTOR]>,
}

impl SimDrive {
    fn new(packet: bool, lba48: bool, total_sectors: u64) -> Self {
        Self {
            packet,
            quiet_abort: false,
            lba48,
            total_sectors,
            model: String::from("SIM HARDDISK"),
            busy_polls: 0,
            faults: HashMap::new(),
            sectors: HashMap::new(),
        }
    }

    /// 28-bit LBA drive
    pub fn ata(total_sectors: u64) -> Self {
        Self::new(false, false, total_sectors)
    }

    /// Drive advertising the 48-bit feature set
    pub fn ata48(total_sectors: u64) -> Self {
        Self::new(false, true, total_sectors)
    }

    /// ATA drive reporting no LBA capacity
    pub fn chs_only() -> Self {
        Self::new(false, false, 0)
    }

    /// Packet device that aborts IDENTIFY DEVICE
    pub fn atapi() -> Self {
        Self::new(true, false, 0)
    }

    /// Abort IDENTIFY leaving only the signature, without ERR
    pub fn quiet_abort(mut self) -> Self {
        self.quiet_abort = true;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = String::from(model);
        self
    }

    /// Status reads showing BSY before each command completes
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Fail when the sector at `lba` is transferred
    pub fn with_fault(mut self, lba: u64, fault: SimFault) -> Self {
        self.faults.insert(lba, fault);
        self
    }

    /// Contents of a never-written sector
    pub fn pattern(lba: u64) -> [u16; WORDS_PER_SECTOR] {
        let mut words = [0u16; WORDS_PER_SECTOR];
        for (i, word) in words.iter_mut().enumerate() {
            *word = (lba as u16).wrapping_mul(0x9E37) ^ (lba >> 16) as u16 ^ i as u16;
        }
        words
    }

    fn sector(&self, lba: u64) -> [u16; WORDS_PER_SECTOR] {
        self.sectors.get(&lba).copied().unwrap_or_else(|| Self::pattern(lba))
    }

    fn identify_words(&self) -> [u16; WORDS_PER_SECTOR] {
        let mut words = [0u16; WORDS_PER_SECTOR];
        put_string(&mut words[10..20], "QM00001");
        put_string(&mut words[23..27], "2.5+");
        put_string(&mut words[27..47], &self.model);
        words[49] = 1 << 9;
        let lba28 = self.total_sectors.min(0x0FFF_FFFF);
        words[60] = lba28 as u16;
        words[61] = (lba28 >> 16) as u16;
        if self.lba48 {
            words[83] = 1 << 10;
            for i in 0..4 {
                words[100 + i] = (self.total_sectors >> (16 * i)) as u16;
            }
        }
        words
    }
}

/// ASCII into IDENTIFY word order (first character in the high byte)
fn put_string(words: &mut [u16], text: &str) {
    let bytes = text.as_bytes();
    for (i, word) in words.iter_mut().enumerate() {
        let hi = bytes.get(i * 2).copied().unwrap_or(b' ');
        let lo = bytes.get(i * 2 + 1).copied().unwrap_or(b' ');
        *word = (hi as u16) << 8 | lo as u16;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Identify,
    PioIn { lba: u64, remaining: u32 },
    PioOut { lba: u64, remaining: u32 },
}

/// Per-drive status machine
#[derive(Debug, Clone, Copy)]
struct DriveState {
    status: u8,
    error: u8,
    busy_left: u32,
    after: u8,
}

impl DriveState {
    const IDLE: Self = Self { status: RDY, error: 0, busy_left: 0, after: RDY };

    /// Enter `status` after `polls` status reads (the last of which sees it)
    fn raise(&mut self, polls: u32, status: u8) {
        if polls == 0 {
            self.busy_left = 0;
            self.status = status;
        } else {
            self.busy_left = polls;
            self.status = BSY;
            self.after = status;
        }
    }

    fn busy(&self) -> bool {
        self.busy_left > 0 || self.status & BSY != 0
    }

    /// Regular status read: advances the busy countdown
    fn poll(&mut self) -> u8 {
        if self.busy_left > 0 {
            self.busy_left -= 1;
            if self.busy_left > 0 {
                return BSY;
            }
            self.status = self.after;
        }
        self.status
    }

    fn peek(&self) -> u8 {
        if self.busy_left > 0 {
            BSY
        } else {
            self.status
        }
    }
}

/// Task file register with its previous value (48-bit FIFO)
#[derive(Debug, Clone, Copy, Default)]
struct Fifo {
    cur: u8,
    hob: u8,
}

impl Fifo {
    fn push(&mut self, value: u8) {
        self.hob = self.cur;
        self.cur = value;
    }
}

#[derive(Debug)]
struct SimState {
    desc: BusDescriptor,
    drives: [Option<SimDrive>; 2],
    state: [DriveState; 2],
    floating: bool,
    reset_busy_polls: u32,

    count: Fifo,
    lba_lo: Fifo,
    lba_mid: Fifo,
    lba_hi: Fifo,
    drive_head: u8,
    device_control: u8,
    selected: usize,

    phase: Phase,
    data: Vec<u16>,
    data_pos: usize,

    status_reads: usize,
    alt_status_reads: usize,
    accesses: usize,
    commands: Vec<u8>,
    violations: usize,
}

impl SimState {
    fn new(desc: BusDescriptor) -> Self {
        Self {
            desc,
            drives: [None, None],
            state: [DriveState::IDLE; 2],
            floating: false,
            reset_busy_polls: 0,
            count: Fifo::default(),
            lba_lo: Fifo::default(),
            lba_mid: Fifo::default(),
            lba_hi: Fifo::default(),
            drive_head: 0xA0,
            device_control: 0,
            selected: 0,
            phase: Phase::Idle,
            data: Vec::new(),
            data_pos: 0,
            status_reads: 0,
            alt_status_reads: 0,
            accesses: 0,
            commands: Vec::new(),
            violations: 0,
        }
    }

    fn present(&self) -> bool {
        self.drives[self.selected].is_some()
    }

    fn drq(&self) -> bool {
        self.present() && self.state[self.selected].peek() & DRQ != 0
    }

    fn hob(&self) -> bool {
        self.device_control & DeviceControl::HOB.bits() != 0
    }

    fn fifo_read(&self, fifo: Fifo) -> u8 {
        if self.hob() {
            fifo.hob
        } else {
            fifo.cur
        }
    }

    fn read_command_block(&mut self, offset: u16) -> u8 {
        if self.floating {
            return Status::FLOATING;
        }
        let packet = self.drives[self.selected].as_ref().is_some_and(|d| d.packet);
        match offset {
            reg::STATUS => {
                self.status_reads += 1;
                if self.present() {
                    self.state[self.selected].poll()
                } else {
                    0
                }
            }
            reg::ERROR => self.state[self.selected].error,
            reg::SECTOR_COUNT => self.fifo_read(self.count),
            reg::LBA_LO => self.fifo_read(self.lba_lo),
            reg::LBA_MID if packet => 0x14,
            reg::LBA_HI if packet => 0xEB,
            reg::LBA_MID => self.fifo_read(self.lba_mid),
            reg::LBA_HI => self.fifo_read(self.lba_hi),
            reg::DRIVE_HEAD => self.drive_head,
            _ => {
                self.violations += 1;
                0
            }
        }
    }

    fn write_command_block(&mut self, offset: u16, value: u8) {
        if self.present() && self.state[self.selected].busy() {
            self.violations += 1;
        }
        match offset {
            reg::FEATURES => {}
            reg::SECTOR_COUNT => self.count.push(value),
            reg::LBA_LO => self.lba_lo.push(value),
            reg::LBA_MID => self.lba_mid.push(value),
            reg::LBA_HI => self.lba_hi.push(value),
            reg::DRIVE_HEAD => {
                self.drive_head = value;
                self.selected = usize::from(value & DriveHead::DRV.bits() != 0);
            }
            reg::COMMAND => self.command(value),
            _ => self.violations += 1,
        }
    }

    fn write_device_control(&mut self, value: u8) {
        let srst = DeviceControl::SRST.bits();
        let was_reset = self.device_control & srst != 0;
        self.device_control = value;

        if value & srst != 0 {
            for state in self.state.iter_mut() {
                *state = DriveState { status: BSY, error: 0, busy_left: 0, after: RDY };
            }
            self.phase = Phase::Idle;
        } else if was_reset {
            // The slave finishes its diagnostics before the master reports
            for (slot, state) in self.state.iter_mut().enumerate() {
                state.error = 0x01;
                let polls = if slot == 0 { self.reset_busy_polls } else { 0 };
                state.raise(polls, RDY);
            }
            self.lba_mid = Fifo::default();
            self.lba_hi = Fifo::default();
            self.selected = 0;
        }
    }

    fn abort(&mut self, bits: u8) {
        let slot = self.selected;
        self.phase = Phase::Idle;
        self.state[slot].error = bits;
        self.state[slot].raise(0, RDY | ERR);
    }

    fn fail(&mut self, fault: SimFault) {
        let slot = self.selected;
        self.phase = Phase::Idle;
        match fault {
            SimFault::Error(bits) => self.abort(bits),
            SimFault::DeviceFault => {
                self.state[slot].error = ErrorBits::ABRT.bits();
                self.state[slot].raise(0, RDY | DF | ERR);
            }
            SimFault::Stall => self.state[slot] = DriveState { status: BSY, busy_left: 0, ..self.state[slot] },
        }
    }

    /// Decode the task file for a read/write command
    fn range(&self, ext: bool) -> (u64, u32) {
        if ext {
            let lba = self.lba_lo.cur as u64
                | (self.lba_mid.cur as u64) << 8
                | (self.lba_hi.cur as u64) << 16
                | (self.lba_lo.hob as u64) << 24
                | (self.lba_mid.hob as u64) << 32
                | (self.lba_hi.hob as u64) << 40;
            let count = (self.count.hob as u32) << 8 | self.count.cur as u32;
            (lba, if count == 0 { 65536 } else { count })
        } else {
            let lba = self.lba_lo.cur as u64
                | (self.lba_mid.cur as u64) << 8
                | (self.lba_hi.cur as u64) << 16
                | ((self.drive_head & DriveHead::ADDR_HIGH.bits()) as u64) << 24;
            let count = self.count.cur as u32;
            (lba, if count == 0 { 256 } else { count })
        }
    }

    fn command(&mut self, opcode: u8) {
        self.commands.push(opcode);
        let slot = self.selected;
        let Some(drive) = self.drives[slot].as_ref() else {
            return;
        };
        let busy = drive.busy_polls;

        if drive.packet {
            self.state[slot].error = ErrorBits::ABRT.bits();
            let status = if drive.quiet_abort { RDY } else { RDY | ERR };
            self.state[slot].raise(busy, status);
            return;
        }

        const IDENTIFY: u8 = Command::Identify.opcode();
        const READ: u8 = Command::ReadSectors.opcode();
        const READ_EXT: u8 = Command::ReadSectorsExt.opcode();
        const WRITE: u8 = Command::WriteSectors.opcode();
        const WRITE_EXT: u8 = Command::WriteSectorsExt.opcode();
        const FLUSH: u8 = Command::CacheFlush.opcode();
        const FLUSH_EXT: u8 = Command::CacheFlushExt.opcode();

        match opcode {
            IDENTIFY => {
                self.data = drive.identify_words().to_vec();
                self.data_pos = 0;
                self.phase = Phase::Identify;
                self.state[slot].raise(busy, RDY | DRQ);
            }
            READ | READ_EXT | WRITE | WRITE_EXT => {
                let ext = matches!(opcode, READ_EXT | WRITE_EXT);
                if (ext && !drive.lba48) || self.drive_head & DriveHead::LBA.bits() == 0 {
                    return self.abort(ErrorBits::ABRT.bits());
                }
                let (lba, count) = self.range(ext);
                if lba + count as u64 > drive.total_sectors {
                    return self.abort(ErrorBits::IDNF.bits() | ErrorBits::ABRT.bits());
                }
                if matches!(opcode, READ | READ_EXT) {
                    self.phase = Phase::PioIn { lba, remaining: count };
                    self.present_sector(lba);
                } else {
                    self.phase = Phase::PioOut { lba, remaining: count };
                    self.data.clear();
                    self.state[slot].raise(busy, RDY | DRQ);
                }
            }
            FLUSH | FLUSH_EXT => self.state[slot].raise(busy, RDY),
            _ => self.abort(ErrorBits::ABRT.bits()),
        }
    }

    /// Load the next read sector into the data buffer, or fail on it
    fn present_sector(&mut self, lba: u64) {
        let slot = self.selected;
        let Some(drive) = self.drives[slot].as_ref() else {
            return;
        };
        if let Some(&fault) = drive.faults.get(&lba) {
            return self.fail(fault);
        }
        let busy = drive.busy_polls;
        self.data = drive.sector(lba).to_vec();
        self.data_pos = 0;
        self.state[slot].raise(busy, RDY | DRQ);
    }

    fn read_data(&mut self) -> u16 {
        if !self.drq() || self.data_pos >= self.data.len() {
            self.violations += 1;
            return 0;
        }
        let word = self.data[self.data_pos];
        self.data_pos += 1;
        if self.data_pos < self.data.len() {
            return word;
        }

        let slot = self.selected;
        match self.phase {
            Phase::PioIn { lba, remaining } if remaining > 1 => {
                self.phase = Phase::PioIn { lba: lba + 1, remaining: remaining - 1 };
                self.present_sector(lba + 1);
            }
            _ => {
                self.phase = Phase::Idle;
                self.state[slot].raise(0, RDY);
            }
        }
        word
    }

    fn write_data(&mut self, word: u16) {
        let Phase::PioOut { lba, remaining } = self.phase else {
            self.violations += 1;
            return;
        };
        if !self.drq() {
            self.violations += 1;
            return;
        }
        self.data.push(word);
        if self.data.len() < WORDS_PER_SECTOR {
            return;
        }

        let slot = self.selected;
        let Some(drive) = self.drives[slot].as_mut() else {
            return;
        };
        let mut sector = [0u16; WORDS_PER_SECTOR];
        sector.copy_from_slice(&self.data);
        self.data.clear();

        if let Some(&fault) = drive.faults.get(&lba) {
            return self.fail(fault);
        }
        drive.sectors.insert(lba, sector);
        let busy = drive.busy_polls;
        if remaining > 1 {
            self.phase = Phase::PioOut { lba: lba + 1, remaining: remaining - 1 };
            self.state[slot].raise(busy, RDY | DRQ);
        } else {
            self.phase = Phase::Idle;
            self.state[slot].raise(busy, RDY);
        }
    }

    fn read_u8(&mut self, port: u16) -> u8 {
        self.accesses += 1;
        let desc = self.desc;
        if (desc.command_base..desc.command_base + 8).contains(&port) {
            return self.read_command_block(port - desc.command_base);
        }
        match port.checked_sub(desc.control_base) {
            Some(ctrl::ALT_STATUS) => {
                self.alt_status_reads += 1;
                if self.floating {
                    Status::FLOATING
                } else if self.present() {
                    self.state[self.selected].peek()
                } else {
                    0
                }
            }
            Some(ctrl::DRIVE_ADDRESS) => 0xFF,
            _ => {
                self.violations += 1;
                0xFF
            }
        }
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.accesses += 1;
        let desc = self.desc;
        if (desc.command_base..desc.command_base + 8).contains(&port) {
            self.write_command_block(port - desc.command_base, value);
        } else if port == desc.control(ctrl::DEVICE_CONTROL) {
            self.write_device_control(value);
        } else {
            self.violations += 1;
        }
    }
}

/// Shared handle to a simulated channel; clones observe the same state
#[derive(Debug, Clone)]
pub struct SimPorts {
    state: Arc<Mutex<SimState>>,
}

impl SimPorts {
    /// Empty channel at `desc`
    pub fn new(desc: BusDescriptor) -> Self {
        Self { state: Arc::new(Mutex::new(SimState::new(desc))) }
    }

    pub fn with_drive(self, slot: Slot, drive: SimDrive) -> Self {
        self.state.lock().drives[slot.index()] = Some(drive);
        self
    }

    /// Status reads showing BSY after SRST is released
    pub fn with_reset_busy(self, polls: u32) -> Self {
        self.state.lock().reset_busy_polls = polls;
        self
    }

    /// Nothing attached: every register reads 0xFF
    pub fn floating(self) -> Self {
        self.state.lock().floating = true;
        self
    }

    /// Stored (or pattern) contents of a sector as bytes
    pub fn sector(&self, slot: Slot, lba: u64) -> Vec<u8> {
        let state = self.state.lock();
        let words = state.drives[slot.index()]
            .as_ref()
            .map_or_else(|| SimDrive::pattern(lba), |drive| drive.sector(lba));
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn protocol_violations(&self) -> usize {
        self.state.lock().violations
    }

    pub fn device_control(&self) -> u8 {
        self.state.lock().device_control
    }

    pub fn drive_head(&self) -> u8 {
        self.state.lock().drive_head
    }

    pub fn status_reads(&self) -> usize {
        self.state.lock().status_reads
    }

    pub fn alt_status_reads(&self) -> usize {
        self.state.lock().alt_status_reads
    }

    /// Every port read or write, data words included
    pub fn port_accesses(&self) -> usize {
        self.state.lock().accesses
    }

    /// Opcodes written to the command register, in order
    pub fn commands(&self) -> Vec<u8> {
        self.state.lock().commands.clone()
    }
}

impl PortIo for SimPorts {
    fn read_u8(&mut self, port: u16) -> u8 {
        self.state.lock().read_u8(port)
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.state.lock().write_u8(port, value)
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        let mut state = self.state.lock();
        state.accesses += 1;
        if port != state.desc.register(reg::DATA) {
            state.violations += 1;
            return 0xFFFF;
        }
        state.read_data()
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        let mut state = self.state.lock();
        state.accesses += 1;
        if port != state.desc.register(reg::DATA) {
            state.violations += 1;
            return;
        }
        state.write_data(value)
    }
}
