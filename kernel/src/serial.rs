//! Serial port output for debugging
//!
//! Log records go to COM1 (0x3F8), which QEMU exposes as its serial
//! console. The UART is assumed to be initialized by firmware.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use crate::hal::port::PortIo;

/// COM1 port address
pub const COM1: u16 = 0x3F8;

/// Line status register offset
const LINE_STATUS: u16 = 5;
/// Transmit holding register empty
const LSR_THR_EMPTY: u8 = 0x20;

/// 16550 UART transmitter
pub struct SerialPort<P> {
    base: u16,
    ports: P,
}

impl<P: PortIo> SerialPort<P> {
    pub const fn new(base: u16, ports: P) -> Self {
        Self { base, ports }
    }

    /// Write a byte once the transmit buffer is empty
    fn write_byte(&mut self, byte: u8) {
        while self.ports.read_u8(self.base + LINE_STATUS) & LSR_THR_EMPTY == 0 {
            core::hint::spin_loop();
        }
        self.ports.write_u8(self.base, byte);
    }
}

impl<P: PortIo> Write for SerialPort<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

/// `log` backend writing one line per record to a serial port
pub struct SerialLogger<P> {
    port: Mutex<SerialPort<P>>,
    level: LevelFilter,
}

impl<P: PortIo> SerialLogger<P> {
    pub const fn new(port: SerialPort<P>, level: LevelFilter) -> Self {
        Self {
            port: Mutex::new(port),
            level,
        }
    }
}

impl<P: PortIo + Send> Log for SerialLogger<P> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Nowhere to report a failed debug write
        let _ = writeln!(self.port.lock(), "[{:<5}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "x86_64")]
static LOGGER: SerialLogger<crate::arch::x86_64::X86Ports> = SerialLogger::new(
    // SAFETY: the logger is the only user of the COM1 registers.
    SerialPort::new(COM1, unsafe { crate::arch::x86_64::X86Ports::new() }),
    LevelFilter::Trace,
);

/// Install the COM1 logger and set the global level
#[cfg(target_arch = "x86_64")]
pub fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
