//! I/O Port Access
//!
//! Provides the abstraction every device driver uses for x86 I/O port
//! access:
//!
//! - **Input**: Read from I/O ports (INB, INW)
//! - **Output**: Write to I/O ports (OUTB, OUTW)
//! - **String I/O**: Block word transfers (INSW, OUTSW)
//!
//! Drivers are generic over [`PortIo`] so the same register protocol runs
//! against real hardware (`arch::x86_64::io::X86Ports`) or a simulated
//! device in host tests.
//!
//! # Port Ranges
//!
//! Ranges used by the HAL drivers:
//! - 0x170-0x177: Secondary IDE
//! - 0x1F0-0x1F7: Primary IDE
//! - 0x376: Secondary IDE control block
//! - 0x3F6: Primary IDE control block
//! - 0x3F8-0x3FF: COM1

/// Byte and word access to an I/O port space
///
/// Port numbers are absolute. Methods take `&mut self` because a port
/// access is a side effect on the device (reading STATUS acknowledges an
/// interrupt, reading DATA pops a FIFO).
pub trait PortIo {
    /// Read a byte from an I/O port
    fn read_u8(&mut self, port: u16) -> u8;

    /// Write a byte to an I/O port
    fn write_u8(&mut self, port: u16, value: u8);

    /// Read a word (16-bit) from an I/O port
    fn read_u16(&mut self, port: u16) -> u16;

    /// Write a word (16-bit) to an I/O port
    fn write_u16(&mut self, port: u16, value: u16);

    /// Read multiple words from one I/O port (REP INSW)
    #[inline]
    fn read_buffer_u16(&mut self, port: u16, buffer: &mut [u16]) {
        for word in buffer.iter_mut() {
            *word = self.read_u16(port);
        }
    }

    /// Write multiple words to one I/O port (REP OUTSW)
    #[inline]
    fn write_buffer_u16(&mut self, port: u16, buffer: &[u16]) {
        for &word in buffer.iter() {
            self.write_u16(port, word);
        }
    }
}

impl<P: PortIo + ?Sized> PortIo for &mut P {
    #[inline]
    fn read_u8(&mut self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    #[inline]
    fn write_u8(&mut self, port: u16, value: u8) {
        (**self).write_u8(port, value)
    }

    #[inline]
    fn read_u16(&mut self, port: u16) -> u16 {
        (**self).read_u16(port)
    }

    #[inline]
    fn write_u16(&mut self, port: u16, value: u16) {
        (**self).write_u16(port, value)
    }

    #[inline]
    fn read_buffer_u16(&mut self, port: u16, buffer: &mut [u16]) {
        (**self).read_buffer_u16(port, buffer)
    }

    #[inline]
    fn write_buffer_u16(&mut self, port: u16, buffer: &[u16]) {
        (**self).write_buffer_u16(port, buffer)
    }
}
