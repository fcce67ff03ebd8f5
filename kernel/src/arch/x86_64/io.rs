//! x86_64 Port I/O Operations
//!
//! Hardware backend for [`PortIo`]: every access is a real `in`/`out`
//! instruction. Used by device drivers (ATA, serial) for register access.

use ::x86_64::instructions::port::Port;

use crate::hal::port::PortIo;

/// Direct access to the CPU's I/O port space
#[derive(Debug)]
pub struct X86Ports {
    _private: (),
}

impl X86Ports {
    /// Create a port I/O handle.
    ///
    /// # Safety
    ///
    /// The caller must run at an I/O privilege level that permits `in`/`out`
    /// and must be the only owner of the device registers reached through
    /// this handle.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortIo for X86Ports {
    #[inline]
    fn read_u8(&mut self, port: u16) -> u8 {
        let mut port: Port<u8> = Port::new(port);
        // SAFETY: I/O privilege and register ownership were asserted in `new`.
        unsafe { port.read() }
    }

    #[inline]
    fn write_u8(&mut self, port: u16, value: u8) {
        let mut port: Port<u8> = Port::new(port);
        // SAFETY: see `read_u8`.
        unsafe { port.write(value) }
    }

    #[inline]
    fn read_u16(&mut self, port: u16) -> u16 {
        let mut port: Port<u16> = Port::new(port);
        // SAFETY: see `read_u8`.
        unsafe { port.read() }
    }

    #[inline]
    fn write_u16(&mut self, port: u16, value: u16) {
        let mut port: Port<u16> = Port::new(port);
        // SAFETY: see `read_u8`.
        unsafe { port.write(value) }
    }

    #[inline]
    fn read_buffer_u16(&mut self, port: u16, buffer: &mut [u16]) {
        let mut port: Port<u16> = Port::new(port);
        for word in buffer.iter_mut() {
            // SAFETY: see `read_u8`.
            *word = unsafe { port.read() };
        }
    }

    #[inline]
    fn write_buffer_u16(&mut self, port: u16, buffer: &[u16]) {
        let mut port: Port<u16> = Port::new(port);
        for &word in buffer.iter() {
            // SAFETY: see `read_u8`.
            unsafe { port.write(word) };
        }
    }
}
