//! x86_64 architecture support
//!
//! - Port I/O (`in`/`out`) behind the HAL's `PortIo` trait

pub mod io;

pub use self::io::X86Ports;
