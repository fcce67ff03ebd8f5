//! Hardware Abstraction Layer (hal)
//!
//! Device access shared by the kernel's drivers:
//!
//! - **Ports**: The `PortIo` trait every driver performs register access
//!   through
//! - **ATA**: PIO disk driver for the legacy IDE channels

pub mod ata;
pub mod port;
