//! ATA error taxonomy
//!
//! Decodes the error register and failure status bits into the kinds the
//! rest of the kernel sees. Nothing here is fatal to the driver: the worst
//! outcome is a drive marked unusable for the session.

use core::fmt;

use super::regs::{ErrorBits, Status};

/// Error register conditions
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolError {
    /// Address mark not found
    AMNF,
    /// Track zero not found
    TKZNF,
    /// Command aborted
    ABRT,
    /// Media change requested
    MCR,
    /// Sector ID not found
    IDNF,
    /// Media changed
    MC,
    /// Uncorrectable data error
    UNC,
    /// Bad block
    BBK,
}

/// Decode order when several error bits are set. ABRT comes last because
/// drives raise it alongside the condition that caused the abort.
const DECODE_ORDER: [(ErrorBits, ProtocolError); 8] = [
    (ErrorBits::BBK, ProtocolError::BBK),
    (ErrorBits::UNC, ProtocolError::UNC),
    (ErrorBits::IDNF, ProtocolError::IDNF),
    (ErrorBits::AMNF, ProtocolError::AMNF),
    (ErrorBits::TKZNF, ProtocolError::TKZNF),
    (ErrorBits::MC, ProtocolError::MC),
    (ErrorBits::MCR, ProtocolError::MCR),
    (ErrorBits::ABRT, ProtocolError::ABRT),
];

impl ProtocolError {
    /// Decode a raw error register value.
    ///
    /// An empty register with ERR set still means the command did not
    /// complete, so it decodes as ABRT.
    pub fn decode(raw: u8) -> Self {
        let bits = ErrorBits::from_bits_retain(raw);
        DECODE_ORDER
            .iter()
            .find(|(bit, _)| bits.contains(*bit))
            .map(|&(_, kind)| kind)
            .unwrap_or(ProtocolError::ABRT)
    }

    pub const fn description(self) -> &'static str {
        match self {
            ProtocolError::AMNF => "address mark not found",
            ProtocolError::TKZNF => "track zero not found",
            ProtocolError::ABRT => "command aborted",
            ProtocolError::MCR => "media change requested",
            ProtocolError::IDNF => "sector ID not found",
            ProtocolError::MC => "media changed",
            ProtocolError::UNC => "uncorrectable data error",
            ProtocolError::BBK => "bad block",
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Why a request against a drive failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Slot was empty at probe time
    NoDevice,
    /// Packet (ATAPI) device; PIO-ATA transfers are not attempted
    NotAta,
    /// ATA drive without LBA addressing
    Unusable,
    /// Poll budget exhausted
    Timeout,
    /// Error register reported a failure
    Protocol(ProtocolError),
    /// DF set in status: controller-level failure
    DeviceFault,
    /// Request extends past the end of the drive
    OutOfRange,
    /// Caller buffer shorter than the requested sectors
    BufferTooSmall,
    /// Global driver used before `init`
    NotInitialized,
}

impl ErrorKind {
    /// Classify a status that ended a poll. `error` is only read when ERR
    /// is set; DF takes precedence.
    pub fn from_status(status: Status, error: impl FnOnce() -> u8) -> Option<Self> {
        if status.contains(Status::DF) {
            Some(ErrorKind::DeviceFault)
        } else if status.contains(Status::ERR) {
            Some(ErrorKind::Protocol(ProtocolError::decode(error())))
        } else {
            None
        }
    }
}

impl From<ProtocolError> for ErrorKind {
    fn from(error: ProtocolError) -> Self {
        ErrorKind::Protocol(error)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NoDevice => f.write_str("no device"),
            ErrorKind::NotAta => f.write_str("not an ATA device"),
            ErrorKind::Unusable => f.write_str("drive has no LBA addressing"),
            ErrorKind::Timeout => f.write_str("timed out"),
            ErrorKind::Protocol(error) => write!(f, "protocol error: {}", error),
            ErrorKind::DeviceFault => f.write_str("device fault"),
            ErrorKind::OutOfRange => f.write_str("sector range out of bounds"),
            ErrorKind::BufferTooSmall => f.write_str("buffer too small"),
            ErrorKind::NotInitialized => f.write_str("driver not initialized"),
        }
    }
}

/// A failed transfer and how far it got
///
/// Sectors `0..sectors_completed` of the request were transferred before
/// the failure; a caller can retry only the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoError {
    pub kind: ErrorKind,
    pub sectors_completed: u32,
}

impl IoError {
    pub const fn new(kind: ErrorKind, sectors_completed: u32) -> Self {
        Self { kind, sectors_completed }
    }

    /// Failure before any sector moved
    pub const fn rejected(kind: ErrorKind) -> Self {
        Self::new(kind, 0)
    }
}

impl From<ErrorKind> for IoError {
    fn from(kind: ErrorKind) -> Self {
        Self::rejected(kind)
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} sector(s)", self.kind, self.sectors_completed)
    }
}
