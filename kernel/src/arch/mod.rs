//! Architecture-specific code
//!
//! This module provides hardware port access for x86_64.

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
