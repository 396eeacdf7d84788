//! Machine configuration errors.
//!
//! Everything in here is detected while the machine is being assembled,
//! before any CPU executes. Once a machine is running nothing in the core
//! returns an error: unmapped accesses hit the open bus, graphics indices
//! clamp and a handshake nobody answers simply stalls.

use thiserror::Error;

/// Which half of an address space a range belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{space} {direction} range {start:#06X}-{end:#06X} is inverted")]
    InvertedRange {
        space: String,
        direction: Direction,
        start: u32,
        end: u32,
    },

    #[error(
        "{space} {direction} range {start:#06X}-{end:#06X} overlaps {other_start:#06X}-{other_end:#06X}"
    )]
    Overlap {
        space: String,
        direction: Direction,
        start: u32,
        end: u32,
        other_start: u32,
        other_end: u32,
    },

    #[error(
        "{space} range {start:#06X}-{end:#06X} needs {needed:#X} bytes of region '{region}' but it holds {len:#X}"
    )]
    OutOfBounds {
        space: String,
        start: u32,
        end: u32,
        region: String,
        needed: usize,
        len: usize,
    },

    #[error(
        "bank '{bank}' selects up to {needed:#X} bytes of region '{region}' but it holds {len:#X}"
    )]
    BankOutOfBounds {
        bank: String,
        region: String,
        needed: usize,
        len: usize,
    },

    #[error("bank '{bank}' mask {mask:#04X} is not a contiguous low-bit mask")]
    BankMask { bank: String, mask: u8 },

    #[error(
        "{space} window {start:#06X}-{end:#06X} maps shared region '{region}' as {found:#X} bytes, region is {expected:#X}"
    )]
    SharedSizeMismatch {
        space: String,
        start: u32,
        end: u32,
        region: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown memory region '{0}'")]
    UnknownRegion(String),

    #[error("unknown cpu index {0}")]
    UnknownCpu(usize),

    #[error("board has {board} cpus but the configuration describes {config}")]
    CpuCountMismatch { board: usize, config: usize },

    #[error("gfx '{name}' layout needs {needed} bytes per element set, ROM holds {len}")]
    GfxLayout {
        name: String,
        needed: usize,
        len: usize,
    },

    #[error("invalid machine configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}


/// ROM loading failures, reported through a system's mount calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RomError {
    #[error("unknown mount point '{0}'")]
    UnknownMountPoint(String),

    #[error("ROM '{region}' must be {expected:#X} bytes, got {found:#X}")]
    Size {
        region: String,
        expected: usize,
        found: usize,
    },
}
