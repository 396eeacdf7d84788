//! Command/result latch between a primary CPU and a secondary CPU.
//!
//! The primary writes a command byte and the secondary answers with a
//! result byte. Two pending bits track who owes a read:
//!
//! - bit 0: a command is pending for the secondary
//! - bit 1: a result is pending for the primary
//!
//! Reads clear their bit. Reading again after that returns the same byte
//! with no further effect. Nothing times out: a command nobody reads stays
//! pending for as long as the emulated program leaves it there.

use crate::logging::{log, LogCategory, LogLevel};

pub const PENDING_FOR_SECONDARY: u8 = 0x01;
pub const PENDING_FOR_PRIMARY: u8 = 0x02;

/// Protocol state as seen through the pending bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    CommandPendingForSecondary,
    ResultPendingForPrimary,
    /// A new command went out before the previous result was collected
    Both,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundLatchHandshake {
    command: u8,
    result: u8,
    pending: u8,
    /// XORed into the status byte; a per-board wiring detail
    invert: u8,
}

impl SoundLatchHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// A latch whose status port reads the pending bits inverted by `mask`
    pub fn with_status_invert(mask: u8) -> Self {
        Self {
            invert: mask,
            ..Self::default()
        }
    }

    /// Primary CPU writes a command
    pub fn write_command(&mut self, data: u8) {
        self.command = data;
        self.pending |= PENDING_FOR_SECONDARY;
        log(LogCategory::Handshake, LogLevel::Trace, || {
            format!("command {:02X} -> secondary", data)
        });
    }

    /// Secondary CPU reads the command
    pub fn read_command(&mut self) -> u8 {
        self.pending &= !PENDING_FOR_SECONDARY;
        self.command
    }

    /// Secondary CPU writes a result
    pub fn write_result(&mut self, data: u8) {
        self.result = data;
        self.pending |= PENDING_FOR_PRIMARY;
        log(LogCategory::Handshake, LogLevel::Trace, || {
            format!("result {:02X} -> primary", data)
        });
    }

    /// Primary CPU reads the result
    pub fn read_result(&mut self) -> u8 {
        self.pending &= !PENDING_FOR_PRIMARY;
        self.result
    }

    /// Status port: the pending bits XOR the board's invert mask
    pub fn status(&self) -> u8 {
        self.pending ^ self.invert
    }

    pub fn pending(&self) -> u8 {
        self.pending
    }

    pub fn phase(&self) -> HandshakePhase {
        match self.pending & 0x03 {
            0 => HandshakePhase::Idle,
            PENDING_FOR_SECONDARY => HandshakePhase::CommandPendingForSecondary,
            PENDING_FOR_PRIMARY => HandshakePhase::ResultPendingForPrimary,
            _ => HandshakePhase::Both,
        }
    }

    /// Machine reset: latches and pending bits clear, wiring stays.
    pub fn reset(&mut self) {
        *self = Self::with_status_invert(self.invert);
    }
}
