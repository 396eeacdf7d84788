//! Boundary to the sound chips.
//!
//! Chip models (YM2203, YM3812, VLM5030, OKIM6295, UPD7759 and friends)
//! are external. Register-bank handlers forward accesses to a
//! [`SoundDevice`] verbatim and never look inside it.

use crate::logging::{log, LogCategory, LogLevel};

pub trait SoundDevice {
    /// Write `data` to register/port `offset`
    fn write(&mut self, offset: u32, data: u8);

    /// Read register/status port `offset`
    fn read(&mut self, offset: u32) -> u8;

    /// State of the chip's busy output
    fn busy(&self) -> bool;

    fn reset(&mut self) {}
}

/// Stand-in for an unpopulated chip: reads 0, never busy.
#[derive(Debug, Default, Clone)]
pub struct NullSoundDevice {
    name: &'static str,
}

impl NullSoundDevice {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl SoundDevice for NullSoundDevice {
    fn write(&mut self, offset: u32, data: u8) {
        log(LogCategory::Sound, LogLevel::Trace, || {
            format!("{} <- [{:X}] = {:02X}", self.name, offset, data)
        });
    }

    fn read(&mut self, _offset: u32) -> u8 {
        0
    }

    fn busy(&self) -> bool {
        false
    }
}

/// A speech chip's BUSY pin wired to one bit of an input port.
///
/// Boards read the pin through some other device's port (the VLM5030 busy
/// line reaches the Double Dribble sound CPU through YM2203 port A). The
/// bit reflects the device's real busy output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyLine {
    pub bit: u8,
    /// Set when the pin reads 0 while busy
    pub active_low: bool,
}

impl BusyLine {
    pub fn sample(&self, device: &dyn SoundDevice) -> u8 {
        let high = device.busy() != self.active_low;
        if high {
            1 << self.bit
        } else {
            0
        }
    }
}
