//! Per-layer video registers as the CPU sees them.

/// Scroll, bank select and control latches of one layer.
///
/// The scroll X register is often 9 bits wide, with bit 8 in a separate
/// byte; [`LayerRegisters::set_scroll_x_high`] writes that bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerRegisters {
    scroll_x: u16,
    scroll_y: u16,
    bank: u8,
    pub control: u8,
}

impl LayerRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_x(&self) -> u16 {
        self.scroll_x
    }

    pub fn scroll_y(&self) -> u16 {
        self.scroll_y
    }

    pub fn set_scroll_x(&mut self, value: u16) {
        self.scroll_x = value;
    }

    pub fn set_scroll_x_low(&mut self, data: u8) {
        self.scroll_x = (self.scroll_x & 0xFF00) | data as u16;
    }

    /// Bit 0 of `data` becomes scroll X bit 8
    pub fn set_scroll_x_high(&mut self, data: u8) {
        self.scroll_x = (self.scroll_x & 0x00FF) | (((data & 0x01) as u16) << 8);
    }

    pub fn set_scroll_y(&mut self, value: u16) {
        self.scroll_y = value;
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// Latch a new bank select; `true` when it differs from the old one and
    /// the layer's cached tiles are stale.
    pub fn set_bank(&mut self, bank: u8) -> bool {
        let changed = self.bank != bank;
        self.bank = bank;
        changed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 16-bit registers behind a byte-wide bus, high byte at the even address.
///
/// 68000 boards decode their control registers as words; a byte write
/// replaces one half and the register takes the merged value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRegisters {
    words: Vec<u16>,
}

impl WordRegisters {
    pub fn new(count: usize) -> Self {
        Self {
            words: vec![0; count],
        }
    }

    /// Merge a byte write at byte `offset`. Returns the register index and
    /// its new value, or `None` past the last register.
    pub fn write(&mut self, offset: u32, data: u8) -> Option<(usize, u16)> {
        let index = (offset / 2) as usize;
        let word = self.words.get_mut(index)?;
        *word = if offset & 1 == 0 {
            (*word & 0x00FF) | ((data as u16) << 8)
        } else {
            (*word & 0xFF00) | data as u16
        };
        Some((index, *word))
    }

    pub fn word(&self, index: usize) -> u16 {
        self.words.get(index).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.words.fill(0);
    }
}

/// Big-endian word `index` of `ram`; 0 past the end
pub fn read_word(ram: &[u8], index: usize) -> u16 {
    let at = |i: usize| ram.get(i).copied().unwrap_or(0) as u16;
    (at(index * 2) << 8) | at(index * 2 + 1)
}
