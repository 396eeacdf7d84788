//! Prehistoric Isle memory maps and register handlers

use crate::video::{Video, BG, FG, FG_RAM_SIZE, PALETTE_SIZE, TX_RAM_SIZE};
use arcade_core::address_space::{AddressSpace, AddressSpaceBuilder, Capability, PortHandler};
use arcade_core::board::Board;
use arcade_core::cpu::CpuId;
use arcade_core::handshake::SoundLatchHandshake;
use arcade_core::interrupt::{InterruptKind, LineState};
use arcade_core::logging::{log, LogCategory, LogLevel};
use arcade_core::memory::{Memory, RegionId};
use arcade_core::sound::{BusyLine, NullSoundDevice, SoundDevice};
use arcade_core::video::WordRegisters;
use arcade_core::ConfigError;

pub const MAIN: CpuId = CpuId(0);
pub const SOUND: CpuId = CpuId(1);

/// Input port indices on the board
pub mod inputs {
    pub const P1: usize = 0;
    pub const P2: usize = 1;
    pub const COIN: usize = 2;
    pub const DSW0: usize = 3;
    /// DIP switches and VBLANK
    pub const DSW1: usize = 4;
    pub const COUNT: usize = 5;
}

/// Word registers of the control block at 0x0F0000
mod reg {
    pub const BG_SCROLL_Y: usize = 0x00;
    pub const BG_SCROLL_X: usize = 0x08;
    pub const FG_SCROLL_Y: usize = 0x10;
    pub const FG_SCROLL_X: usize = 0x18;
    pub const INVERT_CONTROLS: usize = 0x23;
    pub const COIN_COUNTER_1: usize = 0x28;
    pub const COIN_COUNTER_2: usize = 0x29;
    pub const FLIP_SCREEN: usize = 0x30;
    pub const COUNT: usize = 0x38;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    TxRam,
    FgRam,
    Palette,
    /// Input words at 0x0E0000
    Inputs,
    Control,
    SoundCommand,
    SoundLatch,
    /// YM3812 status and address
    Ym3812,
    Ym3812Data,
    /// UPD7759 sample number; reads the BUSY pin
    UpdPort,
    UpdReset,
}

/// Handler state behind every `Port` of both CPUs
pub struct PrehisleBus {
    pub video: Video,
    pub latch: SoundLatchHandshake,
    pub ym3812: Box<dyn SoundDevice>,
    pub upd7759: Box<dyn SoundDevice>,
    upd_busy: BusyLine,
    control: WordRegisters,
    invert_controls: u8,
    coin_latch: [bool; 2],
    coin_counters: [u32; 2],
}

impl PrehisleBus {
    pub fn new(video: Video) -> Self {
        Self {
            video,
            latch: SoundLatchHandshake::new(),
            ym3812: Box::new(NullSoundDevice::new("ym3812")),
            upd7759: Box::new(NullSoundDevice::new("upd7759")),
            // BUSY pin, low while a sample plays
            upd_busy: BusyLine {
                bit: 0,
                active_low: true,
            },
            control: WordRegisters::new(reg::COUNT),
            invert_controls: 0,
            coin_latch: [false; 2],
            coin_counters: [0; 2],
        }
    }

    pub fn coin_counters(&self) -> [u32; 2] {
        self.coin_counters
    }

    pub fn reset(&mut self) {
        self.video.reset();
        self.latch.reset();
        self.ym3812.reset();
        self.upd7759.reset();
        self.control.reset();
        self.invert_controls = 0;
        self.coin_latch = [false; 2];
    }

    /// Input word `index` of the block at 0x0E0000, high byte pulled up
    fn input_word(&self, index: u32, board: &Board) -> u16 {
        let port = |n: usize| 0xFF00 | board.inputs.read_input_port(n) as u16;
        match index {
            0x08 => port(inputs::P2),
            0x10 => port(inputs::COIN),
            0x20 => port(inputs::P1) ^ self.invert_controls as u16,
            0x21 => port(inputs::DSW0),
            0x22 => port(inputs::DSW1),
            _ => 0,
        }
    }

    fn write_control(&mut self, offset: u32, data: u8) {
        let Some((index, value)) = self.control.write(offset, data) else {
            return;
        };
        let playfield = &mut self.video.playfield;
        match index {
            reg::BG_SCROLL_Y => playfield.regs[BG].set_scroll_y(value),
            reg::BG_SCROLL_X => playfield.regs[BG].set_scroll_x(value),
            reg::FG_SCROLL_Y => playfield.regs[FG].set_scroll_y(value),
            reg::FG_SCROLL_X => playfield.regs[FG].set_scroll_x(value),
            reg::INVERT_CONTROLS => self.invert_controls = if value != 0 { 0xFF } else { 0x00 },
            reg::COIN_COUNTER_1 | reg::COIN_COUNTER_2 => {
                let n = index - reg::COIN_COUNTER_1;
                let on = value & 1 != 0;
                if on && !self.coin_latch[n] {
                    self.coin_counters[n] += 1;
                }
                self.coin_latch[n] = on;
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("coin counter {} {}", n + 1, on)
                });
            }
            reg::FLIP_SCREEN => playfield.set_flip_screen(value & 1 != 0),
            _ => {}
        }
    }

    /// Command byte to the Z80, which takes an NMI at once
    fn write_sound_command(&mut self, offset: u32, data: u8, board: &mut Board) {
        if offset & 1 == 0 {
            return;
        }
        self.latch.write_command(data);
        board.irq.set_line(SOUND, InterruptKind::Nmi, LineState::Hold);
    }
}

impl PortHandler for PrehisleBus {
    type Port = Port;

    fn read_port(&mut self, port: Port, offset: u32, board: &mut Board) -> u8 {
        match port {
            Port::TxRam => self.video.playfield.read_tx_ram(offset),
            Port::FgRam => self.video.playfield.read_fg_ram(offset),
            Port::Palette => self.video.palette.read(offset as usize),
            Port::Inputs => {
                let word = self.input_word(offset / 2, board);
                if offset & 1 == 0 {
                    (word >> 8) as u8
                } else {
                    word as u8
                }
            }
            Port::SoundLatch => self.latch.read_command(),
            Port::Ym3812 => self.ym3812.read(0),
            Port::UpdPort => self.upd_busy.sample(self.upd7759.as_ref()),
            _ => board.open_bus,
        }
    }

    fn write_port(&mut self, port: Port, offset: u32, data: u8, board: &mut Board) {
        match port {
            Port::TxRam => self.video.playfield.write_tx_ram(offset, data),
            Port::FgRam => self.video.playfield.write_fg_ram(offset, data),
            Port::Palette => self.video.palette.write(offset as usize, data),
            Port::Control => self.write_control(offset, data),
            Port::SoundCommand => self.write_sound_command(offset, data, board),
            Port::Ym3812 => self.ym3812.write(0, data),
            Port::Ym3812Data => self.ym3812.write(1, data),
            // Sample number, then the start strobe
            Port::UpdPort => self.upd7759.write(0, data),
            Port::UpdReset => self.upd7759.write(1, data),
            Port::Inputs | Port::SoundLatch => {}
        }
    }
}

/// Regions the address spaces map
#[derive(Debug, Clone, Copy)]
pub struct Regions {
    pub main_rom: RegionId,
    pub sound_rom: RegionId,
    pub work_ram: RegionId,
    pub sprite_ram: RegionId,
    pub sound_ram: RegionId,
}

impl Regions {
    pub fn add(memory: &mut Memory, main_rom: RegionId, sound_rom: RegionId) -> Self {
        Self {
            main_rom,
            sound_rom,
            work_ram: memory.add_ram("ram", 0x4000),
            sprite_ram: memory.add_ram("spriteram", 0x800),
            sound_ram: memory.add_ram("sound_ram", 0x800),
        }
    }
}

pub fn main_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("maincpu")
        .read(0x000000, 0x03FFFF, Capability::rom(r.main_rom))
        .read_write(0x070000, 0x073FFF, Capability::ram(r.work_ram))
        .read_write(0x090000, 0x090000 + TX_RAM_SIZE as u32 - 1, Capability::Port(Port::TxRam))
        .read_write(0x0A0000, 0x0A07FF, Capability::ram(r.sprite_ram))
        .read_write(0x0B0000, 0x0B0000 + FG_RAM_SIZE as u32 - 1, Capability::Port(Port::FgRam))
        .read_write(0x0D0000, 0x0D0000 + PALETTE_SIZE as u32 - 1, Capability::Port(Port::Palette))
        .read(0x0E0000, 0x0E00FF, Capability::Port(Port::Inputs))
        .write(0x0F0000, 0x0F006F, Capability::Port(Port::Control))
        .write(0x0F0070, 0x0F0071, Capability::Port(Port::SoundCommand))
        .build(memory)
}

pub fn sound_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("audiocpu")
        .read(0x0000, 0xEFFF, Capability::rom(r.sound_rom))
        .read_write(0xF000, 0xF7FF, Capability::ram(r.sound_ram))
        .read(0xF800, 0xF800, Capability::Port(Port::SoundLatch))
        .write(0xF800, 0xF800, Capability::Nop)
        .build(memory)
}

pub fn sound_io_map(memory: &Memory) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("audiocpu io")
        .read_write(0x00, 0x00, Capability::Port(Port::Ym3812))
        .write(0x20, 0x20, Capability::Port(Port::Ym3812Data))
        .read_write(0x40, 0x40, Capability::Port(Port::UpdPort))
        .write(0x80, 0x80, Capability::Port(Port::UpdReset))
        .build(memory)
}
