//! Tumblepop memory maps and register handlers

use crate::video::{Video, PALETTE_SIZE, PF_RAM_SIZE};
use arcade_core::address_space::{AddressSpace, AddressSpaceBuilder, Capability, PortHandler};
use arcade_core::board::Board;
use arcade_core::cpu::CpuId;
use arcade_core::handshake::SoundLatchHandshake;
use arcade_core::interrupt::{InterruptKind, LineState};
use arcade_core::memory::{Memory, RegionId};
use arcade_core::sound::{NullSoundDevice, SoundDevice};
use arcade_core::ConfigError;

pub const MAIN: CpuId = CpuId(0);
pub const SOUND: CpuId = CpuId(1);

/// Input port indices on the board
pub mod inputs {
    pub const P1: usize = 0;
    pub const P2: usize = 1;
    pub const COIN: usize = 2;
    pub const DSW1: usize = 3;
    pub const DSW2: usize = 4;
    pub const COUNT: usize = 5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    SoundCommand,
    Palette,
    /// Input words at 0x180000
    Inputs,
    Control,
    Pf1Ram,
    Pf2Ram,
    SoundLatch,
    Ym2151,
    Oki,
}

/// Handler state behind every `Port` of both CPUs
pub struct TumblepBus {
    pub video: Video,
    pub latch: SoundLatchHandshake,
    pub ym2151: Box<dyn SoundDevice>,
    pub oki: Box<dyn SoundDevice>,
}

impl TumblepBus {
    pub fn new(video: Video) -> Self {
        Self {
            video,
            latch: SoundLatchHandshake::new(),
            ym2151: Box::new(NullSoundDevice::new("ym2151")),
            oki: Box::new(NullSoundDevice::new("okim6295")),
        }
    }

    pub fn reset(&mut self) {
        self.video.reset();
        self.latch.reset();
        self.ym2151.reset();
        self.oki.reset();
    }

    /// Input word `index`: both joysticks, then both DIP banks, then the
    /// coin port
    fn input_word(index: u32, board: &Board) -> u16 {
        let port = |n: usize| board.inputs.read_input_port(n) as u16;
        match index {
            0 => (port(inputs::P2) << 8) | port(inputs::P1),
            1 => (port(inputs::DSW2) << 8) | port(inputs::DSW1),
            4 => port(inputs::COIN),
            5 | 6 => 0,
            _ => 0xFFFF,
        }
    }

    /// Low byte of the command word to the HuC6280, which takes IRQ1
    fn write_sound_command(&mut self, offset: u32, data: u8, board: &mut Board) {
        if offset & 1 == 0 {
            return;
        }
        self.latch.write_command(data);
        board.irq.set_line(SOUND, InterruptKind::Irq(1), LineState::Hold);
    }
}

impl PortHandler for TumblepBus {
    type Port = Port;

    fn read_port(&mut self, port: Port, offset: u32, board: &mut Board) -> u8 {
        match port {
            Port::Palette => self.video.palette.read(offset as usize),
            Port::Inputs => {
                let word = Self::input_word(offset / 2, board);
                if offset & 1 == 0 {
                    (word >> 8) as u8
                } else {
                    word as u8
                }
            }
            Port::Pf1Ram => self.video.playfield.read_pf1_ram(offset),
            Port::Pf2Ram => self.video.playfield.read_pf2_ram(offset),
            Port::SoundLatch => self.latch.read_command(),
            Port::Ym2151 => self.ym2151.read(offset),
            Port::Oki => self.oki.read(0),
            _ => board.open_bus,
        }
    }

    fn write_port(&mut self, port: Port, offset: u32, data: u8, board: &mut Board) {
        match port {
            Port::SoundCommand => self.write_sound_command(offset, data, board),
            Port::Palette => self.video.palette.write(offset as usize, data),
            Port::Control => self.video.playfield.write_control(offset, data),
            Port::Pf1Ram => self.video.playfield.write_pf1_ram(offset, data),
            Port::Pf2Ram => self.video.playfield.write_pf2_ram(offset, data),
            Port::Ym2151 => self.ym2151.write(offset, data),
            Port::Oki => self.oki.write(0, data),
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
            sound_ram: memory.add_ram("sound_ram", 0x2000),
        }
    }
}

pub fn main_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    let pf_end = |start: u32| start + PF_RAM_SIZE as u32 - 1;
    AddressSpaceBuilder::new("maincpu")
        .read(0x000000, 0x07FFFF, Capability::rom(r.main_rom))
        .write(0x100000, 0x100001, Capability::Port(Port::SoundCommand))
        .read_write(0x120000, 0x123FFF, Capability::ram(r.work_ram))
        .read_write(0x140000, 0x140000 + PALETTE_SIZE as u32 - 1, Capability::Port(Port::Palette))
        .read(0x180000, 0x18000F, Capability::Port(Port::Inputs))
        .write(0x18000C, 0x18000D, Capability::Nop)
        .read_write(0x1A0000, 0x1A07FF, Capability::ram(r.sprite_ram))
        .write(0x300000, 0x30000F, Capability::Port(Port::Control))
        .read_write(0x320000, pf_end(0x320000), Capability::Port(Port::Pf1Ram))
        .read_write(0x322000, pf_end(0x322000), Capability::Port(Port::Pf2Ram))
        // Row and column scroll RAM, never enabled by the game
        .read_write(0x340000, 0x3401FF, Capability::Nop)
        .write(0x340400, 0x34047F, Capability::Nop)
        .write(0x342000, 0x3421FF, Capability::Nop)
        .write(0x342400, 0x34247F, Capability::Nop)
        .build(memory)
}

/// HuC6280 physical (21-bit) address space
pub fn sound_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("audiocpu")
        .read(0x000000, 0x00FFFF, Capability::rom(r.sound_rom))
        // YM2203 and second OKI sockets, unpopulated
        .read_write(0x100000, 0x100001, Capability::Nop)
        .read_write(0x110000, 0x110001, Capability::Port(Port::Ym2151))
        .read_write(0x120000, 0x120001, Capability::Port(Port::Oki))
        .read_write(0x130000, 0x130001, Capability::Nop)
        .read(0x140000, 0x140001, Capability::Port(Port::SoundLatch))
        .read_write(0x1F0000, 0x1F1FFF, Capability::ram(r.sound_ram))
        // Timer and interrupt mask live inside the CPU
        .write(0x1FEC00, 0x1FEC01, Capability::Nop)
        .write(0x1FF402, 0x1FF403, Capability::Nop)
        .build(memory)
}
