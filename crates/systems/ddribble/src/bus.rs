//! Double Dribble memory maps and register handlers

use crate::video::{Video, BG, FG, PALETTE_SIZE};
use arcade_core::address_space::{AddressSpace, AddressSpaceBuilder, Capability, PortHandler};
use arcade_core::board::Board;
use arcade_core::cpu::CpuId;
use arcade_core::interrupt::InterruptKind;
use arcade_core::logging::{log, LogCategory, LogLevel};
use arcade_core::memory::{BankId, Memory, RegionId};
use arcade_core::sound::{BusyLine, NullSoundDevice, SoundDevice};
use arcade_core::ConfigError;

pub const MAIN: CpuId = CpuId(0);
pub const SUB: CpuId = CpuId(1);
pub const SOUND: CpuId = CpuId(2);

/// Input port indices on the board
pub mod inputs {
    pub const DSW1: usize = 0;
    pub const P1: usize = 1;
    pub const P2: usize = 2;
    pub const SYSTEM: usize = 3;
    pub const DSW2: usize = 4;
    pub const DSW3: usize = 5;
    pub const COUNT: usize = 6;
}

/// YM2203 register numbers of its two I/O ports
const YM_PORT_A: u8 = 0x0E;
const YM_PORT_B: u8 = 0x0F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// 005885 register block of chip n
    VideoRegs(usize),
    /// Video RAM of chip n
    VideoRam(usize),
    Palette,
    Bank,
    Input(usize),
    CoinCounter,
    Watchdog,
    Ym2203,
    VlmData,
}

/// Handler state behind every `Port` of the three CPUs
pub struct DdribbleBus {
    pub video: Video,
    pub ym2203: Box<dyn SoundDevice>,
    pub vlm: Box<dyn SoundDevice>,
    vlm_busy: BusyLine,
    /// Last register number written to the YM2203 address port
    ym_address: u8,
    vlm_control: u8,
    bank: BankId,
    coin_latch: u8,
    coin_counters: [u32; 2],
    watchdog_kicks: u32,
}

impl DdribbleBus {
    pub fn new(video: Video, bank: BankId) -> Self {
        Self {
            video,
            ym2203: Box::new(NullSoundDevice::new("ym2203")),
            vlm: Box::new(NullSoundDevice::new("vlm5030")),
            vlm_busy: BusyLine {
                bit: 0,
                active_low: false,
            },
            ym_address: 0,
            vlm_control: 0,
            bank,
            coin_latch: 0,
            coin_counters: [0; 2],
            watchdog_kicks: 0,
        }
    }

    pub fn coin_counters(&self) -> [u32; 2] {
        self.coin_counters
    }

    pub fn watchdog_kicks(&self) -> u32 {
        self.watchdog_kicks
    }

    /// Last byte written to the VLM5030 control pins
    pub fn vlm_control(&self) -> u8 {
        self.vlm_control
    }

    pub fn reset(&mut self) {
        self.video.reset();
        self.ym2203.reset();
        self.vlm.reset();
        self.ym_address = 0;
        self.vlm_control = 0;
        self.coin_latch = 0;
    }

    fn read_ym2203(&mut self, offset: u32) -> u8 {
        if offset == 1 && self.ym_address == YM_PORT_A {
            return self.vlm_busy.sample(self.vlm.as_ref());
        }
        self.ym2203.read(offset)
    }

    fn write_ym2203(&mut self, offset: u32, data: u8) {
        if offset == 0 {
            self.ym_address = data;
        } else if self.ym_address == YM_PORT_B {
            // b6 RST, b5 ST, b4 VCU, b3 speech ROM bank
            self.vlm_control = data;
            self.vlm.write(1, data);
        }
        self.ym2203.write(offset, data);
    }

    fn write_coin_counters(&mut self, data: u8) {
        for (i, count) in self.coin_counters.iter_mut().enumerate() {
            let bit = 1 << i;
            if data & bit != 0 && self.coin_latch & bit == 0 {
                *count += 1;
            }
        }
        self.coin_latch = data;
        log(LogCategory::Stubs, LogLevel::Trace, || {
            format!("coin counters {:02X}", data)
        });
    }
}

impl PortHandler for DdribbleBus {
    type Port = Port;

    fn read_port(&mut self, port: Port, offset: u32, board: &mut Board) -> u8 {
        match port {
            Port::VideoRam(chip) => self.video.playfield.read_ram(chip, offset),
            Port::Palette => self.video.palette.read(offset as usize),
            Port::Input(index) => board.inputs.read_input_port(index),
            Port::Ym2203 => self.read_ym2203(offset),
            _ => board.open_bus,
        }
    }

    fn write_port(&mut self, port: Port, offset: u32, data: u8, board: &mut Board) {
        match port {
            Port::VideoRegs(chip) => {
                self.video.playfield.write_register(chip, offset, data);
                if offset == 4 {
                    let cpu = if chip == FG { MAIN } else { SUB };
                    board.irq.set_enabled(cpu, InterruptKind::Firq, data & 0x02 != 0);
                }
            }
            Port::VideoRam(chip) => self.video.playfield.write_ram(chip, offset, data),
            Port::Palette => self.video.palette.write(offset as usize, data),
            Port::Bank => board.memory.select_bank(self.bank, data),
            Port::CoinCounter => self.write_coin_counters(data),
            Port::Watchdog => {
                self.watchdog_kicks = self.watchdog_kicks.wrapping_add(1);
                log(LogCategory::Stubs, LogLevel::Trace, || "watchdog".to_string());
            }
            Port::Ym2203 => self.write_ym2203(offset, data),
            Port::VlmData => self.vlm.write(0, data),
            Port::Input(_) => {}
        }
    }
}

/// Regions the three address spaces map
#[derive(Debug, Clone, Copy)]
pub struct Regions {
    pub main_rom: RegionId,
    pub sub_rom: RegionId,
    pub sound_rom: RegionId,
    pub shared: RegionId,
    pub sound_shared: RegionId,
    pub sprites: [RegionId; 2],
    pub bank: BankId,
}

impl Regions {
    /// Add the board's RAM and the main ROM bank to `memory`
    pub fn add(
        memory: &mut Memory,
        main_rom: RegionId,
        sub_rom: RegionId,
        sound_rom: RegionId,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            main_rom,
            sub_rom,
            sound_rom,
            shared: memory.add_shared("sharedram", 0x2000),
            sound_shared: memory.add_shared("snd_sharedram", 0x0800),
            sprites: [
                memory.add_ram("spriteram_1", 0x1000),
                memory.add_ram("spriteram_2", 0x1000),
            ],
            // 16 pages of 8 KB from 0x10000 up
            bank: memory.add_bank("bank1", main_rom, 0x10000, 0x2000, 0x0F)?,
        })
    }
}

pub fn main_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("maincpu")
        .write(0x0000, 0x0004, Capability::Port(Port::VideoRegs(FG)))
        .write(0x0800, 0x0804, Capability::Port(Port::VideoRegs(BG)))
        .read_write(0x1800, 0x1800 + PALETTE_SIZE as u32 - 1, Capability::Port(Port::Palette))
        .read_write(0x2000, 0x2FFF, Capability::Port(Port::VideoRam(FG)))
        .read_write(0x3000, 0x3FFF, Capability::ram(r.sprites[FG]))
        .read_write(0x4000, 0x5FFF, Capability::ram(r.shared))
        .read_write(0x6000, 0x6FFF, Capability::Port(Port::VideoRam(BG)))
        .read_write(0x7000, 0x7FFF, Capability::ram(r.sprites[BG]))
        .write(0x8000, 0x8000, Capability::Port(Port::Bank))
        .read(0x8000, 0x9FFF, Capability::Banked(r.bank))
        .read(0xA000, 0xFFFF, Capability::Rom { region: r.main_rom, offset: 0xA000 })
        .build(memory)
}

pub fn sub_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("sub")
        .read_write(0x0000, 0x1FFF, Capability::ram(r.shared))
        .read_write(0x2000, 0x27FF, Capability::ram(r.sound_shared))
        .read(0x2800, 0x2800, Capability::Port(Port::Input(inputs::DSW1)))
        .read(0x2801, 0x2801, Capability::Port(Port::Input(inputs::P1)))
        .read(0x2802, 0x2802, Capability::Port(Port::Input(inputs::P2)))
        .read(0x2803, 0x2803, Capability::Port(Port::Input(inputs::SYSTEM)))
        .read(0x2C00, 0x2C00, Capability::Port(Port::Input(inputs::DSW2)))
        .read(0x3000, 0x3000, Capability::Port(Port::Input(inputs::DSW3)))
        .write(0x3400, 0x3400, Capability::Port(Port::CoinCounter))
        .write(0x3C00, 0x3C00, Capability::Port(Port::Watchdog))
        .read(0x8000, 0xFFFF, Capability::Rom { region: r.sub_rom, offset: 0x8000 })
        .build(memory)
}

pub fn sound_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("sound")
        .read_write(0x0000, 0x07FF, Capability::ram(r.sound_shared))
        .read_write(0x1000, 0x1001, Capability::Port(Port::Ym2203))
        .write(0x3000, 0x3000, Capability::Port(Port::VlmData))
        .read(0x8000, 0xFFFF, Capability::Rom { region: r.sound_rom, offset: 0x8000 })
        .build(memory)
}
