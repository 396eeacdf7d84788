//! Land Sea Air Squad memory maps and register handlers

use arcade_core::address_space::{AddressSpace, AddressSpaceBuilder, Capability, PortHandler};
use arcade_core::board::Board;
use arcade_core::cpu::CpuId;
use arcade_core::handshake::SoundLatchHandshake;
use arcade_core::interrupt::{InterruptKind, LineState, NmiLatch};
use arcade_core::logging::{log, LogCategory, LogLevel};
use arcade_core::mcu::{McuEvent, McuLink, McuStrobes};
use arcade_core::memory::{BankId, Memory, RegionId};
use arcade_core::sound::{NullSoundDevice, SoundDevice};
use arcade_core::ConfigError;

pub const MAIN: CpuId = CpuId(0);
pub const SOUND: CpuId = CpuId(1);
pub const MCU: CpuId = CpuId(2);

/// Input port indices on the board
pub mod inputs {
    pub const DSWA: usize = 0;
    pub const DSWB: usize = 1;
    pub const DSWC: usize = 2;
    /// Coins and tilt; bits 0-1 are replaced by the MCU handshake flags
    pub const COINS: usize = 3;
    pub const P1: usize = 4;
    pub const P2: usize = 5;
    pub const START: usize = 6;
    pub const SERVICE: usize = 7;
    pub const COUNT: usize = 8;
}

/// Bank register bit that flips the screen
const FLIP_SCREEN: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Input(usize),
    McuStatus,
    Bank,
    /// Main side of the sound latch: result in, command out
    SoundLatch,
    SoundStatus,
    /// Main side of the MCU latches
    Mcu,
    /// Sound side of the sound latch: command in, result out
    SoundCommand,
    SoundNmiDisable,
    SoundNmiEnable,
    Ym2203,
    Ay8910,
    McuPortA,
    McuPortB,
    McuDdrA,
    McuDdrB,
}

/// Handler state behind every `Port` of the three CPUs
pub struct LsasquadBus {
    pub latch: SoundLatchHandshake,
    pub nmi: NmiLatch,
    pub mcu: McuLink,
    pub ym2203: Box<dyn SoundDevice>,
    pub ay8910: Box<dyn SoundDevice>,
    bank: BankId,
    flip_screen: bool,
}

impl LsasquadBus {
    pub fn new(bank: BankId) -> Self {
        Self {
            latch: SoundLatchHandshake::new(),
            nmi: NmiLatch::new(),
            mcu: McuLink::new(McuStrobes::default()),
            ym2203: Box::new(NullSoundDevice::new("ym2203")),
            ay8910: Box::new(NullSoundDevice::new("ay8910")),
            bank,
            flip_screen: false,
        }
    }

    pub fn flip_screen(&self) -> bool {
        self.flip_screen
    }

    pub fn reset(&mut self) {
        self.latch.reset();
        self.nmi.reset();
        self.mcu.reset();
        self.ym2203.reset();
        self.ay8910.reset();
        self.flip_screen = false;
    }

    fn write_bank(&mut self, data: u8, board: &mut Board) {
        board.memory.select_bank(self.bank, data);
        self.flip_screen = data & FLIP_SCREEN != 0;
    }

    fn write_sound_command(&mut self, data: u8, board: &mut Board) {
        self.latch.write_command(data);
        if self.nmi.trigger() {
            board.irq.set_line(SOUND, InterruptKind::Nmi, LineState::Hold);
        } else {
            log(LogCategory::Interrupts, LogLevel::Debug, || {
                "sound NMI masked, deferred".to_string()
            });
        }
    }

    fn write_mcu_port_b(&mut self, data: u8, board: &mut Board) {
        for event in self.mcu.write_port_b(data) {
            if let McuEvent::ReceivedFromMain { clear_irq: true } = event {
                board.irq.set_line(MCU, InterruptKind::Irq(0), LineState::Clear);
            }
        }
    }
}

impl PortHandler for LsasquadBus {
    type Port = Port;

    fn read_port(&mut self, port: Port, offset: u32, board: &mut Board) -> u8 {
        match port {
            Port::Input(index) => board.inputs.read_input_port(index),
            Port::McuStatus => self.mcu.status(board.inputs.read_input_port(inputs::COINS)),
            Port::SoundLatch => self.latch.read_result(),
            Port::SoundStatus | Port::SoundNmiEnable => self.latch.status(),
            Port::Mcu => self.mcu.main_read(),
            Port::SoundCommand => self.latch.read_command(),
            Port::Ym2203 => self.ym2203.read(offset),
            Port::Ay8910 => self.ay8910.read(offset),
            Port::McuPortA => self.mcu.read_port_a(),
            Port::McuPortB => self.mcu.read_port_b(),
            _ => board.open_bus,
        }
    }

    fn write_port(&mut self, port: Port, offset: u32, data: u8, board: &mut Board) {
        match port {
            Port::Bank => self.write_bank(data, board),
            Port::SoundLatch => self.write_sound_command(data, board),
            Port::Mcu => {
                self.mcu.main_write(data);
                board.irq.set_line(MCU, InterruptKind::Irq(0), LineState::Assert);
            }
            Port::SoundCommand => self.latch.write_result(data),
            Port::SoundNmiDisable => self.nmi.disable(),
            Port::SoundNmiEnable => {
                if self.nmi.enable() {
                    board.irq.set_line(SOUND, InterruptKind::Nmi, LineState::Hold);
                }
            }
            Port::Ym2203 => self.ym2203.write(offset, data),
            Port::Ay8910 => self.ay8910.write(offset, data),
            Port::McuPortA => self.mcu.write_port_a(data),
            Port::McuPortB => self.write_mcu_port_b(data, board),
            Port::McuDdrA => self.mcu.port_a.set_ddr(data),
            Port::McuDdrB => self.mcu.port_b.set_ddr(data),
            Port::Input(_) | Port::McuStatus | Port::SoundStatus => {}
        }
    }
}

/// Regions the three address spaces map
#[derive(Debug, Clone, Copy)]
pub struct Regions {
    pub main_rom: RegionId,
    pub sound_rom: RegionId,
    pub mcu_rom: RegionId,
    pub work_ram: RegionId,
    pub video_ram: RegionId,
    pub scroll_ram: RegionId,
    pub sprite_ram: RegionId,
    pub sound_ram: RegionId,
    pub mcu_ram: RegionId,
    pub bank: BankId,
}

impl Regions {
    /// Add the board's RAM and the main ROM bank to `memory`
    pub fn add(
        memory: &mut Memory,
        main_rom: RegionId,
        sound_rom: RegionId,
        mcu_rom: RegionId,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            main_rom,
            sound_rom,
            mcu_rom,
            work_ram: memory.add_ram("ram", 0x2000),
            video_ram: memory.add_ram("videoram", 0x2000),
            scroll_ram: memory.add_ram("scrollram", 0x400),
            sprite_ram: memory.add_ram("spriteram", 0x200),
            sound_ram: memory.add_ram("sound_ram", 0x800),
            mcu_ram: memory.add_ram("mcu_ram", 0x70),
            // Eight pages of 8 KB from 0x10000 up
            bank: memory.add_bank("bank1", main_rom, 0x10000, 0x2000, 0x07)?,
        })
    }
}

pub fn main_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("maincpu")
        .read(0x0000, 0x7FFF, Capability::rom(r.main_rom))
        .read(0x8000, 0x9FFF, Capability::Banked(r.bank))
        .read_write(0xA000, 0xBFFF, Capability::ram(r.work_ram))
        .read_write(0xC000, 0xDFFF, Capability::ram(r.video_ram))
        .read_write(0xE000, 0xE3FF, Capability::ram(r.scroll_ram))
        .read_write(0xE400, 0xE5FF, Capability::ram(r.sprite_ram))
        .read(0xE800, 0xE800, Capability::Port(Port::Input(inputs::DSWA)))
        .read(0xE801, 0xE801, Capability::Port(Port::Input(inputs::DSWB)))
        .read(0xE802, 0xE802, Capability::Port(Port::Input(inputs::DSWC)))
        .read(0xE803, 0xE803, Capability::Port(Port::McuStatus))
        .read(0xE804, 0xE804, Capability::Port(Port::Input(inputs::P1)))
        .read(0xE805, 0xE805, Capability::Port(Port::Input(inputs::P2)))
        .read(0xE806, 0xE806, Capability::Port(Port::Input(inputs::START)))
        .read(0xE807, 0xE807, Capability::Port(Port::Input(inputs::SERVICE)))
        .write(0xEA00, 0xEA00, Capability::Port(Port::Bank))
        .read_write(0xEC00, 0xEC00, Capability::Port(Port::SoundLatch))
        .read(0xEC01, 0xEC01, Capability::Port(Port::SoundStatus))
        .read_write(0xEE00, 0xEE00, Capability::Port(Port::Mcu))
        .build(memory)
}

pub fn sound_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("audiocpu")
        .read(0x0000, 0x7FFF, Capability::rom(r.sound_rom))
        .read_write(0x8000, 0x87FF, Capability::ram(r.sound_ram))
        .read_write(0xA000, 0xA001, Capability::Port(Port::Ym2203))
        .write(0xC000, 0xC001, Capability::Port(Port::Ay8910))
        .read_write(0xD000, 0xD000, Capability::Port(Port::SoundCommand))
        .write(0xD400, 0xD400, Capability::Port(Port::SoundNmiDisable))
        .read_write(0xD800, 0xD800, Capability::Port(Port::SoundNmiEnable))
        .read(0xE000, 0xEFFF, Capability::Rom { region: r.sound_rom, offset: 0xE000 })
        .build(memory)
}

/// 68705P5: 11-bit address bus, ports and DDRs in page zero
pub fn mcu_map(memory: &Memory, r: &Regions) -> Result<AddressSpace<Port>, ConfigError> {
    AddressSpaceBuilder::new("mcu")
        .read_write(0x0000, 0x0000, Capability::Port(Port::McuPortA))
        .read_write(0x0001, 0x0001, Capability::Port(Port::McuPortB))
        .write(0x0004, 0x0004, Capability::Port(Port::McuDdrA))
        .write(0x0005, 0x0005, Capability::Port(Port::McuDdrB))
        .read_write(0x0010, 0x007F, Capability::ram(r.mcu_ram))
        .read(0x0080, 0x07FF, Capability::Rom { region: r.mcu_rom, offset: 0x0080 })
        .build(memory)
}
