//! Land Sea Air Squad main system implementation

use crate::bus::{self, LsasquadBus, Regions};
use crate::video::{Video, VideoRam};
use arcade_core::config::{CpuConfig, MachineConfig};
use arcade_core::cpu::{CpuCore, CpuId};
use arcade_core::interrupt::InterruptKind;
use arcade_core::machine::{CpuSpaces, Machine};
use arcade_core::types::Frame;
use arcade_core::{
    Board, ConfigError, Memory, MountPointInfo, RomError, RomSet, RomSpec, System,
};
use thiserror::Error;

/// Land Sea Air Squad emulator errors
#[derive(Debug, Error)]
pub enum LsasquadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),

    #[error("ROM '{region}' must be {expected:#X} bytes, got {found:#X}")]
    RomSize {
        region: String,
        expected: usize,
        found: usize,
    },
}

impl From<RomError> for LsasquadError {
    fn from(e: RomError) -> Self {
        match e {
            RomError::UnknownMountPoint(id) => LsasquadError::InvalidMountPoint(id),
            RomError::Size {
                region,
                expected,
                found,
            } => LsasquadError::RomSize {
                region,
                expected,
                found,
            },
        }
    }
}

const MAIN_CLOCK: u32 = 6_000_000;
const SOUND_CLOCK: u32 = 4_000_000;
const MCU_CLOCK: u32 = 4_000_000;

static ROMS: [RomSpec; 6] = [
    // CPU view in the first 32 KB, bank pages from 0x10000
    RomSpec::new("maincpu", "Main CPU program", 0x20000, 0x20000, true),
    RomSpec::new("audiocpu", "Sound CPU program", 0x10000, 0x10000, true),
    RomSpec::new("mcu", "68705 internal ROM", 0x800, 0x800, true),
    RomSpec::new("gfx1", "Tile graphics", 0x20000, 0x20000, true),
    RomSpec::new("gfx2", "Sprite graphics", 0x20000, 0x20000, true),
    RomSpec::new("proms", "Red, green and blue color PROMs", 0x600, 0x600, true),
];

/// Main Z80 takes IRQ 0 every frame. The sound CPU's NMI comes from the
/// sound latch and the MCU's IRQ from the main CPU, so neither has a
/// periodic source. The MCU handshake needs fine interleave.
pub fn default_config() -> MachineConfig {
    MachineConfig::new("lsasquad", 60, 500)
        .with_cpu(CpuConfig::new("maincpu", MAIN_CLOCK).with_interrupt(InterruptKind::Irq(0), 1))
        .with_cpu(CpuConfig::new("audiocpu", SOUND_CLOCK))
        .with_cpu(CpuConfig::new("mcu", MCU_CLOCK))
}

/// Land Sea Air Squad board
pub struct LsasquadSystem {
    machine: Machine<LsasquadBus>,
    video: Video,
    roms: RomSet,
    regions: Regions,
}

impl LsasquadSystem {
    /// Create a board with the default configuration and no ROMs loaded
    pub fn new() -> Result<Self, LsasquadError> {
        Self::with_config(default_config())
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, LsasquadError> {
        let mut memory = Memory::new();
        let roms = RomSet::new(&ROMS, &mut memory);
        let regions = Regions::add(
            &mut memory,
            roms.region("maincpu")?,
            roms.region("audiocpu")?,
            roms.region("mcu")?,
        )?;
        let spaces = vec![
            CpuSpaces::program_only(bus::main_map(&memory, &regions)?),
            CpuSpaces::program_only(bus::sound_map(&memory, &regions)?),
            CpuSpaces::program_only(bus::mcu_map(&memory, &regions)?),
        ];
        let video = Video::new(
            memory.bytes(roms.region("gfx1")?),
            memory.bytes(roms.region("gfx2")?),
            memory.bytes(roms.region("proms")?),
        )?;

        let mut board = Board::new(memory, spaces.len(), config.open_bus);
        board.inputs = arcade_core::input::InputPorts::new(bus::inputs::COUNT);
        let machine = Machine::new(config, spaces, board, LsasquadBus::new(regions.bank))?;

        Ok(Self {
            machine,
            video,
            roms,
            regions,
        })
    }

    /// Install the core that runs `cpu` (0 main, 1 sound, 2 MCU)
    pub fn attach_cpu(&mut self, cpu: CpuId, core: Box<dyn CpuCore>) -> Result<(), LsasquadError> {
        Ok(self.machine.attach(cpu, core)?)
    }

    pub fn machine(&self) -> &Machine<LsasquadBus> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine<LsasquadBus> {
        &mut self.machine
    }

    pub fn video(&self) -> &Video {
        &self.video
    }

    /// Set an input port (see [`crate::inputs`])
    pub fn set_input(&mut self, index: usize, value: u8) {
        self.machine.board_mut().inputs.set(index, value);
    }

    fn reload_video(&mut self, id: &str) -> Result<(), LsasquadError> {
        let region = self.roms.region(id)?;
        let data = self.machine.board().memory.bytes(region);
        match id {
            "gfx1" => self.video.load_chars(data)?,
            "gfx2" => self.video.load_sprites(data)?,
            "proms" => self.video.load_color_proms(data),
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self) -> Frame {
        let memory = &self.machine.board().memory;
        let ram = VideoRam {
            video: memory.bytes(self.regions.video_ram),
            scroll: memory.bytes(self.regions.scroll_ram),
            sprites: memory.bytes(self.regions.sprite_ram),
        };
        let flip = self.machine.handler().flip_screen();
        self.video.render(ram, flip).clone()
    }
}

impl System for LsasquadSystem {
    type Error = LsasquadError;

    fn reset(&mut self) {
        self.machine.reset();
        self.machine.handler_mut().reset();
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        self.machine.run_frame();
        Ok(self.render())
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        self.roms.mount_points()
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.roms
            .mount(&mut self.machine.board_mut().memory, mount_point_id, data)?;
        self.reload_video(mount_point_id)?;
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        self.roms
            .unmount(&mut self.machine.board_mut().memory, mount_point_id)?;
        self.reload_video(mount_point_id)
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        self.roms.is_mounted(mount_point_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{inputs, MAIN, MCU, SOUND};
    use arcade_core::cpu::ScriptedCpu;

    fn system() -> LsasquadSystem {
        LsasquadSystem::new().unwrap()
    }

    #[test]
    fn test_system_creation() {
        let system = system();
        let points = system.mount_points();
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.required));
        assert_eq!(system.machine().cpu_count(), 3);
    }

    #[test]
    fn test_bank_switch_and_flip() {
        let mut system = system();
        let mut image = vec![0u8; 0x20000];
        for page in 0..8 {
            image[0x10000 + page * 0x2000] = 0x10 + page as u8;
        }
        system.mount("maincpu", &image).unwrap();

        let m = system.machine_mut();
        assert_eq!(m.read(MAIN, 0x8000), 0x10);
        m.write(MAIN, 0xEA00, 0x05);
        assert_eq!(m.read(MAIN, 0x8000), 0x15);
        assert!(!m.handler().flip_screen());
        // Three bits select the page, bit 4 flips the screen
        m.write(MAIN, 0xEA00, 0x1B);
        assert_eq!(m.read(MAIN, 0x8000), 0x13);
        assert!(m.handler().flip_screen());
    }

    #[test]
    fn test_sound_latch_both_ways() {
        let mut system = system();
        let m = system.machine_mut();
        assert_eq!(m.read(MAIN, 0xEC01), 0x00);

        m.write(MAIN, 0xEC00, 0x42);
        assert_eq!(m.read(MAIN, 0xEC01), 0x01);
        assert_eq!(m.read(SOUND, 0xD800), 0x01);
        assert_eq!(m.read(SOUND, 0xD000), 0x42);
        assert_eq!(m.read(MAIN, 0xEC01), 0x00);

        m.write(SOUND, 0xD000, 0x99);
        assert_eq!(m.read(MAIN, 0xEC01), 0x02);
        assert_eq!(m.read(MAIN, 0xEC00), 0x99);
        assert_eq!(m.read(SOUND, 0xD800), 0x00);
    }

    #[test]
    fn test_masked_commands_fire_one_nmi_on_enable() {
        let mut system = system();
        let sound = ScriptedCpu::new(|_, _| {});
        let taken = sound.interrupt_log();
        system.attach_cpu(SOUND, Box::new(sound)).unwrap();

        // NMIs start out masked
        system.machine_mut().write(MAIN, 0xEC00, 0x01);
        system.machine_mut().write(MAIN, 0xEC00, 0x02);
        system.step_frame().unwrap();
        assert!(taken.borrow().is_empty());

        system.machine_mut().write(SOUND, 0xD800, 0x00);
        system.step_frame().unwrap();
        system.step_frame().unwrap();
        assert_eq!(*taken.borrow(), vec![InterruptKind::Nmi]);

        // Unmasked: every command is an NMI
        system.machine_mut().write(MAIN, 0xEC00, 0x03);
        system.step_frame().unwrap();
        assert_eq!(taken.borrow().len(), 2);

        // Masked again: nothing until the next enable
        system.machine_mut().write(SOUND, 0xD400, 0x00);
        system.machine_mut().write(MAIN, 0xEC00, 0x04);
        system.step_frame().unwrap();
        assert_eq!(taken.borrow().len(), 2);
        system.machine_mut().write(SOUND, 0xD800, 0x00);
        system.step_frame().unwrap();
        assert_eq!(taken.borrow().len(), 3);
    }

    #[test]
    fn test_mcu_takes_byte_from_main() {
        let mut system = system();
        let m = system.machine_mut();
        m.write(MAIN, 0xEE00, 0x5A);
        assert!(m.board().irq.line_active(MCU, InterruptKind::Irq(0)));
        // Not ready for another byte yet; no result pending
        assert_eq!(m.read(MAIN, 0xE803) & 0x03, 0x02);

        // Strobes only count on output pins
        m.write(MCU, 0x0001, 0x02);
        m.write(MCU, 0x0001, 0x00);
        assert!(m.board().irq.line_active(MCU, InterruptKind::Irq(0)));

        m.write(MCU, 0x0005, 0x06);
        m.write(MCU, 0x0001, 0x02);
        m.write(MCU, 0x0001, 0x00);
        assert!(!m.board().irq.line_active(MCU, InterruptKind::Irq(0)));
        assert_eq!(m.read(MCU, 0x0000), 0x5A);
        assert_eq!(m.read(MAIN, 0xE803) & 0x03, 0x03);
    }

    #[test]
    fn test_mcu_sends_byte_to_main() {
        let mut system = system();
        system.set_input(inputs::COINS, 0xF0);
        let m = system.machine_mut();
        m.write(MCU, 0x0004, 0xFF);
        m.write(MCU, 0x0005, 0x06);
        m.write(MCU, 0x0000, 0x99);
        m.write(MCU, 0x0001, 0x00);
        m.write(MCU, 0x0001, 0x04);

        // Result pending: bit 1 low, coin bits pass through
        assert_eq!(m.read(MAIN, 0xE803), 0xF1);
        assert_eq!(m.read(MAIN, 0xEE00), 0x99);
        assert_eq!(m.read(MAIN, 0xE803), 0xF3);
    }

    #[test]
    fn test_mcu_rom_and_ram() {
        let mut system = system();
        let mut image = vec![0u8; 0x800];
        image[0x80] = 0xA6;
        image[0x7FF] = 0x80;
        system.mount("mcu", &image).unwrap();
        let m = system.machine_mut();
        assert_eq!(m.read(MCU, 0x0080), 0xA6);
        assert_eq!(m.read(MCU, 0x07FF), 0x80);
        m.write(MCU, 0x0010, 0x33);
        assert_eq!(m.read(MCU, 0x0010), 0x33);
        // Bootstrap area below the RAM is not mapped
        assert_eq!(m.read(MCU, 0x0008), 0xFF);
    }

    #[test]
    fn test_inputs_and_dips() {
        let mut system = system();
        system.set_input(inputs::DSWC, 0x7F);
        system.set_input(inputs::START, 0xFE);
        let m = system.machine_mut();
        assert_eq!(m.read(MAIN, 0xE802), 0x7F);
        assert_eq!(m.read(MAIN, 0xE806), 0xFE);
        assert_eq!(m.read(MAIN, 0xE800), 0xFF);
    }

    #[test]
    fn test_rom_size_checked() {
        let mut system = system();
        assert!(matches!(
            system.mount("proms", &[0; 0x400]),
            Err(LsasquadError::RomSize {
                expected: 0x600,
                found: 0x400,
                ..
            })
        ));
        assert!(matches!(
            system.mount("cpu1", &[]),
            Err(LsasquadError::InvalidMountPoint(_))
        ));
    }

    fn proms_with(entry: usize, rgb: [u8; 3]) -> Vec<u8> {
        let mut proms = vec![0u8; 0x600];
        for (i, &level) in rgb.iter().enumerate() {
            proms[entry + i * 0x200] = level;
        }
        proms
    }

    #[test]
    fn test_empty_layers_show_backdrop() {
        let mut system = system();
        system.mount("proms", &proms_with(511, [0x0F, 0x0F, 0x0F])).unwrap();
        let frame = system.step_frame().unwrap();
        assert_eq!((frame.width, frame.height), (256, 224));
        assert!(frame.pixels.iter().all(|&p| p == 0xFFFFFFFF));
    }

    #[test]
    fn test_opaque_tiles_cover_backdrop() {
        let mut system = system();
        system.mount("proms", &proms_with(0, [0x0F, 0x00, 0x00])).unwrap();
        // Every char all pen 0: the bottom layer covers the screen
        system.mount("gfx1", &vec![0u8; 0x20000]).unwrap();
        let frame = system.step_frame().unwrap();
        assert_eq!(frame.pixels[0], 0xFFFF0000);
        assert_eq!(frame.pixels[256 * 100 + 17], 0xFFFF0000);
    }

    #[test]
    fn test_reset_clears_latches_and_bank() {
        let mut system = system();
        let m = system.machine_mut();
        m.write(MAIN, 0xEA00, 0x13);
        m.write(SOUND, 0xD800, 0x00);
        m.write(MAIN, 0xEC00, 0x42);
        m.write(MAIN, 0xEE00, 0x01);
        system.reset();

        let m = system.machine();
        assert!(!m.handler().flip_screen());
        assert!(!m.handler().nmi.is_enabled());
        assert_eq!(m.handler().latch.pending(), 0);
        assert!(!m.handler().mcu.main_sent());
        assert!(!m.board().irq.line_active(MCU, InterruptKind::Irq(0)));
        assert_eq!(m.board().memory.bank(system.regions.bank).selected(), 0);
    }
}
