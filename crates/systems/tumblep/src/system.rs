//! Tumblepop main system implementation

use crate::bus::{self, Regions, TumblepBus};
use crate::video::{Graphics, Video};
use arcade_core::config::{CpuConfig, MachineConfig};
use arcade_core::cpu::{CpuCore, CpuId};
use arcade_core::interrupt::InterruptKind;
use arcade_core::machine::{CpuSpaces, Machine};
use arcade_core::types::Frame;
use arcade_core::{
    Board, ConfigError, Memory, MountPointInfo, RomError, RomSet, RomSpec, System,
};
use thiserror::Error;

/// Tumblepop emulator errors
#[derive(Debug, Error)]
pub enum TumblepError {
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

impl From<RomError> for TumblepError {
    fn from(e: RomError) -> Self {
        match e {
            RomError::UnknownMountPoint(id) => TumblepError::InvalidMountPoint(id),
            RomError::Size {
                region,
                expected,
                found,
            } => TumblepError::RomSize {
                region,
                expected,
                found,
            },
        }
    }
}

const MAIN_CLOCK: u32 = 14_000_000;
/// 32.22 MHz crystal divided by 8
const SOUND_CLOCK: u32 = 4_027_500;

static ROMS: [RomSpec; 5] = [
    RomSpec::new("maincpu", "68000 program, interleaved", 0x80000, 0x80000, true),
    RomSpec::new("audiocpu", "HuC6280 program", 0x10000, 0x10000, true),
    RomSpec::new("gfx1", "Playfield characters and tiles", 0x80000, 0x80000, true),
    RomSpec::new("gfx2", "Sprite graphics", 0x100000, 0x100000, true),
    RomSpec::new("oki", "OKIM6295 samples", 0x20000, 0x20000, false),
];

/// The 68000 takes IRQ 6 at VBLANK. The HuC6280's IRQ1 comes from the
/// sound latch only.
pub fn default_config() -> MachineConfig {
    MachineConfig::new("tumblep", 60, 100)
        .with_cpu(CpuConfig::new("maincpu", MAIN_CLOCK).with_interrupt(InterruptKind::Irq(6), 1))
        .with_cpu(CpuConfig::new("audiocpu", SOUND_CLOCK))
}

/// Tumblepop board
pub struct TumblepSystem {
    machine: Machine<TumblepBus>,
    roms: RomSet,
    regions: Regions,
}

impl TumblepSystem {
    /// Create a board with the default configuration and no ROMs loaded
    pub fn new() -> Result<Self, TumblepError> {
        Self::with_config(default_config())
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, TumblepError> {
        let mut memory = Memory::new();
        let roms = RomSet::new(&ROMS, &mut memory);
        let regions = Regions::add(
            &mut memory,
            roms.region("maincpu")?,
            roms.region("audiocpu")?,
        );
        let spaces = vec![
            CpuSpaces::program_only(bus::main_map(&memory, &regions)?),
            CpuSpaces::program_only(bus::sound_map(&memory, &regions)?),
        ];
        let gfx = Graphics::decode(
            memory.bytes(roms.region("gfx1")?),
            memory.bytes(roms.region("gfx2")?),
        )?;

        let mut board = Board::new(memory, spaces.len(), config.open_bus);
        board.inputs = arcade_core::input::InputPorts::new(bus::inputs::COUNT);
        let machine = Machine::new(config, spaces, board, TumblepBus::new(Video::new(gfx)))?;

        Ok(Self {
            machine,
            roms,
            regions,
        })
    }

    /// Install the core that runs `cpu` (0 main, 1 sound)
    pub fn attach_cpu(&mut self, cpu: CpuId, core: Box<dyn CpuCore>) -> Result<(), TumblepError> {
        Ok(self.machine.attach(cpu, core)?)
    }

    pub fn machine(&self) -> &Machine<TumblepBus> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine<TumblepBus> {
        &mut self.machine
    }

    /// Set an input port (see [`crate::inputs`])
    pub fn set_input(&mut self, index: usize, value: u8) {
        self.machine.board_mut().inputs.set(index, value);
    }

    fn reload_video(&mut self, id: &str) -> Result<(), TumblepError> {
        let region = self.roms.region(id)?;
        let (board, bus) = self.machine.parts_mut();
        let data = board.memory.bytes(region);
        let gfx = bus.video.playfield.graphics_mut();
        match id {
            "gfx1" => gfx.load_playfield(data)?,
            "gfx2" => gfx.sprites = Graphics::decode_sprites(data)?,
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self) -> Frame {
        let frame = self.machine.frame_number();
        let (board, bus) = self.machine.parts_mut();
        let sprite_ram = board.memory.bytes(self.regions.sprite_ram);
        bus.video.render(sprite_ram, frame).clone()
    }
}

impl System for TumblepSystem {
    type Error = TumblepError;

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
    use crate::bus::{inputs, MAIN, SOUND};
    use crate::video::{ctrl, PF1_TEXT, PF1_TILES, PF2};
    use arcade_core::cpu::{MemoryBus, ScriptedCpu};

    fn system() -> TumblepSystem {
        TumblepSystem::new().unwrap()
    }

    fn write_word(system: &mut TumblepSystem, addr: u32, value: u16) {
        system.machine_mut().bus(MAIN).unwrap().write_word(addr, value);
    }

    fn control_addr(index: usize) -> u32 {
        0x300000 + index as u32 * 2
    }

    #[test]
    fn test_system_creation() {
        let system = system();
        let points = system.mount_points();
        assert_eq!(points.len(), 5);
        assert_eq!(points.iter().filter(|p| !p.required).count(), 1);
        assert_eq!(system.machine().cpu_count(), 2);
    }

    #[test]
    fn test_sound_command_holds_irq1() {
        let mut system = system();
        let sound = ScriptedCpu::new(|_, _| {});
        let taken = sound.interrupt_log();
        system.attach_cpu(SOUND, Box::new(sound)).unwrap();

        write_word(&mut system, 0x100000, 0xAB33);
        assert!(system.machine().board().irq.line_active(SOUND, InterruptKind::Irq(1)));
        system.step_frame().unwrap();
        assert_eq!(*taken.borrow(), vec![InterruptKind::Irq(1)]);
        // Held, not asserted: taken once
        assert!(!system.machine().board().irq.line_active(SOUND, InterruptKind::Irq(1)));
        assert_eq!(system.machine_mut().read(SOUND, 0x140000), 0x33);

        system.step_frame().unwrap();
        assert_eq!(taken.borrow().len(), 1);
    }

    #[test]
    fn test_main_cpu_vblank_irq() {
        let mut system = system();
        let main = ScriptedCpu::new(|_, _| {});
        let taken = main.interrupt_log();
        system.attach_cpu(MAIN, Box::new(main)).unwrap();
        for _ in 0..3 {
            system.step_frame().unwrap();
        }
        assert_eq!(*taken.borrow(), vec![InterruptKind::Irq(6); 3]);
    }

    #[test]
    fn test_input_words() {
        let mut system = system();
        system.set_input(inputs::P1, 0xFE);
        system.set_input(inputs::P2, 0xFD);
        system.set_input(inputs::DSW1, 0x7F);
        system.set_input(inputs::DSW2, 0xBF);
        system.set_input(inputs::COIN, 0xF7);
        let mut bus = system.machine_mut().bus(MAIN).unwrap();
        assert_eq!(bus.read_word(0x180000), 0xFDFE);
        assert_eq!(bus.read_word(0x180002), 0xBF7F);
        assert_eq!(bus.read_word(0x180008), 0x00F7);
        assert_eq!(bus.read_word(0x18000A), 0x0000);
        assert_eq!(bus.read_word(0x180006), 0xFFFF);
    }

    #[test]
    fn test_control_registers_drive_playfields() {
        let mut system = system();
        write_word(&mut system, control_addr(ctrl::PF1_SCROLL_X), 0x0010);
        write_word(&mut system, control_addr(ctrl::PF1_SCROLL_Y), 0x0020);
        write_word(&mut system, control_addr(ctrl::PF2_SCROLL_X), 0x0100);
        write_word(&mut system, control_addr(ctrl::PF1_MODE), 0x0080);
        system.step_frame().unwrap();

        let playfield = &system.machine().handler().video.playfield;
        assert_eq!(playfield.tilemap(PF1_TEXT).scroll(), (0x0F, 0x20));
        assert_eq!(playfield.tilemap(PF2).scroll(), (0xFF, 0));
        assert!(playfield.tilemap(PF1_TEXT).enabled);
        assert!(!playfield.tilemap(PF1_TILES).enabled);
        assert!(!playfield.flip_screen());

        write_word(&mut system, control_addr(ctrl::FLIP), 0x0080);
        system.step_frame().unwrap();
        let playfield = &system.machine().handler().video.playfield;
        assert!(playfield.flip_screen());
        assert_eq!(playfield.tilemap(PF1_TEXT).scroll(), (0x11, 0x20));
    }

    #[test]
    fn test_playfield_and_palette_read_back() {
        let mut system = system();
        write_word(&mut system, 0x320FFE, 0x1234);
        write_word(&mut system, 0x322000, 0x5678);
        write_word(&mut system, 0x1407FE, 0x0ABC);
        write_word(&mut system, 0x1A0010, 0x9999);
        let mut bus = system.machine_mut().bus(MAIN).unwrap();
        assert_eq!(bus.read_word(0x320FFE), 0x1234);
        assert_eq!(bus.read_word(0x322000), 0x5678);
        assert_eq!(bus.read_word(0x1407FE), 0x0ABC);
        assert_eq!(bus.read_word(0x1A0010), 0x9999);
        // Scroll RAM is not kept
        bus.write_word(0x340000, 0x1111);
        assert_eq!(bus.read_word(0x340000), 0xFFFF);
    }

    #[test]
    fn test_sound_cpu_memory() {
        let mut system = system();
        let mut image = vec![0u8; 0x10000];
        image[0xFFFF] = 0x60;
        system.mount("audiocpu", &image).unwrap();
        let m = system.machine_mut();
        assert_eq!(m.read(SOUND, 0x00FFFF), 0x60);
        m.write(SOUND, 0x1F0123, 0x44);
        assert_eq!(m.read(SOUND, 0x1F0123), 0x44);
        assert_eq!(m.read(SOUND, 0x130000), 0xFF);
    }

    #[test]
    fn test_rom_size_checked() {
        let mut system = system();
        assert!(matches!(
            system.mount("gfx2", &[0; 0x80000]),
            Err(TumblepError::RomSize {
                expected: 0x100000,
                found: 0x80000,
                ..
            })
        ));
        assert!(matches!(
            system.mount("gfx3", &[]),
            Err(TumblepError::InvalidMountPoint(_))
        ));
    }

    #[test]
    fn test_back_playfield_fills_frame() {
        let mut system = system();
        // All pen 0; playfield 2 colors start at entry 512
        system.mount("gfx1", &vec![0u8; 0x80000]).unwrap();
        write_word(&mut system, 0x140000 + 512 * 2, 0x000F);
        let frame = system.step_frame().unwrap();
        assert_eq!((frame.width, frame.height), (320, 240));
        assert!(frame.pixels.iter().all(|&p| p == 0xFFFF0000));
    }

    #[test]
    fn test_flashing_sprite_blinks() {
        let mut system = system();
        system.mount("gfx1", &vec![0u8; 0x80000]).unwrap();
        write_word(&mut system, 0x140000 + 512 * 2, 0x000F);
        // Empty sprite ROM is all pen 15; color 0 pen 15 is entry 15
        write_word(&mut system, 0x140000 + 15 * 2, 0x00F0);
        write_word(&mut system, 0x1A0000, 0x1010);
        write_word(&mut system, 0x1A0002, 0x0001);
        write_word(&mut system, 0x1A0004, 0x0030);

        // Bottom-left cell corner at (304 - 0x30, 240 - 0x10), screen row 8 up
        let at = (240 - 0x10 - 8) * 320 + (304 - 0x30);
        let frame = system.step_frame().unwrap();
        assert_eq!(system.machine().frame_number(), 1);
        assert_eq!(frame.pixels[at], 0xFFFF0000);
        let frame = system.step_frame().unwrap();
        assert_eq!(frame.pixels[at], 0xFF00FF00);
    }

    #[test]
    fn test_reset_clears_control_state() {
        let mut system = system();
        write_word(&mut system, control_addr(ctrl::FLIP), 0x0080);
        write_word(&mut system, 0x100000, 0x0042);
        system.reset();
        let bus = system.machine().handler();
        assert!(!bus.video.playfield.flip_screen());
        assert_eq!(bus.video.playfield.control(ctrl::FLIP), 0);
        assert_eq!(bus.latch.pending(), 0);
    }
}
