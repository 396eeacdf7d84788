//! Prehistoric Isle main system implementation

use crate::bus::{self, PrehisleBus, Regions};
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

/// Prehistoric Isle emulator errors
#[derive(Debug, Error)]
pub enum PrehisleError {
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

impl From<RomError> for PrehisleError {
    fn from(e: RomError) -> Self {
        match e {
            RomError::UnknownMountPoint(id) => PrehisleError::InvalidMountPoint(id),
            RomError::Size {
                region,
                expected,
                found,
            } => PrehisleError::RomSize {
                region,
                expected,
                found,
            },
        }
    }
}

const MAIN_CLOCK: u32 = 9_000_000;
const SOUND_CLOCK: u32 = 4_000_000;

static ROMS: [RomSpec; 8] = [
    RomSpec::new("maincpu", "68000 program, interleaved", 0x40000, 0x40000, true),
    RomSpec::new("audiocpu", "Z80 program", 0x10000, 0x10000, true),
    RomSpec::new("chars", "Text layer characters", 0x8000, 0x8000, true),
    RomSpec::new("bgtiles", "Background tiles", 0x80000, 0x80000, true),
    RomSpec::new("fgtiles", "Foreground tiles", 0x40000, 0x40000, true),
    RomSpec::new("sprites", "Sprite graphics", 0xA0000, 0xA0000, true),
    RomSpec::new("bgmap", "Background tile map", 0x10000, 0x10000, true),
    RomSpec::new("upd", "UPD7759 samples", 0x20000, 0x20000, false),
];

/// The 68000 takes IRQ 4 at VBLANK. The Z80's NMI comes only from the
/// sound latch.
pub fn default_config() -> MachineConfig {
    MachineConfig::new("prehisle", 60, 100)
        .with_cpu(CpuConfig::new("maincpu", MAIN_CLOCK).with_interrupt(InterruptKind::Irq(4), 1))
        .with_cpu(CpuConfig::new("audiocpu", SOUND_CLOCK))
}

/// Prehistoric Isle board
pub struct PrehisleSystem {
    machine: Machine<PrehisleBus>,
    roms: RomSet,
    regions: Regions,
}

impl PrehisleSystem {
    /// Create a board with the default configuration and no ROMs loaded
    pub fn new() -> Result<Self, PrehisleError> {
        Self::with_config(default_config())
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, PrehisleError> {
        let mut memory = Memory::new();
        let roms = RomSet::new(&ROMS, &mut memory);
        let regions = Regions::add(
            &mut memory,
            roms.region("maincpu")?,
            roms.region("audiocpu")?,
        );
        let spaces = vec![
            CpuSpaces::program_only(bus::main_map(&memory, &regions)?),
            CpuSpaces {
                program: bus::sound_map(&memory, &regions)?,
                io: bus::sound_io_map(&memory)?,
            },
        ];

        let gfx = Graphics {
            chars: Graphics::decode_chars(memory.bytes(roms.region("chars")?))?,
            bg_tiles: Graphics::decode_bg_tiles(memory.bytes(roms.region("bgtiles")?))?,
            fg_tiles: Graphics::decode_fg_tiles(memory.bytes(roms.region("fgtiles")?))?,
            sprites: Graphics::decode_sprites(memory.bytes(roms.region("sprites")?))?,
        };
        let video = Video::new(gfx, memory.bytes(roms.region("bgmap")?));

        let mut board = Board::new(memory, spaces.len(), config.open_bus);
        board.inputs = arcade_core::input::InputPorts::new(bus::inputs::COUNT);
        let machine = Machine::new(config, spaces, board, PrehisleBus::new(video))?;

        Ok(Self {
            machine,
            roms,
            regions,
        })
    }

    /// Install the core that runs `cpu` (0 main, 1 sound)
    pub fn attach_cpu(&mut self, cpu: CpuId, core: Box<dyn CpuCore>) -> Result<(), PrehisleError> {
        Ok(self.machine.attach(cpu, core)?)
    }

    pub fn machine(&self) -> &Machine<PrehisleBus> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine<PrehisleBus> {
        &mut self.machine
    }

    /// Set an input port (see [`crate::inputs`])
    pub fn set_input(&mut self, index: usize, value: u8) {
        self.machine.board_mut().inputs.set(index, value);
    }

    fn reload_video(&mut self, id: &str) -> Result<(), PrehisleError> {
        let region = self.roms.region(id)?;
        let (board, bus) = self.machine.parts_mut();
        let data = board.memory.bytes(region);
        match id {
            "chars" => bus.video.graphics_mut().chars = Graphics::decode_chars(data)?,
            "bgtiles" => bus.video.graphics_mut().bg_tiles = Graphics::decode_bg_tiles(data)?,
            "fgtiles" => bus.video.graphics_mut().fg_tiles = Graphics::decode_fg_tiles(data)?,
            "sprites" => bus.video.graphics_mut().sprites = Graphics::decode_sprites(data)?,
            "bgmap" => bus.video.playfield.load_bg_map(data),
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self) -> Frame {
        let (board, bus) = self.machine.parts_mut();
        let sprite_ram = board.memory.bytes(self.regions.sprite_ram);
        bus.video.render(sprite_ram).clone()
    }
}

impl System for PrehisleSystem {
    type Error = PrehisleError;

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
