//! Double Dribble main system implementation

use crate::bus::{self, DdribbleBus, Regions};
use crate::video::Video;
use arcade_core::config::{CpuConfig, MachineConfig};
use arcade_core::cpu::{CpuCore, CpuId};
use arcade_core::interrupt::InterruptKind;
use arcade_core::machine::{CpuSpaces, Machine};
use arcade_core::types::Frame;
use arcade_core::{
    Board, ConfigError, Memory, MountPointInfo, RomError, RomSet, RomSpec, System,
};
use thiserror::Error;

/// Double Dribble emulator errors
#[derive(Debug, Error)]
pub enum DdribbleError {
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

impl From<RomError> for DdribbleError {
    fn from(e: RomError) -> Self {
        match e {
            RomError::UnknownMountPoint(id) => DdribbleError::InvalidMountPoint(id),
            RomError::Size {
                region,
                expected,
                found,
            } => DdribbleError::RomSize {
                region,
                expected,
                found,
            },
        }
    }
}

const CPU_CLOCK: u32 = 1_536_000;

static ROMS: [RomSpec; 7] = [
    // CPU view in the first 64 KB, bank pages from 0x10000; pages past the
    // image are unpopulated
    RomSpec::new("maincpu", "Main CPU program", 0x20000, 0x30000, true),
    RomSpec::new("cpu1", "Sub CPU program", 0x10000, 0x10000, true),
    RomSpec::new("cpu2", "Sound CPU program", 0x10000, 0x10000, true),
    RomSpec::new("gfx1", "Tile graphics", 0x40000, 0x40000, true),
    RomSpec::new("gfx2", "Sprite graphics", 0x80000, 0x80000, true),
    RomSpec::new("proms", "Sprite color lookup PROM", 0x100, 0x100, true),
    RomSpec::new("vlm", "VLM5030 speech data", 0x20000, 0x20000, false),
];

/// Three 6809s; main and sub take a FIRQ once per frame while their video
/// chip enables it.
pub fn default_config() -> MachineConfig {
    MachineConfig::new("ddribble", 60, 100)
        .with_cpu(CpuConfig::new("maincpu", CPU_CLOCK).with_gated_interrupt(InterruptKind::Firq, 1))
        .with_cpu(CpuConfig::new("sub", CPU_CLOCK).with_gated_interrupt(InterruptKind::Firq, 1))
        .with_cpu(CpuConfig::new("sound", CPU_CLOCK))
}

/// Double Dribble board
pub struct DdribbleSystem {
    machine: Machine<DdribbleBus>,
    roms: RomSet,
    regions: Regions,
}

impl DdribbleSystem {
    /// Create a board with the default configuration and no ROMs loaded
    pub fn new() -> Result<Self, DdribbleError> {
        Self::with_config(default_config())
    }

    /// Create a board with a user configuration (e.g. more slices per frame)
    pub fn with_config(config: MachineConfig) -> Result<Self, DdribbleError> {
        let mut memory = Memory::new();
        let roms = RomSet::new(&ROMS, &mut memory);
        let regions = Regions::add(
            &mut memory,
            roms.region("maincpu")?,
            roms.region("cpu1")?,
            roms.region("cpu2")?,
        )?;
        let spaces = vec![
            CpuSpaces::program_only(bus::main_map(&memory, &regions)?),
            CpuSpaces::program_only(bus::sub_map(&memory, &regions)?),
            CpuSpaces::program_only(bus::sound_map(&memory, &regions)?),
        ];
        let video = Video::new(
            memory.bytes(roms.region("gfx1")?),
            memory.bytes(roms.region("gfx2")?),
            memory.bytes(roms.region("proms")?),
        )?;

        let mut board = Board::new(memory, spaces.len(), config.open_bus);
        board.inputs = arcade_core::input::InputPorts::new(bus::inputs::COUNT);
        let handler = DdribbleBus::new(video, regions.bank);
        let machine = Machine::new(config, spaces, board, handler)?;

        Ok(Self {
            machine,
            roms,
            regions,
        })
    }

    /// Install the core that runs `cpu` (0 main, 1 sub, 2 sound)
    pub fn attach_cpu(&mut self, cpu: CpuId, core: Box<dyn CpuCore>) -> Result<(), DdribbleError> {
        Ok(self.machine.attach(cpu, core)?)
    }

    pub fn machine(&self) -> &Machine<DdribbleBus> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine<DdribbleBus> {
        &mut self.machine
    }

    /// Set an input port (see [`crate::inputs`])
    pub fn set_input(&mut self, index: usize, value: u8) {
        self.machine.board_mut().inputs.set(index, value);
    }

    /// Re-derive video state after a graphics or PROM region changes
    fn reload_video(&mut self, id: &str) -> Result<(), DdribbleError> {
        let region = self.roms.region(id)?;
        let (board, bus) = self.machine.parts_mut();
        let data = board.memory.bytes(region);
        match id {
            "gfx1" => bus.video.load_chars(data)?,
            "gfx2" => bus.video.load_sprites(data)?,
            "proms" => bus.video.load_color_prom(data),
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self) -> Frame {
        let (board, bus) = self.machine.parts_mut();
        let sprite_ram = [
            board.memory.bytes(self.regions.sprites[0]),
            board.memory.bytes(self.regions.sprites[1]),
        ];
        bus.video.render(sprite_ram).clone()
    }
}

impl System for DdribbleSystem {
    type Error = DdribbleError;

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
    use crate::bus::{inputs, MAIN, SOUND, SUB};
    use arcade_core::cpu::ScriptedCpu;
    use arcade_core::sound::SoundDevice;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn system() -> DdribbleSystem {
        DdribbleSystem::new().unwrap()
    }

    #[test]
    fn test_system_creation() {
        let system = system();
        let points = system.mount_points();
        assert_eq!(points.len(), 7);
        assert_eq!(points[0].id, "maincpu");
        assert!(!points[6].required);
        assert_eq!(system.machine().cpu_count(), 3);
    }

    #[test]
    fn test_shared_ram_between_main_and_sub() {
        let mut system = system();
        let m = system.machine_mut();
        m.write(MAIN, 0x4123, 0x5A);
        assert_eq!(m.read(SUB, 0x0123), 0x5A);
        m.write(SUB, 0x1FFF, 0xA5);
        assert_eq!(m.read(MAIN, 0x5FFF), 0xA5);

        let shared = m.board().memory.find("sharedram").unwrap();
        assert_eq!(m.owners(shared), vec![MAIN, SUB]);
    }

    #[test]
    fn test_sound_shared_ram_between_sub_and_sound() {
        let mut system = system();
        let m = system.machine_mut();
        m.write(SUB, 0x2010, 0x77);
        assert_eq!(m.read(SOUND, 0x0010), 0x77);
        let shared = m.board().memory.find("snd_sharedram").unwrap();
        assert_eq!(m.owners(shared), vec![SUB, SOUND]);
    }

    #[test]
    fn test_bank_switch() {
        let mut system = system();
        let mut image = vec![0u8; 0x20000];
        for page in 0..8 {
            image[0x10000 + page * 0x2000] = page as u8 + 1;
        }
        image[0xA000] = 0xEE;
        system.mount("maincpu", &image).unwrap();

        let m = system.machine_mut();
        assert_eq!(m.read(MAIN, 0x8000), 1);
        m.write(MAIN, 0x8000, 0x03);
        assert_eq!(m.read(MAIN, 0x8000), 4);
        // Only four bits decode
        m.write(MAIN, 0x8000, 0xF5);
        assert_eq!(m.read(MAIN, 0x8000), 6);
        // Pages past the image read as an empty socket
        m.write(MAIN, 0x8000, 0x0C);
        assert_eq!(m.read(MAIN, 0x8000), 0xFF);
        assert_eq!(m.read(MAIN, 0xA000), 0xEE);
    }

    #[test]
    fn test_rom_size_checked() {
        let mut system = system();
        let err = system.mount("cpu1", &[0; 0x100]).unwrap_err();
        assert!(matches!(
            err,
            DdribbleError::RomSize {
                expected: 0x10000,
                found: 0x100,
                ..
            }
        ));
        assert!(!system.is_mounted("cpu1"));
        assert!(matches!(
            system.mount("nope", &[]),
            Err(DdribbleError::InvalidMountPoint(_))
        ));
    }

    #[test]
    fn test_mount_and_unmount() {
        let mut system = system();
        system.mount("cpu2", &vec![0x12; 0x10000]).unwrap();
        assert!(system.is_mounted("cpu2"));
        assert_eq!(system.machine_mut().read(SOUND, 0x8000), 0x12);
        system.unmount("cpu2").unwrap();
        assert!(!system.is_mounted("cpu2"));
        assert_eq!(system.machine_mut().read(SOUND, 0x8000), 0xFF);
    }

    #[test]
    fn test_firq_gated_by_video_register() {
        let mut system = system();
        let main = ScriptedCpu::new(|_, _| {});
        let main_log = main.interrupt_log();
        let sub = ScriptedCpu::new(|_, _| {});
        let sub_log = sub.interrupt_log();
        system.attach_cpu(MAIN, Box::new(main)).unwrap();
        system.attach_cpu(SUB, Box::new(sub)).unwrap();

        system.step_frame().unwrap();
        assert!(main_log.borrow().is_empty());
        assert!(sub_log.borrow().is_empty());

        // Chip 0 register 4 bit 1: main CPU only
        system.machine_mut().write(MAIN, 0x0004, 0x02);
        system.step_frame().unwrap();
        system.step_frame().unwrap();
        assert_eq!(*main_log.borrow(), vec![InterruptKind::Firq; 2]);
        assert!(sub_log.borrow().is_empty());

        // Chip 1 register 4 bit 1: sub CPU
        system.machine_mut().write(MAIN, 0x0804, 0x02);
        system.machine_mut().write(MAIN, 0x0004, 0x00);
        system.step_frame().unwrap();
        assert_eq!(main_log.borrow().len(), 2);
        assert_eq!(*sub_log.borrow(), vec![InterruptKind::Firq]);
    }

    #[test]
    fn test_cpus_talk_through_shared_ram_while_running() {
        let mut system = system();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let out = Rc::clone(&seen);
        system
            .attach_cpu(MAIN, Box::new(ScriptedCpu::new(|bus, slice| {
                bus.write(0x4000, slice as u8);
            })))
            .unwrap();
        system
            .attach_cpu(SUB, Box::new(ScriptedCpu::new(move |bus, _| {
                out.borrow_mut().push(bus.read(0x0000));
            })))
            .unwrap();
        system.step_frame().unwrap();
        // The sub CPU runs right after the main CPU in every round
        let seen = seen.borrow();
        assert_eq!(seen.len(), 100);
        assert_eq!(seen[0], 0);
        assert_eq!(seen[42], 42);
    }

    #[test]
    fn test_inputs_and_dips() {
        let mut system = system();
        system.set_input(inputs::P1, 0xFE);
        system.set_input(inputs::DSW3, 0x0F);
        let m = system.machine_mut();
        assert_eq!(m.read(SUB, 0x2801), 0xFE);
        assert_eq!(m.read(SUB, 0x3000), 0x0F);
        assert_eq!(m.read(SUB, 0x2800), 0xFF);
    }

    #[test]
    fn test_coin_counters_and_watchdog() {
        let mut system = system();
        let m = system.machine_mut();
        m.write(SUB, 0x3400, 0x01);
        m.write(SUB, 0x3400, 0x01);
        m.write(SUB, 0x3400, 0x00);
        m.write(SUB, 0x3400, 0x03);
        m.write(SUB, 0x3C00, 0x00);
        assert_eq!(m.handler().coin_counters(), [2, 1]);
        assert_eq!(m.handler().watchdog_kicks(), 1);
    }

    struct Speech {
        busy: Rc<RefCell<bool>>,
        written: Rc<RefCell<Vec<(u32, u8)>>>,
    }

    impl SoundDevice for Speech {
        fn write(&mut self, offset: u32, data: u8) {
            self.written.borrow_mut().push((offset, data));
        }

        fn read(&mut self, _offset: u32) -> u8 {
            0
        }

        fn busy(&self) -> bool {
            *self.busy.borrow()
        }
    }

    #[test]
    fn test_vlm_busy_through_ym2203_port_a() {
        let mut system = system();
        let busy = Rc::new(RefCell::new(false));
        let written = Rc::new(RefCell::new(Vec::new()));
        system.machine_mut().handler_mut().vlm = Box::new(Speech {
            busy: Rc::clone(&busy),
            written: Rc::clone(&written),
        });

        let m = system.machine_mut();
        m.write(SOUND, 0x1000, 0x0E);
        assert_eq!(m.read(SOUND, 0x1001) & 0x01, 0);
        *busy.borrow_mut() = true;
        assert_eq!(m.read(SOUND, 0x1001) & 0x01, 1);

        // Port B carries the VLM control pins
        m.write(SOUND, 0x1000, 0x0F);
        m.write(SOUND, 0x1001, 0x40);
        m.write(SOUND, 0x3000, 0x9C);
        assert_eq!(m.handler().vlm_control(), 0x40);
        assert_eq!(*written.borrow(), vec![(1, 0x40), (0, 0x9C)]);
    }

    #[test]
    fn test_palette_ram_reads_back() {
        let mut system = system();
        let m = system.machine_mut();
        m.write(MAIN, 0x1800, 0x7C);
        m.write(MAIN, 0x187F, 0x1F);
        assert_eq!(m.read(MAIN, 0x1800), 0x7C);
        assert_eq!(m.read(MAIN, 0x187F), 0x1F);
        // Past the palette: unmapped
        assert_eq!(m.read(MAIN, 0x1880), 0xFF);
    }

    #[test]
    fn test_frame_shows_background_color() {
        let mut system = system();
        system.mount("gfx1", &vec![0u8; 0x40000]).unwrap();
        // Background chars use entries 0-15; entry 0 = pure red
        let m = system.machine_mut();
        m.write(MAIN, 0x1800, 0x00);
        m.write(MAIN, 0x1801, 0x1F);
        let frame = system.step_frame().unwrap();
        assert_eq!((frame.width, frame.height), (256, 224));
        assert_eq!(frame.pixels[0], 0xFFFF0000);
        assert_eq!(frame.pixels[1000], 0xFFFF0000);
    }

    #[test]
    fn test_reset_clears_enables_and_bank() {
        let mut system = system();
        system.machine_mut().write(MAIN, 0x0004, 0x02);
        system.machine_mut().write(MAIN, 0x8000, 0x05);
        system.reset();
        let board = system.machine().board();
        assert!(!board.irq.is_enabled(MAIN, InterruptKind::Firq));
        assert_eq!(board.memory.bank(system.regions.bank).selected(), 0);
    }
}
