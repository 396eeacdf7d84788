//! Arcade board primitives and traits.
//!
//! Boards are assembled from a [`memory::Memory`] arena, one
//! [`address_space::AddressSpace`] pair per CPU, an
//! [`interrupt::InterruptController`] and driver-specific handler state, all
//! owned by a [`machine::Machine`]. Video hardware is built from the pieces
//! in [`video`].

pub mod address_space;
pub mod board;
pub mod config;
pub mod cpu;
pub mod error;
pub mod handshake;
pub mod input;
pub mod interrupt;
pub mod logging;
pub mod machine;
pub mod mcu;
pub mod memory;
pub mod renderer;
pub mod rom;
pub mod sound;
pub mod video;

pub mod types {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }
    }
}

pub use address_space::{AddressSpace, AddressSpaceBuilder, Capability, PortHandler};
pub use board::Board;
pub use config::{CpuConfig, MachineConfig};
pub use cpu::{CpuCore, CpuId, IdleCpu, MemoryBus, ScriptedCpu};
pub use error::{ConfigError, RomError};
pub use interrupt::{InterruptKind, LineState};
pub use machine::{CpuSpaces, Machine};
pub use memory::{BankId, Memory, RegionId};
pub use rom::{RomSet, RomSpec};

/// Description of a mount point (ROM slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier, the ROM region name (e.g. "maincpu", "gfx1")
    pub id: String,
    /// User-friendly name for display
    pub name: String,
    /// File extensions accepted by this mount point
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load a ROM image into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
