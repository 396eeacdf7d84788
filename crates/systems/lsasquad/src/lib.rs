//! Taito Land Sea Air Squad / Riku Kai Kuu Saizensen (1986)
//!
//! # Architecture
//!
//! - **CPUs**
//!   - main: Zilog Z80 @ 6 MHz, 8 KB ROM window over eight banks
//!   - sound: Zilog Z80 @ 4 MHz
//!   - MCU: Motorola 68705P5 @ 4 MHz, protection and game logic helper
//! - **Sound**: YM2203 and AY-3-8910
//! - **Video**: three column-strip tile layers driven by scroll RAM, 128
//!   sprites, 512 colors from three 4-bit color PROMs
//!
//! The main and sound CPUs talk through a command/result latch pair. A
//! command raises the sound CPU's NMI, unless the sound program has NMIs
//! masked; then one NMI is held back until they are unmasked.
//!
//! The main CPU and the MCU talk through two byte latches. The MCU moves
//! bytes with DDR-gated strobes on its port B; a main CPU write raises the
//! MCU's interrupt until the MCU takes the byte.

mod bus;
mod system;
mod video;

pub use bus::{inputs, LsasquadBus, Port};
pub use system::{default_config, LsasquadError, LsasquadSystem};
pub use video::{Video, VideoRam};
