//! Data East Tumblepop (1991)
//!
//! # Architecture
//!
//! - **CPUs**
//!   - main: Motorola 68000 @ 14 MHz, IRQ 6 every frame
//!   - sound: Hudson HuC6280 @ 4.0275 MHz
//! - **Sound**: YM2151 and OKIM6295
//! - **Video**: two 64x32 playfields (the front one switchable between 8x8
//!   characters and 16x16 tiles), 256 sprites up to eight cells tall,
//!   1024 colors of palette RAM
//!
//! A command word from the main CPU lands in the sound latch and holds
//! the HuC6280's IRQ1 until it is taken. Sprites with their flash bit set
//! show on even frames only.

mod bus;
mod system;
mod video;

pub use bus::{inputs, Port, TumblepBus};
pub use system::{default_config, TumblepError, TumblepSystem};
pub use video::{ctrl, Graphics, Playfield, Video};
