//! UPL Prehistoric Isle in 1930 (1989)
//!
//! # Architecture
//!
//! - **CPUs**
//!   - main: Motorola 68000 @ 9 MHz, IRQ 4 every frame
//!   - sound: Zilog Z80 @ 4 MHz, YM3812 and UPD7759 in its I/O space
//! - **Video**: ROM-mapped 16x16 background, RAM 16x16 foreground, 8x8
//!   text layer, 16x16 sprites in two priority banks, 1024 colors of
//!   palette RAM
//!
//! A command word written by the main CPU lands in the sound latch and
//! raises the Z80's NMI straight away; there is no mask and no result
//! path. The UPD7759 BUSY pin reads back through the sample port.

mod bus;
mod system;
mod video;

pub use bus::{inputs, PrehisleBus, Port};
pub use system::{default_config, PrehisleError, PrehisleSystem};
pub use video::{Graphics, Playfield, Video};
