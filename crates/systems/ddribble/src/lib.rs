//! Konami Double Dribble (1986)
//!
//! # Architecture
//!
//! - **CPUs**: three Motorola 6809 @ 1.536 MHz
//!   - main: game logic and both video chips
//!   - sub: inputs, DIP switches, coin counters, watchdog
//!   - sound: YM2203 and VLM5030
//! - **Video**: two Konami 005885 tilemap/sprite controllers. Chip 0 drives
//!   the foreground layer and the first sprite list, chip 1 the background
//!   layer and the second sprite list.
//! - **Sound**: Yamaha YM2203 (FM + SSG) and Sanyo VLM5030 speech. The
//!   VLM5030 busy pin is wired to YM2203 port A, its control pins to port B.
//! - **Memory**: 8 KB shared between main and sub, 2 KB shared between sub
//!   and sound, a 16-entry bank register selecting an 8 KB window of the
//!   main ROM.
//!
//! Each video chip's register 4 bit 1 enables the FIRQ of the CPU it
//! serves (chip 0 the main CPU, chip 1 the sub CPU); the interrupt fires
//! once per frame while enabled.

mod bus;
mod system;
mod video;

pub use bus::{inputs, DdribbleBus, Port};
pub use system::{default_config, DdribbleError, DdribbleSystem};
pub use video::{Playfield, Video};
