//! Shared hardware context handed to every register handler.

use crate::input::InputPorts;
use crate::interrupt::InterruptController;
use crate::memory::Memory;

/// The parts of a machine that any handler may touch: the memory arena
/// (regions and bank registers), the interrupt lines of every CPU, and the
/// input ports.
///
/// Handlers run to completion while no CPU is mid-instruction, so plain
/// `&mut` access is all the synchronization there is.
#[derive(Debug, Clone)]
pub struct Board {
    pub memory: Memory,
    pub irq: InterruptController,
    pub inputs: InputPorts,
    /// Value an unmapped read returns
    pub open_bus: u8,
}

impl Board {
    pub fn new(memory: Memory, cpu_count: usize, open_bus: u8) -> Self {
        Self {
            memory,
            irq: InterruptController::new(cpu_count),
            inputs: InputPorts::default(),
            open_bus,
        }
    }

    /// Machine reset: banks back to page 0, interrupt enables and lines
    /// cleared. Memory contents are left as they are.
    pub fn reset(&mut self) {
        self.memory.reset_banks();
        self.irq.reset();
    }
}
