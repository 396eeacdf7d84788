//! CPU scheduling units.
//!
//! Instruction-set interpreters live outside this crate. The scheduler
//! only needs to hand a CPU a cycle budget and a bus, and to deliver the
//! interrupt the controller decided on; [`CpuCore`] is that contract.

use crate::interrupt::InterruptKind;
use std::cell::RefCell;
use std::rc::Rc;

/// Index of a CPU within its machine, in configuration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub usize);

/// Memory interface seen by a running CPU
pub trait MemoryBus {
    /// Read a byte from program space
    fn read(&mut self, addr: u32) -> u8;

    /// Write a byte to program space
    fn write(&mut self, addr: u32, val: u8);

    /// Read from I/O port space
    fn io_read(&mut self, port: u32) -> u8;

    /// Write to I/O port space
    fn io_write(&mut self, port: u32, val: u8);

    /// Big-endian word read, as a 68000 sees memory
    fn read_word(&mut self, addr: u32) -> u16 {
        let hi = self.read(addr) as u16;
        let lo = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Big-endian word write
    fn write_word(&mut self, addr: u32, val: u16) {
        self.write(addr, (val >> 8) as u8);
        self.write(addr.wrapping_add(1), val as u8);
    }
}

/// A CPU as the scheduler sees it.
pub trait CpuCore {
    fn reset(&mut self);

    /// Run for about `cycles` cycles; returns the cycles actually consumed.
    fn execute(&mut self, cycles: u32, bus: &mut dyn MemoryBus) -> u32;

    /// Enter the handler for `kind`. Called before `execute` when the
    /// interrupt controller has something to deliver.
    fn take_interrupt(&mut self, kind: InterruptKind);
}

/// A CPU that does nothing but use up its slice.
///
/// Boards are built with these until a real core is attached.
#[derive(Debug, Default, Clone)]
pub struct IdleCpu {
    pub cycles: u64,
    pub interrupts: u64,
}

impl CpuCore for IdleCpu {
    fn reset(&mut self) {
        self.cycles = 0;
        self.interrupts = 0;
    }

    fn execute(&mut self, cycles: u32, _bus: &mut dyn MemoryBus) -> u32 {
        self.cycles += cycles as u64;
        cycles
    }

    fn take_interrupt(&mut self, _kind: InterruptKind) {
        self.interrupts += 1;
    }
}

type Script = Box<dyn FnMut(&mut dyn MemoryBus, u64)>;

/// Shared view of the interrupts a [`ScriptedCpu`] has taken
pub type InterruptLog = Rc<RefCell<Vec<InterruptKind>>>;

/// A CPU whose slices run a closure instead of an instruction stream.
///
/// The closure receives the bus and the index of the slice being run. Every
/// interrupt delivered to it is recorded in order, which makes it the
/// stand-in for high-level emulation of a program and for tests.
pub struct ScriptedCpu {
    script: Script,
    slice: u64,
    taken: InterruptLog,
}

impl ScriptedCpu {
    pub fn new<F>(script: F) -> Self
    where
        F: FnMut(&mut dyn MemoryBus, u64) + 'static,
    {
        Self {
            script: Box::new(script),
            slice: 0,
            taken: InterruptLog::default(),
        }
    }

    /// Interrupts delivered so far, oldest first
    pub fn interrupts(&self) -> Vec<InterruptKind> {
        self.taken.borrow().clone()
    }

    /// Handle to the interrupt record that stays valid after the CPU has
    /// been handed to a machine
    pub fn interrupt_log(&self) -> InterruptLog {
        Rc::clone(&self.taken)
    }

    pub fn slices_run(&self) -> u64 {
        self.slice
    }
}

impl std::fmt::Debug for ScriptedCpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedCpu")
            .field("slice", &self.slice)
            .field("taken", &self.taken)
            .finish_non_exhaustive()
    }
}

impl CpuCore for ScriptedCpu {
    fn reset(&mut self) {
        self.slice = 0;
        self.taken.borrow_mut().clear();
    }

    fn execute(&mut self, cycles: u32, bus: &mut dyn MemoryBus) -> u32 {
        (self.script)(bus, self.slice);
        self.slice += 1;
        cycles
    }

    fn take_interrupt(&mut self, kind: InterruptKind) {
        self.taken.borrow_mut().push(kind);
    }
}
