//! Cooperative multi-CPU scheduler.
//!
//! A frame is `slices_per_frame` round-robin rounds. In each round every CPU
//! runs one slice of `clock / fps / slices` cycles, in configuration order.
//! Only one CPU executes at a time, so a byte one CPU stores in shared RAM
//! is what the next CPU to run reads, with no locking anywhere.
//!
//! Interrupts are resolved at slice boundaries. Before a CPU's slice the
//! scheduler raises its periodic interrupt when the slice index lands on the
//! CPU's interrupt schedule (subject to the polled enable flag for gated
//! sources), then delivers whatever the controller reports for that CPU.
//! A line a handler asserted during another CPU's slice is therefore seen
//! no later than the start of the target's next slice.

use crate::address_space::{AddressSpace, PortHandler};
use crate::board::Board;
use crate::config::MachineConfig;
use crate::cpu::{CpuCore, CpuId, IdleCpu, MemoryBus};
use crate::error::ConfigError;
use crate::interrupt::LineState;
use crate::logging::{log, LogCategory, LogLevel};
use crate::memory::RegionId;

/// What a running CPU's bus accesses go through
pub struct CpuBus<'a, H: PortHandler> {
    program: &'a AddressSpace<H::Port>,
    io: &'a AddressSpace<H::Port>,
    board: &'a mut Board,
    handler: &'a mut H,
}

impl<'a, H: PortHandler> CpuBus<'a, H> {
    pub fn new(
        program: &'a AddressSpace<H::Port>,
        io: &'a AddressSpace<H::Port>,
        board: &'a mut Board,
        handler: &'a mut H,
    ) -> Self {
        Self {
            program,
            io,
            board,
            handler,
        }
    }
}

impl<H: PortHandler> MemoryBus for CpuBus<'_, H> {
    fn read(&mut self, addr: u32) -> u8 {
        self.program.read(addr, self.board, self.handler)
    }

    fn write(&mut self, addr: u32, val: u8) {
        self.program.write(addr, val, self.board, self.handler)
    }

    fn io_read(&mut self, port: u32) -> u8 {
        self.io.read(port, self.board, self.handler)
    }

    fn io_write(&mut self, port: u32, val: u8) {
        self.io.write(port, val, self.board, self.handler)
    }
}

/// Program and I/O space of one CPU
pub struct CpuSpaces<P> {
    pub program: AddressSpace<P>,
    pub io: AddressSpace<P>,
}

impl<P: Copy + std::fmt::Debug> CpuSpaces<P> {
    pub fn program_only(program: AddressSpace<P>) -> Self {
        let io = AddressSpace::empty(&format!("{} io", program.name()));
        Self { program, io }
    }
}

struct CpuSlot<P> {
    core: Box<dyn CpuCore>,
    spaces: CpuSpaces<P>,
    cycles_per_slice: u32,
    /// Slice indices (within a frame) at which the periodic interrupt fires
    interrupt_slices: Vec<u32>,
    total_cycles: u64,
}

/// One machine instance: CPUs, their address spaces, the board and the
/// board-specific handler state.
pub struct Machine<H: PortHandler> {
    config: MachineConfig,
    cpus: Vec<CpuSlot<H::Port>>,
    board: Board,
    handler: H,
    frame: u64,
}

impl<H: PortHandler> Machine<H> {
    /// Assemble a machine. `spaces` holds one entry per configured CPU.
    /// Every CPU starts out as an [`IdleCpu`].
    pub fn new(
        config: MachineConfig,
        spaces: Vec<CpuSpaces<H::Port>>,
        mut board: Board,
        handler: H,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if spaces.len() != config.cpus.len() {
            return Err(ConfigError::CpuCountMismatch {
                board: spaces.len(),
                config: config.cpus.len(),
            });
        }
        board.open_bus = config.open_bus;
        board.irq = crate::interrupt::InterruptController::new(spaces.len());

        let slices = config.slices_per_frame;
        let mut cpus = Vec::with_capacity(spaces.len());
        for (i, spaces) in spaces.into_iter().enumerate() {
            let id = CpuId(i);
            let cpu = config.cpu(id)?;
            board
                .irq
                .set_periodic(id, cpu.periodic_interrupt, cpu.gated);
            cpus.push(CpuSlot {
                core: Box::new(IdleCpu::default()),
                spaces,
                cycles_per_slice: config.cycles_per_slice(id),
                interrupt_slices: interrupt_schedule(cpu.interrupts_per_frame, slices),
                total_cycles: 0,
            });
        }

        Ok(Self {
            config,
            cpus,
            board,
            handler,
            frame: 0,
        })
    }

    /// Replace the core that runs `cpu`
    pub fn attach(&mut self, cpu: CpuId, core: Box<dyn CpuCore>) -> Result<(), ConfigError> {
        let slot = self.cpus.get_mut(cpu.0).ok_or(ConfigError::UnknownCpu(cpu.0))?;
        slot.core = core;
        Ok(())
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Board and handler state together, for the video pass
    pub fn parts(&self) -> (&Board, &H) {
        (&self.board, &self.handler)
    }

    pub fn parts_mut(&mut self) -> (&mut Board, &mut H) {
        (&mut self.board, &mut self.handler)
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    /// CPUs whose program or I/O space maps `region`
    pub fn owners(&self, region: RegionId) -> Vec<CpuId> {
        self.cpus
            .iter()
            .enumerate()
            .filter(|(_, c)| c.spaces.program.maps_region(region) || c.spaces.io.maps_region(region))
            .map(|(i, _)| CpuId(i))
            .collect()
    }

    pub fn total_cycles(&self, cpu: CpuId) -> u64 {
        self.cpus.get(cpu.0).map_or(0, |c| c.total_cycles)
    }

    /// Bus view of `cpu`, as its core would see it
    pub fn bus(&mut self, cpu: CpuId) -> Option<CpuBus<'_, H>> {
        let slot = self.cpus.get(cpu.0)?;
        Some(CpuBus::new(
            &slot.spaces.program,
            &slot.spaces.io,
            &mut self.board,
            &mut self.handler,
        ))
    }

    pub fn read(&mut self, cpu: CpuId, addr: u32) -> u8 {
        match self.bus(cpu) {
            Some(mut bus) => bus.read(addr),
            None => self.board.open_bus,
        }
    }

    pub fn write(&mut self, cpu: CpuId, addr: u32, data: u8) {
        if let Some(mut bus) = self.bus(cpu) {
            bus.write(addr, data);
        }
    }

    /// Reset CPUs, interrupt state and bank selections
    pub fn reset(&mut self) {
        self.board.reset();
        for slot in &mut self.cpus {
            slot.core.reset();
            slot.total_cycles = 0;
        }
        self.frame = 0;
        log(LogCategory::Cpu, LogLevel::Info, || {
            format!("{}: reset", self.config.name)
        });
    }

    /// Run one slice of `cpu`, delivering interrupts first.
    pub fn run_slice(&mut self, cpu: CpuId, slice: u32) {
        let Some(slot) = self.cpus.get_mut(cpu.0) else {
            return;
        };

        if slot.interrupt_slices.contains(&slice) {
            if let Some(kind) = self.board.irq.poll(cpu) {
                self.board.irq.set_line(cpu, kind, LineState::Hold);
            }
        }
        if let Some(kind) = self.board.irq.acknowledge(cpu) {
            slot.core.take_interrupt(kind);
        }

        let mut bus = CpuBus::new(
            &slot.spaces.program,
            &slot.spaces.io,
            &mut self.board,
            &mut self.handler,
        );
        let used = slot.core.execute(slot.cycles_per_slice, &mut bus);
        slot.total_cycles += used as u64;
    }

    /// Run every CPU for one frame's worth of slices.
    pub fn run_frame(&mut self) {
        for slice in 0..self.config.slices_per_frame {
            for i in 0..self.cpus.len() {
                self.run_slice(CpuId(i), slice);
            }
        }
        self.frame += 1;
        log(LogCategory::Cpu, LogLevel::Trace, || {
            format!("{}: frame {} done", self.config.name, self.frame)
        });
    }
}

/// Evenly spaced slice indices for `per_frame` interrupts in `slices`
/// slices. The first interrupt of a frame lands on slice 0.
fn interrupt_schedule(per_frame: u32, slices: u32) -> Vec<u32> {
    if per_frame == 0 || slices == 0 {
        return Vec::new();
    }
    let per_frame = per_frame.min(slices);
    (0..per_frame)
        .map(|n| (n as u64 * slices as u64 / per_frame as u64) as u32)
        .collect()
}
