//! Per-CPU address decoding.
//!
//! An [`AddressSpace`] is two sorted, non-overlapping range lists, one for
//! reads and one for writes, each entry carrying a [`Capability`]:
//!
//! | Capability | read                         | write                    |
//! |------------|------------------------------|--------------------------|
//! | `Ram`      | region byte                  | region byte              |
//! | `Rom`      | region byte                  | discarded                |
//! | `Banked`   | byte in the selected page    | page byte if region is RAM |
//! | `Port(p)`  | driver handler               | driver handler           |
//! | `Nop`      | open bus                     | discarded                |
//!
//! Addresses no entry covers behave like a floating bus: reads return the
//! board's open-bus value and writes vanish. That is normal hardware
//! behavior, not an error.
//!
//! The table is validated once by [`AddressSpaceBuilder::build`] and never
//! changes afterwards; bank switching changes what a `Banked` entry sees,
//! not the table.

use crate::board::Board;
use crate::error::{ConfigError, Direction};
use crate::logging::{log, LogCategory, LogLevel};
use crate::memory::{BankId, Memory, RegionId, RegionKind};

/// Semantic register handlers of one board.
///
/// `Port` is the board's own tag type; the address space stores tags and
/// hands them back here together with the offset of the access inside the
/// mapped range.
pub trait PortHandler {
    type Port: Copy + std::fmt::Debug;

    fn read_port(&mut self, port: Self::Port, offset: u32, board: &mut Board) -> u8;

    fn write_port(&mut self, port: Self::Port, offset: u32, data: u8, board: &mut Board);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    Program,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<P> {
    Ram { region: RegionId, offset: usize },
    Rom { region: RegionId, offset: usize },
    Banked(BankId),
    Port(P),
    Nop,
}

impl<P> Capability<P> {
    /// Plain RAM starting at the beginning of `region`
    pub fn ram(region: RegionId) -> Self {
        Capability::Ram { region, offset: 0 }
    }

    /// ROM starting at the beginning of `region`
    pub fn rom(region: RegionId) -> Self {
        Capability::Rom { region, offset: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntry<P> {
    pub start: u32,
    pub end: u32,
    pub capability: Capability<P>,
}

impl<P> MapEntry<P> {
    fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }
}

#[derive(Debug, Clone)]
pub struct AddressSpace<P> {
    name: String,
    reads: Vec<MapEntry<P>>,
    writes: Vec<MapEntry<P>>,
}

fn lookup<P>(entries: &[MapEntry<P>], addr: u32) -> Option<&MapEntry<P>> {
    // Entries are sorted by start and disjoint: the only candidate is the
    // last one starting at or below addr.
    let idx = entries.partition_point(|e| e.start <= addr);
    entries[..idx].last().filter(|e| addr <= e.end)
}

impl<P: Copy + std::fmt::Debug> AddressSpace<P> {
    /// A space with nothing mapped; every access hits the open bus
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read_entry(&self, addr: u32) -> Option<&MapEntry<P>> {
        lookup(&self.reads, addr)
    }

    pub fn write_entry(&self, addr: u32) -> Option<&MapEntry<P>> {
        lookup(&self.writes, addr)
    }

    /// Whether any window of this space is backed directly by `region`
    pub fn maps_region(&self, region: RegionId) -> bool {
        self.reads.iter().chain(&self.writes).any(|e| match e.capability {
            Capability::Ram { region: r, .. } | Capability::Rom { region: r, .. } => r == region,
            _ => false,
        })
    }

    pub fn read<H>(&self, addr: u32, board: &mut Board, handler: &mut H) -> u8
    where
        H: PortHandler<Port = P>,
    {
        let open_bus = board.open_bus;
        let Some(entry) = lookup(&self.reads, addr) else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("{}: open bus read {:06X}", self.name, addr)
            });
            return open_bus;
        };
        let offset = addr - entry.start;
        match entry.capability {
            Capability::Ram { region, offset: base } | Capability::Rom { region, offset: base } => {
                board.memory.peek(region, base + offset as usize, open_bus)
            }
            Capability::Banked(bank) => board.memory.read_bank(bank, offset as usize, open_bus),
            Capability::Port(port) => handler.read_port(port, offset, board),
            Capability::Nop => open_bus,
        }
    }

    pub fn write<H>(&self, addr: u32, data: u8, board: &mut Board, handler: &mut H)
    where
        H: PortHandler<Port = P>,
    {
        let Some(entry) = lookup(&self.writes, addr) else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("{}: open bus write {:06X} = {:02X}", self.name, addr, data)
            });
            return;
        };
        let offset = addr - entry.start;
        match entry.capability {
            Capability::Ram { region, offset: base } => {
                board.memory.poke(region, base + offset as usize, data)
            }
            Capability::Rom { .. } | Capability::Nop => {}
            Capability::Banked(bank) => {
                let (region, at) = {
                    let bank = board.memory.bank(bank);
                    (bank.region(), bank.translate(offset as usize))
                };
                if board.memory.region(region).kind() != RegionKind::Rom {
                    board.memory.poke(region, at, data);
                }
            }
            Capability::Port(port) => handler.write_port(port, offset, data, board),
        }
    }
}

/// Collects ranges for one address space and validates them.
#[derive(Debug, Clone)]
pub struct AddressSpaceBuilder<P> {
    name: String,
    reads: Vec<MapEntry<P>>,
    writes: Vec<MapEntry<P>>,
}

impl<P: Copy + std::fmt::Debug> AddressSpaceBuilder<P> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn read(mut self, start: u32, end: u32, capability: Capability<P>) -> Self {
        self.reads.push(MapEntry {
            start,
            end,
            capability,
        });
        self
    }

    pub fn write(mut self, start: u32, end: u32, capability: Capability<P>) -> Self {
        self.writes.push(MapEntry {
            start,
            end,
            capability,
        });
        self
    }

    /// Same capability for both reads and writes
    pub fn read_write(self, start: u32, end: u32, capability: Capability<P>) -> Self {
        self.read(start, end, capability).write(start, end, capability)
    }

    /// Sort, check every range against `memory`, and freeze the table.
    pub fn build(self, memory: &Memory) -> Result<AddressSpace<P>, ConfigError> {
        let reads = Self::validate(&self.name, Direction::Read, self.reads, memory)?;
        let writes = Self::validate(&self.name, Direction::Write, self.writes, memory)?;
        Ok(AddressSpace {
            name: self.name,
            reads,
            writes,
        })
    }

    fn validate(
        space: &str,
        direction: Direction,
        mut entries: Vec<MapEntry<P>>,
        memory: &Memory,
    ) -> Result<Vec<MapEntry<P>>, ConfigError> {
        for entry in &entries {
            if entry.end < entry.start {
                return Err(ConfigError::InvertedRange {
                    space: space.to_string(),
                    direction,
                    start: entry.start,
                    end: entry.end,
                });
            }
            Self::check_backing(space, entry, memory)?;
        }

        entries.sort_by_key(|e| e.start);
        for pair in entries.windows(2) {
            if pair[1].start <= pair[0].end {
                return Err(ConfigError::Overlap {
                    space: space.to_string(),
                    direction,
                    start: pair[1].start,
                    end: pair[1].end,
                    other_start: pair[0].start,
                    other_end: pair[0].end,
                });
            }
        }
        Ok(entries)
    }

    fn check_backing(space: &str, entry: &MapEntry<P>, memory: &Memory) -> Result<(), ConfigError> {
        let (region, needed) = match entry.capability {
            Capability::Ram { region, offset } | Capability::Rom { region, offset } => {
                (region, offset + entry.len())
            }
            Capability::Banked(bank) => {
                let bank = memory.try_bank(bank)?;
                if entry.len() > bank.bank_size() {
                    return Err(ConfigError::OutOfBounds {
                        space: space.to_string(),
                        start: entry.start,
                        end: entry.end,
                        region: format!("{} (page)", bank.name()),
                        needed: entry.len(),
                        len: bank.bank_size(),
                    });
                }
                return Ok(());
            }
            Capability::Port(_) | Capability::Nop => return Ok(()),
        };

        let target = memory.try_region(region)?;
        if target.kind() == RegionKind::Shared && (entry.len() != target.len() || needed != entry.len()) {
            return Err(ConfigError::SharedSizeMismatch {
                space: space.to_string(),
                start: entry.start,
                end: entry.end,
                region: target.name().to_string(),
                expected: target.len(),
                found: entry.len(),
            });
        }
        if needed > target.len() {
            return Err(ConfigError::OutOfBounds {
                space: space.to_string(),
                start: entry.start,
                end: entry.end,
                region: target.name().to_string(),
                needed,
                len: target.len(),
            });
        }
        Ok(())
    }
}
