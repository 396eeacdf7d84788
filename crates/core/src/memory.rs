//! Backing stores for a machine's address spaces.
//!
//! All ROM, RAM and shared RAM of one machine lives in a [`Memory`] arena
//! and is referred to by [`RegionId`]. Address-space entries point into the
//! arena instead of owning buffers, which is what lets two CPUs map the same
//! shared region: both entries carry the same id.
//!
//! Bank switching is an index, not a pointer: a [`BankRegister`] names its
//! region, the base offset of page 0, the page size and the decode mask,
//! and a switch only changes the selected page number.

use crate::error::ConfigError;
use crate::logging::{log, LogCategory, LogLevel};

/// Index of a region in its [`Memory`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub usize);

/// Index of a bank register in its [`Memory`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BankId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Read-only program or data ROM
    Rom,
    /// RAM private to one CPU (or to a video chip)
    Ram,
    /// RAM visible to two CPUs; every window onto it spans the whole region
    Shared,
}

#[derive(Debug, Clone)]
pub struct Region {
    name: String,
    kind: RegionKind,
    data: Vec<u8>,
}

impl Region {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A selectable page window over part of a region.
#[derive(Debug, Clone)]
pub struct BankRegister {
    name: String,
    region: RegionId,
    base: usize,
    bank_size: usize,
    mask: u8,
    selected: u8,
}

impl BankRegister {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn bank_size(&self) -> usize {
        self.bank_size
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn selected(&self) -> u8 {
        self.selected
    }

    /// Latch a new page from a raw selector byte, decoded with the mask.
    pub fn select(&mut self, data: u8) {
        self.selected = data & self.mask;
    }

    /// Region offset of `offset` within the current page
    pub fn translate(&self, offset: usize) -> usize {
        self.base + self.selected as usize * self.bank_size + offset
    }

    /// Bytes of the region the highest selectable page reaches
    fn reach(&self) -> usize {
        self.base + (self.mask as usize + 1) * self.bank_size
    }
}

/// Region and bank arena owned by one machine instance.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    regions: Vec<Region>,
    banks: Vec<BankRegister>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, kind: RegionKind, data: Vec<u8>) -> RegionId {
        self.regions.push(Region {
            name: name.to_string(),
            kind,
            data,
        });
        RegionId(self.regions.len() - 1)
    }

    /// Add a ROM region with its initial contents
    pub fn add_rom(&mut self, name: &str, data: Vec<u8>) -> RegionId {
        self.push(name, RegionKind::Rom, data)
    }

    /// Add a zero-filled RAM region
    pub fn add_ram(&mut self, name: &str, size: usize) -> RegionId {
        self.push(name, RegionKind::Ram, vec![0; size])
    }

    /// Add a zero-filled region meant to be mapped by two CPUs
    pub fn add_shared(&mut self, name: &str, size: usize) -> RegionId {
        self.push(name, RegionKind::Shared, vec![0; size])
    }

    /// Add a bank register over `region`.
    ///
    /// `mask` is the hardware decode width (0x0F for 16 pages, 0x07 for 8).
    /// Fails unless every selectable page fits inside the region.
    pub fn add_bank(
        &mut self,
        name: &str,
        region: RegionId,
        base: usize,
        bank_size: usize,
        mask: u8,
    ) -> Result<BankId, ConfigError> {
        let target = self
            .regions
            .get(region.0)
            .ok_or_else(|| ConfigError::UnknownRegion(format!("#{}", region.0)))?;
        if mask & mask.wrapping_add(1) != 0 {
            return Err(ConfigError::BankMask {
                bank: name.to_string(),
                mask,
            });
        }
        let bank = BankRegister {
            name: name.to_string(),
            region,
            base,
            bank_size,
            mask,
            selected: 0,
        };
        if bank.reach() > target.len() {
            return Err(ConfigError::BankOutOfBounds {
                bank: name.to_string(),
                region: target.name.clone(),
                needed: bank.reach(),
                len: target.len(),
            });
        }
        self.banks.push(bank);
        Ok(BankId(self.banks.len() - 1))
    }

    /// Region `id`. Ids come from this arena's `add_*` calls; a foreign
    /// id panics, so configuration code uses `try_region`.
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    pub fn try_region(&self, id: RegionId) -> Result<&Region, ConfigError> {
        self.regions
            .get(id.0)
            .ok_or_else(|| ConfigError::UnknownRegion(format!("#{}", id.0)))
    }

    pub fn find(&self, name: &str) -> Option<RegionId> {
        self.regions.iter().position(|r| r.name == name).map(RegionId)
    }

    pub fn regions(&self) -> impl Iterator<Item = (RegionId, &Region)> {
        self.regions.iter().enumerate().map(|(i, r)| (RegionId(i), r))
    }

    /// Contents of region `id`, empty for an unknown id
    pub fn bytes(&self, id: RegionId) -> &[u8] {
        self.regions.get(id.0).map_or(&[][..], |r| r.data.as_slice())
    }

    pub fn bytes_mut(&mut self, id: RegionId) -> &mut [u8] {
        match self.regions.get_mut(id.0) {
            Some(region) => region.data.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Replace a region's contents, as a ROM loader does.
    ///
    /// The size is fixed at configuration time, so the data must match it.
    pub fn load(&mut self, id: RegionId, data: &[u8]) -> Result<(), ConfigError> {
        let region = self
            .regions
            .get_mut(id.0)
            .ok_or_else(|| ConfigError::UnknownRegion(format!("#{}", id.0)))?;
        if data.len() != region.data.len() {
            return Err(ConfigError::OutOfBounds {
                space: "loader".to_string(),
                start: 0,
                end: data.len().saturating_sub(1) as u32,
                region: region.name.clone(),
                needed: data.len(),
                len: region.data.len(),
            });
        }
        region.data.copy_from_slice(data);
        Ok(())
    }

    /// Byte at `offset`; reads past the end see the open-bus value
    pub fn peek(&self, id: RegionId, offset: usize, open_bus: u8) -> u8 {
        self.regions
            .get(id.0)
            .and_then(|r| r.data.get(offset))
            .copied()
            .unwrap_or(open_bus)
    }

    /// Store `val` at `offset`; out-of-range stores are dropped
    pub fn poke(&mut self, id: RegionId, offset: usize, val: u8) {
        if let Some(slot) = self.regions.get_mut(id.0).and_then(|r| r.data.get_mut(offset)) {
            *slot = val;
        }
    }

    pub fn bank(&self, id: BankId) -> &BankRegister {
        &self.banks[id.0]
    }

    pub fn try_bank(&self, id: BankId) -> Result<&BankRegister, ConfigError> {
        self.banks
            .get(id.0)
            .ok_or_else(|| ConfigError::UnknownRegion(format!("bank #{}", id.0)))
    }

    /// Bank-switch write: decode `data` with the bank's mask and latch it.
    pub fn select_bank(&mut self, id: BankId, data: u8) {
        if let Some(bank) = self.banks.get_mut(id.0) {
            let before = bank.selected;
            bank.select(data);
            if before != bank.selected {
                let (name, page) = (bank.name.clone(), bank.selected);
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("bank '{}' -> page {}", name, page)
                });
            }
        }
    }

    /// Read through a bank at `offset` within the page
    pub fn read_bank(&self, id: BankId, offset: usize, open_bus: u8) -> u8 {
        match self.banks.get(id.0) {
            Some(bank) => self.peek(bank.region, bank.translate(offset), open_bus),
            None => open_bus,
        }
    }

    /// Put every bank back on page 0
    pub fn reset_banks(&mut self) {
        for bank in &mut self.banks {
            bank.selected = 0;
        }
    }
}
