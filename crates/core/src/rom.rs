//! ROM images and the regions they load into.
//!
//! A board lists its ROM regions as [`RomSpec`]s. Each one is a mount point
//! of the board's [`crate::System`]. A region can be larger than the image
//! dumped from the PCB (bank windows over unpopulated sockets); the part
//! past the image reads 0xFF, like an empty EPROM socket.

use crate::error::{ConfigError, RomError};
use crate::logging::{log, LogCategory, LogLevel};
use crate::memory::{Memory, RegionId};
use crate::MountPointInfo;

const EMPTY_SOCKET: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomSpec {
    /// Region name, also the mount point id
    pub region: &'static str,
    pub name: &'static str,
    /// Exact size of a dumped image
    pub image_size: usize,
    pub region_size: usize,
    pub required: bool,
}

impl RomSpec {
    pub const fn new(
        region: &'static str,
        name: &'static str,
        image_size: usize,
        region_size: usize,
        required: bool,
    ) -> Self {
        Self {
            region,
            name,
            image_size,
            region_size,
            required,
        }
    }

    pub fn mount_point(&self) -> MountPointInfo {
        MountPointInfo {
            id: self.region.to_string(),
            name: self.name.to_string(),
            extensions: vec!["bin".to_string(), "rom".to_string()],
            required: self.required,
        }
    }

    /// Region contents with nothing loaded
    pub fn blank(&self) -> Vec<u8> {
        vec![EMPTY_SOCKET; self.region_size]
    }

    /// Region contents for `image`, padded out to the region size
    pub fn fill(&self, image: &[u8]) -> Result<Vec<u8>, RomError> {
        if image.len() != self.image_size {
            return Err(RomError::Size {
                region: self.region.to_string(),
                expected: self.image_size,
                found: image.len(),
            });
        }
        let mut data = self.blank();
        data[..image.len()].copy_from_slice(image);
        Ok(data)
    }
}

/// A board's ROM regions and which of them hold an image.
#[derive(Debug, Clone)]
pub struct RomSet {
    specs: &'static [RomSpec],
    regions: Vec<RegionId>,
    mounted: Vec<bool>,
}

impl RomSet {
    /// Add a blank ROM region to `memory` for every spec
    pub fn new(specs: &'static [RomSpec], memory: &mut Memory) -> Self {
        let regions = specs
            .iter()
            .map(|spec| memory.add_rom(spec.region, spec.blank()))
            .collect();
        Self {
            specs,
            regions,
            mounted: vec![false; specs.len()],
        }
    }

    fn index(&self, id: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.region == id)
    }

    pub fn region(&self, id: &str) -> Result<RegionId, ConfigError> {
        self.index(id)
            .map(|i| self.regions[i])
            .ok_or_else(|| ConfigError::UnknownRegion(id.to_string()))
    }

    pub fn specs(&self) -> &'static [RomSpec] {
        self.specs
    }

    pub fn mount_points(&self) -> Vec<MountPointInfo> {
        self.specs.iter().map(RomSpec::mount_point).collect()
    }

    /// Load `image` into region `id`
    pub fn mount(&mut self, memory: &mut Memory, id: &str, image: &[u8]) -> Result<RegionId, RomError> {
        let index = self
            .index(id)
            .ok_or_else(|| RomError::UnknownMountPoint(id.to_string()))?;
        let data = self.specs[index].fill(image)?;
        let region = self.regions[index];
        // Sizes match by construction
        if memory.load(region, &data).is_ok() {
            self.mounted[index] = true;
            log(LogCategory::Bus, LogLevel::Info, || {
                format!("rom '{}' loaded ({:#X} bytes)", id, image.len())
            });
        }
        Ok(region)
    }

    /// Blank region `id` again
    pub fn unmount(&mut self, memory: &mut Memory, id: &str) -> Result<RegionId, RomError> {
        let index = self
            .index(id)
            .ok_or_else(|| RomError::UnknownMountPoint(id.to_string()))?;
        let region = self.regions[index];
        if memory.load(region, &self.specs[index].blank()).is_ok() {
            self.mounted[index] = false;
        }
        Ok(region)
    }

    pub fn is_mounted(&self, id: &str) -> bool {
        self.index(id).is_some_and(|i| self.mounted[i])
    }

    /// Whether every required region holds an image
    pub fn is_complete(&self) -> bool {
        self.specs
            .iter()
            .zip(&self.mounted)
            .all(|(spec, &mounted)| mounted || !spec.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ROMS: [RomSpec; 2] = [
        RomSpec::new("maincpu", "Main CPU", 4, 8, true),
        RomSpec::new("proms", "Color PROMs", 2, 2, false),
    ];

    #[test]
    fn test_blank_regions_read_empty_socket() {
        let mut memory = Memory::new();
        let roms = RomSet::new(&ROMS, &mut memory);
        let main = roms.region("maincpu").unwrap();
        assert_eq!(memory.bytes(main), &[0xFF; 8]);
        assert!(!roms.is_mounted("maincpu"));
        assert!(!roms.is_complete());
    }

    #[test]
    fn test_mount_pads_region() {
        let mut memory = Memory::new();
        let mut roms = RomSet::new(&ROMS, &mut memory);
        let main = roms.mount(&mut memory, "maincpu", &[1, 2, 3, 4]).unwrap();
        assert_eq!(memory.bytes(main), &[1, 2, 3, 4, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(roms.is_mounted("maincpu"));
        assert!(roms.is_complete());

        roms.unmount(&mut memory, "maincpu").unwrap();
        assert_eq!(memory.bytes(main), &[0xFF; 8]);
        assert!(!roms.is_mounted("maincpu"));
    }

    #[test]
    fn test_mount_rejects_wrong_size() {
        let mut memory = Memory::new();
        let mut roms = RomSet::new(&ROMS, &mut memory);
        assert_eq!(
            roms.mount(&mut memory, "maincpu", &[0; 8]),
            Err(RomError::Size {
                region: "maincpu".to_string(),
                expected: 4,
                found: 8,
            })
        );
        assert!(!roms.is_mounted("maincpu"));
    }

    #[test]
    fn test_unknown_mount_point() {
        let mut memory = Memory::new();
        let mut roms = RomSet::new(&ROMS, &mut memory);
        assert_eq!(
            roms.mount(&mut memory, "gfx9", &[]),
            Err(RomError::UnknownMountPoint("gfx9".to_string()))
        );
        assert!(roms.region("gfx9").is_err());
        assert_eq!(roms.mount_points().len(), 2);
        assert!(roms.mount_points()[0].required);
    }
}
