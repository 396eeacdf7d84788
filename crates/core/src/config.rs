//! Machine configuration.
//!
//! Boards ship a default [`MachineConfig`]; a JSON document can replace it
//! or override individual fields, e.g. to raise `slices_per_frame` when a
//! game's CPUs need tighter synchronization.

use crate::cpu::CpuId;
use crate::error::ConfigError;
use crate::interrupt::InterruptKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuConfig {
    pub name: String,
    pub clock_hz: u32,
    /// How many periodic interrupts the CPU receives per frame
    #[serde(default = "default_interrupts_per_frame")]
    pub interrupts_per_frame: u32,
    /// Interrupt raised each period, if any
    #[serde(default)]
    pub periodic_interrupt: Option<InterruptKind>,
    /// Periodic interrupt only fires while its enable flag is set
    #[serde(default)]
    pub gated: bool,
}

fn default_interrupts_per_frame() -> u32 {
    1
}

impl CpuConfig {
    pub fn new(name: &str, clock_hz: u32) -> Self {
        Self {
            name: name.to_string(),
            clock_hz,
            interrupts_per_frame: 1,
            periodic_interrupt: None,
            gated: false,
        }
    }

    /// Periodic interrupt that always fires
    pub fn with_interrupt(mut self, kind: InterruptKind, per_frame: u32) -> Self {
        self.periodic_interrupt = Some(kind);
        self.interrupts_per_frame = per_frame;
        self.gated = false;
        self
    }

    /// Periodic interrupt subject to the CPU's enable flag
    pub fn with_gated_interrupt(mut self, kind: InterruptKind, per_frame: u32) -> Self {
        self.periodic_interrupt = Some(kind);
        self.interrupts_per_frame = per_frame;
        self.gated = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub name: String,
    pub frames_per_second: u32,
    /// Round-robin rounds per frame; more rounds, tighter CPU interleave
    pub slices_per_frame: u32,
    #[serde(default = "default_open_bus")]
    pub open_bus: u8,
    pub cpus: Vec<CpuConfig>,
}

fn default_open_bus() -> u8 {
    0xFF
}

impl MachineConfig {
    pub fn new(name: &str, frames_per_second: u32, slices_per_frame: u32) -> Self {
        Self {
            name: name.to_string(),
            frames_per_second,
            slices_per_frame,
            open_bus: default_open_bus(),
            cpus: Vec::new(),
        }
    }

    pub fn with_cpu(mut self, cpu: CpuConfig) -> Self {
        self.cpus.push(cpu);
        self
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply a partial JSON document on top of this configuration.
    ///
    /// Objects merge key by key; `cpus` entries merge by position.
    pub fn merge_json(&self, overrides: &str) -> Result<Self, ConfigError> {
        let patch: Value = serde_json::from_str(overrides)?;
        let mut base = serde_json::to_value(self)?;
        merge(&mut base, patch);
        let merged: Self = serde_json::from_value(base)?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_per_second == 0 || self.slices_per_frame == 0 {
            return Err(ConfigError::Parse(
                "frames_per_second and slices_per_frame must be non-zero".to_string(),
            ));
        }
        for cpu in &self.cpus {
            if let Some(kind) = cpu.periodic_interrupt.filter(|k| !k.is_valid()) {
                return Err(ConfigError::Parse(format!(
                    "cpu '{}' periodic interrupt {:?} is above Irq({})",
                    cpu.name,
                    kind,
                    InterruptKind::MAX_IRQ
                )));
            }
        }
        Ok(())
    }

    pub fn cpu(&self, id: CpuId) -> Result<&CpuConfig, ConfigError> {
        self.cpus.get(id.0).ok_or(ConfigError::UnknownCpu(id.0))
    }

    /// Cycle budget of one slice of `cpu`
    pub fn cycles_per_slice(&self, id: CpuId) -> u32 {
        let Some(cpu) = self.cpus.get(id.0) else {
            return 0;
        };
        let per_frame = cpu.clock_hz / self.frames_per_second.max(1);
        (per_frame / self.slices_per_frame.max(1)).max(1)
    }
}

fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(patch)) => {
            for (i, value) in patch.into_iter().enumerate() {
                match base.get_mut(i) {
                    Some(slot) => merge(slot, value),
                    None => base.push(value),
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
