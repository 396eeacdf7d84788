//! Interrupt line controller.
//!
//! Two styles of interrupt generation show up on these boards:
//!
//! - **Polled enables.** A register write sets or clears an enable bit;
//!   once per interrupt period the scheduler asks [`InterruptController::poll`]
//!   whether the CPU's periodic interrupt should fire. Disabled means the
//!   CPU runs its slice uninterrupted.
//! - **Immediate assertion.** A peer CPU's write (typically a sound command)
//!   drives a line directly with [`InterruptController::set_line`]. The
//!   target CPU sees it at the start of its next slice.
//!
//! [`NmiLatch`] covers the third shape: an NMI requested while NMIs are
//! masked is remembered (once) and fires the moment they are re-enabled.

use crate::cpu::CpuId;
use crate::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

/// Interrupt request classes on the modeled CPUs.
///
/// `Irq(n)` is maskable input `n`: the 6809 IRQ and Z80 INT are `Irq(0)`,
/// the HuC6280 uses `Irq(1)`/`Irq(2)`, a 68000 autovector level `n` is
/// `Irq(n)`. Inputs above `InterruptKind::MAX_IRQ` do not exist; the
/// controller ignores them and configuration rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterruptKind {
    Nmi,
    Firq,
    Irq(u8),
}

impl InterruptKind {
    /// Highest maskable input index
    pub const MAX_IRQ: u8 = 29;

    pub fn is_valid(self) -> bool {
        match self {
            InterruptKind::Irq(n) => n <= Self::MAX_IRQ,
            _ => true,
        }
    }

    /// Bit used in the per-cpu enable and line masks, 0 for an input
    /// that does not exist
    fn bit(self) -> u32 {
        match self {
            InterruptKind::Nmi => 1 << 31,
            InterruptKind::Firq => 1 << 30,
            InterruptKind::Irq(n) if n <= Self::MAX_IRQ => 1 << n,
            InterruptKind::Irq(_) => 0,
        }
    }
}

/// Drive state of an interrupt line, following MAME's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Line released
    Clear,
    /// Line held active until explicitly cleared
    Assert,
    /// Line pulsed; released when the CPU acknowledges it
    Hold,
}

#[derive(Debug, Clone, Default)]
struct CpuLines {
    enabled: u32,
    asserted: u32,
    held: u32,
    periodic: Option<InterruptKind>,
    gated: bool,
}

/// Per-machine interrupt state for every CPU.
#[derive(Debug, Clone)]
pub struct InterruptController {
    cpus: Vec<CpuLines>,
}

impl InterruptController {
    pub fn new(cpu_count: usize) -> Self {
        Self {
            cpus: vec![CpuLines::default(); cpu_count],
        }
    }

    /// Configure the interrupt a CPU receives each interrupt period.
    ///
    /// A gated source only fires while its enable flag is set; an ungated
    /// one fires every period.
    pub fn set_periodic(&mut self, cpu: CpuId, kind: Option<InterruptKind>, gated: bool) {
        if let Some(lines) = self.cpus.get_mut(cpu.0) {
            lines.periodic = kind;
            lines.gated = gated;
        }
    }

    pub fn periodic(&self, cpu: CpuId) -> Option<InterruptKind> {
        self.cpus.get(cpu.0).and_then(|l| l.periodic)
    }

    /// Enable flags go back to disabled and every line is released.
    pub fn reset(&mut self) {
        for lines in &mut self.cpus {
            lines.enabled = 0;
            lines.asserted = 0;
            lines.held = 0;
        }
    }

    /// Set or clear the enable flag for `kind` on `cpu`
    pub fn set_enabled(&mut self, cpu: CpuId, kind: InterruptKind, enabled: bool) {
        let Some(lines) = self.cpus.get_mut(cpu.0) else {
            return;
        };
        let before = lines.enabled & kind.bit() != 0;
        if enabled {
            lines.enabled |= kind.bit();
        } else {
            lines.enabled &= !kind.bit();
        }
        if before != enabled {
            log(LogCategory::Interrupts, LogLevel::Debug, || {
                format!("cpu{} {:?} {}", cpu.0, kind, if enabled { "enabled" } else { "disabled" })
            });
        }
    }

    pub fn is_enabled(&self, cpu: CpuId, kind: InterruptKind) -> bool {
        self.cpus
            .get(cpu.0)
            .is_some_and(|l| l.enabled & kind.bit() != 0)
    }

    /// The periodic interrupt this CPU should service now, if any.
    ///
    /// Returns the configured kind when the source is ungated or its enable
    /// flag is set, `None` ("no interrupt") otherwise.
    pub fn poll(&self, cpu: CpuId) -> Option<InterruptKind> {
        let lines = self.cpus.get(cpu.0)?;
        let kind = lines.periodic?;
        if !lines.gated || lines.enabled & kind.bit() != 0 {
            Some(kind)
        } else {
            None
        }
    }

    /// Drive a line directly, bypassing the enable flags.
    pub fn set_line(&mut self, cpu: CpuId, kind: InterruptKind, state: LineState) {
        let Some(lines) = self.cpus.get_mut(cpu.0) else {
            return;
        };
        if !kind.is_valid() {
            log(LogCategory::Interrupts, LogLevel::Warn, || {
                format!("cpu{} has no {:?} input, line ignored", cpu.0, kind)
            });
            return;
        }
        let bit = kind.bit();
        match state {
            LineState::Clear => {
                lines.asserted &= !bit;
                lines.held &= !bit;
            }
            LineState::Assert => {
                lines.asserted |= bit;
                lines.held &= !bit;
            }
            LineState::Hold => {
                lines.held |= bit;
            }
        }
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!("cpu{} {:?} line {:?}", cpu.0, kind, state)
        });
    }

    /// Whether `kind` is currently driven on `cpu` (asserted or held)
    pub fn line_active(&self, cpu: CpuId, kind: InterruptKind) -> bool {
        self.cpus
            .get(cpu.0)
            .is_some_and(|l| (l.asserted | l.held) & kind.bit() != 0)
    }

    /// Highest-priority active line on `cpu`, acknowledging it.
    ///
    /// Held lines are released by the acknowledge; asserted lines stay
    /// active until a handler clears them. Priority is NMI, then FIRQ, then
    /// maskable inputs from the highest index down.
    pub fn acknowledge(&mut self, cpu: CpuId) -> Option<InterruptKind> {
        let lines = self.cpus.get_mut(cpu.0)?;
        let active = lines.asserted | lines.held;
        if active == 0 {
            return None;
        }
        let top = 31 - active.leading_zeros();
        let kind = match top {
            31 => InterruptKind::Nmi,
            30 => InterruptKind::Firq,
            n => InterruptKind::Irq(n as u8),
        };
        lines.held &= !kind.bit();
        Some(kind)
    }
}

/// One-deep deferred NMI.
///
/// `trigger` while enabled fires at once. `trigger` while disabled arms a
/// single pending flag; any number of further triggers leave it armed
/// exactly once. `enable` fires the pending NMI, if any, and disarms it.
/// Each method returns `true` when an NMI must be delivered now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NmiLatch {
    enabled: bool,
    pending: bool,
}

impl NmiLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&mut self) -> bool {
        if self.enabled {
            true
        } else {
            self.pending = true;
            false
        }
    }

    pub fn enable(&mut self) -> bool {
        self.enabled = true;
        std::mem::take(&mut self.pending)
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: CpuId = CpuId(0);
    const SOUND: CpuId = CpuId(1);

    #[test]
    fn test_enable_write_makes_poll_return_kind() {
        let mut irq = InterruptController::new(2);
        irq.set_periodic(MAIN, Some(InterruptKind::Firq), true);

        assert_eq!(irq.poll(MAIN), None);
        irq.set_enabled(MAIN, InterruptKind::Firq, true);
        assert_eq!(irq.poll(MAIN), Some(InterruptKind::Firq));
        irq.set_enabled(MAIN, InterruptKind::Firq, false);
        assert_eq!(irq.poll(MAIN), None);
    }

    #[test]
    fn test_ungated_source_always_polls() {
        let mut irq = InterruptController::new(1);
        irq.set_periodic(MAIN, Some(InterruptKind::Irq(0)), false);
        assert_eq!(irq.poll(MAIN), Some(InterruptKind::Irq(0)));
    }

    #[test]
    fn test_hold_released_on_acknowledge() {
        let mut irq = InterruptController::new(2);
        irq.set_line(SOUND, InterruptKind::Irq(1), LineState::Hold);

        assert!(irq.line_active(SOUND, InterruptKind::Irq(1)));
        assert_eq!(irq.acknowledge(SOUND), Some(InterruptKind::Irq(1)));
        assert_eq!(irq.acknowledge(SOUND), None);
        assert_eq!(irq.acknowledge(MAIN), None);
    }

    #[test]
    fn test_assert_stays_until_cleared() {
        let mut irq = InterruptController::new(1);
        irq.set_line(MAIN, InterruptKind::Irq(0), LineState::Assert);

        assert_eq!(irq.acknowledge(MAIN), Some(InterruptKind::Irq(0)));
        assert_eq!(irq.acknowledge(MAIN), Some(InterruptKind::Irq(0)));
        irq.set_line(MAIN, InterruptKind::Irq(0), LineState::Clear);
        assert_eq!(irq.acknowledge(MAIN), None);
    }

    #[test]
    fn test_priority_order() {
        let mut irq = InterruptController::new(1);
        irq.set_line(MAIN, InterruptKind::Irq(4), LineState::Hold);
        irq.set_line(MAIN, InterruptKind::Irq(6), LineState::Hold);
        irq.set_line(MAIN, InterruptKind::Firq, LineState::Hold);
        irq.set_line(MAIN, InterruptKind::Nmi, LineState::Hold);

        assert_eq!(irq.acknowledge(MAIN), Some(InterruptKind::Nmi));
        assert_eq!(irq.acknowledge(MAIN), Some(InterruptKind::Firq));
        assert_eq!(irq.acknowledge(MAIN), Some(InterruptKind::Irq(6)));
        assert_eq!(irq.acknowledge(MAIN), Some(InterruptKind::Irq(4)));
        assert_eq!(irq.acknowledge(MAIN), None);
    }

    #[test]
    fn test_irq_inputs_past_the_last_are_ignored() {
        let mut irq = InterruptController::new(1);
        irq.set_line(MAIN, InterruptKind::Irq(30), LineState::Hold);
        assert!(!irq.line_active(MAIN, InterruptKind::Irq(29)));
        assert_eq!(irq.acknowledge(MAIN), None);

        irq.set_enabled(MAIN, InterruptKind::Irq(30), true);
        assert!(!irq.is_enabled(MAIN, InterruptKind::Irq(29)));

        irq.set_line(MAIN, InterruptKind::Irq(29), LineState::Hold);
        assert_eq!(irq.acknowledge(MAIN), Some(InterruptKind::Irq(29)));
        assert!(!InterruptKind::Irq(30).is_valid());
    }

    #[test]
    fn test_reset_disables_everything() {
        let mut irq = InterruptController::new(1);
        irq.set_periodic(MAIN, Some(InterruptKind::Firq), true);
        irq.set_enabled(MAIN, InterruptKind::Firq, true);
        irq.set_line(MAIN, InterruptKind::Nmi, LineState::Assert);

        irq.reset();
        assert_eq!(irq.poll(MAIN), None);
        assert_eq!(irq.acknowledge(MAIN), None);
        // The periodic source itself is configuration and survives reset
        assert_eq!(irq.periodic(MAIN), Some(InterruptKind::Firq));
    }

    #[test]
    fn test_unknown_cpu_is_ignored() {
        let mut irq = InterruptController::new(1);
        irq.set_line(CpuId(5), InterruptKind::Nmi, LineState::Assert);
        irq.set_enabled(CpuId(5), InterruptKind::Nmi, true);
        assert_eq!(irq.acknowledge(CpuId(5)), None);
        assert!(!irq.is_enabled(CpuId(5), InterruptKind::Nmi));
    }

    #[test]
    fn test_nmi_latch_fires_immediately_when_enabled() {
        let mut latch = NmiLatch::new();
        assert!(!latch.enable());
        assert!(latch.trigger());
        assert!(!latch.is_pending());
    }

    #[test]
    fn test_nmi_latch_two_triggers_while_disabled_fire_once() {
        let mut latch = NmiLatch::new();
        latch.disable();
        assert!(!latch.trigger());
        assert!(!latch.trigger());
        assert!(latch.is_pending());

        assert!(latch.enable());
        assert!(!latch.is_pending());
        // Re-enabling again has nothing left to deliver
        latch.disable();
        assert!(!latch.enable());
    }
}
