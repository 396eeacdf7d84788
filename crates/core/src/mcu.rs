//! Main CPU <-> microcontroller link through parallel ports.
//!
//! Taito's 68705 boards connect the main CPU to the MCU with two byte
//! latches. The MCU moves bytes through its port A and signals transfers
//! by toggling port B control bits:
//!
//! - a high-to-low edge on the *receive* bit copies the main CPU's byte
//!   into port A's input pins and clears the main CPU's "sent" flag (and the
//!   interrupt the main CPU raised on the MCU when it wrote);
//! - a low-to-high edge on the *send* bit copies port A's output latch into
//!   the byte the main CPU reads and sets the MCU's "sent" flag.
//!
//! Edges only count on pins configured as outputs in the port's DDR.

use crate::logging::{log, LogCategory, LogLevel};

/// One 8-bit port with a data-direction register.
///
/// Each DDR bit set makes that pin an output driven by the latch; clear
/// makes it an input read from the outside world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdrPort {
    pub latch: u8,
    pub input: u8,
    pub ddr: u8,
}

impl DdrPort {
    /// Output latch bits where DDR=1, external pins where DDR=0
    pub fn read(&self) -> u8 {
        (self.latch & self.ddr) | (self.input & !self.ddr)
    }

    pub fn write(&mut self, data: u8) {
        self.latch = data;
    }

    pub fn set_ddr(&mut self, ddr: u8) {
        self.ddr = ddr;
    }
}

/// Which port B bits strobe the transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McuStrobes {
    /// Falling edge: take the main CPU's byte
    pub receive: u8,
    /// Rising edge: publish a byte for the main CPU
    pub send: u8,
}

impl Default for McuStrobes {
    fn default() -> Self {
        Self {
            receive: 0x02,
            send: 0x04,
        }
    }
}

/// Side effect of a port B write the board has to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McuEvent {
    /// MCU took the main CPU's byte; release the MCU's interrupt line
    ReceivedFromMain { clear_irq: bool },
    /// MCU published a byte for the main CPU
    SentToMain(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McuLink {
    pub port_a: DdrPort,
    pub port_b: DdrPort,
    from_main: u8,
    from_mcu: u8,
    main_sent: bool,
    mcu_sent: bool,
    strobes: McuStrobes,
    /// XORed into the status byte; per-game wiring
    invert: u8,
}

/// Status bit: MCU is ready to take a byte from the main CPU
pub const STATUS_READY_TO_RECEIVE: u8 = 0x01;
/// Status bit, active low: reads 0 while the MCU has a byte waiting for
/// the main CPU
pub const STATUS_NO_RESULT: u8 = 0x02;

impl McuLink {
    pub fn new(strobes: McuStrobes) -> Self {
        Self {
            strobes,
            ..Self::default()
        }
    }

    /// A link whose status byte is XORed with `mask`
    pub fn with_status_invert(strobes: McuStrobes, mask: u8) -> Self {
        Self {
            strobes,
            invert: mask,
            ..Self::default()
        }
    }

    /// Main CPU writes a byte for the MCU.
    ///
    /// The board asserts the MCU's interrupt line alongside this call.
    pub fn main_write(&mut self, data: u8) {
        self.from_main = data;
        self.main_sent = true;
        log(LogCategory::Handshake, LogLevel::Trace, || {
            format!("main -> mcu {:02X}", data)
        });
    }

    /// Main CPU reads the MCU's byte, acknowledging it
    pub fn main_read(&mut self) -> u8 {
        self.mcu_sent = false;
        self.from_mcu
    }

    /// Handshake bits for the main CPU's status port, merged into `base`
    /// (the rest of that port is usually DIP switches or inputs).
    pub fn status(&self, base: u8) -> u8 {
        let mut res = base & !(STATUS_READY_TO_RECEIVE | STATUS_NO_RESULT);
        if !self.main_sent {
            res |= STATUS_READY_TO_RECEIVE;
        }
        if !self.mcu_sent {
            res |= STATUS_NO_RESULT;
        }
        res ^ self.invert
    }

    pub fn main_sent(&self) -> bool {
        self.main_sent
    }

    pub fn mcu_sent(&self) -> bool {
        self.mcu_sent
    }

    pub fn read_port_a(&self) -> u8 {
        self.port_a.read()
    }

    pub fn write_port_a(&mut self, data: u8) {
        self.port_a.write(data);
    }

    pub fn read_port_b(&self) -> u8 {
        self.port_b.read()
    }

    /// MCU writes port B; transfer strobes are detected against the
    /// previous latch value.
    pub fn write_port_b(&mut self, data: u8) -> Vec<McuEvent> {
        let mut events = Vec::new();
        let ddr = self.port_b.ddr;
        let old = self.port_b.latch;
        let receive = self.strobes.receive;
        let send = self.strobes.send;

        if ddr & receive != 0 && data & receive == 0 && old & receive != 0 {
            self.port_a.input = self.from_main;
            let clear_irq = self.main_sent;
            self.main_sent = false;
            log(LogCategory::Handshake, LogLevel::Trace, || {
                format!("mcu took {:02X}", self.from_main)
            });
            events.push(McuEvent::ReceivedFromMain { clear_irq });
        }
        if ddr & send != 0 && data & send != 0 && old & send == 0 {
            self.from_mcu = self.port_a.latch;
            self.mcu_sent = true;
            log(LogCategory::Handshake, LogLevel::Trace, || {
                format!("mcu -> main {:02X}", self.from_mcu)
            });
            events.push(McuEvent::SentToMain(self.from_mcu));
        }

        self.port_b.write(data);
        events
    }

    pub fn reset(&mut self) {
        *self = Self::with_status_invert(self.strobes, self.invert);
    }
}
