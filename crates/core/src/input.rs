//! Input ports (joysticks, buttons, DIP switches).
//!
//! The core only passes these bytes through to the read handlers that
//! expose them. Ports are active low, so an untouched port reads 0xFF.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPorts {
    ports: Vec<u8>,
}

impl InputPorts {
    pub fn new(count: usize) -> Self {
        Self {
            ports: vec![0xFF; count],
        }
    }

    /// Current value of port `index`; missing ports float high
    pub fn read_input_port(&self, index: usize) -> u8 {
        self.ports.get(index).copied().unwrap_or(0xFF)
    }

    pub fn set(&mut self, index: usize, value: u8) {
        if index >= self.ports.len() {
            self.ports.resize(index + 1, 0xFF);
        }
        self.ports[index] = value;
    }

    /// Press (`true`) or release the bits in `mask` of an active-low port
    pub fn set_active_low(&mut self, index: usize, mask: u8, pressed: bool) {
        let current = self.read_input_port(index);
        self.set(index, if pressed { current & !mask } else { current | mask });
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl Default for InputPorts {
    fn default() -> Self {
        Self::new(0)
    }
}
