//! Pin state machine (spec §3/§4.6): mode/value/pull with per-attribute
//! fixity enforcement and asymmetric hardware-apply behaviour.

use crate::error::{Result, ScpiEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    In,
    Out,
    I2c,
    Pwm,
    Serial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
    Off,
}

/// Board-specific GPIO backend. A pin mutation calls exactly one of
/// `configure`/`configure_pull` depending on its mode (spec §3): an
/// input pushes both mode and pull to hardware, an output pushes the
/// pull alone.
pub trait HardwareIO: Send + Sync {
    fn configure(&self, id: u32, mode: Mode, pull: Pull);
    fn configure_pull(&self, id: u32, pull: Pull);
    fn write(&self, id: u32, value: bool);
    fn read(&self, id: u32) -> bool;
}

/// A `HardwareIO` that performs no I/O; every read returns `false`.
/// Used where no board-specific backend is wired in (tests, non-Pi hosts).
#[derive(Debug, Default)]
pub struct NullHardware;

impl HardwareIO for NullHardware {
    fn configure(&self, _id: u32, _mode: Mode, _pull: Pull) {}
    fn configure_pull(&self, _id: u32, _pull: Pull) {}
    fn write(&self, _id: u32, _value: bool) {}
    fn read(&self, _id: u32) -> bool {
        false
    }
}

pub struct Pin {
    pub id: u32,
    pub description: &'static str,

    mode: Mode,
    value: bool,
    pull: Pull,

    mode_rst: Mode,
    value_rst: bool,
    pull_rst: Pull,

    mode_fix: bool,
    value_fix: bool,
    pull_fix: bool,
}

impl Pin {
    /// Build a pin. If `configurable` is false all three fixity flags
    /// are forced true regardless of the individual flags given.
    pub fn new(
        id: u32,
        mode_rst: Mode,
        value_rst: bool,
        pull_rst: Pull,
        configurable: bool,
        mode_fix: bool,
        value_fix: bool,
        pull_fix: bool,
        description: &'static str,
    ) -> Self {
        let (mode_fix, value_fix, pull_fix) = if configurable {
            (mode_fix, value_fix, pull_fix)
        } else {
            (true, true, true)
        };
        Pin {
            id,
            description,
            mode: mode_rst,
            value: value_rst,
            pull: pull_rst,
            mode_rst,
            value_rst,
            pull_rst,
            mode_fix,
            value_fix,
            pull_fix,
        }
    }

    fn apply(&self, hw: &dyn HardwareIO) {
        match self.mode {
            Mode::Out => hw.configure_pull(self.id, self.pull),
            _ => hw.configure(self.id, self.mode, self.pull),
        }
    }

    /// Restore the three reset attributes and re-apply them to hardware.
    pub fn reset(&mut self, hw: &dyn HardwareIO) {
        self.mode = self.mode_rst;
        self.value = self.value_rst;
        self.pull = self.pull_rst;
        self.apply(hw);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pull(&self) -> Pull {
        self.pull
    }

    /// Last-set cached value (not a hardware read).
    pub fn cached_value(&self) -> bool {
        self.value
    }

    pub fn set_mode(&mut self, mode: Mode, hw: &dyn HardwareIO) -> Result<()> {
        if self.mode_fix {
            if self.mode != mode {
                return Err(ScpiEvent::device_error(format!(
                    "mode of pin {} is fixed.",
                    self.id
                )));
            }
            return Ok(());
        }
        self.mode = mode;
        self.apply(hw);
        Ok(())
    }

    pub fn set_pull(&mut self, pull: Pull, hw: &dyn HardwareIO) -> Result<()> {
        if self.pull_fix {
            if self.pull != pull {
                return Err(ScpiEvent::device_error(format!(
                    "pull-up/down resistor of pin {} is fixed.",
                    self.id
                )));
            }
            return Ok(());
        }
        self.pull = pull;
        self.apply(hw);
        Ok(())
    }

    /// Write the cached value; only drives hardware if the pin is
    /// currently an output.
    pub fn set_value(&mut self, value: bool, hw: &dyn HardwareIO) -> Result<()> {
        if self.value_fix {
            if self.value != value {
                return Err(ScpiEvent::device_error(format!(
                    "value of pin {} is fixed.",
                    self.id
                )));
            }
            return Ok(());
        }
        self.value = value;
        if self.mode == Mode::Out {
            hw.write(self.id, value);
        }
        Ok(())
    }

    /// Read the pin's live value: a fixed pin returns its reset value
    /// without touching hardware, otherwise reads hardware directly
    /// (the cache is not updated).
    pub fn read_hardware(&self, hw: &dyn HardwareIO) -> bool {
        if self.value_fix {
            self.value_rst
        } else {
            hw.read(self.id)
        }
    }
}
