//! The static 40-pin header table (spec §4.6): pins 1..40, with 27 and
//! 28 absent and no duplicated indices.

use crate::pin::{Mode, Pin, Pull};

/// Highest channel index the GPIO command subtree admits.
pub const PIN_COUNT: u32 = 40;

struct Entry {
    id: u32,
    mode_rst: Mode,
    value_rst: bool,
    pull_rst: Pull,
    configurable: bool,
    description: &'static str,
}

const fn fixed_entry(id: u32, value_rst: bool, pull_rst: Pull, description: &'static str) -> Entry {
    Entry {
        id,
        mode_rst: Mode::Out,
        value_rst,
        pull_rst,
        configurable: false,
        description,
    }
}

const fn gpio_entry(id: u32) -> Entry {
    Entry {
        id,
        mode_rst: Mode::Out,
        value_rst: false,
        pull_rst: Pull::Off,
        configurable: true,
        description: "GPIO",
    }
}

/// The board table as a sequence of `(id, entry)`; indices 27 and 28 are
/// skipped entirely, matching a real 40-pin header's unused positions.
fn entries() -> Vec<Entry> {
    vec![
        fixed_entry(1, true, Pull::Up, "3V3 supply"),
        fixed_entry(2, true, Pull::Up, "5V supply"),
        Entry {
            id: 3,
            mode_rst: Mode::Out,
            value_rst: false,
            pull_rst: Pull::Up,
            configurable: true,
            description: "I2C_SDA",
        },
        fixed_entry(4, true, Pull::Up, "5V supply"),
        Entry {
            id: 5,
            mode_rst: Mode::Out,
            value_rst: false,
            pull_rst: Pull::Up,
            configurable: true,
            description: "I2C_SCL",
        },
        fixed_entry(6, false, Pull::Down, "GND"),
        gpio_entry(7),
        gpio_entry(8),
        fixed_entry(9, false, Pull::Down, "GND"),
        gpio_entry(10),
        gpio_entry(11),
        gpio_entry(12),
        gpio_entry(13),
        fixed_entry(14, false, Pull::Down, "GND"),
        gpio_entry(15),
        gpio_entry(16),
        fixed_entry(17, true, Pull::Up, "3V3 supply"),
        gpio_entry(18),
        gpio_entry(19),
        fixed_entry(20, false, Pull::Down, "GND"),
        gpio_entry(21),
        gpio_entry(22),
        gpio_entry(23),
        gpio_entry(24),
        fixed_entry(25, false, Pull::Down, "GND"),
        gpio_entry(26),
        // 27, 28: not present on the header.
        gpio_entry(29),
        fixed_entry(30, false, Pull::Down, "GND"),
        gpio_entry(31),
        gpio_entry(32),
        gpio_entry(33),
        fixed_entry(34, false, Pull::Down, "GND"),
        gpio_entry(35),
        gpio_entry(36),
        gpio_entry(37),
        gpio_entry(38),
        fixed_entry(39, false, Pull::Down, "GND"),
        gpio_entry(40),
    ]
}

/// Build the pin table: index 0 is unused (channels are 1-based), and
/// indices 27/28 hold `None`.
pub fn build_pins() -> Vec<Option<Pin>> {
    let mut table: Vec<Option<Pin>> = (0..=PIN_COUNT).map(|_| None).collect();
    for e in entries() {
        table[e.id as usize] = Some(Pin::new(
            e.id,
            e.mode_rst,
            e.value_rst,
            e.pull_rst,
            e.configurable,
            false,
            false,
            false,
            e.description,
        ));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_27_and_28_are_absent() {
        let table = build_pins();
        assert!(table[27].is_none());
        assert!(table[28].is_none());
    }

    #[test]
    fn every_other_pin_1_to_40_is_present_and_unique() {
        let table = build_pins();
        let mut seen = std::collections::HashSet::new();
        for (idx, slot) in table.iter().enumerate().skip(1) {
            if idx == 27 || idx == 28 {
                continue;
            }
            let pin = slot.as_ref().unwrap();
            assert_eq!(pin.id as usize, idx);
            assert!(seen.insert(pin.id), "duplicate pin id {}", pin.id);
        }
    }

    #[test]
    fn power_and_ground_pins_are_fully_fixed() {
        let hw = crate::pin::NullHardware;
        let mut table = build_pins();
        let gnd = table[6].as_mut().unwrap();
        assert!(gnd.set_mode(Mode::In, &hw).is_err());
    }
}
