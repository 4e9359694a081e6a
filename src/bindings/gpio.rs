//! `GPIO:MEASure:DIGital:*` and `GPIO:SOURce:DIGital:*` command subtree
//! (spec §4.6), registered against the shared instrument's pin table.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::board::PIN_COUNT;
use crate::dispatcher::{self, Handler, Value};
use crate::error::ScpiEvent;
use crate::instrument::Instrument;
use crate::pin::{HardwareIO, Mode, Pin, Pull};
use crate::registry::Registry;

/// `time::sleep(delay + DELAY_CORRECTION)` in the source: the measured
/// pulse width runs `190µs` short of the requested delay on the reference
/// hardware, so the correction is subtracted before sleeping.
const DELAY_CORRECTION: f64 = -190e-6;
const PULSE_MIN_DELAY: f64 = 200e-6;
const PULSE_MAX_DELAY: f64 = 2.0;

fn channel_index(channels: &[Option<u32>]) -> usize {
    channels.last().copied().flatten().expect("channel spec guarantees a value") as usize
}

fn check_arg<'a, T: Copy>(
    label: &str,
    raw: &str,
    options: &'a [(&'a str, T)],
) -> crate::error::Result<T> {
    let upper = raw.to_uppercase();
    options
        .iter()
        .find(|(key, _)| *key == upper)
        .map(|(_, value)| *value)
        .ok_or_else(|| {
            let allowed: Vec<&str> = options.iter().map(|(k, _)| *k).collect();
            ScpiEvent::query_error(format!("{label} must be one of [{}].", allowed.join(", ")))
        })
}

fn pin_missing() -> ScpiEvent {
    ScpiEvent::device_error("pin is not present on this board")
}

/// Look up a pin for reading, alongside the hardware adapter it's read
/// through. Split out of `Instrument::pins`/`hardware` as disjoint
/// borrows of the same locked guard.
fn pin_and_hardware(
    instrument: &mut Instrument,
    id: usize,
) -> crate::error::Result<(&mut Pin, &dyn HardwareIO)> {
    let Instrument { pins, hardware, .. } = instrument;
    let pin = pins[id].as_mut().ok_or_else(pin_missing)?;
    Ok((pin, &**hardware))
}

fn value_arg(args: &[String]) -> crate::error::Result<bool> {
    check_arg(
        "DATA",
        dispatcher::arg(args, 0)?,
        &[
            ("0", false),
            ("1", true),
            ("LOW", false),
            ("HIGH", true),
            ("FALSE", false),
            ("TRUE", true),
        ],
    )
}

pub fn register(registry: &mut Registry, instrument: Arc<Mutex<Instrument>>) {
    let channels = Some(vec![None, None, None, Some(PIN_COUNT)]);

    {
        let instrument = instrument.clone();
        registry
            .register(
                "GPIO:MEASure:DIGital:DATA",
                Handler::getter(move |_args, channels| {
                    let id = channel_index(channels);
                    let mut guard = instrument.lock().unwrap();
                    let (pin, hw) = pin_and_hardware(&mut guard, id)?;
                    Ok(Value::Bool(pin.read_hardware(hw)))
                }),
                channels.clone(),
            )
            .expect("GPIO:MEASure:DIGital:DATA registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "GPIO:MEASure:DIGital:PULL",
                Handler::both(
                    {
                        let instrument = instrument.clone();
                        move |_args, channels| {
                            let id = channel_index(channels);
                            let guard = instrument.lock().unwrap();
                            let pin = guard.pins[id].as_ref().ok_or_else(pin_missing)?;
                            Ok(Value::Str(
                                match pin.pull() {
                                    Pull::Up => "UP",
                                    Pull::Down => "DOWN",
                                    Pull::Off => "NONE",
                                }
                                .to_string(),
                            ))
                        }
                    },
                    move |args, channels| {
                        let id = channel_index(channels);
                        let pull = check_arg(
                            "PULL",
                            dispatcher::arg(args, 0)?,
                            &[("UP", Pull::Up), ("DOWN", Pull::Down), ("NONE", Pull::Off)],
                        )?;
                        let mut guard = instrument.lock().unwrap();
                        let (pin, hw) = pin_and_hardware(&mut guard, id)?;
                        pin.set_pull(pull, hw)
                    },
                ),
                channels.clone(),
            )
            .expect("GPIO:MEASure:DIGital:PULL registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "GPIO:SOURce:DIGital:DATA",
                Handler::both(
                    {
                        let instrument = instrument.clone();
                        move |_args, channels| {
                            let id = channel_index(channels);
                            let guard = instrument.lock().unwrap();
                            let pin = guard.pins[id].as_ref().ok_or_else(pin_missing)?;
                            Ok(Value::Bool(pin.cached_value()))
                        }
                    },
                    move |args, channels| {
                        let id = channel_index(channels);
                        let value = value_arg(args)?;
                        let mut guard = instrument.lock().unwrap();
                        let (pin, hw) = pin_and_hardware(&mut guard, id)?;
                        pin.set_value(value, hw)
                    },
                ),
                channels.clone(),
            )
            .expect("GPIO:SOURce:DIGital:DATA registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "GPIO:SOURce:DIGital:IO",
                Handler::both(
                    {
                        let instrument = instrument.clone();
                        move |_args, channels| {
                            let id = channel_index(channels);
                            let guard = instrument.lock().unwrap();
                            let pin = guard.pins[id].as_ref().ok_or_else(pin_missing)?;
                            Ok(Value::Str(
                                match pin.mode() {
                                    Mode::In => "IN",
                                    Mode::Out => "OUT",
                                    Mode::I2c => "I2C",
                                    Mode::Pwm => "PWM",
                                    Mode::Serial => "SERIAL",
                                }
                                .to_string(),
                            ))
                        }
                    },
                    move |args, channels| {
                        let id = channel_index(channels);
                        let mode = check_arg(
                            "direction",
                            dispatcher::arg(args, 0)?,
                            &[("IN", Mode::In), ("OUT", Mode::Out)],
                        )?;
                        let mut guard = instrument.lock().unwrap();
                        let (pin, hw) = pin_and_hardware(&mut guard, id)?;
                        pin.set_mode(mode, hw)
                    },
                ),
                channels.clone(),
            )
            .expect("GPIO:SOURce:DIGital:IO registration");
    }

    {
        registry
            .register(
                "GPIO:SOURce:DIGital:PULSe",
                Handler::setter(move |args, channels| {
                    let id = channel_index(channels);
                    let value = value_arg(args)?;
                    let delay: f64 = dispatcher::arg(args, 1)?.trim().parse().map_err(|_| {
                        ScpiEvent::query_error(format!(
                            "unable to convert \"{}\" to float.",
                            dispatcher::arg(args, 1).unwrap_or("")
                        ))
                    })?;
                    if !(PULSE_MIN_DELAY..=PULSE_MAX_DELAY).contains(&delay) {
                        return Err(ScpiEvent::query_error("delay must be between 200us and 2s."));
                    }

                    // Held for the whole pulse, including the sleep: no other
                    // session's command may run while a pulse is in flight.
                    let mut guard = instrument.lock().unwrap();
                    let (pin, hw) = pin_and_hardware(&mut guard, id)?;
                    let restore = pin.cached_value();
                    pin.set_value(value, hw)?;

                    let sleep_secs = (delay + DELAY_CORRECTION).max(0.0);
                    thread::sleep(Duration::from_secs_f64(sleep_secs));

                    let (pin, hw) = pin_and_hardware(&mut guard, id)?;
                    pin.set_value(restore, hw)
                }),
                channels,
            )
            .expect("GPIO:SOURce:DIGital:PULSe registration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn fresh() -> (Registry, Arc<Mutex<Instrument>>) {
        let instrument = Arc::new(Mutex::new(Instrument::with_null_hardware()));
        let mut registry = Registry::new();
        register(&mut registry, instrument.clone());
        (registry, instrument)
    }

    #[test]
    fn configurable_pin_round_trips_direction_and_value() {
        let (registry, _) = fresh();
        let set_io = parse_line("GPIO:SOUR:DIG:IO7 OUT").unwrap().remove(0);
        crate::dispatcher::execute(&registry, &set_io).unwrap();
        let set_data = parse_line("GPIO:SOUR:DIG:DATA7 HIGH").unwrap().remove(0);
        crate::dispatcher::execute(&registry, &set_data).unwrap();
        let query = parse_line("GPIO:SOUR:DIG:DATA7?").unwrap().remove(0);
        let resp = crate::dispatcher::execute(&registry, &query).unwrap().unwrap();
        assert_eq!(resp, "1");
    }

    #[test]
    fn fixed_pin_rejects_direction_change_with_device_error() {
        let (registry, _) = fresh();
        let token = parse_line("GPIO:SOUR:DIG:IO1 IN").unwrap().remove(0);
        let err = crate::dispatcher::execute(&registry, &token).unwrap_err();
        assert_eq!(err.code, crate::error::CODE_DEVICE_ERROR);
    }

    #[test]
    fn unrecognised_argument_is_query_error_listing_options() {
        let (registry, _) = fresh();
        let token = parse_line("GPIO:SOUR:DIG:DATA7 MAYBE").unwrap().remove(0);
        let err = crate::dispatcher::execute(&registry, &token).unwrap_err();
        assert_eq!(err.code, crate::error::CODE_QUERY_ERROR);
        assert!(err.to_string().contains("DATA must be one of"));
    }

    #[test]
    fn pulse_out_of_range_delay_is_query_error() {
        let (registry, _) = fresh();
        let token = parse_line("GPIO:SOUR:DIG:PULS7 HIGH,3.0").unwrap().remove(0);
        let err = crate::dispatcher::execute(&registry, &token).unwrap_err();
        assert_eq!(err.code, crate::error::CODE_QUERY_ERROR);
    }

    #[test]
    fn absent_pin_27_is_device_error() {
        let (registry, _) = fresh();
        let token = parse_line("GPIO:SOUR:DIG:DATA27?").unwrap().remove(0);
        let err = crate::dispatcher::execute(&registry, &token).unwrap_err();
        assert_eq!(err.code, crate::error::CODE_DEVICE_ERROR);
    }

    #[test]
    fn pulse_applies_value_then_restores_after_delay() {
        let (registry, instrument) = fresh();
        let set_io = parse_line("GPIO:SOUR:DIG:IO7 OUT").unwrap().remove(0);
        crate::dispatcher::execute(&registry, &set_io).unwrap();
        let token = parse_line("GPIO:SOUR:DIG:PULS7 HIGH,0.0002").unwrap().remove(0);
        crate::dispatcher::execute(&registry, &token).unwrap();
        assert!(!instrument.lock().unwrap().pins[7].as_ref().unwrap().cached_value());
    }
}
