//! Mandatory SCPI commands: `SYSTem:*`, `STATus:*`, `QUEStionable:*`,
//! `PRESet`, plus the non-mandatory `SYSTem:HELP:HEADers?` introspection.

use std::sync::{Arc, Mutex};

use crate::dispatcher::{self, Handler, Value};
use crate::instrument::Instrument;
use crate::registry::Registry;

fn enable_mask_from_args(args: &[String]) -> crate::error::Result<u16> {
    dispatcher::arg(args, 0)?
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|v| (0..(1 << 15)).contains(v))
        .map(|v| v as u16)
        .ok_or_else(|| {
            crate::error::ScpiEvent::device_error("enable mask must be between 0 and 2**15-1.")
        })
}

pub fn register(registry: &mut Registry, instrument: Arc<Mutex<Instrument>>) {
    {
        let instrument = instrument.clone();
        registry
            .register(
                "SYSTem:ERRor",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Str(
                        instrument.lock().unwrap().status.pop_error().to_string(),
                    ))
                }),
                None,
            )
            .expect("SYSTem:ERRor registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "SYSTem:ERRor:NEXT",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Str(
                        instrument.lock().unwrap().status.pop_error().to_string(),
                    ))
                }),
                None,
            )
            .expect("SYSTem:ERRor:NEXT registration");
    }

    registry
        .register(
            "SYSTem:VERSion",
            Handler::getter(|_args, _channels| Ok(Value::Str("1999.0".to_string()))),
            None,
        )
        .expect("SYSTem:VERSion registration");

    {
        let instrument = instrument.clone();
        registry
            .register(
                "STATus:OPERation",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(
                        instrument.lock().unwrap().status.operation.read_event() as i64,
                    ))
                }),
                None,
            )
            .expect("STATus:OPERation registration");
    }
    {
        let instrument = instrument.clone();
        registry
            .register(
                "STATus:OPERation:EVENt",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(
                        instrument.lock().unwrap().status.operation.read_event() as i64,
                    ))
                }),
                None,
            )
            .expect("STATus:OPERation:EVENt registration");
    }
    {
        let instrument = instrument.clone();
        registry
            .register(
                "STATus:OPERation:CONDition",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(
                        instrument.lock().unwrap().status.operation.condition() as i64,
                    ))
                }),
                None,
            )
            .expect("STATus:OPERation:CONDition registration");
    }
    {
        let instrument = instrument.clone();
        registry
            .register(
                "STATus:OPERation:ENABle",
                Handler::both(
                    {
                        let instrument = instrument.clone();
                        move |_args, _channels| {
                            Ok(Value::Integer(
                                instrument.lock().unwrap().status.operation.enable() as i64,
                            ))
                        }
                    },
                    move |args, _channels| {
                        let mask = enable_mask_from_args(args)?;
                        instrument.lock().unwrap().status.operation.set_enable(mask)
                    },
                ),
                None,
            )
            .expect("STATus:OPERation:ENABle registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "QUEStionable",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(
                        instrument.lock().unwrap().status.questionable.read_event() as i64,
                    ))
                }),
                None,
            )
            .expect("QUEStionable registration");
    }
    {
        let instrument = instrument.clone();
        registry
            .register(
                "QUEStionable:EVENt",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(
                        instrument.lock().unwrap().status.questionable.read_event() as i64,
                    ))
                }),
                None,
            )
            .expect("QUEStionable:EVENt registration");
    }
    {
        let instrument = instrument.clone();
        registry
            .register(
                "QUEStionable:CONDition",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(
                        instrument.lock().unwrap().status.questionable.condition() as i64,
                    ))
                }),
                None,
            )
            .expect("QUEStionable:CONDition registration");
    }
    {
        let instrument = instrument.clone();
        registry
            .register(
                "QUEStionable:ENABle",
                Handler::both(
                    {
                        let instrument = instrument.clone();
                        move |_args, _channels| {
                            Ok(Value::Integer(
                                instrument.lock().unwrap().status.questionable.enable() as i64,
                            ))
                        }
                    },
                    move |args, _channels| {
                        let mask = enable_mask_from_args(args)?;
                        instrument.lock().unwrap().status.questionable.set_enable(mask)
                    },
                ),
                None,
            )
            .expect("QUEStionable:ENABle registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "PRESet",
                Handler::setter(move |_args, _channels| {
                    instrument.lock().unwrap().reset();
                    Ok(())
                }),
                None,
            )
            .expect("PRESet registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "SYSTem:HELP:HEADers",
                Handler::getter(move |_args, _channels| {
                    let headers = instrument.lock().unwrap().headers.clone();
                    Ok(Value::Block(headers.into_bytes()))
                }),
                None,
            )
            .expect("SYSTem:HELP:HEADers registration");
    }
}

/// Render the full header list for `SYSTem:HELP:HEADers?`: one line per
/// command, sorted, suffixed `?` (query-only), `/nquery` (set-only) or
/// bare (both), with any channel capacities rendered as `{1:N}`.
pub fn render_headers(registry: &Registry) -> String {
    let mut lines: Vec<String> = registry
        .commands()
        .iter()
        .map(|c| {
            let suffix = match (c.has_getter(), c.has_setter()) {
                (true, false) => "?",
                (false, true) => "/nquery",
                (true, true) => "",
                (false, false) => "/unknown/",
            };
            let channels = match &c.channels {
                Some(spec) => spec
                    .iter()
                    .filter_map(|cap| cap.map(|n| format!("{{1:{n}}}")))
                    .collect::<Vec<_>>()
                    .join(""),
                None => String::new(),
            };
            format!("{}{}{}", c.name, channels, suffix)
        })
        .collect();
    lines.sort();
    lines.join("\n")
}
