//! Mandatory IEEE-488.2 commands, registered against the shared
//! instrument's status model.

use std::sync::{Arc, Mutex};

use crate::dispatcher::{self, Handler, Value};
use crate::error::ScpiEvent;
use crate::instrument::Instrument;
use crate::registry::Registry;

fn mask_from_args(args: &[String]) -> crate::error::Result<u8> {
    dispatcher::arg(args, 0)?
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|v| (0..128).contains(v))
        .map(|v| v as u8)
        .ok_or_else(|| ScpiEvent::device_error("enable mask must be between 0 and 2**7-1."))
}

pub fn register(registry: &mut Registry, instrument: Arc<Mutex<Instrument>>) {
    {
        let instrument = instrument.clone();
        registry
            .register(
                "*CLS",
                Handler::setter(move |_args, _channels| {
                    instrument.lock().unwrap().status.clear_status();
                    Ok(())
                }),
                None,
            )
            .expect("*CLS registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "*ESE",
                Handler::both(
                    {
                        let instrument = instrument.clone();
                        move |_args, _channels| {
                            Ok(Value::Integer(
                                instrument.lock().unwrap().status.sesr_enable() as i64,
                            ))
                        }
                    },
                    move |args, _channels| {
                        let mask = mask_from_args(args)?;
                        instrument.lock().unwrap().status.set_sesr_enable(mask)
                    },
                ),
                None,
            )
            .expect("*ESE registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "*ESR",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(
                        instrument.lock().unwrap().status.read_and_clear_sesr() as i64,
                    ))
                }),
                None,
            )
            .expect("*ESR registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "*IDN",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Str(instrument.lock().unwrap().identification().to_string()))
                }),
                None,
            )
            .expect("*IDN registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "*OPC",
                Handler::both(
                    |_args, _channels| Ok(Value::Bool(true)),
                    {
                        let instrument = instrument.clone();
                        move |_args, _channels| {
                            instrument
                                .lock()
                                .unwrap()
                                .status
                                .record(ScpiEvent::new(crate::error::CODE_OPERATION_COMPLETE));
                            Ok(())
                        }
                    },
                ),
                None,
            )
            .expect("*OPC registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "*RST",
                Handler::setter(move |_args, _channels| {
                    instrument.lock().unwrap().reset();
                    Ok(())
                }),
                None,
            )
            .expect("*RST registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "*SRE",
                Handler::both(
                    {
                        let instrument = instrument.clone();
                        move |_args, _channels| {
                            Ok(Value::Integer(
                                instrument.lock().unwrap().status.srq_enable() as i64,
                            ))
                        }
                    },
                    move |args, _channels| {
                        let mask = mask_from_args(args)?;
                        instrument.lock().unwrap().status.set_srq_enable(mask)
                    },
                ),
                None,
            )
            .expect("*SRE registration");
    }

    {
        let instrument = instrument.clone();
        registry
            .register(
                "*STB",
                Handler::getter(move |_args, _channels| {
                    Ok(Value::Integer(instrument.lock().unwrap().status.status_byte() as i64))
                }),
                None,
            )
            .expect("*STB registration");
    }

    registry
        .register("*TST", Handler::getter(|_args, _channels| Ok(Value::Integer(0))), None)
        .expect("*TST registration");

    registry
        .register("*WAI", Handler::setter(|_args, _channels| Ok(())), None)
        .expect("*WAI registration");
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
    fn idn_reports_vendor_string() {
        let (registry, _) = fresh();
        let token = parse_line("*IDN?").unwrap().remove(0);
        let resp = crate::dispatcher::execute(&registry, &token).unwrap().unwrap();
        assert!(resp.starts_with("SQDLab, Raspberry Pi GPIO,"));
    }

    #[test]
    fn opc_sets_sesr_bit_and_query_returns_true_immediately() {
        let (registry, instrument) = fresh();
        let set = parse_line("*OPC").unwrap().remove(0);
        crate::dispatcher::execute(&registry, &set).unwrap();
        assert_ne!(instrument.lock().unwrap().status.sesr() & 1, 0);

        let query = parse_line("*OPC?").unwrap().remove(0);
        let resp = crate::dispatcher::execute(&registry, &query).unwrap().unwrap();
        assert_eq!(resp, "1");
    }

    #[test]
    fn ese_rejects_out_of_range_mask() {
        let (registry, _) = fresh();
        let token = parse_line("*ESE 128").unwrap().remove(0);
        assert!(crate::dispatcher::execute(&registry, &token).is_err());
    }

    #[test]
    fn cls_clears_sesr_and_errors() {
        let (registry, instrument) = fresh();
        instrument
            .lock()
            .unwrap()
            .status
            .record(ScpiEvent::command_error("x"));
        let token = parse_line("*CLS").unwrap().remove(0);
        crate::dispatcher::execute(&registry, &token).unwrap();
        let mut guard = instrument.lock().unwrap();
        assert_eq!(guard.status.status_byte(), 0);
    }
}
