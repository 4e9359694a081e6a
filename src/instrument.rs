//! Instrument facade (spec component 9): owns the pin table, status
//! model and hardware adapter behind one mutex; builds the registry once.

use std::sync::{Arc, Mutex};

use log::warn;

use crate::board;
use crate::bindings;
use crate::dispatcher;
use crate::error::ScpiEvent;
use crate::parser;
use crate::pin::{HardwareIO, NullHardware, Pin};
use crate::registry::Registry;
use crate::status::StatusModel;

/// Everything a session thread touches while executing one line, all
/// reachable only while holding the surrounding `Arc<Mutex<_>>`.
pub struct Instrument {
    pub pins: Vec<Option<Pin>>,
    pub status: StatusModel,
    pub hardware: Box<dyn HardwareIO>,
    pub strict_errors: bool,
    identification: String,
    /// Rendered `SYSTem:HELP:HEADers?` payload, filled in once by
    /// `build_registry` after every command has been registered.
    pub headers: String,
}

fn read_serial() -> String {
    match std::fs::read_to_string("/proc/cpuinfo") {
        Ok(contents) => contents
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                (key.trim() == "Serial").then(|| value.trim().to_string())
            })
            .unwrap_or_else(|| "?".to_string()),
        Err(_) => "?".to_string(),
    }
}

impl Instrument {
    pub fn new(hardware: Box<dyn HardwareIO>, strict_errors: bool) -> Self {
        let pins = board::build_pins();
        let identification = format!("SQDLab, Raspberry Pi GPIO, {}, V1", read_serial());
        Instrument {
            pins,
            status: StatusModel::new(),
            hardware,
            strict_errors,
            identification,
            headers: String::new(),
        }
    }

    pub fn with_null_hardware() -> Self {
        Instrument::new(Box::new(NullHardware), false)
    }

    pub fn identification(&self) -> &str {
        &self.identification
    }

    /// `*RST`/`PRESet`: a no-op, matching the source's empty `pass`.
    pub fn reset(&mut self) {}
}

/// Build the full command registry against a shared instrument.
pub fn build_registry(instrument: Arc<Mutex<Instrument>>) -> Registry {
    let mut registry = Registry::new();
    bindings::ieee488::register(&mut registry, instrument.clone());
    bindings::system::register(&mut registry, instrument.clone());
    bindings::gpio::register(&mut registry, instrument.clone());
    instrument.lock().unwrap().headers = bindings::system::render_headers(&registry);
    registry
}

/// Process one already-framed line against `registry`/`instrument`,
/// returning the text to send back (without a terminator).
///
/// Parsing and execution are interleaved piece by piece: a piece that
/// fails to parse queues its event and aborts the rest of the line, but
/// pieces before it have already executed and their responses are kept.
pub fn process_line(
    registry: &Registry,
    instrument: &Arc<Mutex<Instrument>>,
    line: &str,
) -> String {
    let mut piece_parser = parser::PieceParser::new();
    let mut responses = Vec::new();
    for piece in parser::split_semicolons(line) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let token = match piece_parser.parse(piece) {
            Ok(token) => token,
            Err(event) => {
                instrument.lock().unwrap().status.record(event);
                break;
            }
        };
        match dispatcher::execute(registry, &token) {
            Ok(Some(text)) => responses.push(text),
            Ok(None) => {}
            Err(event) => {
                instrument.lock().unwrap().status.record(event);
            }
        }
    }
    responses.join(";")
}

/// Convert a non-`ScpiEvent` handler panic/error into either a silent
/// drop or a queued `ExecutionError`, per the `strict_errors` toggle.
pub fn handle_generic_error(instrument: &Mutex<Instrument>, message: impl Into<String>) {
    let mut guard = instrument.lock().unwrap();
    if guard.strict_errors {
        let message = message.into();
        warn!("converting generic handler error to ExecutionError: {message}");
        guard.status.record(ScpiEvent::execution_error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idn_contains_expected_vendor_string() {
        let instrument = Instrument::with_null_hardware();
        assert!(instrument.identification().starts_with("SQDLab, Raspberry Pi GPIO,"));
    }

    #[test]
    fn process_line_joins_multiple_query_responses() {
        let instrument = Arc::new(Mutex::new(Instrument::with_null_hardware()));
        let registry = build_registry(instrument.clone());
        let response = process_line(&registry, &instrument, "*TST?;*OPC?");
        assert_eq!(response, "0;1");
    }

    #[test]
    fn unsupported_command_is_queued_and_surfaced_by_syst_err() {
        let instrument = Arc::new(Mutex::new(Instrument::with_null_hardware()));
        let registry = build_registry(instrument.clone());
        let resp = process_line(&registry, &instrument, "FOO:BAR?");
        assert_eq!(resp, "");
        let err = process_line(&registry, &instrument, "SYST:ERR?");
        assert!(err.starts_with("-102"));
    }
}
