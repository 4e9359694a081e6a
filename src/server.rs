//! TCP accept loop and per-connection line framer (spec §6, component 8).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, error, info};

use crate::instrument::{self, Instrument};
use crate::registry::Registry;

/// Split a byte stream into lines on `\r\n` or `\n`, remembering which
/// terminator ended each line so it can be echoed on the response.
struct LineSplitter {
    buffer: String,
}

impl LineSplitter {
    fn new() -> Self {
        LineSplitter { buffer: String::new() }
    }

    fn feed(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Pop the next complete line, if any, along with its terminator.
    /// Finds the earliest terminator in the buffer rather than checking
    /// `"\r\n"` before `"\n"`, so a stream that mixes line endings (a
    /// bare `\n` followed later by a `\r\n`) still splits at whichever
    /// comes first.
    fn next_line(&mut self) -> Option<(String, &'static str)> {
        let idx = self.buffer.find('\n')?;
        let is_crlf = idx > 0 && self.buffer.as_bytes()[idx - 1] == b'\r';
        let (line_end, terminator) = if is_crlf { (idx - 1, "\r\n") } else { (idx, "\n") };
        let line = self.buffer[..line_end].to_string();
        self.buffer.drain(..line_end + terminator.len());
        Some((line, terminator))
    }
}

fn handle_connection(
    mut stream: TcpStream,
    registry: Arc<Registry>,
    instrument: Arc<Mutex<Instrument>>,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("connection opened: {peer}");

    let mut splitter = LineSplitter::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                debug!("connection closed by peer: {peer}");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                error!("read error on {peer}: {e}");
                break;
            }
        };
        splitter.feed(&String::from_utf8_lossy(&buf[..n]));

        while let Some((line, terminator)) = splitter.next_line() {
            let response = instrument::process_line(&registry, &instrument, &line);
            if response.is_empty() {
                continue;
            }
            let mut out = response.into_bytes();
            out.extend_from_slice(terminator.as_bytes());
            if let Err(e) = stream.write_all(&out) {
                error!("write error on {peer}: {e}");
                return;
            }
        }
    }
}

/// Bind `bind:port`, building one registry/instrument shared by every
/// connection, and serve forever. One thread per connection; the shared
/// `Mutex<Instrument>` in `instrument.rs` serialises command execution.
pub fn run(bind: &str, port: u16, instrument: Arc<Mutex<Instrument>>) -> std::io::Result<()> {
    let registry = Arc::new(instrument::build_registry(instrument.clone()));
    let listener = TcpListener::bind((bind, port))?;
    info!("listening on {bind}:{port}");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                error!("accept error: {e}");
                continue;
            }
        };
        let registry = registry.clone();
        let instrument = instrument.clone();
        thread::spawn(move || handle_connection(stream, registry, instrument));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_yields_lines_on_either_terminator_and_keeps_remainder() {
        let mut s = LineSplitter::new();
        s.feed("*IDN?\r\nSYST:ERR?\nGPIO:SOUR");
        assert_eq!(s.next_line(), Some(("*IDN?".to_string(), "\r\n")));
        assert_eq!(s.next_line(), Some(("SYST:ERR?".to_string(), "\n")));
        assert_eq!(s.next_line(), None);
        assert_eq!(s.buffer, "GPIO:SOUR");
    }

    #[test]
    fn incomplete_trailing_line_is_never_yielded() {
        let mut s = LineSplitter::new();
        s.feed("*IDN?");
        assert_eq!(s.next_line(), None);
    }

    #[test]
    fn mixed_terminators_within_one_stream_split_at_whichever_comes_first() {
        let mut s = LineSplitter::new();
        s.feed("*IDN?\n*RST\r\n");
        assert_eq!(s.next_line(), Some(("*IDN?".to_string(), "\n")));
        assert_eq!(s.next_line(), Some(("*RST".to_string(), "\r\n")));
        assert_eq!(s.next_line(), None);
    }
}
