//! Command registry (spec §4.2): short/long form extraction, `2^depth`
//! collision enumeration, per-command compiled regex, lookup.

use std::sync::OnceLock;

use regex::Regex;

use crate::dispatcher::Handler;
use crate::error::{Result, ScpiEvent};

/// Per-level channel capacity: `None` means the level admits no numeric
/// suffix, `Some(n)` is the maximum 1-based channel index at that level.
pub type ChannelSpec = Vec<Option<u32>>;

pub struct Command {
    /// Canonical dotted-colon name as registered, e.g. `GPIO:SOURce:DIGital:DATA`.
    pub name: String,
    pub handler: Handler,
    pub channels: Option<ChannelSpec>,
    regex: Regex,
}

impl Command {
    pub fn has_getter(&self) -> bool {
        self.handler.has_getter()
    }

    pub fn has_setter(&self) -> bool {
        self.handler.has_setter()
    }

    fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

#[derive(Default)]
pub struct Registry {
    commands: Vec<Command>,
}

/// A single mnemonic level's short/long form, extracted from its
/// registration-form spelling (e.g. `SYSTem` -> short `SYST`, long `SYSTEM`).
struct Forms {
    short: String,
    long: String,
}

fn level_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\*?[A-Z]+)([a-z]*)$").unwrap())
}

fn split_forms(level: &str) -> Result<Forms> {
    let caps = level_split_re()
        .captures(level)
        .ok_or_else(|| ScpiEvent::execution_error(format!("malformed mnemonic {level}")))?;
    let short = caps.get(1).unwrap().as_str().to_string();
    if short.is_empty() || short == "*" {
        return Err(ScpiEvent::execution_error(format!(
            "empty short form provided for {level}"
        )));
    }
    let long = format!("{}{}", short, caps.get(2).unwrap().as_str());
    Ok(Forms { short, long })
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a command under dotted-colon name `name`
    /// (e.g. `"GPIO:SOURce:DIGital:DATA"`). Fails if any of the `2^depth`
    /// short/long combinations collides with an already-registered command.
    pub fn register(
        &mut self,
        name: &str,
        handler: Handler,
        channels: Option<ChannelSpec>,
    ) -> std::result::Result<(), String> {
        let levels: Vec<&str> = name.split(':').collect();
        let forms: Vec<Forms> = levels
            .iter()
            .map(|l| split_forms(l))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.to_string())?;

        if let Some(spec) = &channels {
            if spec.len() > levels.len() {
                return Err(format!(
                    "number of entries of channels is larger than the hierarchy level for {name}"
                ));
            }
        }

        let depth = forms.len();
        for variant_idx in 0u32..(1u32 << depth) {
            let candidate: Vec<&str> = forms
                .iter()
                .enumerate()
                .map(|(bit, f)| {
                    if variant_idx & (1 << bit) != 0 {
                        f.long.as_str()
                    } else {
                        f.short.as_str()
                    }
                })
                .collect();
            let candidate = candidate.join(":");
            if let Some(existing) = self.find(&candidate) {
                return Err(format!(
                    "command {name} conflicts with previously defined command {}",
                    existing.name
                ));
            }
        }

        let pattern = format!(
            "(?i)^{}$",
            forms
                .iter()
                .map(|f| format!("({}|{})", regex::escape(&f.short), regex::escape(&f.long)))
                .collect::<Vec<_>>()
                .join(":")
        );
        let regex = Regex::new(&pattern).map_err(|e| e.to_string())?;

        let mut channels = channels;
        if let Some(spec) = &mut channels {
            spec.resize(levels.len(), None);
        }

        self.commands.push(Command {
            name: name.to_string(),
            handler,
            channels,
            regex,
        });
        Ok(())
    }

    /// Find the command whose regex fully matches `candidate`
    /// (a colon-joined mnemonic path).
    pub fn find(&self, candidate: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.matches(candidate))
    }

    /// All registered commands, for `SYSTem:HELP:HEADers?` introspection.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Handler;

    fn noop_getter() -> Handler {
        Handler::getter(|_args, _channels| Ok(crate::dispatcher::Value::Integer(0)))
    }

    #[test]
    fn registers_and_matches_short_and_long_forms() {
        let mut reg = Registry::new();
        reg.register("SYSTem:VERSion", noop_getter(), None).unwrap();
        assert!(reg.find("SYST:VERS").is_some());
        assert!(reg.find("system:version").is_some());
        assert!(reg.find("SYSTEM:VERSION").is_some());
        assert!(reg.find("SYS:VERS").is_none());
    }

    #[test]
    fn rejects_colliding_registration() {
        let mut reg = Registry::new();
        reg.register("SYSTem:VERSion", noop_getter(), None).unwrap();
        let err = reg.register("SYST:VERSION", noop_getter(), None).unwrap_err();
        assert!(err.contains("conflicts"));
    }

    #[test]
    fn channel_bearing_command_matches_on_bare_mnemonic_path() {
        // The parser strips channel digits into a separate list before the
        // dispatcher ever calls `find`, so the registered regex only ever
        // sees the bare mnemonic path.
        let mut reg = Registry::new();
        reg.register(
            "GPIO:SOURce:DIGital:DATA",
            noop_getter(),
            Some(vec![None, None, None, Some(40)]),
        )
        .unwrap();
        assert!(reg.find("GPIO:SOUR:DIG:DATA").is_some());
        assert!(reg.find("gpio:source:digital:data").is_some());
    }

    #[test]
    fn star_prefixed_mnemonics_register_at_root() {
        let mut reg = Registry::new();
        reg.register("*IDN", noop_getter(), None).unwrap();
        assert!(reg.find("*IDN").is_some());
        assert!(reg.find("*idn").is_some());
    }
}
