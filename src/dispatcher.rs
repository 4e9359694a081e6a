//! Dispatcher / executor (spec §4.3): channel resolution, getter/setter
//! selection, invocation, response formatting and line-level joining.

use crate::error::{Result, ScpiEvent};
use crate::parser::CommandToken;
use crate::registry::Registry;

/// A handler's return value, formatted on the wire per spec §4.4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Str(String),
    /// IEEE-488.2 definite-length arbitrary block payload.
    Block(Vec<u8>),
}

impl Value {
    pub fn format(&self) -> String {
        match self {
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Str(s) => s.clone(),
            Value::Block(data) => {
                let len_str = data.len().to_string();
                format!(
                    "#{}{}{}",
                    len_str.len(),
                    len_str,
                    String::from_utf8_lossy(data)
                )
            }
        }
    }
}

type Getter = Box<dyn Fn(&[String], &[Option<u32>]) -> Result<Value> + Send + Sync>;
type Setter = Box<dyn Fn(&[String], &[Option<u32>]) -> Result<()> + Send + Sync>;

/// A command's behaviour: an optional getter (invoked on query) and an
/// optional setter (invoked otherwise). At least one must be present for
/// the command to be reachable.
pub struct Handler {
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Handler {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn(&[String], &[Option<u32>]) -> Result<Value> + Send + Sync + 'static,
    {
        Handler {
            getter: Some(Box::new(f)),
            setter: None,
        }
    }

    pub fn setter<F>(f: F) -> Self
    where
        F: Fn(&[String], &[Option<u32>]) -> Result<()> + Send + Sync + 'static,
    {
        Handler {
            getter: None,
            setter: Some(Box::new(f)),
        }
    }

    pub fn both<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn(&[String], &[Option<u32>]) -> Result<Value> + Send + Sync + 'static,
        S: Fn(&[String], &[Option<u32>]) -> Result<()> + Send + Sync + 'static,
    {
        Handler {
            getter: Some(Box::new(getter)),
            setter: Some(Box::new(setter)),
        }
    }

    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }
}

/// Resolve declared channel capacities against the channels parsed from
/// the wire, substituting channel 1 where the spec admits a channel but
/// none was given (spec §4.3 step 3).
fn resolve_channels(
    spec: &[Option<u32>],
    parsed: &[Option<u32>],
) -> Result<Vec<Option<u32>>> {
    let mut resolved = vec![None; parsed.len()];
    for idx in 0..parsed.len() {
        let capacity = spec.get(idx).copied().flatten();
        match parsed[idx] {
            Some(n) => {
                let Some(max) = capacity else {
                    return Err(ScpiEvent::command_error(format!(
                        "channel index unexpected at index {idx}"
                    )));
                };
                if n < 1 || n > max {
                    return Err(ScpiEvent::command_error(format!(
                        "channel index {n} at index {idx} out of range"
                    )));
                }
                resolved[idx] = Some(n);
            }
            None => {
                if capacity.is_some() {
                    resolved[idx] = Some(1);
                }
            }
        }
    }
    Ok(resolved)
}

/// Fetch a positional argument by index, or a `CommandError`/missing-
/// parameter event if the caller omitted it.
pub fn arg(args: &[String], idx: usize) -> Result<&str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| ScpiEvent::with_info(crate::error::CODE_MISSING_PARAMETER, "missing parameter"))
}

/// Execute one parsed command against `registry`. Returns the formatted
/// query response, if the command was a successful query.
pub fn execute(registry: &Registry, token: &CommandToken) -> Result<Option<String>> {
    let path = token.mnemonics.join(":");
    let command = registry
        .find(&path)
        .ok_or_else(|| ScpiEvent::command_error(format!("unsupported command {path}.")))?;

    let channels = match &command.channels {
        None => {
            if token.channels.iter().any(Option::is_some) {
                return Err(ScpiEvent::command_error(format!(
                    "channel index unexpected in {path}"
                )));
            }
            Vec::new()
        }
        Some(spec) => resolve_channels(spec, &token.channels)?,
    };

    if token.is_query {
        let getter = command
            .handler
            .getter
            .as_ref()
            .ok_or_else(|| ScpiEvent::command_error("GET not allowed"))?;
        let value = getter(&token.args, &channels)?;
        Ok(Some(value.format()))
    } else {
        let setter = command
            .handler
            .setter
            .as_ref()
            .ok_or_else(|| ScpiEvent::command_error("SET not allowed"))?;
        setter(&token.args, &channels)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn registry_with_pin_data() -> Registry {
        let mut reg = Registry::new();
        reg.register(
            "GPIO:SOURce:DIGital:DATA",
            Handler::both(
                |_args, channels| Ok(Value::Bool(channels[3] == Some(7))),
                |_args, _channels| Ok(()),
            ),
            Some(vec![None, None, None, Some(40)]),
        )
        .unwrap();
        reg
    }

    #[test]
    fn implied_channel_one_when_not_given() {
        let mut reg = Registry::new();
        reg.register(
            "GPIO:SOURce:DIGital:DATA",
            Handler::getter(|_args, channels| Ok(Value::Integer(channels[3].unwrap() as i64))),
            Some(vec![None, None, None, Some(40)]),
        )
        .unwrap();
        let token = CommandToken {
            mnemonics: vec!["GPIO", "SOUR", "DIG", "DATA"]
                .into_iter()
                .map(String::from)
                .collect(),
            channels: vec![None, None, None, None],
            is_query: true,
            args: vec![],
        };
        reg = reg;
        assert_eq!(execute(&reg, &token).unwrap(), Some("1".to_string()));
    }

    #[test]
    fn out_of_range_channel_is_command_error() {
        let reg = registry_with_pin_data();
        let token = CommandToken {
            mnemonics: vec!["GPIO", "SOUR", "DIG", "DATA"]
                .into_iter()
                .map(String::from)
                .collect(),
            channels: vec![None, None, None, Some(99)],
            is_query: true,
            args: vec![],
        };
        assert!(execute(&reg, &token).is_err());
    }

    #[test]
    fn get_not_allowed_when_no_getter() {
        let mut reg = Registry::new();
        reg.register("*RST", Handler::setter(|_a, _c| Ok(())), None)
            .unwrap();
        let token = CommandToken {
            mnemonics: vec!["*RST".to_string()],
            channels: vec![None],
            is_query: true,
            args: vec![],
        };
        let err = execute(&reg, &token).unwrap_err();
        assert!(err.to_string().contains("GET not allowed"));
    }

    #[test]
    fn unsupported_command_reports_full_path() {
        let reg = Registry::new();
        let token = CommandToken {
            mnemonics: vec!["FOO".to_string(), "BAR".to_string()],
            channels: vec![None, None],
            is_query: true,
            args: vec![],
        };
        let err = execute(&reg, &token).unwrap_err();
        assert_eq!(err.to_string(), "-102,\"Command error;unsupported command FOO:BAR.\"");
    }

    #[test]
    fn block_formats_as_definite_length_arbitrary_block() {
        assert_eq!(Value::Block(b"abc".to_vec()).format(), "#13abc");
    }
}
