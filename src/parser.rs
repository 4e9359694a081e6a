//! Five-stage line lexer (spec §4.1): semicolon split, command/argument
//! split, query-flag strip, sticky-base-path tree traversal, per-element
//! mnemonic/channel lex.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, ScpiEvent};

/// One parsed command within a line: the fully-qualified mnemonic path,
/// one channel index per path element (`None` if no suffix was given),
/// whether it was issued in query form, and its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToken {
    pub mnemonics: Vec<String>,
    pub channels: Vec<Option<u32>>,
    pub is_query: bool,
    pub args: Vec<String>,
}

fn root_element_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*?[A-Za-z]+[0-9]*$").unwrap())
}

fn element_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+[0-9]*$").unwrap())
}

fn mnemonic_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z*]+)([0-9]*)$").unwrap())
}

/// Parses one line's `;`-separated pieces one at a time, carrying the
/// sticky base path between them. Exposed separately from `parse_line`
/// so a caller can execute each piece as it parses rather than waiting
/// for the whole line to lex cleanly (a parse fault aborts only the
/// pieces from that point on; earlier pieces already ran).
#[derive(Debug, Default)]
pub struct PieceParser {
    base_path: Vec<String>,
}

impl PieceParser {
    pub fn new() -> Self {
        PieceParser::default()
    }

    pub fn parse(&mut self, piece: &str) -> Result<CommandToken> {
        let (cmd, args) = split_command_and_args(piece)?;
        let (cmd, is_query) = strip_query_flag(cmd);
        let path = traverse(&mut self.base_path, cmd)?;
        let (mnemonics, channels) = lex_elements(&path)?;
        Ok(CommandToken {
            mnemonics,
            channels,
            is_query,
            args,
        })
    }
}

/// Parse a full line (terminator already stripped) into its commands.
/// All-or-nothing: the first piece that fails to parse discards the
/// whole result. Callers that need to execute earlier pieces even when
/// a later one faults should drive `PieceParser` directly instead.
pub fn parse_line(text: &str) -> Result<Vec<CommandToken>> {
    let mut parser = PieceParser::new();
    let mut tokens = Vec::new();
    for piece in split_semicolons(text) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        tokens.push(parser.parse(piece)?);
    }
    Ok(tokens)
}

/// Stage 1: split on `;`, never inside a matched `"…"` pair.
pub(crate) fn split_semicolons(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b';' if !in_quotes => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Stage 2: split the command token from its argument list on the first
/// space, then split the argument list on commas honouring quoted
/// strings. Rejects malformed argument lists with a syntax `CommandError`.
fn split_command_and_args(piece: &str) -> Result<(&str, Vec<String>)> {
    let Some(space_idx) = piece.find(' ') else {
        return Ok((piece, Vec::new()));
    };
    let cmd = piece[..space_idx].trim();
    let arg_str = piece[space_idx + 1..].trim();
    if arg_str.is_empty() {
        return Ok((cmd, Vec::new()));
    }

    let mut args = Vec::new();
    let mut accounted = 0usize;
    let mut in_quotes = false;
    let mut start = 0usize;
    let bytes = arg_str.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                let raw = &arg_str[start..i];
                accounted += raw.len();
                args.push(raw.trim().trim_matches('"').to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let raw = &arg_str[start..];
    accounted += raw.len();
    args.push(raw.trim().trim_matches('"').to_string());

    // length-accounting check: every character of arg_str must belong to
    // exactly one argument or one of the (len(args)-1) comma separators.
    // An unterminated quote also fails here (it never toggles back), so
    // treat it as a malformed argument list too.
    if in_quotes || accounted + args.len().saturating_sub(1) != arg_str.len() {
        return Err(ScpiEvent::command_error("in argument list"));
    }
    Ok((cmd, args))
}

/// Stage 3: strip a trailing `?` and report whether it was present.
fn strip_query_flag(cmd: &str) -> (&str, bool) {
    match cmd.strip_suffix('?') {
        Some(stripped) => (stripped, true),
        None => (cmd, false),
    }
}

/// Stage 4: prepend the sticky base path, resolve rise-a-level markers,
/// and update the base path from the normalised result's prefix.
fn traverse<'a>(base_path: &mut Vec<String>, cmd: &'a str) -> Result<Vec<String>> {
    let mut parts: Vec<String> = base_path
        .iter()
        .cloned()
        .chain(cmd.split(':').map(str::to_string))
        .collect();

    let mut idx = 0;
    while idx < parts.len() {
        if parts[idx].is_empty() {
            if idx == 0 {
                return Err(ScpiEvent::command_error(
                    "command refers to a level above the root of the command tree",
                ));
            }
            parts.remove(idx);
            parts.remove(idx - 1);
            idx -= 1;
        } else {
            idx += 1;
        }
    }

    *base_path = parts[..parts.len().saturating_sub(1)].to_vec();
    Ok(parts)
}

/// Stage 5: lex each path element into its mnemonic and optional channel
/// index, enforcing the index-0-allows-`*` rule.
fn lex_elements(path: &[String]) -> Result<(Vec<String>, Vec<Option<u32>>)> {
    let mut mnemonics = Vec::with_capacity(path.len());
    let mut channels = Vec::with_capacity(path.len());
    for (i, element) in path.iter().enumerate() {
        let allowed = if i == 0 { root_element_re() } else { element_re() };
        if !allowed.is_match(element) {
            return Err(ScpiEvent::command_error("in command name"));
        }
        let caps = mnemonic_split_re()
            .captures(element)
            .ok_or_else(|| ScpiEvent::command_error("in command name"))?;
        let mnemonic = caps.get(1).unwrap().as_str().to_string();
        let channel = caps.get(2).unwrap().as_str();
        mnemonics.push(mnemonic);
        channels.push(if channel.is_empty() {
            None
        } else {
            channel.parse::<u32>().ok()
        });
    }
    Ok((mnemonics, channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(text: &str) -> CommandToken {
        let mut tokens = parse_line(text).unwrap();
        assert_eq!(tokens.len(), 1);
        tokens.remove(0)
    }

    #[test]
    fn splits_query_flag() {
        let t = one("*IDN?");
        assert!(t.is_query);
        assert_eq!(t.mnemonics, vec!["*IDN"]);
    }

    #[test]
    fn splits_args_honouring_quotes_and_commas() {
        let t = one(r#"GPIO:SOUR:DIG:PULS7 HIGH,0.000050"#);
        assert_eq!(t.args, vec!["HIGH", "0.000050"]);
    }

    #[test]
    fn quoted_semicolon_is_not_a_separator() {
        let tokens = parse_line(r#"SYST:ERR? "a;b""#).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].args, vec!["a;b"]);
    }

    #[test]
    fn base_path_persists_across_commands_on_one_line() {
        let tokens = parse_line("A:B:C;D").unwrap();
        assert_eq!(tokens[0].mnemonics, vec!["A", "B", "C"]);
        assert_eq!(tokens[1].mnemonics, vec!["A", "B", "D"]);
    }

    #[test]
    fn leading_colon_resets_to_root() {
        let tokens = parse_line("A:B:C;:D").unwrap();
        assert_eq!(tokens[1].mnemonics, vec!["D"]);
    }

    #[test]
    fn root_only_mnemonic_fails_to_lex_once_a_base_path_is_inherited() {
        // `*IDN` is only a valid path element at index 0; inheriting
        // `SYST`'s base path pushes it to index 1, where the element
        // regex (no `*` allowed) rejects it.
        assert!(parse_line("SYST:ERR?;*IDN?").is_err());
    }

    #[test]
    fn leading_colon_lets_a_root_only_mnemonic_resolve() {
        let tokens = parse_line("SYST:ERR?;:*IDN?").unwrap();
        assert_eq!(tokens[1].mnemonics, vec!["*IDN"]);
    }

    #[test]
    fn leading_colon_at_start_of_line_is_an_error() {
        assert!(parse_line(":FOO").is_err());
    }

    #[test]
    fn channel_suffix_is_parsed_per_element() {
        let t = one("GPIO:SOUR:DIG:DATA7?");
        assert_eq!(t.mnemonics, vec!["GPIO", "SOUR", "DIG", "DATA"]);
        assert_eq!(t.channels, vec![None, None, None, Some(7)]);
    }

    #[test]
    fn malformed_argument_list_is_a_command_error() {
        // An unterminated quote leaves a stray quote character unaccounted for.
        let result = parse_line(r#"SYST:ERR? "unterminated"#);
        assert!(result.is_err());
    }
}
