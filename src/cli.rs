//! Command-line surface (component 10): TCP port/bind address and the
//! legacy tune-folder argument.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "gpio-scpid", about = "SCPI/IEEE-488.2 GPIO instrument server")]
pub struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 4000)]
    pub port: u16,

    /// Address to bind to.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Convert generic (non-`ScpiEvent`) handler errors into a queued
    /// `ExecutionError` instead of silently dropping them.
    #[arg(long)]
    pub strict_errors: bool,

    /// Folder holding the legacy startup tune (`intro.csv`).
    pub tune_folder: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let args = Args::parse_from(["gpio-scpid"]);
        assert_eq!(args.port, 4000);
        assert_eq!(args.bind, "0.0.0.0");
        assert!(!args.strict_errors);
        assert_eq!(args.tune_folder, None);
    }

    #[test]
    fn accepts_port_bind_and_tune_folder() {
        let args = Args::parse_from([
            "gpio-scpid",
            "--port",
            "5025",
            "--bind",
            "127.0.0.1",
            "--strict-errors",
            "/opt/tunes",
        ]);
        assert_eq!(args.port, 5025);
        assert_eq!(args.bind, "127.0.0.1");
        assert!(args.strict_errors);
        assert_eq!(args.tune_folder.as_deref(), Some("/opt/tunes"));
    }
}
