//! Clap derive structures for the `panelink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// panelink -- cached reads, writes, and live event streams for a proxy panel
#[derive(Debug, Parser)]
#[command(
    name = "panelink",
    version,
    about = "Talk to a proxy management panel from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PANELINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Panel origin URL (overrides config)
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "pretty", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON (default)
    Pretty,
    /// One compact JSON document per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cached GET of an API path
    Get(GetArgs),

    /// Mutating request (POST, PUT, PATCH, DELETE)
    Send(SendArgs),

    /// Stream realtime events until interrupted
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// API path, e.g. /api/v1/nodes
    pub path: String,

    /// Query parameter as key=value (repeatable; a repeated key becomes a list)
    #[arg(long, short = 'q', value_parser = parse_key_val)]
    pub query: Vec<(String, Value)>,

    /// Issue the read this many times (later reads hit the cache)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// HTTP method
    pub method: String,

    /// API path, e.g. /api/v1/nodes/7
    pub path: String,

    /// JSON request body
    #[arg(long, short = 'b')]
    pub body: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Channel to subscribe to (repeatable; defaults to config, then all channels)
    #[arg(long, short = 'c')]
    pub channel: Vec<String>,

    /// Realtime endpoint (overrides the one derived from the origin)
    #[arg(long)]
    pub endpoint: Option<String>,
}

/// Parse `key=value`. The value is read as JSON when it parses as JSON
/// (`3`, `true`, `[1,2]`), and as a plain string otherwise.
pub fn parse_key_val(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_val_reads_json_or_string() {
        assert_eq!(parse_key_val("node=3").unwrap(), ("node".into(), json!(3)));
        assert_eq!(
            parse_key_val("email=a@b.c").unwrap(),
            ("email".into(), json!("a@b.c"))
        );
        assert_eq!(
            parse_key_val("expr=a=b").unwrap(),
            ("expr".into(), json!("a=b"))
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn get_parses_query_and_repeat() {
        let cli = Cli::try_parse_from([
            "panelink", "get", "/api/v1/clients", "-q", "node=1", "-q", "page=2", "--repeat", "3",
        ])
        .unwrap();
        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.query.len(), 2);
        assert_eq!(args.repeat, 3);
    }

    #[test]
    fn repeat_must_be_positive() {
        assert!(Cli::try_parse_from(["panelink", "get", "/x", "--repeat", "0"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["panelink", "watch", "-c", "traffic", "-k", "-o", "json"])
            .unwrap();
        assert!(cli.global.insecure);
        assert_eq!(cli.global.output, OutputFormat::Json);
    }
}
