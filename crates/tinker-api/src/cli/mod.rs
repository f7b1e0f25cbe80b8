//! CLI command definitions for the `tinker` binary.
//!
//! `serve` runs the HTTP API; `history` and `send` talk to a running server
//! through the client sync layer.

pub mod conversation;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default server for the client commands.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

/// Maker Helper conversation server and client.
#[derive(Parser)]
#[command(name = "tinker", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the chosen verbosity, used when RUST_LOG is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "info,tinker=debug,tinker_core=debug,tinker_infra=debug,tinker_api=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Host to bind to (overrides config).
        #[arg(long, env = "TINKER_HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config).
        #[arg(short, long, env = "TINKER_PORT")]
        port: Option<u16>,

        /// Keep conversations in memory instead of SQLite.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Show the turn log of a session.
    History {
        /// Session id.
        #[arg(long)]
        session: String,

        /// Server base URL.
        #[arg(long, env = "TINKER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Send one turn and print the helper's reply.
    Send {
        /// Session id.
        #[arg(long)]
        session: String,

        /// Message text.
        #[arg(long)]
        text: Option<String>,

        /// Image file to attach.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Server base URL.
        #[arg(long, env = "TINKER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_command() {
        let cli = Cli::parse_from([
            "tinker", "-v", "send", "--session", "s1", "--text", "robot", "--image", "a.png",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Send {
                session,
                text,
                image,
                server,
            } => {
                assert_eq!(session, "s1");
                assert_eq!(text.as_deref(), Some("robot"));
                assert_eq!(image, Some(PathBuf::from("a.png")));
                assert_eq!(server, DEFAULT_SERVER);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_log_filter_by_verbosity() {
        let cli = Cli::parse_from(["tinker", "--quiet", "serve", "--ephemeral"]);
        assert_eq!(cli.log_filter(), "error");
        assert!(matches!(cli.command, Commands::Serve { ephemeral: true, .. }));

        let cli = Cli::parse_from(["tinker", "-vv", "history", "--session", "s"]);
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
