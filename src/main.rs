use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod api;
mod cache;
mod cmd;
mod config;
mod utils;

/// sm - command-line client for the SpaceMolt game API
///
/// Usage:
///   sm [global flags] <command> [args...] [key=value ...]
///
/// Every game endpoint is a command (underscores become hyphens):
///   sm travel <target_poi>
///   sm buy <item_id> <quantity>
///   sm get-chat-history system limit=20
///
/// Built-ins:
///   login [cred_file]     start a session from a credential file
///   logout                end the session and forget the token
///   register <username> <empire> <registration_code>
///   status                credits, location, ship
///   raw <endpoint> [json] call any endpoint with a JSON body
///   sell-all              sell the whole cargo hold, paced
///   commands              list every command with its arguments
///
/// Global flags / env:
///   -v / -vv              Increase verbosity (RUST_LOG overrides)
///   -q / --quiet          Errors only
///   --json                Machine-readable output
///   --base-url URL        API root (SM_API_BASE)
///   --session-file PATH   Saved token (SM_SESSION_FILE)
///   --cred-file PATH      Credentials for login / re-login (SM_CRED_FILE)
///   --timeout SECS        Request timeout (SM_TIMEOUT)
///   --action-interval S   Pause between batch actions (SM_ACTION_INTERVAL)
#[derive(Parser, Debug)]
#[command(
    name = "sm",
    version,
    about = "sm - command-line client for the SpaceMolt game API",
    propagate_version = true,
    disable_help_subcommand = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON
    #[arg(long, global = true)]
    json: bool,

    /// API base URL
    #[arg(long = "base-url", value_name = "URL")]
    base_url: Option<String>,

    /// File holding the session token between runs
    #[arg(long = "session-file", value_name = "PATH")]
    session_file: Option<PathBuf>,

    /// Credential file (Username / Password)
    #[arg(long = "cred-file", value_name = "PATH")]
    cred_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds to wait between actions in batch commands
    #[arg(long = "action-interval", value_name = "SECS")]
    action_interval: Option<u64>,

    /// Load named parameters from a JSON or YAML file
    #[arg(long = "param-file", value_name = "PATH")]
    param_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Any command from `sm commands`
    #[command(external_subcommand)]
    Call(Vec<String>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    // Settings: CLI flag > SM_* env > default
    let flags = config::Flags {
        base_url: cli.base_url.clone(),
        session_file: cli.session_file.clone(),
        cred_file: cli.cred_file.clone(),
        timeout: cli.timeout,
        action_interval: cli.action_interval,
    };
    let settings = match config::resolve(&flags, |k| std::env::var(k).ok()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid configuration: {e:#}");
            std::process::exit(2);
        }
    };

    let Commands::Call(words) = cli.command;
    let opts = cmd::RunOptions {
        json: cli.json,
        param_file: cli.param_file,
    };
    let code = cmd::run(&settings, &words, &opts)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
