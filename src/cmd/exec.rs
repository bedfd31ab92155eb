/*!
`exec.rs`

Runs one command line end to end: splits the words after the command
name into positional values and `key=value` pairs, merges an optional
parameter file, builds the session from the resolved settings, dispatches
and prints the outcome.

Parameter sources, strongest first:
  key=value words          (key must look like an identifier)
  --param-file FILE        (JSON or YAML object; never overrides the above)
  positional words         (bound by index to the endpoint's parameters)

Exit codes:
  0    success
  1    any structured failure (unknown command, bad args, API error)
  130  interrupted (Ctrl-C during a wait or a batch)

JSON Error Output:
{
  "status":"error",
  "error":"message",
  "hint":"..."
}
*/

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::batch::PacingPolicy;
use super::dispatch::{DispatchError, Dispatcher, Outcome};
use super::output::{StyleOptions, render_failure, render_outcome};
use super::table::CommandTable;
use crate::api::{CancelSignal, HttpTransport, Session, SessionConfig, TokenStore};
use crate::config::Settings;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Front-end switches that are not part of the resolved settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub json: bool,
    pub param_file: Option<PathBuf>,
}

/* ---- Argument Splitting ---- */

/// Words after the command name, sorted into positional values and named
/// pairs. A bare `--json` anywhere switches output mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitArgs {
    pub positional: Vec<String>,
    pub named: HashMap<String, String>,
    pub json: bool,
}

pub fn split_args(words: &[String]) -> SplitArgs {
    let mut out = SplitArgs::default();
    for word in words {
        if word == "--json" {
            out.json = true;
            continue;
        }
        match word.split_once('=') {
            Some((key, value)) if is_param_key(key) => {
                out.named.insert(key.to_string(), value.to_string());
            }
            _ => out.positional.push(word.clone()),
        }
    }
    out
}

fn is_param_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/* ---- Parameter File Loading ---- */

/// Merge a JSON/YAML object into `named`. Keys already present win.
pub fn load_param_file_into_map(path: &Path, named: &mut HashMap<String, String>) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read param file: {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let value: serde_json::Value = if is_yaml {
        let yaml_v: serde_yaml::Value =
            serde_yaml::from_str(&raw).context("failed to parse YAML param file")?;
        serde_json::to_value(yaml_v).context("failed to convert YAML to JSON")?
    } else {
        serde_json::from_str(&raw).context("failed to parse JSON param file")?
    };

    let Some(obj) = value.as_object() else {
        bail!("param file root must be an object");
    };
    for (k, v) in obj {
        if named.contains_key(k) {
            continue;
        }
        let s = match v {
            serde_json::Value::String(sv) => sv.clone(),
            other => other.to_string(),
        };
        named.insert(k.clone(), s);
    }
    Ok(())
}

/* ---- Exit Codes ---- */

pub fn outcome_exit_code(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Batch(report) if report.interrupted => EXIT_INTERRUPTED,
        _ => 0,
    }
}

pub fn failure_exit_code(err: &DispatchError) -> i32 {
    if err.is_interrupted() {
        EXIT_INTERRUPTED
    } else {
        EXIT_FAILURE
    }
}

/* ---- Public Entry Point ---- */

/// `words[0]` is the command name, the rest its arguments. Returns the
/// process exit code; `Err` only for setup failures outside dispatch.
pub fn run(settings: &Settings, words: &[String], opts: &RunOptions) -> Result<i32> {
    let Some((name, rest)) = words.split_first() else {
        bail!("no command given (try 'sm commands')");
    };
    let SplitArgs {
        positional,
        mut named,
        json,
    } = split_args(rest);
    let json = json || opts.json;
    if let Some(pf) = &opts.param_file {
        load_param_file_into_map(pf, &mut named)?;
    }

    // main is sync; the runtime lives for this one command
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(dispatch_once(settings, name, &positional, &named, json))
}

async fn dispatch_once(
    settings: &Settings,
    name: &str,
    positional: &[String],
    named: &HashMap<String, String>,
    json: bool,
) -> Result<i32> {
    let cancel = CancelSignal::new();
    cancel.install_ctrl_c();

    let transport = HttpTransport::new(settings.base_url.clone(), settings.timeout)
        .context("failed to build HTTP client")?;
    let config = SessionConfig {
        timeout: settings.timeout,
        cred_file: Some(settings.cred_file.clone()),
        ..Default::default()
    };
    let session = Session::resume(
        transport,
        config,
        TokenStore::at(&settings.session_file),
        cancel,
    )
    .context("failed to load saved session")?;
    debug!(
        resumed = session.token().is_some(),
        session_file = %settings.session_file.display(),
        "session ready"
    );

    let mut dispatcher = Dispatcher::new(
        session,
        CommandTable::builtin(),
        PacingPolicy::new(settings.action_interval),
    );
    let style = StyleOptions::detect();

    let code = match dispatcher.dispatch(name, positional, named).await {
        Ok(outcome) => {
            println!("{}", render_outcome(&outcome, json, &style));
            outcome_exit_code(&outcome)
        }
        Err(err) => {
            let text = render_failure(&err, json, &style);
            if json {
                println!("{text}");
            } else {
                eprintln!("{text}");
            }
            failure_exit_code(&err)
        }
    };
    Ok(code)
}
