/*!
output.rs

Human and JSON rendering of dispatch outcomes and failures.

Human output:
  - boxed header naming the command
  - server notifications as `[type] message` lines
  - result fields as a NAME / VALUE table (a lone `message` prints as-is)
  - failures as one red line plus, when there is one, a dimmed hint

JSON output mirrors the envelope / report as-is; failures become
`{"status":"error","error":...,"hint":...}` with suggestions or missing
argument names attached when they exist.

Color and emoji follow `NO_COLOR` / `NO_EMOJI`; width follows `COLUMNS`.
These functions only build strings; printing is the caller's job.
*/

use serde_json::{Value, json};
use std::borrow::Cow;
use std::io::IsTerminal;

use super::batch::{BatchReport, SaleOutcome};
use super::dispatch::{DispatchError, Outcome};
use super::params::{ArgError, usage_args};
use super::table::{CommandEntry, CommandKind};
use crate::api::ResponseEnvelope;

/* ---- Style Options ---- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    /// Plain when stdout is piped; otherwise honour `NO_COLOR` / `NO_EMOJI`.
    pub fn detect() -> Self {
        if !std::io::stdout().is_terminal() {
            return Self::plain();
        }
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);
        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
            term_width: width,
        }
    }

    /// No escapes, no emoji, fixed width.
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
            term_width: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",
        Role::Accent => "38;5;213",
        Role::Success => "38;5;82",
        Role::Warning => "38;5;214",
        Role::Error => "38;5;196",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔ ",
        "error" => "✖ ",
        "warn" => "⚠ ",
        "info" => "ℹ ",
        "bell" => "🔔 ",
        _ => "",
    }
}

/* ---- Primitives ---- */

/// One-line title in a light box, sized to its content.
pub fn box_header(title: &str, style: &StyleOptions) -> String {
    let inner = truncate_ellipsis(title, style.term_width.saturating_sub(4).max(8));
    let width = display_width(&inner) + 2;
    format!(
        "┌{bar}┐\n│ {text} │\n└{bar}┘",
        bar = "─".repeat(width),
        text = color(Role::Primary, &inner, style),
    )
}

/// Left-aligned columns separated by two spaces; the last column is
/// truncated to keep rows within the terminal width.
pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }
    let last = widths.len() - 1;
    let fixed: usize = widths[..last].iter().sum::<usize>() + last * 2;
    widths[last] = widths[last].min(style.term_width.saturating_sub(fixed).max(8));

    let render_row = |cells: &[String]| {
        (0..widths.len())
            .map(|i| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                let cell = truncate_ellipsis(cell, widths[i]);
                if i == last {
                    cell
                } else {
                    format!("{cell:<w$}", w = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut lines = vec![color(Role::Accent, render_row(header.as_slice()), style)];
    lines.push(color(
        Role::Dim,
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
        style,
    ));
    lines.extend(rows.iter().map(|r| render_row(r.as_slice())));
    lines.join("\n")
}

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 1 {
        return "…".into();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // skip CSI up to and including the final letter
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    Cow::Owned(out)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}

/* ---- Outcomes ---- */

pub fn render_outcome(outcome: &Outcome, json_mode: bool, style: &StyleOptions) -> String {
    if json_mode {
        let value = match outcome {
            Outcome::Envelope { envelope, .. } => serde_json::to_value(envelope),
            Outcome::Batch(report) => serde_json::to_value(report),
            Outcome::Commands(entries) => Ok(commands_json(entries)),
        };
        return match value {
            Ok(v) => serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string()),
            Err(e) => json!({"status": "error", "error": e.to_string()}).to_string(),
        };
    }
    match outcome {
        Outcome::Envelope { command, envelope } => render_envelope(command, envelope, style),
        Outcome::Batch(report) => render_batch(report, style),
        Outcome::Commands(entries) => render_commands(entries, style),
    }
}

fn render_envelope(command: &str, env: &ResponseEnvelope, style: &StyleOptions) -> String {
    let mut out = vec![box_header(
        &format!("{}{command}", emoji("success", style)),
        style,
    )];

    for n in &env.notifications {
        let kind = if n.kind.is_empty() { &n.msg_type } else { &n.kind };
        out.push(format!(
            "{}{} {}",
            emoji("bell", style),
            color(Role::Warning, format!("[{kind}]"), style),
            n.text()
        ));
    }

    match &env.result {
        None => out.push(color(Role::Success, "OK", style)),
        Some(result) if result.is_empty() => out.push(color(Role::Success, "OK", style)),
        Some(result) => match (result.len(), result.get("message")) {
            (1, Some(Value::String(msg))) => out.push(msg.clone()),
            _ => {
                let rows: Vec<Vec<String>> = result
                    .iter()
                    .map(|(k, v)| vec![k.clone(), value_text(v)])
                    .collect();
                out.push(table(&["NAME", "VALUE"], &rows, style));
            }
        },
    }
    out.join("\n")
}

fn render_batch(report: &BatchReport, style: &StyleOptions) -> String {
    if report.total == 0 {
        return "Nothing to sell (cargo empty or unreadable).".into();
    }
    let mut out: Vec<String> = report
        .lines
        .iter()
        .map(|line| match &line.outcome {
            SaleOutcome::Sold { earned } => format!(
                "  {} x{}: sold (+{} cr)",
                line.item_id,
                line.quantity,
                earned.map_or_else(|| "?".to_string(), |e| e.to_string())
            ),
            SaleOutcome::Failed { error } => format!(
                "  {} x{}: {}",
                line.item_id,
                line.quantity,
                color(Role::Error, format!("FAILED ({error})"), style)
            ),
        })
        .collect();
    out.push(format!(
        "Done. Sold {}/{} item(s), {} failed. Total earned: {} cr",
        report.completed, report.total, report.failed, report.credits_earned
    ));
    if report.interrupted {
        out.push(color(
            Role::Warning,
            format!(
                "{}Interrupted after {} of {} sale(s)",
                emoji("warn", style),
                report.completed + report.failed,
                report.total
            ),
            style,
        ));
    }
    out.join("\n")
}

fn kind_label(entry: &CommandEntry) -> String {
    match &entry.kind {
        CommandKind::Handler(_) => "built-in".into(),
        CommandKind::Passthrough { endpoint } => (*endpoint).to_string(),
    }
}

fn render_commands(entries: &[CommandEntry], style: &StyleOptions) -> String {
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| vec![e.name.clone(), usage_args(&e.params), kind_label(e)])
        .collect();
    table(&["COMMAND", "ARGS", "ENDPOINT"], &rows, style)
}

fn commands_json(entries: &[CommandEntry]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|e| {
                json!({
                    "name": e.name,
                    "endpoint": kind_label(e),
                    "usage": usage_args(&e.params),
                })
            })
            .collect(),
    )
}

/* ---- Failures ---- */

pub fn render_failure(err: &DispatchError, json_mode: bool, style: &StyleOptions) -> String {
    let hint = err.hint();
    if json_mode {
        let mut v = json!({"status": "error", "error": err.to_string()});
        if let Some(h) = &hint {
            v["hint"] = json!(h);
        }
        match err {
            DispatchError::UnknownCommand { suggestions, .. } => {
                v["suggestions"] = json!(suggestions);
            }
            DispatchError::Args {
                source: ArgError::MissingRequired(names),
                ..
            } => {
                v["missing"] = json!(names);
            }
            _ => {}
        }
        return serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string());
    }

    let mut out = color(
        Role::Error,
        format!("{}Error: {err}", emoji("error", style)),
        style,
    );
    if let Some(h) = hint {
        out.push('\n');
        out.push_str(&color(Role::Dim, format!("  {h}"), style));
    }
    out
}
