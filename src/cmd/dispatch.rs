/*!
dispatch.rs - the single entry point the CLI calls.

Each invocation walks `Resolving -> Mapping -> Executing -> Done` and
stops at the first failing stage:

  Resolving   exact lookup in the command table (after normalisation);
              a miss ends with `UnknownCommand` plus suggestions
  Mapping     positional/named values -> typed body; an `ArgError` ends
              the invocation before any network I/O
  Executing   passthrough endpoint or built-in handler via the session
  Done        outcome handed back to the renderer

Server errors on well-known endpoints get a contextual hint attached
here, since only this layer knows which command the user typed.
*/

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::trace;

use super::batch::{self, BatchReport, PacingPolicy};
use super::params::{self, ArgError};
use super::suggest::{did_you_mean, suggest};
use super::table::{CommandEntry, CommandKind, CommandTable, Handler};
use crate::api::{ApiError, Body, RequestEnvelope, ResponseEnvelope, Session, Transport};

/* ---- Outcomes & Failures ---- */

#[derive(Debug)]
pub enum Outcome {
    Envelope {
        command: String,
        envelope: ResponseEnvelope,
    },
    Batch(BatchReport),
    Commands(Vec<CommandEntry>),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown command '{name}'")]
    UnknownCommand {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("{command}: {source}")]
    Args {
        command: String,
        usage: String,
        #[source]
        source: ArgError,
    },

    #[error("{source}")]
    Api {
        endpoint: String,
        #[source]
        source: ApiError,
    },

    #[error("{0}")]
    Usage(String),
}

impl DispatchError {
    pub fn hint(&self) -> Option<String> {
        match self {
            DispatchError::UnknownCommand { suggestions, .. } => Some(
                did_you_mean(suggestions)
                    .unwrap_or_else(|| "Run 'sm commands' to list available commands".into()),
            ),
            DispatchError::Args { command, usage, .. } => {
                Some(format!("Usage: sm {command} {usage}").trim_end().to_string())
            }
            DispatchError::Api { endpoint, source } => match source {
                ApiError::ServerError { message, .. } => server_hint(endpoint, message)
                    .map(str::to_string)
                    .or_else(|| source.hint()),
                _ => source.hint(),
            },
            DispatchError::Usage(_) => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            DispatchError::Api {
                source: ApiError::Interrupted,
                ..
            }
        )
    }

    fn api(endpoint: &str) -> impl FnOnce(ApiError) -> DispatchError + '_ {
        move |source| DispatchError::Api {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Resolving,
    Mapping,
    Executing,
    Done,
}

/* ---- Dispatcher ---- */

/// Owns the session for the lifetime of one process invocation.
pub struct Dispatcher<T> {
    session: Session<T>,
    table: CommandTable,
    pacing: PacingPolicy,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(session: Session<T>, table: CommandTable, pacing: PacingPolicy) -> Self {
        Self {
            session,
            table,
            pacing,
        }
    }

    #[cfg(test)]
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Exact lookup, or `UnknownCommand` with up to three suggestions.
    pub fn resolve(&self, typed: &str) -> Result<&CommandEntry, DispatchError> {
        self.table.lookup(typed).ok_or_else(|| {
            let name = CommandTable::normalize(typed);
            DispatchError::UnknownCommand {
                suggestions: suggest(&name, self.table.names()),
                name,
            }
        })
    }

    pub async fn dispatch(
        &mut self,
        name: &str,
        positional: &[String],
        named: &HashMap<String, String>,
    ) -> Result<Outcome, DispatchError> {
        trace!(stage = ?Stage::Resolving, name);
        let entry = self.resolve(name)?.clone();

        trace!(stage = ?Stage::Mapping, command = %entry.name);
        let body = params::build_body(&entry.params, positional, named).map_err(|source| {
            DispatchError::Args {
                command: entry.name.clone(),
                usage: params::usage_args(&entry.params),
                source,
            }
        })?;

        trace!(stage = ?Stage::Executing, command = %entry.name);
        let outcome = match entry.kind {
            CommandKind::Passthrough { endpoint } => {
                let request = RequestEnvelope::new(endpoint, body);
                let envelope = self
                    .session
                    .execute(&request.endpoint, &request.body)
                    .await
                    .map_err(DispatchError::api(endpoint))?;
                Outcome::Envelope {
                    command: entry.name,
                    envelope,
                }
            }
            CommandKind::Handler(handler) => self.run_handler(handler, &entry.name, body).await?,
        };

        trace!(stage = ?Stage::Done, name);
        Ok(outcome)
    }

    async fn run_handler(
        &mut self,
        handler: Handler,
        command: &str,
        mut body: Body,
    ) -> Result<Outcome, DispatchError> {
        let envelope = match handler {
            Handler::Login => {
                let path = take_string(&mut body, "cred_file").map(PathBuf::from);
                self.session
                    .login(path.as_deref())
                    .await
                    .map_err(DispatchError::api("login"))?
            }
            Handler::Logout => self
                .session
                .logout()
                .await
                .map_err(DispatchError::api("logout"))?,
            Handler::Register => {
                let username = take_string(&mut body, "username").unwrap_or_default();
                let empire = take_string(&mut body, "empire").unwrap_or_default();
                let code = take_string(&mut body, "registration_code").unwrap_or_default();
                self.session
                    .register(&username, &empire, &code)
                    .await
                    .map_err(DispatchError::api("register"))?
            }
            Handler::Status => self
                .session
                .execute("get_status", &Body::new())
                .await
                .map_err(DispatchError::api("get_status"))?,
            Handler::Raw => {
                let endpoint = take_string(&mut body, "endpoint").unwrap_or_default();
                let mut payload = match take_string(&mut body, "json_body") {
                    Some(text) => parse_json_body(&text)?,
                    None => Body::new(),
                };
                // Leftover named args overlay the JSON body.
                payload.extend(body);
                self.session
                    .execute(&endpoint, &payload)
                    .await
                    .map_err(DispatchError::api(&endpoint))?
            }
            Handler::SellAll => {
                let report = batch::sell_all(&mut self.session, &self.pacing)
                    .await
                    .map_err(DispatchError::api("sell"))?;
                return Ok(Outcome::Batch(report));
            }
            Handler::Commands => {
                return Ok(Outcome::Commands(self.table.entries().cloned().collect()));
            }
        };
        Ok(Outcome::Envelope {
            command: command.to_string(),
            envelope,
        })
    }
}

fn take_string(body: &mut Body, key: &str) -> Option<String> {
    match body.remove(key)? {
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn parse_json_body(text: &str) -> Result<Body, DispatchError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DispatchError::Usage(
            "raw: JSON body must be an object".into(),
        )),
        Err(e) => Err(DispatchError::Usage(format!("raw: invalid JSON body: {e}"))),
    }
}

/* ---- Contextual Hints ---- */

fn mentions(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Next step for common server-side refusals.
pub fn server_hint(endpoint: &str, message: &str) -> Option<&'static str> {
    let msg = message.to_lowercase();
    let hint = if endpoint == "scan" && mentions(&msg, &["module", "scanner", "equip", "install"]) {
        "A scanner module is required. Hint: sm ships  |  sm install-mod <module_id>"
    } else if endpoint == "attack" && mentions(&msg, &["weapon", "equip", "install"]) {
        "A weapon module is required. Hint: sm ships  |  sm install-mod <module_id>"
    } else if endpoint == "mine"
        && mentions(&msg, &["no resource", "not mineable", "no ore", "nothing to mine"])
    {
        "No mineable resources here. Hint: sm system (find asteroid belts)"
    } else if endpoint == "dock"
        && mentions(&msg, &["no base", "no station", "not dockable", "can't dock"])
    {
        "Nothing to dock with here. Hint: sm system  |  sm travel <target_poi>"
    } else if mentions(
        &msg,
        &["not enough fuel", "insufficient fuel", "out of fuel", "no fuel"],
    ) {
        "Insufficient fuel. Hint: sm dock  |  sm refuel"
    } else if mentions(
        &msg,
        &["cargo full", "not enough space", "insufficient cargo", "no cargo space"],
    ) {
        "Not enough cargo space. Hint: sm sell-all  |  sm jettison <item_id> <quantity>"
    } else if mentions(
        &msg,
        &["not enough credits", "insufficient credits", "can't afford", "insufficient funds"],
    ) {
        "Insufficient credits. Hint: sm sell-all  |  sm market"
    } else if mentions(&msg, &["must be docked", "need to dock", "at a station"]) {
        "This action requires being docked. Hint: sm dock"
    } else if mentions(&msg, &["must be undocked", "need to undock", "in space"]) {
        "This action requires being undocked. Hint: sm undock"
    } else {
        return None;
    };
    Some(hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{ScriptedTransport, ok, session_with_token};
    use serde_json::json;

    fn dispatcher(t: &ScriptedTransport) -> Dispatcher<ScriptedTransport> {
        Dispatcher::new(
            session_with_token(t),
            CommandTable::builtin(),
            PacingPolicy::default(),
        )
    }

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn unknown_command_suggests_and_skips_network() {
        let t = ScriptedTransport::new(vec![]);
        let mut d = dispatcher(&t);
        let err = d
            .dispatch("undok", &[], &HashMap::new())
            .await
            .unwrap_err();
        match &err {
            DispatchError::UnknownCommand { name, suggestions } => {
                assert_eq!(name, "undok");
                assert_eq!(suggestions.first().map(String::as_str), Some("undock"));
                assert!(suggestions.len() <= 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.hint().unwrap().contains("'undock'"));
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test]
    async fn missing_argument_skips_network() {
        let t = ScriptedTransport::new(vec![]);
        let mut d = dispatcher(&t);
        let err = d
            .dispatch("buy", &args(&["ore_iron"]), &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            DispatchError::Args { source: ArgError::MissingRequired(names), .. }
                if names == &["quantity".to_string()]
        ));
        assert_eq!(err.hint().unwrap(), "Usage: sm buy <item_id> <quantity>");
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test]
    async fn invalid_integer_skips_network() {
        let t = ScriptedTransport::new(vec![]);
        let mut d = dispatcher(&t);
        let err = d
            .dispatch("buy", &args(&["ore_iron", "ten"]), &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Args {
                source: ArgError::InvalidType { .. },
                ..
            }
        ));
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test]
    async fn passthrough_sends_typed_body() {
        let t = ScriptedTransport::new(vec![ok(json!({"result": {"message": "bought"}}))]);
        let mut d = dispatcher(&t);
        let out = d
            .dispatch("BUY", &args(&["ore_iron", "10"]), &HashMap::new())
            .await
            .unwrap();
        assert!(matches!(out, Outcome::Envelope { ref command, .. } if command == "buy"));
        let sent = &t.requests()[0];
        assert_eq!(sent.endpoint, "buy");
        assert_eq!(sent.body.get("item_id"), Some(&json!("ore_iron")));
        assert_eq!(sent.body.get("quantity"), Some(&json!(10)));
        assert_eq!(sent.token.as_deref(), Some("tok-test"));
    }

    #[tokio::test]
    async fn underscored_names_resolve_to_hyphenated_entries() {
        let t = ScriptedTransport::new(vec![ok(json!({"result": {}}))]);
        let mut d = dispatcher(&t);
        d.dispatch("buy_ship", &args(&["hauler"]), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(t.endpoints(), vec!["buy_ship"]);
    }

    #[tokio::test]
    async fn status_calls_get_status() {
        let t = ScriptedTransport::new(vec![ok(json!({"result": {"credits": 10}}))]);
        let mut d = dispatcher(&t);
        d.dispatch("status", &[], &HashMap::new()).await.unwrap();
        assert_eq!(t.endpoints(), vec!["get_status"]);
    }

    #[tokio::test]
    async fn raw_merges_json_body_and_named_args() {
        let t = ScriptedTransport::new(vec![ok(json!({"result": {}}))]);
        let mut d = dispatcher(&t);
        let named = HashMap::from([("page".to_string(), "2".to_string())]);
        d.dispatch("raw", &args(&["get_map", r#"{"detail": true}"#]), &named)
            .await
            .unwrap();
        let sent = &t.requests()[0];
        assert_eq!(sent.endpoint, "get_map");
        assert_eq!(sent.body.get("detail"), Some(&json!(true)));
        assert_eq!(sent.body.get("page"), Some(&json!("2")));
    }

    #[tokio::test]
    async fn raw_rejects_non_object_body() {
        let t = ScriptedTransport::new(vec![]);
        let mut d = dispatcher(&t);
        for body in ["[1, 2]", "{oops"] {
            let err = d
                .dispatch("raw", &args(&["get_map", body]), &HashMap::new())
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::Usage(_)));
        }
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test]
    async fn commands_lists_table_without_network() {
        let t = ScriptedTransport::new(vec![]);
        let mut d = dispatcher(&t);
        let out = d.dispatch("commands", &[], &HashMap::new()).await.unwrap();
        match out {
            Outcome::Commands(entries) => {
                assert_eq!(entries.len(), d.table().len());
                assert!(entries.iter().any(|e| e.name == "sell-all"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test]
    async fn server_errors_surface_verbatim_with_context_hint() {
        let t = ScriptedTransport::new(vec![ok(json!({
            "error": {"code": "mine_failed", "message": "Nothing to mine here"}
        }))]);
        let mut d = dispatcher(&t);
        let err = d.dispatch("mine", &[], &HashMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Nothing to mine here [mine_failed]");
        assert!(err.hint().unwrap().contains("No mineable resources"));
    }

    #[test]
    fn hint_table_matches_generic_phrases() {
        assert!(server_hint("jump", "Not enough fuel to jump").unwrap().contains("sm refuel"));
        assert!(server_hint("buy", "Cargo full").unwrap().contains("jettison"));
        assert!(server_hint("dock", "Not dockable").unwrap().contains("travel"));
        assert_eq!(server_hint("chat", "channel muted"), None);
    }

    #[test]
    fn interrupt_is_recognised() {
        let err = DispatchError::Api {
            endpoint: "sell".into(),
            source: ApiError::Interrupted,
        };
        assert!(err.is_interrupted());
        assert_eq!(err.hint(), None);
    }
}
