//! Request / response envelopes.
//!
//! The server answers with loosely shaped JSON: `error` may be a bare
//! string or an object, `result` is usually an object but occasionally a
//! string, notifications can sit at the top level or inside `result`.
//! Everything is normalised here, once, so nothing past the session layer
//! sees the ambiguity. Unknown top-level fields are kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body: parameter name -> typed JSON value.
pub type Body = Map<String, Value>;

/// `{endpoint, body}` built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub endpoint: String,
    pub body: Body,
}

impl RequestEnvelope {
    pub fn new(endpoint: impl Into<String>, body: Body) -> Self {
        Self {
            endpoint: endpoint.into(),
            body,
        }
    }
}

/// Structured form of a server-reported error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerFault {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<u64>,
}

impl ServerFault {
    /// Accepts `"text"`, `{code, message, wait_seconds}` or anything else
    /// (rendered as JSON text). `null` means "no error".
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(ServerFault {
                code: String::new(),
                message: s.clone(),
                wait_seconds: None,
            }),
            Value::Object(obj) => {
                let code = obj
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let message = obj
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                let wait_seconds = obj.get("wait_seconds").and_then(|w| {
                    w.as_u64()
                        .or_else(|| w.as_f64().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64))
                });
                Some(ServerFault {
                    code,
                    message,
                    wait_seconds,
                })
            }
            other => Some(ServerFault {
                code: String::new(),
                message: other.to_string(),
                wait_seconds: None,
            }),
        }
    }

    /// Fault synthesised from a non-JSON error body.
    pub fn from_text(status: u16, text: &str) -> Self {
        let trimmed = text.trim();
        ServerFault {
            code: format!("http_{status}"),
            message: if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.to_string()
            },
            wait_seconds: None,
        }
    }

    pub fn mentions_session(&self) -> bool {
        self.code.to_ascii_lowercase().contains("session")
    }

    pub fn is_rate_limit(&self) -> bool {
        let code = self.code.to_ascii_lowercase();
        code.contains("rate_limit") || code == "too_many_requests"
    }
}

/// A server push carried alongside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Notification {
    /// Plain acknowledgements carry no information for the user.
    pub fn is_ack(&self) -> bool {
        self.msg_type == "ok"
    }

    /// Best human-readable line for this notification.
    pub fn text(&self) -> String {
        self.data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.message.clone())
            .or_else(|| self.content.clone())
            .unwrap_or_else(|| match &self.data {
                Value::Object(m) if !m.is_empty() => format!("{}: {}", self.msg_type, self.data),
                _ => self.msg_type.clone(),
            })
    }
}

/// Normalised response.
///
/// At most one of `result` / `error` is meaningful; both absent is an
/// empty success.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Body>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ServerFault>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
    /// Session id announced by the server (creation, registration, refresh).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(flatten)]
    pub extra: Body,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
    #[serde(default)]
    notifications: Value,
    #[serde(default)]
    session: Value,
    #[serde(flatten)]
    extra: Body,
}

impl ResponseEnvelope {
    /// Parse a response body. Fails only when the text is not a JSON object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        Ok(Self::from_raw(raw))
    }

    #[cfg(test)]
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let raw: RawEnvelope = serde_json::from_value(value)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawEnvelope) -> Self {
        let RawEnvelope {
            result,
            error,
            notifications,
            session,
            mut extra,
        } = raw;

        let mut notes = collect_notifications(&notifications);
        let result = match result {
            Value::Null => None,
            Value::Object(mut map) => {
                if let Some(nested) = map.remove("notifications") {
                    notes.extend(collect_notifications(&nested));
                }
                Some(map)
            }
            Value::String(s) => Some(Map::from_iter([("message".to_string(), Value::String(s))])),
            other => Some(Map::from_iter([("value".to_string(), other)])),
        };

        let session = session_marker(&session)
            .or_else(|| match extra.remove("session_id") {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                Some(v) => {
                    extra.insert("session_id".into(), v);
                    None
                }
                None => None,
            })
            .or_else(|| {
                result
                    .as_ref()
                    .and_then(|r| r.get("session_id"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            });

        ResponseEnvelope {
            result,
            error: ServerFault::from_value(&error),
            notifications: notes,
            session,
            extra,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Field lookup inside `result`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.result.as_ref()?.get(key)
    }
}

fn collect_notifications(value: &Value) -> Vec<Notification> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|n| serde_json::from_value::<Notification>(n.clone()).ok())
        .filter(|n| !n.is_ack())
        .collect()
}

fn session_marker(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => ["id", "session_id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}
