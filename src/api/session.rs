//! Session & transport layer.
//!
//! `Session::execute(endpoint, body)` is the one call every command goes
//! through. It owns the token, the retry/backoff policy, re-authentication
//! on session expiry, server-driven rate-limit waits, pre-flight checks
//! against the [`StateCache`], and cache maintenance after each response.
//!
//! Recovery layers, innermost first:
//!   round_trip   transient retries (connect/timeout/503/504) + one short
//!                rate-limit wait; never re-authenticates
//!   execute      one re-authentication + replay on session expiry
//!
//! Every attempt rebuilds its [`OutboundRequest`] from the caller's body
//! and the *current* token, so a replay can never carry the old token.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;
use super::credentials::{Credentials, TokenStore};
use super::envelope::{Body, ResponseEnvelope, ServerFault};
use super::error::ApiError;
use super::policy::{self, RetryPolicy};
use super::transport::{OutboundRequest, RawResponse, Transport, TransportError};
use crate::cache::{Snapshot, StateCache};

/// Tunables fixed at session construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Credential file used by `login()` without an explicit path and by
    /// re-authentication when nothing has been loaded yet.
    pub cred_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            cred_file: None,
        }
    }
}

/// What a single logical exchange produced once transient noise is gone.
#[derive(Debug)]
enum Reply {
    Envelope(ResponseEnvelope),
    SessionExpired(ServerFault),
}

/// How one raw HTTP response should be treated.
#[derive(Debug)]
enum Verdict {
    Done(ResponseEnvelope),
    SessionExpired(ServerFault),
    RateLimited(ServerFault),
    Transient(String),
}

/// Why an attempt failed transiently; decides the terminal error kind.
#[derive(Debug)]
enum Transient {
    Timeout,
    Network(String),
}

pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    store: TokenStore,
    token: Option<String>,
    credentials: Option<Credentials>,
    cache: StateCache,
    cancel: CancelSignal,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig, store: TokenStore, cancel: CancelSignal) -> Self {
        Self {
            transport,
            config,
            store,
            token: None,
            credentials: None,
            cache: StateCache::default(),
            cancel,
            closed: false,
        }
    }

    /// Build a session and pick up the token persisted by an earlier run.
    pub fn resume(
        transport: T,
        config: SessionConfig,
        store: TokenStore,
        cancel: CancelSignal,
    ) -> Result<Self, ApiError> {
        let mut session = Self::new(transport, config, store, cancel);
        session.token = session.store.load()?;
        if let Some(t) = &session.token {
            debug!(token = %token_prefix(t), "resumed persisted session");
        }
        Ok(session)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[cfg(test)]
    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    #[cfg(test)]
    pub(crate) fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Execute a named request with the current session token.
    pub async fn execute(&mut self, endpoint: &str, body: &Body) -> Result<ResponseEnvelope, ApiError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ApiError::EmptyEndpoint);
        }
        if self.closed {
            return Err(ApiError::Unauthenticated);
        }
        let Some(token) = self.token.clone() else {
            return Err(ApiError::Unauthenticated);
        };

        if let Some(snapshot) = self.cache.get() {
            policy::preflight(endpoint, body, snapshot).inspect_err(|e| {
                debug!(endpoint, reason = %e, "pre-flight check rejected call");
            })?;
        }

        let envelope = match self.round_trip(endpoint, body, Some(&token)).await? {
            Reply::Envelope(env) => env,
            Reply::SessionExpired(fault) => {
                info!(endpoint, code = %fault.code, "session expired, re-logging in");
                self.reauthenticate().await?;
                let fresh = self.token.clone().ok_or(ApiError::Unauthenticated)?;
                match self.round_trip(endpoint, body, Some(&fresh)).await? {
                    Reply::Envelope(env) => env,
                    Reply::SessionExpired(_) => return Err(ApiError::Unauthenticated),
                }
            }
        };

        self.absorb(endpoint, envelope)
    }

    /// Log in with a credential file (explicit path, else the configured one).
    pub async fn login(&mut self, cred_file: Option<&Path>) -> Result<ResponseEnvelope, ApiError> {
        let path = cred_file
            .map(Path::to_path_buf)
            .or_else(|| self.config.cred_file.clone())
            .ok_or_else(|| ApiError::Credentials("no credential file configured".into()))?;
        let creds = Credentials::load(&path)?;
        self.config.cred_file = Some(path);
        self.authenticate(creds).await
    }

    /// Register a new account, adopting the resulting session and saving
    /// the issued password to the credential file when none exists yet.
    pub async fn register(
        &mut self,
        username: &str,
        empire: &str,
        registration_code: &str,
    ) -> Result<ResponseEnvelope, ApiError> {
        let sid = self.open_session().await?;
        self.adopt_token(&sid)?;

        let mut body = Body::new();
        body.insert("username".into(), Value::String(username.to_string()));
        body.insert("empire".into(), Value::String(empire.to_string()));
        body.insert(
            "registration_code".into(),
            Value::String(registration_code.to_string()),
        );

        let env = match self.round_trip("register", &body, Some(&sid)).await {
            Ok(Reply::Envelope(env)) if !env.is_error() => env,
            Ok(Reply::Envelope(env)) => {
                self.discard_token()?;
                return Err(server_error(env.error.unwrap_or_else(empty_fault)));
            }
            Ok(Reply::SessionExpired(fault)) => {
                self.discard_token()?;
                return Err(server_error(fault));
            }
            Err(e) => {
                self.discard_token()?;
                return Err(e);
            }
        };

        if let Some(new_sid) = env.session.as_deref().filter(|s| *s != sid) {
            self.adopt_token(new_sid)?;
        }
        if let Some(password) = env.get("password").and_then(Value::as_str) {
            let creds = Credentials {
                username: username.to_string(),
                password: password.to_string(),
            };
            if let Some(path) = &self.config.cred_file
                && creds.write_if_absent(path)?
            {
                info!(path = %path.display(), "saved credentials");
            }
            self.credentials = Some(creds);
        }
        self.closed = false;
        Ok(env)
    }

    /// Issue `logout`, then drop the token for good: in memory, on disk,
    /// and for re-authentication purposes.
    pub async fn logout(&mut self) -> Result<ResponseEnvelope, ApiError> {
        let outcome = self.execute("logout", &Body::new()).await;
        self.close()?;
        outcome
    }

    /* ---- internals ---- */

    fn absorb(&mut self, endpoint: &str, envelope: ResponseEnvelope) -> Result<ResponseEnvelope, ApiError> {
        if let Some(sid) = envelope.session.as_deref()
            && self.token.as_deref() != Some(sid)
            && endpoint != "logout"
        {
            info!(token = %token_prefix(sid), "server refreshed session");
            self.adopt_token(sid)?;
        }

        if let Some(fault) = envelope.error {
            for n in &envelope.notifications {
                info!(kind = %n.kind, "{}", n.text());
            }
            return Err(server_error(fault));
        }

        if let Some(result) = &envelope.result
            && let Some(snapshot) = Snapshot::extract(result, tokio::time::Instant::now())
        {
            self.cache.put(snapshot);
        }
        if policy::is_mutating(endpoint) {
            self.cache.invalidate();
        }
        Ok(envelope)
    }

    async fn reauthenticate(&mut self) -> Result<(), ApiError> {
        let creds = match &self.credentials {
            Some(c) => c.clone(),
            None => match &self.config.cred_file {
                Some(path) if path.exists() => Credentials::load(path)?,
                _ => return Err(ApiError::Unauthenticated),
            },
        };
        match self.authenticate(creds).await {
            Ok(_) => Ok(()),
            Err(ApiError::Interrupted) => Err(ApiError::Interrupted),
            Err(e) => Err(ApiError::ReauthFailed(e.to_string())),
        }
    }

    async fn authenticate(&mut self, creds: Credentials) -> Result<ResponseEnvelope, ApiError> {
        let sid = self.open_session().await?;
        self.adopt_token(&sid)?;

        let mut body = Body::new();
        body.insert("username".into(), Value::String(creds.username.clone()));
        body.insert("password".into(), Value::String(creds.password.clone()));

        let reply = self.round_trip("login", &body, Some(&sid)).await;
        let env = match reply {
            Ok(Reply::Envelope(env)) if !env.is_error() => env,
            Ok(Reply::Envelope(env)) => {
                self.discard_token()?;
                return Err(server_error(env.error.unwrap_or_else(empty_fault)));
            }
            Ok(Reply::SessionExpired(fault)) => {
                self.discard_token()?;
                return Err(server_error(fault));
            }
            Err(e) => {
                self.discard_token()?;
                return Err(e);
            }
        };

        info!(username = %creds.username, token = %token_prefix(&sid), "logged in");
        self.credentials = Some(creds);
        self.closed = false;
        self.cache.invalidate();
        Ok(env)
    }

    /// `POST session` without a token; returns the new session id.
    async fn open_session(&mut self) -> Result<String, ApiError> {
        match self.round_trip("session", &Body::new(), None).await? {
            Reply::Envelope(env) => {
                if let Some(fault) = env.error {
                    return Err(server_error(fault));
                }
                env.session.ok_or_else(|| ApiError::ServerError {
                    code: "no_session".into(),
                    message: "server did not return a session id".into(),
                })
            }
            Reply::SessionExpired(fault) => Err(server_error(fault)),
        }
    }

    fn adopt_token(&mut self, token: &str) -> Result<(), ApiError> {
        self.token = Some(token.to_string());
        self.store.save(token)
    }

    fn discard_token(&mut self) -> Result<(), ApiError> {
        self.token = None;
        self.store.clear()
    }

    fn close(&mut self) -> Result<(), ApiError> {
        self.closed = true;
        self.credentials = None;
        self.cache.invalidate();
        self.discard_token()
    }

    async fn round_trip(
        &mut self,
        endpoint: &str,
        body: &Body,
        token: Option<&str>,
    ) -> Result<Reply, ApiError> {
        let mut retries = 0u32;
        let mut waited_for_rate_limit = false;

        loop {
            let request = OutboundRequest::build(endpoint, body, token);
            debug!(endpoint, attempt = retries + 1, "sending request");

            let sent = tokio::time::timeout(self.config.timeout, self.transport.post(&request)).await;
            let failure = match sent {
                Err(_) | Ok(Err(TransportError::Timeout)) => Transient::Timeout,
                Ok(Err(e)) => Transient::Network(e.to_string()),
                Ok(Ok(raw)) => match classify(raw) {
                    Verdict::Done(env) => return Ok(Reply::Envelope(env)),
                    Verdict::SessionExpired(fault) => return Ok(Reply::SessionExpired(fault)),
                    Verdict::RateLimited(fault) => match fault.wait_seconds {
                        Some(wait)
                            if !waited_for_rate_limit && self.config.retry.should_wait(wait) =>
                        {
                            waited_for_rate_limit = true;
                            info!(endpoint, wait, "rate limited, waiting");
                            if !self.cancel.sleep(Duration::from_secs(wait)).await {
                                return Err(ApiError::Interrupted);
                            }
                            continue;
                        }
                        Some(wait) => return Err(ApiError::RateLimited { wait_seconds: wait }),
                        None => return Err(server_error(fault)),
                    },
                    Verdict::Transient(reason) => Transient::Network(reason),
                },
            };

            let Some(delay) = self.config.retry.delay_before(retries) else {
                return Err(match failure {
                    Transient::Timeout => ApiError::NetworkTimeout {
                        endpoint: endpoint.to_string(),
                        timeout_secs: self.config.timeout.as_secs(),
                    },
                    Transient::Network(reason) => ApiError::NetworkError {
                        endpoint: endpoint.to_string(),
                        attempts: retries + 1,
                        reason,
                    },
                });
            };
            retries += 1;
            warn!(endpoint, ?failure, delay_secs = delay.as_secs(), "transient failure, retrying");
            if !self.cancel.sleep(delay).await {
                return Err(ApiError::Interrupted);
            }
        }
    }
}

fn classify(raw: RawResponse) -> Verdict {
    let parsed = ResponseEnvelope::parse(&raw.body);

    if raw.is_success() {
        return match parsed {
            Ok(env) => match &env.error {
                Some(f) if f.mentions_session() => Verdict::SessionExpired(f.clone()),
                Some(f) if f.is_rate_limit() => Verdict::RateLimited(f.clone()),
                _ => Verdict::Done(env),
            },
            Err(e) => Verdict::Done(ResponseEnvelope {
                error: Some(ServerFault {
                    code: "invalid_response".into(),
                    message: format!("malformed response body: {e}"),
                    wait_seconds: None,
                }),
                ..Default::default()
            }),
        };
    }

    if matches!(raw.status, 503 | 504) {
        return Verdict::Transient(format!("server returned HTTP {}", raw.status));
    }

    let mut env = parsed.unwrap_or_default();
    let fault = env
        .error
        .take()
        .unwrap_or_else(|| ServerFault::from_text(raw.status, &raw.body));

    match raw.status {
        401 if fault.mentions_session() => Verdict::SessionExpired(fault),
        429 => Verdict::RateLimited(fault),
        _ if fault.is_rate_limit() => Verdict::RateLimited(fault),
        _ => {
            env.error = Some(fault);
            Verdict::Done(env)
        }
    }
}

fn server_error(fault: ServerFault) -> ApiError {
    ApiError::ServerError {
        code: fault.code,
        message: fault.message,
    }
}

fn empty_fault() -> ServerFault {
    ServerFault {
        code: String::new(),
        message: "request failed".into(),
        wait_seconds: None,
    }
}

fn token_prefix(token: &str) -> String {
    let head: String = token.chars().take(12).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{ScriptedTransport, Step};
    use serde_json::json;
    use tokio::time::Instant;

    fn body(v: Value) -> Body {
        v.as_object().cloned().unwrap()
    }

    fn logged_in(transport: ScriptedTransport) -> Session<ScriptedTransport> {
        let mut s = Session::new(
            transport,
            SessionConfig::default(),
            TokenStore::ephemeral(),
            CancelSignal::new(),
        );
        s.token = Some("tok-old".into());
        s
    }

    fn ok(v: Value) -> Step {
        Step::Respond(RawResponse::new(200, v.to_string()))
    }

    fn status(code: u16, v: Value) -> Step {
        Step::Respond(RawResponse::new(code, v.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn no_token_fails_before_network() {
        let t = ScriptedTransport::new(vec![]);
        let mut s = Session::new(
            t.clone(),
            SessionConfig::default(),
            TokenStore::ephemeral(),
            CancelSignal::new(),
        );
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_endpoint_is_rejected() {
        let t = ScriptedTransport::new(vec![]);
        let mut s = logged_in(t.clone());
        assert!(matches!(
            s.execute("  ", &Body::new()).await,
            Err(ApiError::EmptyEndpoint)
        ));
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn token_goes_into_header_and_body() {
        let t = ScriptedTransport::new(vec![ok(json!({"result": {"message": "hi"}}))]);
        let mut s = logged_in(t.clone());
        let env = s.execute("get_version", &Body::new()).await.unwrap();
        assert_eq!(env.get("message"), Some(&json!("hi")));
        let sent = t.requests();
        assert_eq!(sent[0].token.as_deref(), Some("tok-old"));
        assert_eq!(sent[0].body.get("session_id"), Some(&json!("tok-old")));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_short_wait_sleeps_and_retries_once() {
        let t = ScriptedTransport::new(vec![
            status(429, json!({"error": {"code": "rate_limited", "message": "slow", "wait_seconds": 5}})),
            ok(json!({"result": {"message": "mined"}})),
        ]);
        let mut s = logged_in(t.clone());
        let started = Instant::now();
        let env = s.execute("mine", &Body::new()).await.unwrap();
        assert_eq!(env.get("message"), Some(&json!("mined")));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(t.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_long_wait_surfaces_without_retry() {
        let t = ScriptedTransport::new(vec![status(
            429,
            json!({"error": {"code": "rate_limited", "message": "slow", "wait_seconds": 30}}),
        )]);
        let mut s = logged_in(t.clone());
        let err = s.execute("mine", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { wait_seconds: 30 }));
        assert_eq!(t.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_retry_happens_only_once() {
        let limited = json!({"error": {"code": "rate_limited", "message": "slow", "wait_seconds": 2}});
        let t = ScriptedTransport::new(vec![status(429, limited.clone()), status(429, limited)]);
        let mut s = logged_in(t.clone());
        let err = s.execute("mine", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { wait_seconds: 2 }));
        assert_eq!(t.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_failures_back_off_one_then_two_seconds() {
        let t = ScriptedTransport::new(vec![
            Step::Fail(TransportError::Connect("refused".into())),
            Step::Fail(TransportError::Connect("reset".into())),
            ok(json!({"result": {}})),
        ]);
        let mut s = logged_in(t.clone());
        let started = Instant::now();
        s.execute("get_status", &Body::new()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(t.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_network_error() {
        let t = ScriptedTransport::new(vec![
            status(503, json!({})),
            status(504, json!({})),
            status(503, json!({})),
        ]);
        let mut s = logged_in(t.clone());
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkError { attempts: 3, .. }));
        assert_eq!(t.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_requests_time_out() {
        let t = ScriptedTransport::new(vec![Step::Hang, Step::Hang, Step::Hang]);
        let mut s = logged_in(t.clone());
        let started = Instant::now();
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkTimeout { timeout_secs: 30, .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(30 * 3 + 1 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn session_expiry_reauthenticates_and_replays_with_new_token() {
        let dir = tempfile::tempdir().unwrap();
        let cred = dir.path().join("credentials.txt");
        std::fs::write(&cred, "Username: pilot\nPassword: pw\n").unwrap();

        let t = ScriptedTransport::new(vec![
            status(401, json!({"error": {"code": "session_expired", "message": "expired"}})),
            ok(json!({"session": {"id": "tok-new"}})),
            ok(json!({"result": {"message": "welcome"}})),
            ok(json!({"result": {"credits_earned": 40}})),
        ]);
        let mut s = logged_in(t.clone());
        s.config.cred_file = Some(cred);

        let env = s
            .execute("sell", &body(json!({"item_id": "ore", "quantity": 2})))
            .await
            .unwrap();
        assert_eq!(env.get("credits_earned"), Some(&json!(40)));

        let sent = t.requests();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[1].endpoint, "session");
        assert!(sent[1].token.is_none());
        assert_eq!(sent[2].endpoint, "login");
        assert_eq!(sent[2].body.get("username"), Some(&json!("pilot")));
        let replay = &sent[3];
        assert_eq!(replay.endpoint, "sell");
        assert_eq!(replay.token.as_deref(), Some("tok-new"));
        assert_eq!(replay.body.get("session_id"), Some(&json!("tok-new")));
        assert_eq!(replay.body.get("quantity"), Some(&json!(2)));
        assert_eq!(s.token(), Some("tok-new"));
    }

    #[tokio::test(start_paused = true)]
    async fn second_expiry_after_reauth_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let cred = dir.path().join("credentials.txt");
        std::fs::write(&cred, "Username: pilot\nPassword: pw\n").unwrap();
        let expired = json!({"error": {"code": "session_invalid", "message": "bad"}});
        let t = ScriptedTransport::new(vec![
            status(401, expired.clone()),
            ok(json!({"session": {"id": "tok-new"}})),
            ok(json!({"result": {}})),
            status(401, expired),
        ]);
        let mut s = logged_in(t.clone());
        s.config.cred_file = Some(cred);
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(t.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_without_credentials_is_unauthenticated() {
        let t = ScriptedTransport::new(vec![status(
            401,
            json!({"error": {"code": "session_expired", "message": "expired"}}),
        )]);
        let mut s = logged_in(t.clone());
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(t.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_envelope_is_surfaced_verbatim() {
        let t = ScriptedTransport::new(vec![ok(
            json!({"error": {"code": "no_fuel", "message": "Not enough fuel"}}),
        )]);
        let mut s = logged_in(t);
        let err = s.execute("jump", &body(json!({"target_system": "x"}))).await.unwrap_err();
        match err {
            ApiError::ServerError { code, message } => {
                assert_eq!(code, "no_fuel");
                assert_eq!(message, "Not enough fuel");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_undocked_snapshot_blocks_repair_without_network() {
        let t = ScriptedTransport::new(vec![ok(
            json!({"result": {"player": {"docked_at_base": null, "current_system": "sol"}}}),
        )]);
        let mut s = logged_in(t.clone());
        s.execute("get_status", &Body::new()).await.unwrap();
        let err = s.execute("repair", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::PreconditionFailed { .. }));
        assert_eq!(t.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_snapshot_lets_call_through() {
        let t = ScriptedTransport::new(vec![
            ok(json!({"result": {"docked": false, "current_system": "sol"}})),
            ok(json!({"result": {"hull": 100}})),
        ]);
        let mut s = logged_in(t.clone());
        s.execute("get_status", &Body::new()).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        s.execute("repair", &Body::new()).await.unwrap();
        assert_eq!(t.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mutating_call_invalidates_even_with_status_fields() {
        let t = ScriptedTransport::new(vec![
            ok(json!({"result": {"docked": false, "current_system": "sol"}})),
            ok(json!({"result": {"docked": true, "current_system": "sol", "base_name": "Hub"}})),
        ]);
        let mut s = logged_in(t);
        s.execute("get_status", &Body::new()).await.unwrap();
        assert!(s.cache().get().is_some());
        s.execute("dock", &Body::new()).await.unwrap();
        assert!(s.cache().get().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_backoff_returns_promptly() {
        let t = ScriptedTransport::new(vec![
            Step::Fail(TransportError::Connect("refused".into())),
            ok(json!({"result": {}})),
        ]);
        let mut s = logged_in(t.clone());
        s.cancel_signal().trigger();
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Interrupted));
        assert_eq!(t.request_count(), 1);
        assert_eq!(s.token(), Some("tok-old"));
    }

    #[tokio::test(start_paused = true)]
    async fn login_persists_token_and_logout_forgets_it() {
        let dir = tempfile::tempdir().unwrap();
        let cred = dir.path().join("credentials.txt");
        let token_file = dir.path().join("session");
        std::fs::write(&cred, "Username: pilot\nPassword: pw\n").unwrap();
        let t = ScriptedTransport::new(vec![
            ok(json!({"session": {"id": "tok-a"}})),
            ok(json!({"result": {"message": "welcome"}})),
            ok(json!({"result": {"message": "bye"}})),
        ]);
        let mut s = Session::new(
            t.clone(),
            SessionConfig::default(),
            TokenStore::at(&token_file),
            CancelSignal::new(),
        );
        s.login(Some(&cred)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&token_file).unwrap(), "tok-a");

        s.logout().await.unwrap();
        assert!(!token_file.exists());
        assert!(s.token().is_none());
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(t.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_removes_persisted_token() {
        let dir = tempfile::tempdir().unwrap();
        let cred = dir.path().join("credentials.txt");
        let token_file = dir.path().join("session");
        std::fs::write(&cred, "Username: pilot\nPassword: wrong\n").unwrap();
        let t = ScriptedTransport::new(vec![
            ok(json!({"session": {"id": "tok-a"}})),
            status(401, json!({"error": {"code": "invalid_credentials", "message": "bad password"}})),
        ]);
        let mut s = Session::new(
            t,
            SessionConfig::default(),
            TokenStore::at(&token_file),
            CancelSignal::new(),
        );
        let err = s.login(Some(&cred)).await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError { ref code, .. } if code == "invalid_credentials"));
        assert!(!token_file.exists());
        assert!(s.token().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn register_saves_issued_password() {
        let dir = tempfile::tempdir().unwrap();
        let cred = dir.path().join("me/credentials.txt");
        let t = ScriptedTransport::new(vec![
            ok(json!({"session": {"id": "tok-reg"}})),
            ok(json!({"result": {"username": "pilot", "password": "s3cret", "session_id": "tok-acct"}})),
        ]);
        let config = SessionConfig {
            cred_file: Some(cred.clone()),
            ..SessionConfig::default()
        };
        let mut s = Session::new(t, config, TokenStore::ephemeral(), CancelSignal::new());
        s.register("pilot", "solarian", "CODE").await.unwrap();
        assert_eq!(s.token(), Some("tok-acct"));
        let saved = Credentials::load(&cred).unwrap();
        assert_eq!(saved.password, "s3cret");
    }

    #[tokio::test(start_paused = true)]
    async fn resume_reads_persisted_token() {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("session");
        std::fs::write(&token_file, "tok-disk\n").unwrap();
        let s = Session::resume(
            ScriptedTransport::new(vec![]),
            SessionConfig::default(),
            TokenStore::at(&token_file),
            CancelSignal::new(),
        )
        .unwrap();
        assert_eq!(s.token(), Some("tok-disk"));
    }

    #[test]
    fn classify_maps_statuses() {
        assert!(matches!(
            classify(RawResponse::new(503, "")),
            Verdict::Transient(_)
        ));
        assert!(matches!(
            classify(RawResponse::new(500, "boom")),
            Verdict::Done(ResponseEnvelope { error: Some(_), .. })
        ));
        assert!(matches!(
            classify(RawResponse::new(200, r#"{"error":{"code":"session_invalid","message":"x"}}"#)),
            Verdict::SessionExpired(_)
        ));
        assert!(matches!(
            classify(RawResponse::new(401, r#"{"error":{"code":"forbidden","message":"x"}}"#)),
            Verdict::Done(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn location_only_snapshot_does_not_block_docked_calls() {
        let t = ScriptedTransport::new(vec![
            ok(json!({"result": {"system_name": "Sol"}})),
            ok(json!({"result": {"hull": 100}})),
        ]);
        let mut s = logged_in(t.clone());
        s.execute("get_system", &Body::new()).await.unwrap();
        s.execute("repair", &Body::new()).await.unwrap();
        assert_eq!(t.endpoints(), vec!["get_system", "repair"]);
    }

    #[tokio::test(start_paused = true)]
    async fn docked_at_base_outweighs_stale_docked_flag() {
        let t = ScriptedTransport::new(vec![
            ok(json!({"result": {"docked": false, "player": {"docked_at_base": "base-9", "current_system": "sol"}}})),
            ok(json!({"result": {"hull": 100}})),
        ]);
        let mut s = logged_in(t.clone());
        s.execute("get_status", &Body::new()).await.unwrap();
        s.execute("repair", &Body::new()).await.unwrap();
        assert_eq!(t.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_rate_limit_wait_returns_promptly() {
        let t = ScriptedTransport::new(vec![
            status(429, json!({"error": {"code": "rate_limited", "message": "slow", "wait_seconds": 5}})),
            ok(json!({"result": {}})),
        ]);
        let mut s = logged_in(t.clone());
        s.cancel_signal().trigger();
        let err = s.execute("get_status", &Body::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Interrupted));
        assert_eq!(t.request_count(), 1);
        assert_eq!(s.token(), Some("tok-old"));
    }

    #[tokio::test(start_paused = true)]
    async fn refreshed_session_id_is_adopted_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("session");
        let t = ScriptedTransport::new(vec![
            ok(json!({"session": {"id": "tok-new"}, "result": {"credits": 10}})),
            ok(json!({"result": {"credits": 10}})),
        ]);
        let mut s = Session::new(
            t.clone(),
            SessionConfig::default(),
            TokenStore::at(&token_file),
            CancelSignal::new(),
        )
        .with_token("tok-old");
        s.execute("get_status", &Body::new()).await.unwrap();
        assert_eq!(s.token(), Some("tok-new"));
        assert_eq!(
            TokenStore::at(&token_file).load().unwrap().as_deref(),
            Some("tok-new")
        );
        s.execute("get_status", &Body::new()).await.unwrap();
        assert_eq!(t.requests()[1].token.as_deref(), Some("tok-new"));
    }
}
