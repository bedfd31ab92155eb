//! Scripted in-memory transport for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::cancel::CancelSignal;
use super::credentials::TokenStore;
use super::session::{Session, SessionConfig};
use super::transport::{OutboundRequest, RawResponse, Transport, TransportError};

/// One scripted reaction to the next request.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(RawResponse),
    Fail(TransportError),
    /// Never answers; exercises the request timeout.
    Hang,
}

/// Replays queued steps in order and records every request it sees.
/// Clones share the same script and log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    steps: Rc<RefCell<VecDeque<Step>>>,
    seen: Rc<RefCell<Vec<OutboundRequest>>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Rc::new(RefCell::new(steps.into())),
            seen: Rc::default(),
        }
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.seen.borrow().iter().map(|r| r.endpoint.clone()).collect()
    }
}

/// A session already holding `tok-test`, backed by `transport`.
pub fn session_with_token(transport: &ScriptedTransport) -> Session<ScriptedTransport> {
    Session::new(
        transport.clone(),
        SessionConfig::default(),
        TokenStore::ephemeral(),
        CancelSignal::new(),
    )
    .with_token("tok-test")
}

/// `200 OK` with `value` as the JSON body.
pub fn ok(value: serde_json::Value) -> Step {
    Step::Respond(RawResponse::new(200, value.to_string()))
}

impl Transport for ScriptedTransport {
    async fn post(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        self.seen.borrow_mut().push(request.clone());
        let step = self.steps.borrow_mut().pop_front();
        match step {
            Some(Step::Respond(raw)) => Ok(raw),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TransportError::Other(format!(
                "no scripted response for '{}'",
                request.endpoint
            ))),
        }
    }
}
