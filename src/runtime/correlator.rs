use super::context::PendingRequest;
use super::engine::LoopCore;
use super::fault::LoopFaultSignal;
use crate::agent::{AgentCommand, AgentSendError, RequestId};
use crate::{log_debug, log_debug_content};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum RequestError {
    Timeout {
        id: RequestId,
        name: String,
        waited: Duration,
    },
    AgentUnavailable,
    Send(String),
    /// A control signal was raised by the loop while waiting
    Interrupted(LoopFaultSignal),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Timeout { id, name, waited } => write!(
                f,
                "agent request '{name}' ({id}) timed out after {}ms",
                waited.as_millis()
            ),
            RequestError::AgentUnavailable => f.write_str("agent is not running"),
            RequestError::Send(msg) => write!(f, "failed to send agent request: {msg}"),
            RequestError::Interrupted(signal) => write!(f, "agent request interrupted: {signal}"),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<AgentSendError> for RequestError {
    fn from(err: AgentSendError) -> Self {
        match err {
            AgentSendError::Unavailable(_) => RequestError::AgentUnavailable,
            AgentSendError::Io(err) => RequestError::Send(err.to_string()),
        }
    }
}

impl From<RequestError> for LoopFaultSignal {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Interrupted(signal) => signal,
            other => LoopFaultSignal::unhandled(other.to_string()),
        }
    }
}

impl LoopCore {
    /// Send a request to the agent and keep the loop running until its
    /// response arrives or the configured timeout passes.
    pub fn request(
        &mut self,
        name: &str,
        params: Value,
    ) -> Result<Map<String, Value>, RequestError> {
        let timeout = self.settings.request_timeout;
        self.request_with_timeout(name, params, timeout)
    }

    pub fn request_with_timeout(
        &mut self,
        name: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Map<String, Value>, RequestError> {
        let id = self.ctx.allocate_request_id();
        log_debug_content(&format!("agent request {id} {name}: {params}"));
        self.supervisor.send(&AgentCommand::Request {
            id,
            name: name.to_string(),
            params,
        })?;
        let sent_at = Instant::now();
        self.ctx.pending_requests.insert(
            id,
            PendingRequest {
                id,
                name: name.to_string(),
                sent_at,
            },
        );

        loop {
            if let Err(signal) = self.pump() {
                self.ctx.pending_requests.remove(&id);
                self.ctx.pending_responses.remove(&id);
                return Err(RequestError::Interrupted(signal));
            }
            if let Some(response) = self.ctx.pending_responses.remove(&id) {
                return Ok(response);
            }
            let waited = sent_at.elapsed();
            if waited >= timeout {
                self.ctx.pending_requests.remove(&id);
                log_debug(&format!("agent request {id} ({name}) timed out"));
                return Err(RequestError::Timeout {
                    id,
                    name: name.to_string(),
                    waited,
                });
            }
        }
    }
}
