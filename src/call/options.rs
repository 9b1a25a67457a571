// Call construction and per-advance options

use crate::http::{HttpMethod, Params};

pub const DEFAULT_DIRECTION: &str = "inbound";

/// Options for [`CallSession::initiate`](super::CallSession::initiate)
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    /// Method of the initial request
    pub method: HttpMethod,
    /// Call identifier; generated when `None`
    pub call_sid: Option<String>,
    /// Sends `AnsweredBy=machine` instead of `human`
    pub is_machine: bool,
    pub called: Option<String>,
    pub direction: String,
    /// `CallStatus` of the initial request only (e.g. "ringing")
    pub call_status: Option<String>,
    /// Emit `[DEBUG]` lines on stderr
    pub debug: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            method: HttpMethod::Post,
            call_sid: None,
            is_machine: false,
            called: None,
            direction: DEFAULT_DIRECTION.to_string(),
            call_status: None,
            debug: false,
        }
    }
}

/// Overrides for one advance request. Never stored on the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceOptions {
    pub call_status: Option<String>,
    /// Replaces the method named by the document
    pub method: Option<HttpMethod>,
    /// Extra parameters, applied last
    pub params: Params,
}

impl AdvanceOptions {
    pub fn with_call_status(status: impl Into<String>) -> Self {
        Self {
            call_status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn with_method(method: HttpMethod) -> Self {
        Self {
            method: Some(method),
            ..Default::default()
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.set(name, value);
        self
    }
}

/// Immutable identity of one simulated call
#[derive(Debug, Clone, PartialEq)]
pub struct CallIdentity {
    pub sid: String,
    pub initial_path: String,
    pub http_method: HttpMethod,
    pub from: String,
    pub to: String,
    pub is_machine: bool,
    pub called: Option<String>,
    pub direction: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_defaults() {
        let opts = CallOptions::default();
        assert_eq!(opts.method, HttpMethod::Post);
        assert_eq!(opts.call_sid, None);
        assert!(!opts.is_machine);
        assert_eq!(opts.called, None);
        assert_eq!(opts.direction, "inbound");
        assert_eq!(opts.call_status, None);
        assert!(!opts.debug);
    }

    #[test]
    fn test_advance_options_defaults() {
        let opts = AdvanceOptions::default();
        assert_eq!(opts.call_status, None);
        assert_eq!(opts.method, None);
        assert!(opts.params.is_empty());
    }

    #[test]
    fn test_advance_options_builders() {
        let opts = AdvanceOptions::with_call_status("completed").param("RecordingUrl", "http://r");
        assert_eq!(opts.call_status.as_deref(), Some("completed"));
        assert_eq!(opts.params.get("RecordingUrl"), Some("http://r"));

        let opts = AdvanceOptions::with_method(HttpMethod::Get);
        assert_eq!(opts.method, Some(HttpMethod::Get));
        assert_eq!(opts.call_status, None);
    }
}
