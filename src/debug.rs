// Call session debug logging types and format functions
//
// Contains the DebugEvent enum and format_*_log helpers used by CallSession
// for structured debug output on stderr.

use crate::http::{HttpMethod, Params};

pub(crate) enum DebugEvent {
    Request,
    Response,
    Redirect,
    GatherSubmit,
    PartialResult,
    Error,
}

impl DebugEvent {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            DebugEvent::Request => "REQUEST",
            DebugEvent::Response => "RESPONSE",
            DebugEvent::Redirect => "REDIRECT",
            DebugEvent::GatherSubmit => "GATHER_SUBMIT",
            DebugEvent::PartialResult => "PARTIAL_RESULT",
            DebugEvent::Error => "ERROR",
        }
    }
}

/// Parameters rendered as `name=value` pairs separated by commas
fn format_params(params: &Params) -> String {
    let mut buf = String::new();
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        buf.push_str(name);
        buf.push('=');
        buf.push_str(value);
    }
    buf
}

/// Outbound request log
pub(crate) fn format_request_log(call_sid: &str, method: HttpMethod, path: &str, params: &Params) -> String {
    format!(
        "[DEBUG] {} call-sid={} method={} path={} params={}",
        DebugEvent::Request.label(),
        call_sid,
        method,
        path,
        format_params(params)
    )
}

/// Inbound response log
pub(crate) fn format_response_log(call_sid: &str, path: &str, status: u16, body_len: usize) -> String {
    format!(
        "[DEBUG] {} call-sid={} path={} status={} bytes={}",
        DebugEvent::Response.label(),
        call_sid,
        path,
        status,
        body_len
    )
}

/// Advance log: which transition moved the call from one path to another
pub(crate) fn format_advance_log(event: DebugEvent, call_sid: &str, from: &str, to: &str) -> String {
    format!(
        "[DEBUG] {} call-sid={} from={} to={}",
        event.label(),
        call_sid,
        from,
        to
    )
}

/// Error log for a failed request
pub(crate) fn format_error_log(call_sid: &str, path: &str, error: &str) -> String {
    format!(
        "[DEBUG] {} call-sid={} path={} error=\"{}\"",
        DebugEvent::Error.label(),
        call_sid,
        path,
        error
    )
}
