use crate::twiml::message::ElementKind;
use crate::twiml::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum CallScopeError {
    #[error("No redirect")]
    NoRedirect,
    #[error("No el in scope: {0}")]
    NoElementInScope(ElementKind),
    #[error("Not a gather")]
    NotAGather,
    #[error("Missing attribute {attribute} on {element}")]
    MissingAttribute {
        element: ElementKind,
        attribute: &'static str,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn no_redirect_display() {
        let err = CallScopeError::NoRedirect;
        assert_eq!(err.to_string(), "No redirect");
    }

    #[test]
    fn no_element_in_scope_display() {
        let err = CallScopeError::NoElementInScope(ElementKind::Gather);
        assert_eq!(err.to_string(), "No el in scope: Gather");
    }

    #[test]
    fn not_a_gather_display() {
        let err = CallScopeError::NotAGather;
        assert_eq!(err.to_string(), "Not a gather");
    }

    #[test]
    fn missing_attribute_display() {
        let err = CallScopeError::MissingAttribute {
            element: ElementKind::Gather,
            attribute: "partialResultCallback",
        };
        assert_eq!(
            err.to_string(),
            "Missing attribute partialResultCallback on Gather"
        );
    }

    #[test]
    fn parse_error_is_passed_through() {
        let err: CallScopeError = ParseError::new("unexpected end of input").into();
        assert!(matches!(err, CallScopeError::Parse(_)));
        assert_eq!(err.to_string(), "XML parse error: unexpected end of input");
    }

    #[test]
    fn transport_error_display() {
        let err = CallScopeError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn io_error_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "body truncated");
        let err: CallScopeError = io_err.into();
        assert!(matches!(err, CallScopeError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: body truncated");
    }

    #[test]
    fn config_error_display() {
        let err = CallScopeError::ConfigError("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn no_element_in_scope_matches_pattern() {
        let err = CallScopeError::NoElementInScope(ElementKind::Dial);
        assert!(matches!(err, CallScopeError::NoElementInScope(ElementKind::Dial)));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CallScopeError>();
    }

    #[test]
    fn error_implements_std_error() {
        let err = CallScopeError::NotAGather;
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn error_debug_impl() {
        let err = CallScopeError::NoRedirect;
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("NoRedirect"));
    }
}
