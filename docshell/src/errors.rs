use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for shell operations.
///
/// Each kind names the component that raised it: the extended JSON parser,
/// the parameter verifier, the cursor state machine, the handle
/// preconditions, or the driver underneath.
///
/// # Examples
///
/// ```rust,ignore
/// use docshell::errors::{ShellError, ErrorKind, ShellResult};
///
/// fn example() -> ShellResult<()> {
///     Err(ShellError::new("cursor is closed", ErrorKind::ClosedCursorError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Parser errors
    /// Malformed extended JSON; `offset` is the byte offset of the anomaly
    SyntaxError { offset: usize },
    /// The top-level JSON value is neither an object nor an array
    UnsupportedTopLevelType,

    // Verifier errors
    /// A parameter has a shape the operation does not accept
    TypeMismatch { actual: String, allowed: String },
    /// No parameter was given and no allowed shape has an empty default
    NoSuitableDefault,

    // Cursor errors
    /// A pre-open configuration call was made after the cursor was read from
    InvalidStateError,
    /// sort/skip/limit called on an aggregation cursor
    NotSupportedForAggregation,
    /// The cursor is closed
    ClosedCursorError,
    /// `next()` was called when no document was available
    NoNextDocument,

    // Handle preconditions
    /// No client is connected
    NotConnected,
    /// A client is connected but no database has been selected
    NotConnectedDatabase,

    /// Invalid shell configuration, reported by the builder
    ConfigurationError,

    /// Error passed through from the driver
    ExecutorError,
    /// Error encoding or decoding data
    EncodingError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::SyntaxError { offset } => write!(f, "Syntax error at offset {}", offset),
            ErrorKind::UnsupportedTopLevelType => write!(f, "Unsupported top-level type"),
            ErrorKind::TypeMismatch { actual, allowed } => {
                write!(f, "Type mismatch: found {}, allowed {}", actual, allowed)
            }
            ErrorKind::NoSuitableDefault => write!(f, "No suitable default"),
            ErrorKind::InvalidStateError => write!(f, "Invalid cursor state"),
            ErrorKind::NotSupportedForAggregation => write!(f, "Not supported for aggregation"),
            ErrorKind::ClosedCursorError => write!(f, "Closed cursor"),
            ErrorKind::NoNextDocument => write!(f, "No next document"),
            ErrorKind::NotConnected => write!(f, "Not connected"),
            ErrorKind::NotConnectedDatabase => write!(f, "Not connected to a database"),
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::ExecutorError => write!(f, "Executor error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom shell error type.
///
/// `ShellError` carries a message, an [ErrorKind] and an optional cause.
/// It captures a backtrace at construction for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use docshell::errors::{ShellError, ErrorKind};
///
/// let cause = ShellError::new("connection refused", ErrorKind::ExecutorError);
/// let err = ShellError::new_with_cause("find failed", ErrorKind::ExecutorError, cause);
/// ```
#[derive(Clone)]
pub struct ShellError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<ShellError>>,
    backtrace: Atomic<Backtrace>,
}

impl ShellError {
    /// Creates a new `ShellError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        ShellError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates a new `ShellError` chained onto a cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: ShellError) -> Self {
        ShellError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&ShellError> {
        self.cause.as_deref()
    }

    /// Shorthand for a syntax error at a byte offset.
    pub(crate) fn syntax(message: &str, offset: usize) -> Self {
        ShellError::new(message, ErrorKind::SyntaxError { offset })
    }
}

impl Display for ShellError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for ShellError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})\nCaused by: {:?}", self.message, self.error_kind, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "{} ({})\n{:?}", self.message, self.error_kind, *backtrace)
            }
        }
    }
}

impl Error for ShellError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for shell operations.
pub type ShellResult<T> = Result<T, ShellError>;

impl From<serde_json::Error> for ShellError {
    fn from(err: serde_json::Error) -> Self {
        ShellError::new(&format!("JSON error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<base64::DecodeError> for ShellError {
    fn from(err: base64::DecodeError) -> Self {
        ShellError::new(&format!("Base64 decoding error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<chrono::ParseError> for ShellError {
    fn from(err: chrono::ParseError) -> Self {
        ShellError::new(&format!("Date parsing error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<std::num::ParseIntError> for ShellError {
    fn from(err: std::num::ParseIntError) -> Self {
        ShellError::new(&format!("Integer parsing error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<std::num::ParseFloatError> for ShellError {
    fn from(err: std::num::ParseFloatError) -> Self {
        ShellError::new(&format!("Float parsing error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        ShellError::new(&format!("IO error: {}", err), ErrorKind::ExecutorError)
    }
}

impl From<regex::Error> for ShellError {
    fn from(err: regex::Error) -> Self {
        ShellError::new(&format!("Invalid regular expression: {}", err), ErrorKind::ExecutorError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_error_new_creates_error() {
        let error = ShellError::new("An error occurred", ErrorKind::ExecutorError);
        assert_eq!(error.message, "An error occurred");
        assert_eq!(error.error_kind, ErrorKind::ExecutorError);
        assert!(error.cause.is_none());
    }

    #[test]
    fn shell_error_new_with_cause_creates_error() {
        let error = ShellError::new_with_cause(
            "find failed",
            ErrorKind::ExecutorError,
            ShellError::new("socket closed", ErrorKind::ExecutorError),
        );
        assert!(error.cause().is_some());
        assert_eq!(error.cause().unwrap().message(), "socket closed");
        assert!(error.source().is_some());
    }

    #[test]
    fn shell_error_display_is_message() {
        let error = ShellError::new("cursor is closed", ErrorKind::ClosedCursorError);
        assert_eq!(format!("{}", error), "cursor is closed");
    }

    #[test]
    fn shell_error_debug_contains_kind_and_cause() {
        let error = ShellError::new_with_cause(
            "outer",
            ErrorKind::ExecutorError,
            ShellError::new("inner", ErrorKind::InternalError),
        );
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("outer"));
        assert!(formatted.contains("Caused by:"));
        assert!(formatted.contains("inner"));
    }

    #[test]
    fn syntax_error_carries_offset() {
        let error = ShellError::syntax("unexpected token", 7);
        assert_eq!(error.kind(), &ErrorKind::SyntaxError { offset: 7 });
        assert_eq!(error.kind().to_string(), "Syntax error at offset 7");
    }

    #[test]
    fn type_mismatch_display_names_shapes() {
        let kind = ErrorKind::TypeMismatch {
            actual: "array".to_string(),
            allowed: "ordered document".to_string(),
        };
        assert_eq!(kind.to_string(), "Type mismatch: found array, allowed ordered document");
    }

    #[test]
    fn serde_json_error_converts_to_encoding_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let shell_err: ShellError = err.into();
        assert_eq!(shell_err.kind(), &ErrorKind::EncodingError);
    }

    #[test]
    fn clone_keeps_kind_and_message() {
        let error = ShellError::new("no next document", ErrorKind::NoNextDocument);
        let cloned = error.clone();
        assert_eq!(cloned.kind(), error.kind());
        assert_eq!(cloned.message(), error.message());
    }
}
