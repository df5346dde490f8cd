//! # Error Handling
//!
//! Errors raised by capture sessions, the scroll detector and offline replay.
//! Pixel-engine failures arrive as [`cap_stitch::StitchError`] and are wrapped
//! in [`CaptureError::Stitch`] so callers deal with one type.
//!
//! ## Error Classification
//!
//! - `Retryable`: a repeat of the same call may succeed (a dropped frame)
//! - [`classify::is_transient`]: safe to skip, e.g. a failed monitoring tick
//! - `ErrorSeverity::Fatal`: the session cannot continue; every error that
//!   ends a session carries it, plus the stage it failed in as `stage` metadata
//!
//! Every variant carries an [`ErrorContext`] with the operation that failed, a
//! free-form note, an optional recovery suggestion and a severity.
//!
//! ## Usage
//!
//! ```rust
//! use scroll_capture::error::{CaptureError, HasRecoverySuggestion, Retryable};
//!
//! let error = CaptureError::capture_failed("display went to sleep")
//!     .with_operation("initial_capture")
//!     .with_recovery_suggestion("Wake the display and start the capture again");
//!
//! assert_eq!(error.category(), "capture_failed");
//! assert!(error.is_retryable());
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::{error::Error as StdError, fmt, path::Path, time::SystemTime};

use cap_stitch::StitchError;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, e.g. a user cancel
    Info,
    /// Something went wrong but work continues
    Warning,
    /// The current operation failed
    Error,
    /// The session cannot be recovered
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Whether this error is retryable
    pub retryable: bool,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            retryable: false,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for scroll capture
#[derive(Debug)]
pub enum CaptureError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// The capture source could not produce a frame
    CaptureFailed {
        reason: String,
        context: ErrorContext,
    },
    /// Overlap search, planning or compositing rejected its input
    Stitch {
        source: StitchError,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors (image codecs, JSON)
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
    /// Validation errors on user-supplied values
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// State errors (invalid state transitions)
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// The session was cancelled before stitching began
    Cancelled {
        stage: String,
        context: ErrorContext,
    },
}

impl CaptureError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a capture failure; retryable by default
    pub fn capture_failed(reason: impl Into<String>) -> Self {
        let mut context = ErrorContext::new();
        context.retryable = true;
        Self::CaptureFailed {
            reason: reason.into(),
            context,
        }
    }

    /// Wrap a pixel-engine error
    pub fn stitch(source: StitchError) -> Self {
        Self::Stitch {
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error tied to a file or directory
    pub fn io_at(operation: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// The session was cancelled while in `stage`
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Info),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Set the operation that was being performed
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Set recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity level
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut()
            .metadata
            .insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::CaptureFailed { context, .. }
            | Self::Stitch { context, .. }
            | Self::Io { context, .. }
            | Self::External { context, .. }
            | Self::Validation { context, .. }
            | Self::State { context, .. }
            | Self::Cancelled { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::CaptureFailed { context, .. }
            | Self::Stitch { context, .. }
            | Self::Io { context, .. }
            | Self::External { context, .. }
            | Self::Validation { context, .. }
            | Self::State { context, .. }
            | Self::Cancelled { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::CaptureFailed { .. } => "capture_failed",
            Self::Stitch { .. } => "stitch",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
            Self::Validation { .. } => "validation",
            Self::State { .. } => "state",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// The wrapped pixel-engine error, if any.
    pub fn as_stitch(&self) -> Option<&StitchError> {
        match self {
            Self::Stitch { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            CaptureError::CaptureFailed { reason, .. } => {
                write!(f, "Frame capture failed: {}", reason)
            }
            CaptureError::Stitch { source, .. } => write!(f, "Stitching failed: {}", source),
            CaptureError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            CaptureError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
            CaptureError::Validation {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Validation failed for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
            CaptureError::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Invalid state transition from '{}' when attempting '{}': {}",
                    current_state, attempted_operation, reason
                )
            }
            CaptureError::Cancelled { stage, .. } => {
                write!(f, "Capture session cancelled during {}", stage)
            }
        }
    }
}

impl StdError for CaptureError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Stitch { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;
}

impl Retryable for CaptureError {
    fn is_retryable(&self) -> bool {
        self.context().retryable || matches!(self, Self::Io { .. })
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for CaptureError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for CaptureError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Check if an error is transient (may resolve itself on the next tick)
    pub fn is_transient(error: &CaptureError) -> bool {
        matches!(error, CaptureError::CaptureFailed { .. }) && error.is_retryable()
    }
}

impl From<StitchError> for CaptureError {
    fn from(error: StitchError) -> Self {
        Self::stitch(error)
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}
