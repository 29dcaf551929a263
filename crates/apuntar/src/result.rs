//! Result and error types for Apuntar.

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the locator and action-readiness engine.
///
/// None of these carry a captured backtrace: diagnostic messages shown to
/// the caller consist of the message text alone.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Selector named an engine that is not registered
    #[error("Unknown engine \"{name}\" while parsing selector {selector}")]
    UnknownEngine {
        /// The unregistered engine name
        name: String,
        /// The full selector string
        selector: String,
    },

    /// Selector could not be tokenized (unbalanced quotes, empty part, ...)
    #[error("Malformed selector: {selector}")]
    MalformedSelector {
        /// The offending selector string
        selector: String,
    },

    /// Engine body failed to parse (bad nth index, bad regex, ...)
    #[error("Malformed selector body for engine \"{engine}\": {body}")]
    MalformedBody {
        /// Engine the body was destined for
        engine: String,
        /// The offending body
        body: String,
    },

    /// A capture mark precedes an `nth` part
    #[error("Can't query n-th element in a request with the capture")]
    CaptureWithNth,

    /// More than one element matched a strict query
    #[error("{message}")]
    StrictModeViolation {
        /// Pre-rendered diagnostic including element previews
        message: String,
    },

    /// Operation requires an element but got a non-element node
    #[error("Node is not an element")]
    NotAnElement,

    /// Checked-state query on something that is not a checkbox or radio
    #[error("Not a checkbox or radio button")]
    NotACheckbox,

    /// Option selection on something that is not a select
    #[error("Element is not a <select>")]
    NotASelect,

    /// File installation on something that is not a file input
    #[error("Not an input element")]
    NotAnInput,

    /// Fill attempted on an input type that cannot be filled
    #[error("Input of type \"{input_type}\" cannot be filled")]
    CannotFillType {
        /// The input's `type` attribute
        input_type: String,
    },

    /// Non-numeric text filled into a number input
    #[error("Cannot type text into input[type=number]")]
    NumberExpected,

    /// A date-like input rejected the assigned value
    #[error("Malformed value")]
    MalformedValue,

    /// Assertion expression not in the supported table
    #[error("Unknown expect matcher: {expression}")]
    UnknownExpectMatcher {
        /// The unsupported expression
        expression: String,
    },

    /// A file payload buffer was not valid base64
    #[error("Malformed file payload for \"{name}\"")]
    MalformedFilePayload {
        /// File name from the payload
        name: String,
    },

    /// Attempt to register a selector engine under a taken name
    #[error("\"{name}\" selector engine has been already registered")]
    EngineAlreadyRegistered {
        /// The contested engine name
        name: String,
    },

    /// A poll's predicate failed; the original message is preserved
    #[error("{message}")]
    PollFailed {
        /// Message of the failing tick
        message: String,
    },

    /// JSON error from option-bag decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
