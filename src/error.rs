//! Error types shared by the capture, recognition and submission paths.
//!
//! Every variant carries a message that can be rendered as-is in the
//! results area or raised as a toast.

use thiserror::Error;

/// Microphone acquisition failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The user (or the OS) refused access to the input device.
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    /// No capture device or backend is available at all.
    #[error("Voice recognition is not supported on this system: {0}")]
    Unsupported(String),

    #[error("A capture session is already active")]
    AlreadyActive,
}

impl CaptureError {
    /// Unsupported hardware is terminal for the whole session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureError::Unsupported(_))
    }
}

/// Outcome classes for a recognition round trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("Invalid response format: {0}")]
    MalformedResponse(String),

    #[error("The recognised items are not in a valid format")]
    NoValidItems,

    #[error("{0}")]
    Unknown(String),
}

impl RecognitionError {
    /// Short title used for the toast raised alongside the error block.
    pub fn title(&self) -> &'static str {
        match self {
            RecognitionError::ServiceUnavailable(_) => "AI service unavailable",
            RecognitionError::UnsupportedFormat(_) => "Unsupported audio format",
            _ => "Voice recognition error",
        }
    }

    /// User-facing message for the results area.
    pub fn user_message(&self) -> &'static str {
        match self {
            RecognitionError::ServiceUnavailable(_) => {
                "The AI service is temporarily unavailable. Please try again in a few moments."
            }
            RecognitionError::UnsupportedFormat(_) => {
                "The audio format is not supported. Please use a compatible format."
            }
            RecognitionError::MalformedResponse(_) => {
                "The response format is invalid. Please try again."
            }
            RecognitionError::NoValidItems => {
                "The recognised items are not in a valid format. Please try again."
            }
            RecognitionError::Transport(_) | RecognitionError::Unknown(_) => {
                "An error occurred while analysing the audio. Please try again."
            }
        }
    }

    /// Extra diagnostic line shown under the message, when the message
    /// alone does not explain what went wrong.
    pub fn detail(&self) -> Option<&str> {
        match self {
            RecognitionError::Transport(detail) | RecognitionError::Unknown(detail) => {
                Some(detail.as_str())
            }
            _ => None,
        }
    }
}

/// Editing an item through an index the list no longer has.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Item index {index} is stale (list has {len} items)")]
    StaleIndex { index: usize, len: usize },

    #[error("{kind} {id} is not available for the selected parent")]
    OutOfScope { kind: &'static str, id: i64 },
}

/// Failures talking to the item/loan/location API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Reasons a confirmation did not reach the server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("No complete item to add. Please check the missing information.")]
    NothingToSubmit,

    #[error("Nothing to submit in the current state")]
    NotReady,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Per-item, non-fatal problems raised while validating a submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemWarning {
    #[error("The item \"{name}\" is incomplete. Please check its name and location.")]
    IncompleteItem { index: usize, name: String },
}
