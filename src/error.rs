//! Error taxonomy for the recorder.
//!
//! Every error ends up in front of the operator as a status line
//! (`"Error: {error}"`), so the display strings are written for humans.

/// Errors surfaced by the recording session and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    /// Access to the capture device was denied. The operator may retry.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// No input device matches the request. The operator may retry.
    #[error("Requested device not found: {0}")]
    DeviceUnavailable(String),

    /// The capture device went away mid-recording.
    #[error("capture device disconnected")]
    DeviceLost,

    /// The audio processing context (monitor output) could not be created.
    #[error("Could not start audio processing: {0}")]
    GraphInit(String),

    /// The monitor playback stream rejected a command.
    #[error("Monitor playback failed: {0}")]
    Monitor(String),

    /// The encoder failed to produce the recording.
    #[error("Encoding failed: {0}")]
    Encoder(String),

    /// The playback review could not decode or play the recording.
    #[error("Playback failed: {0}")]
    Playback(String),
}

impl RecorderError {
    /// Status line reported to the event sink for this error.
    pub fn status_text(&self) -> String {
        format!("Error: {}", self)
    }

    /// Whether calling `start()` again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecorderError::Permission(_) | RecorderError::DeviceUnavailable(_)
        )
    }
}

impl From<hound::Error> for RecorderError {
    fn from(err: hound::Error) -> Self {
        RecorderError::Encoder(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_prefix() {
        let err = RecorderError::Permission("microphone blocked".to_string());
        assert_eq!(err.status_text(), "Error: Permission denied: microphone blocked");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(RecorderError::Permission("x".into()).is_retryable());
        assert!(RecorderError::DeviceUnavailable("x".into()).is_retryable());
        assert!(!RecorderError::GraphInit("x".into()).is_retryable());
    }
}
