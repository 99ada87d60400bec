use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SessionState;

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: SessionState,

    /// When the current recording started, if one has
    pub started_at: Option<DateTime<Utc>>,

    /// Recorded time in seconds, pauses excluded
    pub elapsed_secs: f64,

    /// Number of encoded chunks sealed so far
    pub chunks_count: usize,

    /// Frames routed through the live graph
    pub frames_routed: u64,

    /// Monitor gain currently in effect
    pub gain: f32,

    /// Capture device feeding the live graph
    pub device: Option<String>,

    /// Size of the finished recording in bytes
    pub artifact_bytes: Option<usize>,

    /// When the finished recording was stopped
    pub stopped_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    /// Compact JSON on a single line, so it can share stdout with the
    /// JSON-lines event stream
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line_is_one_line() -> serde_json::Result<()> {
        let stats = SessionStats {
            session_id: "session-test".to_string(),
            state: SessionState::Recording,
            started_at: Some(Utc::now()),
            elapsed_secs: 1.5,
            chunks_count: 2,
            frames_routed: 40,
            gain: 1.0,
            device: Some("Mock Microphone".to_string()),
            artifact_bytes: None,
            stopped_at: None,
        };

        let line = stats.to_json_line()?;
        assert!(!line.contains('\n'));

        let parsed: SessionStats = serde_json::from_str(&line)?;
        assert_eq!(parsed.session_id, "session-test");
        assert_eq!(parsed.device.as_deref(), Some("Mock Microphone"));
        Ok(())
    }
}
