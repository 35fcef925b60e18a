use std::fmt;

/// The service-reported phase of the conversation.
///
/// The service is not validated against the known set: any other string is kept
/// verbatim in [`SessionStatus::Other`] so it can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    Connecting,
    Connected,
    Listening,
    Thinking,
    Synthesizing,
    Transcribing,
    Paused,
    Disconnected,
    Other(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Listening => "listening",
            SessionStatus::Thinking => "thinking",
            SessionStatus::Synthesizing => "synthesizing",
            SessionStatus::Transcribing => "transcribing",
            SessionStatus::Paused => "paused",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Other(raw) => raw,
        }
    }

    /// Learner-facing label; unrecognized states fall back to the raw string.
    pub fn label(&self) -> &str {
        match self {
            SessionStatus::Connecting => "Connecting...",
            SessionStatus::Connected => "Connected",
            SessionStatus::Listening => "Your turn — tap the mic to speak",
            SessionStatus::Thinking => "Tutor is thinking...",
            SessionStatus::Synthesizing => "Generating voice...",
            SessionStatus::Transcribing => "Processing your speech...",
            SessionStatus::Paused => "Paused",
            SessionStatus::Disconnected => "Disconnected",
            SessionStatus::Other(raw) => raw,
        }
    }

    /// Whether the tutor side is working and a spinner should show.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionStatus::Connecting
                | SessionStatus::Thinking
                | SessionStatus::Synthesizing
                | SessionStatus::Transcribing
        )
    }
}

impl From<String> for SessionStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "connecting" => SessionStatus::Connecting,
            "connected" => SessionStatus::Connected,
            "listening" => SessionStatus::Listening,
            "thinking" => SessionStatus::Thinking,
            "synthesizing" => SessionStatus::Synthesizing,
            "transcribing" => SessionStatus::Transcribing,
            "paused" => SessionStatus::Paused,
            "disconnected" => SessionStatus::Disconnected,
            _ => SessionStatus::Other(raw),
        }
    }
}

impl From<&str> for SessionStatus {
    fn from(raw: &str) -> Self {
        SessionStatus::from(raw.to_string())
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
