use crate::status::SessionStatus;

/// `tutor_text` and `learner_text` events
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextEvent {
    /// One complete utterance
    text: String,
}

impl TextEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// `tutor_audio` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioEvent {
    /// A base64 encoded WAV file holding one synthesized utterance
    audio: String,
}

impl AudioEvent {
    pub fn new(audio: String) -> Self {
        Self { audio }
    }

    pub fn audio(&self) -> &str {
        &self.audio
    }
}

/// `status` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StatusEvent {
    state: SessionStatus,
}

impl StatusEvent {
    pub fn new(state: SessionStatus) -> Self {
        Self { state }
    }

    pub fn into_state(self) -> SessionStatus {
        self.state
    }
}

/// `module_complete` event
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModuleCompleteEvent {
    #[serde(default)]
    message: Option<String>,
}

impl ModuleCompleteEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// `error` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    /// Human readable, shown to the learner as is
    message: String,
}

impl ErrorEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
