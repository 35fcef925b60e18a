pub mod client;
pub mod server;

use client::*;
use server::*;

use crate::progress::{CurriculumInfo, Progress, SectionComplete};

/// Messages the learner's client sends over the session channel.
///
/// Serialized as `{"type": ..., "data": {...}}`; unit variants carry no `data`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "start")]
    Start(StartEvent),
    #[serde(rename = "skip")]
    Skip,
    #[serde(rename = "setPace")]
    SetPace(SetPaceEvent),
    #[serde(rename = "pause")]
    Pause,
}

impl ClientEvent {
    /// The wire `type` string, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Start(_) => "start",
            ClientEvent::Skip => "skip",
            ClientEvent::SetPace(_) => "setPace",
            ClientEvent::Pause => "pause",
        }
    }
}

/// Messages the tutoring service pushes to the client.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "tutor_text")]
    TutorText(TextEvent),
    #[serde(rename = "tutor_audio")]
    TutorAudio(AudioEvent),
    #[serde(rename = "learner_text")]
    LearnerText(TextEvent),
    #[serde(rename = "status")]
    Status(StatusEvent),
    #[serde(rename = "progress")]
    Progress(Progress),
    #[serde(rename = "section_complete")]
    SectionComplete(SectionComplete),
    #[serde(rename = "module_complete")]
    ModuleComplete(ModuleCompleteEvent),
    #[serde(rename = "curriculum_info")]
    CurriculumInfo(CurriculumInfo),
    #[serde(rename = "error")]
    Error(ErrorEvent),
}

impl ServerEvent {
    /// Every `type` string this client understands.
    pub const KINDS: [&'static str; 9] = [
        "tutor_text",
        "tutor_audio",
        "learner_text",
        "status",
        "progress",
        "section_complete",
        "module_complete",
        "curriculum_info",
        "error",
    ];

    pub fn is_known_kind(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }
}

/// The bare `{type, data}` wrapper shared by every inbound message.
///
/// Used to classify frames that did not parse as a [`ServerEvent`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl Envelope {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}
