use crate::types::{CurriculumInfo, Pace, Progress, SectionComplete, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Tutor,
    Learner,
}

/// One finished utterance. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    speaker: Speaker,
    text: String,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: String) -> Self {
        Self { speaker, text }
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The two pieces of state that clear themselves after a visibility window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientSlot {
    SectionComplete,
    Error,
}

/// Everything the UI layer may observe about the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    status: SessionStatus,
    transcript: Vec<TranscriptEntry>,
    progress: Option<Progress>,
    curriculum: Option<CurriculumInfo>,
    section_complete: Option<SectionComplete>,
    error: Option<String>,
    module_complete: bool,
    module_message: Option<String>,
    tutor_speaking: bool,
    recording: bool,
    pace: Pace,
}

impl SessionState {
    pub fn new(pace: Pace) -> Self {
        Self {
            status: SessionStatus::Connecting,
            transcript: Vec::new(),
            progress: None,
            curriculum: None,
            section_complete: None,
            error: None,
            module_complete: false,
            module_message: None,
            tutor_speaking: false,
            recording: false,
            pace,
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    /// The section outline sent by the service after `start`.
    pub fn curriculum(&self) -> Option<&CurriculumInfo> {
        self.curriculum.as_ref()
    }

    pub fn section_complete(&self) -> Option<&SectionComplete> {
        self.section_complete.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Once true, stays true for the lifetime of the engine.
    pub fn module_complete(&self) -> bool {
        self.module_complete
    }

    pub fn module_message(&self) -> Option<&str> {
        self.module_message.as_deref()
    }

    /// Whether a tutor fragment is audible right now.
    pub fn tutor_speaking(&self) -> bool {
        self.tutor_speaking
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    pub(crate) fn push_transcript(&mut self, speaker: Speaker, text: String) {
        self.transcript.push(TranscriptEntry::new(speaker, text));
    }

    pub(crate) fn set_progress(&mut self, progress: Progress) {
        self.progress = Some(progress);
    }

    pub(crate) fn set_curriculum(&mut self, curriculum: CurriculumInfo) {
        self.curriculum = Some(curriculum);
    }

    pub(crate) fn set_section_complete(&mut self, section: SectionComplete) {
        self.section_complete = Some(section);
    }

    pub(crate) fn set_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    pub(crate) fn complete_module(&mut self, message: Option<&str>) {
        self.module_complete = true;
        if let Some(message) = message {
            self.module_message = Some(message.to_string());
        }
    }

    /// Returns whether the slot held a value.
    pub(crate) fn clear(&mut self, slot: TransientSlot) -> bool {
        match slot {
            TransientSlot::SectionComplete => self.section_complete.take().is_some(),
            TransientSlot::Error => self.error.take().is_some(),
        }
    }

    pub(crate) fn set_tutor_speaking(&mut self, speaking: bool) -> bool {
        let changed = self.tutor_speaking != speaking;
        self.tutor_speaking = speaking;
        changed
    }

    pub(crate) fn set_recording(&mut self, recording: bool) -> bool {
        let changed = self.recording != recording;
        self.recording = recording;
        changed
    }

    pub(crate) fn set_pace(&mut self, pace: Pace) -> bool {
        let changed = self.pace != pace;
        self.pace = pace;
        changed
    }
}
