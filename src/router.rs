//! Applies inbound protocol events to [`SessionState`].
//!
//! Routing never touches the connection or a device. Anything beyond the state
//! mutation itself (playing a fragment, arming an expiry timer) is returned to
//! the caller as a [`Directive`].

use crate::playback::AudioFragment;
use crate::state::{SessionState, Speaker, TransientSlot};
use crate::types::ServerEvent;
use crate::utils::audio::decode_base64;

/// What the engine has to do after an event was routed.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// State changed, nothing else to do.
    Updated,
    /// State changed and the slot's visibility window starts now.
    Arm(TransientSlot),
    /// Hand the fragment to the playback sequencer. State is untouched.
    Play(AudioFragment),
    Nothing,
}

impl Directive {
    pub fn changed_state(&self) -> bool {
        matches!(self, Directive::Updated | Directive::Arm(_))
    }
}

pub fn route(state: &mut SessionState, event: ServerEvent) -> Directive {
    match event {
        ServerEvent::TutorText(event) => {
            state.push_transcript(Speaker::Tutor, event.into_text());
            Directive::Updated
        }
        ServerEvent::LearnerText(event) => {
            state.push_transcript(Speaker::Learner, event.into_text());
            Directive::Updated
        }
        ServerEvent::TutorAudio(event) => match decode_base64(event.audio()) {
            Ok(bytes) => Directive::Play(AudioFragment::new(bytes)),
            Err(e) => {
                tracing::warn!("skipping tutor audio: {:#}", e);
                Directive::Nothing
            }
        },
        ServerEvent::Status(event) => {
            let status = event.into_state();
            tracing::debug!("status => {}", status);
            if state.set_status(status) {
                Directive::Updated
            } else {
                Directive::Nothing
            }
        }
        ServerEvent::Progress(progress) => {
            if !progress.is_consistent() {
                tracing::warn!("inconsistent progress: {:?}", progress);
            }
            state.set_progress(progress);
            Directive::Updated
        }
        ServerEvent::CurriculumInfo(curriculum) => {
            tracing::debug!("curriculum with {} sections", curriculum.sections().len());
            state.set_curriculum(curriculum);
            Directive::Updated
        }
        ServerEvent::SectionComplete(section) => {
            tracing::info!(
                "section {} complete: {}",
                section.section_index(),
                section.section_title()
            );
            state.set_section_complete(section);
            Directive::Arm(TransientSlot::SectionComplete)
        }
        ServerEvent::ModuleComplete(event) => {
            tracing::info!("module complete");
            state.complete_module(event.message());
            Directive::Updated
        }
        ServerEvent::Error(event) => {
            tracing::warn!("tutoring service reported: {}", event.message());
            state.set_error(event.message());
            Directive::Arm(TransientSlot::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::server::{
        AudioEvent, ErrorEvent, ModuleCompleteEvent, StatusEvent, TextEvent,
    };
    use crate::types::{Pace, Progress, SectionComplete, SessionStatus};
    use crate::utils::audio::encode_base64;

    fn state() -> SessionState {
        SessionState::new(Pace::Normal)
    }

    fn parse(text: &str) -> ServerEvent {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn transcript_follows_arrival_order() {
        let mut state = state();
        let events = [
            ServerEvent::TutorText(TextEvent::new("Hello")),
            ServerEvent::LearnerText(TextEvent::new("Hi")),
            ServerEvent::LearnerText(TextEvent::new("Hi")),
            ServerEvent::TutorText(TextEvent::new("Let's begin")),
        ];
        for event in events {
            assert_eq!(route(&mut state, event), Directive::Updated);
        }

        let transcript: Vec<(Speaker, &str)> = state
            .transcript()
            .iter()
            .map(|entry| (entry.speaker(), entry.text()))
            .collect();
        assert_eq!(
            transcript,
            vec![
                (Speaker::Tutor, "Hello"),
                (Speaker::Learner, "Hi"),
                (Speaker::Learner, "Hi"),
                (Speaker::Tutor, "Let's begin"),
            ]
        );
    }

    #[test]
    fn status_then_progress() {
        let mut state = state();
        route(
            &mut state,
            parse(r#"{"type":"status","data":{"state":"listening"}}"#),
        );
        route(
            &mut state,
            parse(r#"{"type":"progress","data":{"section_index":0,"total_sections":5,"section_title":"Intro","step_index":0,"step_count":3}}"#),
        );

        assert_eq!(state.status(), &SessionStatus::Listening);
        assert_eq!(state.progress(), Some(&Progress::new(0, 5, "Intro", 0, Some(3))));
    }

    #[test]
    fn progress_is_replaced_not_merged() {
        let mut state = state();
        route(&mut state, ServerEvent::Progress(Progress::new(0, 5, "Intro", 2, Some(3))));
        route(&mut state, ServerEvent::Progress(Progress::new(1, 5, "", 0, None)));
        assert_eq!(state.progress(), Some(&Progress::new(1, 5, "", 0, None)));
    }

    #[test]
    fn unrecognized_status_is_kept_verbatim() {
        let mut state = state();
        let directive = route(
            &mut state,
            parse(r#"{"type":"status","data":{"state":"warming_up"}}"#),
        );
        assert_eq!(directive, Directive::Updated);
        assert_eq!(state.status(), &SessionStatus::Other("warming_up".to_string()));
        assert_eq!(state.status().label(), "warming_up");
    }

    #[test]
    fn repeated_status_changes_nothing() {
        let mut state = state();
        let event = ServerEvent::Status(StatusEvent::new(SessionStatus::Thinking));
        assert_eq!(route(&mut state, event.clone()), Directive::Updated);
        assert_eq!(route(&mut state, event), Directive::Nothing);
    }

    #[test]
    fn tutor_audio_is_decoded_for_playback() {
        let mut state = state();
        let before = state.clone();
        let event = ServerEvent::TutorAudio(AudioEvent::new(encode_base64(b"RIFF....")));
        assert_eq!(
            route(&mut state, event),
            Directive::Play(AudioFragment::new(b"RIFF....".to_vec()))
        );
        assert_eq!(state, before);
    }

    #[test]
    fn undecodable_audio_is_skipped() {
        let mut state = state();
        let event = ServerEvent::TutorAudio(AudioEvent::new("not*base64".to_string()));
        assert_eq!(route(&mut state, event), Directive::Nothing);
    }

    #[test]
    fn transient_slots_are_armed() {
        let mut state = state();
        let directive = route(
            &mut state,
            ServerEvent::SectionComplete(SectionComplete::new(0, "Intro")),
        );
        assert_eq!(directive, Directive::Arm(TransientSlot::SectionComplete));
        assert_eq!(state.section_complete().map(|s| s.section_title()), Some("Intro"));

        let directive = route(&mut state, ServerEvent::Error(ErrorEvent::new("Tutor unavailable")));
        assert_eq!(directive, Directive::Arm(TransientSlot::Error));
        assert_eq!(state.error(), Some("Tutor unavailable"));
    }

    #[test]
    fn module_complete_is_monotonic() {
        let mut state = state();
        route(
            &mut state,
            ServerEvent::ModuleComplete(ModuleCompleteEvent::new("Great work!")),
        );
        route(&mut state, ServerEvent::Status(StatusEvent::new(SessionStatus::Listening)));
        route(&mut state, ServerEvent::ModuleComplete(ModuleCompleteEvent::default()));

        assert!(state.module_complete());
        assert_eq!(state.module_message(), Some("Great work!"));
    }

    #[test]
    fn curriculum_is_stored() {
        let mut state = state();
        let event = parse(
            r#"{"type":"curriculum_info","data":{"sections":[{"index":0,"title":"Greetings","title_hi":"नमस्ते","step_count":3}]}}"#,
        );
        assert_eq!(route(&mut state, event), Directive::Updated);
        let curriculum = state.curriculum().unwrap();
        assert_eq!(curriculum.sections().len(), 1);
        assert_eq!(curriculum.sections()[0].title_hi(), Some("नमस्ते"));
    }
}
