mod client;
mod config;
mod engine;
mod error;
mod playback;
mod recording;
mod router;
mod state;

#[cfg(feature = "native")]
mod native;

pub use tutor_realtime_types as types;
pub use tutor_realtime_utils as utils;

pub use client::{build_url, ConnectionEvent, InboundRx, SessionConnection};
pub use config::{Config, ConfigBuilder};
pub use engine::{EngineBuilder, PaceStore, SessionEngine};
pub use error::{ConfigError, ConnectionError, EngineError, PlaybackError, RecordingError};
pub use playback::{AudioFragment, AudioSink, PlaybackSequencer};
pub use recording::{Acquired, Microphone, RecordingController, RecordingState};
pub use router::{route, Directive};
pub use state::{SessionState, Speaker, TranscriptEntry, TransientSlot};

#[cfg(feature = "native")]
pub use native::{NativeMicrophone, NativeSpeaker};
