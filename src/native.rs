//! Microphone and speaker backed by the host's audio devices.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use crate::error::{PlaybackError, RecordingError};
use crate::playback::{AudioFragment, AudioSink};
use crate::recording::Microphone;
use crate::utils::audio::{self, ToBinary};
use crate::utils::capture::CaptureThread;
use crate::utils::output::{self, OutputThread};

const OUTPUT_LATENCY_MS: usize = 2000;
const OUTPUT_BACKOFF: Duration = Duration::from_millis(20);

/// Captures mono PCM16 from an input device and packages each recording as WAV.
#[derive(Default)]
pub struct NativeMicrophone {
    device_name: Option<String>,
    capture: Option<CaptureThread>,
    sample_rate: u32,
}

impl NativeMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the named input device instead of the host default.
    pub fn with_device(mut self, device_name: &str) -> Self {
        self.device_name = Some(device_name.to_string());
        self
    }
}

#[async_trait]
impl Microphone for NativeMicrophone {
    async fn acquire(
        &mut self,
        chunks: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<(), RecordingError> {
        let device_name = self.device_name.clone();
        let capture = tokio::task::spawn_blocking(move || {
            CaptureThread::start(device_name, move |samples: &[f32]| {
                let _ = chunks.send(samples.to_binary());
            })
        })
        .await
        .map_err(|e| RecordingError::DeviceUnavailable(e.to_string()))?
        .map_err(|e| RecordingError::DeviceUnavailable(format!("{:#}", e)))?;

        self.sample_rate = capture.format().sample_rate;
        self.capture = Some(capture);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }

    fn package(&self, raw: Vec<u8>) -> Vec<u8> {
        let pcm = audio::pcm16_from_bytes(&raw);
        match audio::encode_wav(&pcm, self.sample_rate, 1) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!("sending raw pcm, wav packaging failed: {:#}", e);
                raw
            }
        }
    }
}

/// Plays WAV fragments on an output device.
pub struct NativeSpeaker {
    output: OutputThread,
    drained: Arc<Notify>,
}

impl NativeSpeaker {
    /// Opens the named output device, or the host default.
    pub fn new(device_name: Option<&str>) -> Result<Self, PlaybackError> {
        let drained = Arc::new(Notify::new());
        let notify = drained.clone();
        let output = OutputThread::start(
            device_name.map(str::to_string),
            OUTPUT_LATENCY_MS,
            move || notify.notify_one(),
        )
        .map_err(|e| PlaybackError::Device(format!("{:#}", e)))?;
        Ok(Self { output, drained })
    }
}

/// Silences the device unless the fragment ran to completion.
struct InFlight<'a> {
    output: &'a mut OutputThread,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.output.flush();
        }
    }
}

#[async_trait]
impl AudioSink for NativeSpeaker {
    async fn play(&mut self, fragment: &AudioFragment) -> Result<(), PlaybackError> {
        let decoded = audio::decode_wav(fragment.bytes())
            .map_err(|e| PlaybackError::Decode(format!("{:#}", e)))?;
        let samples = output::resample(&decoded.samples, decoded.sample_rate, self.output.sample_rate())
            .map_err(|e| PlaybackError::Device(format!("{:#}", e)))?;
        if samples.is_empty() {
            return Ok(());
        }
        tracing::debug!("playing {:.2}s of tutor audio", decoded.duration_secs());

        let mut flight = InFlight {
            output: &mut self.output,
            finished: false,
        };
        let mut offset = 0;
        while offset < samples.len() {
            offset += flight.output.push(&samples[offset..]);
            if offset < samples.len() {
                tokio::time::sleep(OUTPUT_BACKOFF).await;
            }
        }
        while !flight.output.is_drained() {
            self.drained.notified().await;
        }
        flight.finished = true;
        Ok(())
    }
}
