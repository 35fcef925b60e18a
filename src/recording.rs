use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;

use crate::error::RecordingError;

/// A capture device.
///
/// While acquired it pushes raw audio chunks into the sender it was given.
#[async_trait]
pub trait Microphone: Send + 'static {
    /// Opens the device and starts capturing. May wait on a permission prompt.
    async fn acquire(&mut self, chunks: mpsc::UnboundedSender<Vec<u8>>)
        -> Result<(), RecordingError>;

    /// Stops the hardware capture. Must be safe to call when nothing is open.
    fn release(&mut self);

    /// Wraps the concatenated chunks of one recording for transmission.
    fn package(&self, raw: Vec<u8>) -> Vec<u8> {
        raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Acquiring,
    Capturing,
    Finalizing,
}

enum Phase {
    Idle,
    Acquiring,
    Capturing(mpsc::UnboundedReceiver<Vec<u8>>),
    Finalizing,
}

/// The outcome of a device acquisition, still holding the device.
///
/// Hand it back with [`RecordingController::complete`] or
/// [`RecordingController::discard`].
pub struct Acquired<M> {
    mic: M,
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    result: Result<(), RecordingError>,
}

/// Owns the microphone for the span of one recording.
pub struct RecordingController<M> {
    mic: Option<M>,
    phase: Phase,
}

impl<M: Microphone> RecordingController<M> {
    pub fn new(mic: M) -> Self {
        Self {
            mic: Some(mic),
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> RecordingState {
        match self.phase {
            Phase::Idle => RecordingState::Idle,
            Phase::Acquiring => RecordingState::Acquiring,
            Phase::Capturing(_) => RecordingState::Capturing,
            Phase::Finalizing => RecordingState::Finalizing,
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.phase, Phase::Capturing(_))
    }

    /// Opens the device and starts capturing.
    pub async fn begin(&mut self) -> Result<(), RecordingError> {
        let acquired = self.acquire()?.await;
        self.complete(acquired)
    }

    /// Moves the device into a future that opens it.
    ///
    /// The controller stays in [`RecordingState::Acquiring`] until the outcome
    /// is handed back, so a second start is refused meanwhile.
    pub fn acquire(&mut self) -> Result<BoxFuture<'static, Acquired<M>>, RecordingError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(RecordingError::AlreadyInProgress);
        }
        let Some(mut mic) = self.mic.take() else {
            return Err(RecordingError::AlreadyInProgress);
        };

        self.phase = Phase::Acquiring;
        let (tx, chunks) = mpsc::unbounded_channel();
        Ok(async move {
            let result = mic.acquire(tx).await;
            Acquired {
                mic,
                chunks,
                result,
            }
        }
        .boxed())
    }

    /// Takes the device back and starts capturing if it opened.
    pub fn complete(&mut self, acquired: Acquired<M>) -> Result<(), RecordingError> {
        let Acquired {
            mut mic,
            chunks,
            result,
        } = acquired;

        if let Err(e) = result {
            tracing::error!("failed to open microphone: {}", e);
            mic.release();
            self.mic = Some(mic);
            self.phase = Phase::Idle;
            return Err(e);
        }

        tracing::info!("recording started");
        self.mic = Some(mic);
        self.phase = Phase::Capturing(chunks);
        Ok(())
    }

    /// Takes the device back and closes it without recording.
    pub fn discard(&mut self, acquired: Acquired<M>) {
        let mut mic = acquired.mic;
        mic.release();
        self.mic = Some(mic);
        self.phase = Phase::Idle;
        tracing::info!("microphone opened too late, released");
    }

    /// Finishes the recording and returns its payload.
    ///
    /// `None` when nothing was being captured or nothing was heard. The device
    /// is released either way.
    pub fn end(&mut self) -> Option<Vec<u8>> {
        let mut rx = match std::mem::replace(&mut self.phase, Phase::Finalizing) {
            Phase::Capturing(rx) => rx,
            other => {
                self.phase = other;
                return None;
            }
        };

        let mut raw = Vec::new();
        let mut chunks = 0;
        while let Ok(chunk) = rx.try_recv() {
            raw.extend_from_slice(&chunk);
            chunks += 1;
        }
        self.phase = Phase::Idle;

        let mic = self.mic.as_mut()?;
        mic.release();
        if raw.is_empty() {
            tracing::info!("recording stopped, nothing captured");
            return None;
        }
        tracing::info!("recording stopped, {} chunks / {} bytes", chunks, raw.len());
        Some(mic.package(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        Mic {}

        #[async_trait]
        impl Microphone for Mic {
            async fn acquire(&mut self, chunks: mpsc::UnboundedSender<Vec<u8>>) -> Result<(), RecordingError>;
            fn release(&mut self);
            fn package(&self, raw: Vec<u8>) -> Vec<u8>;
        }
    }

    #[test]
    fn end_while_idle_has_no_side_effects() {
        let mut mic = MockMic::new();
        mic.expect_acquire().never();
        mic.expect_release().never();
        mic.expect_package().never();

        let mut controller = RecordingController::new(mic);
        assert_eq!(controller.end(), None);
        assert_eq!(controller.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn denied_access_leaves_nothing_behind() {
        let mut mic = MockMic::new();
        mic.expect_acquire()
            .times(1)
            .returning(|_| Err(RecordingError::DeviceUnavailable("permission denied".to_string())));
        mic.expect_release().times(1).return_const(());

        let mut controller = RecordingController::new(mic);
        let err = controller.begin().await.unwrap_err();
        assert_eq!(err, RecordingError::DeviceUnavailable("permission denied".to_string()));
        assert_eq!(controller.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn second_begin_is_refused() {
        let mut mic = MockMic::new();
        mic.expect_acquire().times(1).returning(|_| Ok(()));
        mic.expect_release().times(1).return_const(());

        let mut controller = RecordingController::new(mic);
        controller.begin().await.unwrap();
        assert_eq!(controller.begin().await, Err(RecordingError::AlreadyInProgress));
        assert!(controller.is_capturing());

        assert_eq!(controller.end(), None);
    }

    #[tokio::test]
    async fn chunks_are_concatenated_and_packaged() {
        let mut mic = MockMic::new();
        mic.expect_acquire().times(1).returning(|chunks| {
            chunks.send(vec![1, 2]).unwrap();
            chunks.send(vec![3]).unwrap();
            chunks.send(vec![4, 5, 6]).unwrap();
            Ok(())
        });
        mic.expect_release().times(1).return_const(());
        mic.expect_package()
            .with(eq(vec![1, 2, 3, 4, 5, 6]))
            .times(1)
            .returning(|raw| [b"WAV".to_vec(), raw].concat());

        let mut controller = RecordingController::new(mic);
        controller.begin().await.unwrap();
        assert_eq!(controller.end(), Some(b"WAV\x01\x02\x03\x04\x05\x06".to_vec()));
        assert_eq!(controller.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn silent_recording_still_releases_the_device() {
        let mut mic = MockMic::new();
        mic.expect_acquire().times(2).returning(|_| Ok(()));
        mic.expect_release().times(2).return_const(());
        mic.expect_package().never();

        let mut controller = RecordingController::new(mic);
        controller.begin().await.unwrap();
        assert_eq!(controller.end(), None);
        // Back to idle, so a new recording may start.
        controller.begin().await.unwrap();
        assert_eq!(controller.end(), None);
    }

    #[tokio::test]
    async fn start_is_refused_while_the_device_opens() {
        let mut mic = MockMic::new();
        mic.expect_acquire().times(1).returning(|chunks| {
            chunks.send(vec![7]).unwrap();
            Ok(())
        });
        mic.expect_release().times(1).return_const(());
        mic.expect_package().times(1).returning(|raw| raw);

        let mut controller = RecordingController::new(mic);
        let pending = controller.acquire().unwrap();
        assert_eq!(controller.state(), RecordingState::Acquiring);
        assert!(matches!(controller.acquire(), Err(RecordingError::AlreadyInProgress)));
        assert_eq!(controller.end(), None);

        let acquired = pending.await;
        controller.complete(acquired).unwrap();
        assert!(controller.is_capturing());
        assert_eq!(controller.end(), Some(vec![7]));
    }

    #[tokio::test]
    async fn late_device_is_released_unused() {
        let mut mic = MockMic::new();
        mic.expect_acquire().times(2).returning(|_| Ok(()));
        mic.expect_release().times(2).return_const(());
        mic.expect_package().never();

        let mut controller = RecordingController::new(mic);
        let acquired = controller.acquire().unwrap().await;
        controller.discard(acquired);
        assert_eq!(controller.state(), RecordingState::Idle);
        assert_eq!(controller.end(), None);

        // The device came back, so it can be opened again.
        controller.begin().await.unwrap();
        assert_eq!(controller.end(), None);
    }
}
