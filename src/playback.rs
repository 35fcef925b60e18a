use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::PlaybackError;

/// One decoded unit of synthesized speech, typically a WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFragment(Vec<u8>);

impl AudioFragment {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The audio output channel.
///
/// `play` resolves once the fragment has been heard in full. Dropping the
/// future must silence the fragment.
#[async_trait]
pub trait AudioSink: Send + 'static {
    async fn play(&mut self, fragment: &AudioFragment) -> Result<(), PlaybackError>;
}

/// Plays fragments one at a time, in the order they were enqueued.
///
/// The sink is owned by a worker task; nothing else can start playback.
pub struct PlaybackSequencer {
    tx: Option<mpsc::UnboundedSender<AudioFragment>>,
    playing: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackSequencer {
    pub fn new<S: AudioSink>(sink: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (playing_tx, playing) = watch::channel(false);
        let handle = tokio::spawn(run(sink, rx, playing_tx));
        Self {
            tx: Some(tx),
            playing,
            handle: Some(handle),
        }
    }

    /// Appends to the tail of the queue. Returns false once shut down.
    pub fn enqueue(&self, fragment: AudioFragment) -> bool {
        match self.tx {
            Some(ref tx) => {
                tracing::debug!("queueing {} bytes of tutor audio", fragment.len());
                tx.send(fragment).is_ok()
            }
            None => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        *self.playing.borrow()
    }

    /// Follows the "is anything playing" flag.
    pub fn watch_playing(&self) -> watch::Receiver<bool> {
        self.playing.clone()
    }

    /// Silences the current fragment and discards everything still queued.
    ///
    /// Once this returns the sink will not be touched again.
    pub async fn shutdown(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!("playback worker failed: {}", e),
            }
            tracing::debug!("playback stopped");
        }
    }
}

impl Drop for PlaybackSequencer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run<S: AudioSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<AudioFragment>,
    playing: watch::Sender<bool>,
) {
    while let Some(first) = rx.recv().await {
        playing.send_replace(true);
        let mut next = Some(first);
        // Drain without lowering the flag between back-to-back fragments.
        while let Some(fragment) = next.take() {
            if let Err(e) = sink.play(&fragment).await {
                tracing::warn!("skipping fragment: {}", e);
            }
            next = rx.try_recv().ok();
        }
        playing.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    struct Played {
        name: String,
        started: Instant,
        finished: Instant,
    }

    /// Each fragment takes 100ms per byte; fragments named "bad" fail.
    #[derive(Clone, Default)]
    struct FakeSink {
        played: Arc<Mutex<Vec<Played>>>,
        started: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AudioSink for FakeSink {
        async fn play(&mut self, fragment: &AudioFragment) -> Result<(), PlaybackError> {
            let name = String::from_utf8_lossy(fragment.bytes()).to_string();
            self.started.lock().unwrap().push(name.clone());
            if name == "bad" {
                return Err(PlaybackError::Decode("not a wav".to_string()));
            }
            let started = Instant::now();
            tokio::time::sleep(Duration::from_millis(100 * fragment.len() as u64)).await;
            self.played.lock().unwrap().push(Played {
                name,
                started,
                finished: Instant::now(),
            });
            Ok(())
        }
    }

    fn fragment(name: &str) -> AudioFragment {
        AudioFragment::new(name.as_bytes().to_vec())
    }

    #[tokio::test(start_paused = true)]
    async fn plays_in_order_without_overlap() {
        let sink = FakeSink::default();
        let sequencer = PlaybackSequencer::new(sink.clone());
        for name in ["A", "BB", "C", "DDD"] {
            assert!(sequencer.enqueue(fragment(name)));
        }

        tokio::time::sleep(Duration::from_secs(5)).await;

        let played = sink.played.lock().unwrap().clone();
        let names: Vec<&str> = played.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "BB", "C", "DDD"]);
        for pair in played.windows(2) {
            assert!(pair[0].finished <= pair[1].started);
        }
        assert!(!sequencer.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_skips_to_the_next_fragment() {
        let sink = FakeSink::default();
        let sequencer = PlaybackSequencer::new(sink.clone());
        sequencer.enqueue(fragment("A"));
        sequencer.enqueue(fragment("bad"));
        sequencer.enqueue(fragment("C"));

        tokio::time::sleep(Duration::from_secs(1)).await;

        let names: Vec<String> = sink.played.lock().unwrap().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn playing_flag_spans_the_whole_burst() {
        let sink = FakeSink::default();
        let sequencer = PlaybackSequencer::new(sink);
        let mut playing = sequencer.watch_playing();
        let start = Instant::now();
        sequencer.enqueue(fragment("AA"));
        sequencer.enqueue(fragment("BB"));

        playing.changed().await.unwrap();
        assert!(*playing.borrow_and_update());

        playing.changed().await.unwrap();
        assert!(!*playing.borrow_and_update());
        // Both fragments were heard before the flag dropped.
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_the_queue() {
        let sink = FakeSink::default();
        let mut sequencer = PlaybackSequencer::new(sink.clone());
        sequencer.enqueue(fragment("AAAAA"));
        sequencer.enqueue(fragment("B"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        sequencer.shutdown().await;
        assert!(!sequencer.enqueue(fragment("C")));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.started.lock().unwrap().clone(), vec!["AAAAA".to_string()]);
        assert!(sink.played.lock().unwrap().is_empty());
    }
}
