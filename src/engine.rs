//! The composition root of a tutoring session.
//!
//! A single driver task owns the connection, the playback sequencer, the
//! recording controller and the transient timers. Inbound frames, commands
//! from [`SessionEngine`] handles, timer expiries and the playback flag are
//! all handled one at a time by that task, so [`SessionState`] has exactly one
//! writer and needs no locking.
//!
//! The handshake and the microphone acquisition are kept as pending futures
//! polled by the same loop, so a slow network or permission prompt never
//! holds up the rest of the session.

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot, watch};

use crate::client::consts::{CONNECTION_ERROR_MESSAGE, MICROPHONE_ERROR_MESSAGE};
use crate::client::{build_url, ConnectionEvent, InboundRx, SessionConnection};
use crate::config::Config;
use crate::error::{ConnectionError, EngineError, RecordingError};
use crate::playback::{AudioSink, PlaybackSequencer};
use crate::recording::{Acquired, Microphone, RecordingController};
use crate::router::{self, Directive};
use crate::state::{SessionState, TransientSlot};
use crate::types::events::client::SetPaceEvent;
use crate::types::{ClientEvent, Pace, SessionStatus};

mod transient;

use transient::{Expiry, TransientTimers};

/// Write callback for the persisted pace preference.
pub type PaceStore = Box<dyn FnMut(Pace) + Send>;

type Reply<T> = oneshot::Sender<T>;

type Opened = (Pace, Result<(SessionConnection, InboundRx), ConnectionError>);

enum Command {
    StartSpeaking(Reply<Result<(), EngineError>>),
    StopSpeaking(Reply<bool>),
    SetPace(Pace, Reply<()>),
    Skip(Reply<bool>),
    Pause(Reply<bool>),
    Disconnect(Reply<()>),
}

pub struct EngineBuilder {
    config: Config,
    pace_store: Option<PaceStore>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pace_store: None,
        }
    }

    /// Called with every new pace, after the local setting changed.
    pub fn with_pace_store<F>(mut self, store: F) -> Self
    where
        F: FnMut(Pace) + Send + 'static,
    {
        self.pace_store = Some(Box::new(store));
        self
    }

    /// Starts the engine for `session_id` and begins opening the channel.
    ///
    /// Returns as soon as the driver runs; follow [`SessionEngine::watch`] for
    /// `connected` or `disconnected`. Only an unusable endpoint fails here.
    pub fn connect<M, S>(
        self,
        session_id: &str,
        pace: Pace,
        mic: M,
        speaker: S,
    ) -> Result<SessionEngine, ConnectionError>
    where
        M: Microphone,
        S: AudioSink,
    {
        build_url(&self.config, session_id)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(self.config.capacity());
        let (state_tx, state_rx) = watch::channel(SessionState::new(pace));
        let playback = PlaybackSequencer::new(speaker);
        let playing = playback.watch_playing();

        let driver = Driver {
            config: self.config,
            session_id: session_id.to_string(),
            pace,
            cmd_rx,
            state: state_tx,
            connecting: None,
            connection: None,
            inbound: None,
            playback: Some(playback),
            playing: Some(playing),
            recorder: RecordingController::new(mic),
            acquiring: None,
            pending_start: None,
            timers: TransientTimers::new(),
            pace_store: self.pace_store,
        };
        tokio::spawn(driver.run());

        Ok(SessionEngine {
            cmd_tx,
            state: state_rx,
        })
    }
}

/// Handle to a running session. Cheap to clone; every clone drives the same
/// session.
///
/// The session is torn down by [`disconnect`](Self::disconnect), or once the
/// last handle is dropped.
#[derive(Clone)]
pub struct SessionEngine {
    cmd_tx: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionEngine {
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn connect<M, S>(
        config: Config,
        session_id: &str,
        pace: Pace,
        mic: M,
        speaker: S,
    ) -> Result<Self, ConnectionError>
    where
        M: Microphone,
        S: AudioSink,
    {
        EngineBuilder::new(config).connect(session_id, pace, mic, speaker)
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Follows every state change. Closed once the session has been torn down.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the state satisfies `f` and returns that state.
    pub async fn wait_for<F>(&self, mut f: F) -> Result<SessionState, EngineError>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut rx = self.state.clone();
        let state = rx.wait_for(|state| f(state)).await.map_err(|_| EngineError::Stopped)?;
        Ok(state.clone())
    }

    /// Opens the microphone. Refused unless the tutor is listening.
    pub async fn start_speaking(&self) -> Result<(), EngineError> {
        self.request(Command::StartSpeaking).await?
    }

    /// Ends the recording and sends it. Returns whether audio went out.
    pub async fn stop_speaking(&self) -> Result<bool, EngineError> {
        self.request(Command::StopSpeaking).await
    }

    pub async fn set_pace(&self, pace: Pace) -> Result<(), EngineError> {
        self.request(|reply| Command::SetPace(pace, reply)).await
    }

    /// Asks the tutor to move on. Returns whether the request was sent.
    pub async fn skip(&self) -> Result<bool, EngineError> {
        self.request(Command::Skip).await
    }

    /// Asks the service to pause the session. Returns whether the request was sent.
    pub async fn pause(&self) -> Result<bool, EngineError> {
        self.request(Command::Pause).await
    }

    /// Closes the channel, silences playback and cancels pending timers.
    ///
    /// When this returns the state is final. Calling it again is a no-op.
    pub async fn disconnect(&self) -> Result<(), EngineError> {
        match self.request(Command::Disconnect).await {
            Err(EngineError::Stopped) => Ok(()),
            other => other,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(command(tx))
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)
    }
}

struct Driver<M> {
    config: Config,
    session_id: String,
    pace: Pace,
    cmd_rx: mpsc::Receiver<Command>,
    state: watch::Sender<SessionState>,
    connecting: Option<BoxFuture<'static, Opened>>,
    connection: Option<SessionConnection>,
    inbound: Option<InboundRx>,
    playback: Option<PlaybackSequencer>,
    playing: Option<watch::Receiver<bool>>,
    recorder: RecordingController<M>,
    acquiring: Option<BoxFuture<'static, Acquired<M>>>,
    pending_start: Option<Reply<Result<(), EngineError>>>,
    timers: TransientTimers,
    pace_store: Option<PaceStore>,
}

impl<M: Microphone> Driver<M> {
    async fn run(mut self) {
        self.open();
        let reply = self.event_loop().await;
        self.teardown().await;
        drop(self);
        if let Some(reply) = reply {
            let _ = reply.send(());
        }
    }

    fn open(&mut self) {
        let config = self.config.clone();
        let session_id = self.session_id.clone();
        let pace = self.pace;
        self.connecting = Some(
            async move { (pace, SessionConnection::open(&config, &session_id, pace).await) }.boxed(),
        );
    }

    async fn on_opened(&mut self, (started_with, opened): Opened) {
        match opened {
            Ok((connection, inbound)) => {
                tracing::info!("session {} connected", self.session_id);
                self.connection = Some(connection);
                self.inbound = Some(inbound);
                self.state
                    .send_if_modified(|state| state.set_status(SessionStatus::Connected));
                if self.pace != started_with {
                    let pace = self.pace;
                    self.send_control(ClientEvent::SetPace(SetPaceEvent::new(pace))).await;
                }
            }
            Err(e) => {
                tracing::error!("failed to connect session {}: {}", self.session_id, e);
                self.on_closed(Some(e.to_string())).await;
            }
        }
    }

    /// Runs until a disconnect request or until every handle is gone.
    async fn event_loop(&mut self) -> Option<Reply<()>> {
        loop {
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(Command::Disconnect(reply)) => return Some(reply),
                    Some(command) => self.handle_command(command).await,
                    None => {
                        tracing::debug!("all engine handles dropped");
                        return None;
                    }
                },
                opened = settle(&mut self.connecting) => self.on_opened(opened).await,
                acquired = settle(&mut self.acquiring) => self.on_acquired(acquired),
                event = recv_inbound(&mut self.inbound) => self.handle_inbound(event).await,
                Some(expiry) = self.timers.next() => self.expire(expiry),
                playing = playing_changed(&mut self.playing) => {
                    self.state.send_if_modified(|state| state.set_tutor_speaking(playing));
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartSpeaking(reply) => self.start_speaking(reply),
            Command::StopSpeaking(reply) => {
                let sent = self.stop_speaking().await;
                let _ = reply.send(sent);
            }
            Command::SetPace(pace, reply) => {
                self.set_pace(pace).await;
                let _ = reply.send(());
            }
            Command::Skip(reply) => {
                let sent = self.send_control(ClientEvent::Skip).await;
                let _ = reply.send(sent);
            }
            Command::Pause(reply) => {
                let sent = self.send_control(ClientEvent::Pause).await;
                let _ = reply.send(sent);
            }
            Command::Disconnect(_) => {}
        }
    }

    /// Answers once the device opened or failed to.
    fn start_speaking(&mut self, reply: Reply<Result<(), EngineError>>) {
        let status = self.state.borrow().status().clone();
        if status != SessionStatus::Listening {
            tracing::debug!("not recording while {}", status);
            let _ = reply.send(Err(EngineError::NotListening(status)));
            return;
        }

        match self.recorder.acquire() {
            Ok(pending) => {
                self.acquiring = Some(pending);
                self.pending_start = Some(reply);
            }
            Err(e) => {
                let _ = reply.send(Err(e.into()));
            }
        }
    }

    fn on_acquired(&mut self, acquired: Acquired<M>) {
        // The tutor may have moved on while the device was opening.
        let status = self.state.borrow().status().clone();
        let result = if status != SessionStatus::Listening {
            self.recorder.discard(acquired);
            Err(EngineError::NotListening(status))
        } else {
            match self.recorder.complete(acquired) {
                Ok(()) => {
                    self.state.send_if_modified(|state| state.set_recording(true));
                    Ok(())
                }
                Err(e @ RecordingError::DeviceUnavailable(_)) => {
                    self.show(TransientSlot::Error, MICROPHONE_ERROR_MESSAGE);
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        };

        if let Some(reply) = self.pending_start.take() {
            let _ = reply.send(result);
        }
    }

    async fn stop_speaking(&mut self) -> bool {
        let payload = self.recorder.end();
        self.state.send_if_modified(|state| state.set_recording(false));
        match payload {
            Some(payload) => match self.connection {
                Some(ref connection) => connection.send_audio(payload).await,
                None => false,
            },
            None => false,
        }
    }

    async fn set_pace(&mut self, pace: Pace) {
        self.pace = pace;
        self.state.send_if_modified(|state| state.set_pace(pace));
        if let Some(store) = self.pace_store.as_mut() {
            store(pace);
        }
        self.send_control(ClientEvent::SetPace(SetPaceEvent::new(pace))).await;
    }

    async fn send_control(&mut self, event: ClientEvent) -> bool {
        match self.connection {
            Some(ref connection) => connection.send_control(event).await,
            None => {
                tracing::debug!("dropping {} control message, not connected", event.kind());
                false
            }
        }
    }

    async fn handle_inbound(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message(event) => {
                let mut directive = Directive::Nothing;
                self.state.send_if_modified(|state| {
                    directive = router::route(state, event);
                    directive.changed_state()
                });
                match directive {
                    Directive::Arm(slot) => {
                        let ttl = self.ttl(slot);
                        self.timers.arm(slot, ttl);
                    }
                    Directive::Play(fragment) => {
                        if let Some(ref playback) = self.playback {
                            playback.enqueue(fragment);
                        }
                    }
                    Directive::Updated | Directive::Nothing => {}
                }
            }
            ConnectionEvent::Closed { error } => self.on_closed(error).await,
        }
    }

    /// The channel is gone: nothing queued may play, the mic is released and
    /// a transport failure is shown.
    async fn on_closed(&mut self, error: Option<String>) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.inbound = None;
        self.stop_media().await;

        self.state.send_modify(|state| {
            state.set_status(SessionStatus::Disconnected);
        });
        if let Some(error) = error {
            tracing::warn!("session {} lost: {}", self.session_id, error);
            self.show(TransientSlot::Error, CONNECTION_ERROR_MESSAGE);
        } else {
            tracing::info!("session {} closed by the service", self.session_id);
        }
    }

    async fn stop_media(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.shutdown().await;
        }
        self.playing = None;
        if self.recorder.end().is_some() {
            tracing::debug!("discarded an unsent recording");
        }
        self.state.send_if_modified(|state| {
            let speaking = state.set_tutor_speaking(false);
            let recording = state.set_recording(false);
            speaking || recording
        });
    }

    fn show(&mut self, slot: TransientSlot, message: &str) {
        self.state.send_modify(|state| state.set_error(message));
        let ttl = self.ttl(slot);
        self.timers.arm(slot, ttl);
    }

    fn expire(&mut self, expiry: Expiry) {
        if self.timers.accept(expiry) {
            tracing::debug!("{:?} expired", expiry.slot());
            self.state.send_if_modified(|state| state.clear(expiry.slot()));
        }
    }

    fn ttl(&self, slot: TransientSlot) -> Duration {
        match slot {
            TransientSlot::SectionComplete => self.config.section_complete_ttl(),
            TransientSlot::Error => self.config.error_ttl(),
        }
    }

    async fn teardown(&mut self) {
        self.connecting = None;
        self.acquiring = None;
        if let Some(reply) = self.pending_start.take() {
            let _ = reply.send(Err(EngineError::Stopped));
        }
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.inbound = None;
        self.stop_media().await;
        self.timers.cancel_all();

        self.state.send_modify(|state| {
            state.clear(TransientSlot::SectionComplete);
            state.clear(TransientSlot::Error);
            state.set_status(SessionStatus::Disconnected);
        });
        tracing::info!("session {} disconnected", self.session_id);
    }
}

/// Resolves with the output of the pending future, then forgets it.
async fn settle<T>(pending: &mut Option<BoxFuture<'static, T>>) -> T {
    let Some(future) = pending.as_mut() else {
        return std::future::pending().await;
    };
    let output = future.await;
    *pending = None;
    output
}

/// Pending forever once the channel is gone.
async fn recv_inbound(inbound: &mut Option<InboundRx>) -> ConnectionEvent {
    match inbound {
        Some(rx) => match rx.recv().await {
            Some(event) => event,
            None => ConnectionEvent::Closed { error: None },
        },
        None => std::future::pending().await,
    }
}

/// Pending forever once playback has been shut down.
async fn playing_changed(playing: &mut Option<watch::Receiver<bool>>) -> bool {
    let Some(rx) = playing.as_mut() else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_ok() {
        return *rx.borrow_and_update();
    }
    *playing = None;
    false
}
