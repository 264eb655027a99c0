//! Session loop and activation lifecycle

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::VoiceError;
use super::audio::{AudioSink, AudioSource};
use super::pcm::{decode_blob, encode_blob};
use super::playback::PlaybackScheduler;
use super::protocol::{ADD_TASK_TOOL, ClientMessage, FunctionCall, ServerMessage, UPDATE_HEALTH_TOOL, voice_tools};
use super::transport::{LiveConnector, LiveTransport};
use crate::config::VoiceConfig;
use crate::domain::{HealthUpdate, NotificationKind, Priority, Task};
use crate::prompts::{PromptLoader, VoicePromptContext};
use crate::state::StateManager;

/// Notification emitted when a session is switched on
pub const ACTIVATED_MESSAGE: &str = "Voice Architect activated...";

/// Why a session loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Switched off locally
    Stopped,
    /// The service closed the connection
    Closed,
}

/// What happened during one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub frames_sent: usize,
    pub tool_calls: usize,
    pub audio_chunks: usize,
    pub audio_seconds: f64,
}

/// One live session: pumps microphone frames out, plays audio and answers tool calls
pub struct VoiceBridge {
    state: StateManager,
    transport: Box<dyn LiveTransport>,
    sink: Box<dyn AudioSink>,
    scheduler: PlaybackScheduler,
    input_rate: u32,
    output_rate: u32,
    frames_sent: usize,
    tool_calls: usize,
    audio_chunks: usize,
    audio_seconds: f64,
}

impl VoiceBridge {
    pub fn new(
        state: StateManager,
        transport: Box<dyn LiveTransport>,
        sink: Box<dyn AudioSink>,
        config: &VoiceConfig,
    ) -> Self {
        Self {
            state,
            transport,
            sink,
            scheduler: PlaybackScheduler::new(),
            input_rate: config.input_sample_rate,
            output_rate: config.output_sample_rate,
            frames_sent: 0,
            tool_calls: 0,
            audio_chunks: 0,
            audio_seconds: 0.0,
        }
    }

    /// Run until stopped or until the service closes
    ///
    /// Inbound messages are handled one at a time; every tool call in a
    /// message is dispatched and acknowledged before the next message is read.
    /// Dropping `stop`'s sender counts as a stop. The transport is closed on
    /// every exit, failures included.
    pub async fn run(
        mut self,
        setup: ClientMessage,
        mic: mpsc::UnboundedReceiver<Vec<f32>>,
        stop: oneshot::Receiver<()>,
    ) -> Result<SessionSummary, VoiceError> {
        debug!("VoiceBridge::run: called");
        let result = self.pump(setup, mic, stop).await;
        let closed = self.transport.close().await;

        let end = match result {
            Ok(end) => end,
            Err(e) => {
                error!(error = %e, "Voice session failed");
                if let Err(close_err) = closed {
                    debug!(error = %close_err, "VoiceBridge::run: close after failure also failed");
                }
                return Err(e);
            }
        };
        closed?;

        Ok(SessionSummary {
            end,
            frames_sent: self.frames_sent,
            tool_calls: self.tool_calls,
            audio_chunks: self.audio_chunks,
            audio_seconds: self.audio_seconds,
        })
    }

    /// The session loop proper; returns how it ended
    async fn pump(
        &mut self,
        setup: ClientMessage,
        mut mic: mpsc::UnboundedReceiver<Vec<f32>>,
        mut stop: oneshot::Receiver<()>,
    ) -> Result<SessionEnd, VoiceError> {
        self.transport.send(setup).await?;

        let mut mic_open = true;
        loop {
            tokio::select! {
                _ = &mut stop => {
                    info!("Voice session stopped");
                    return Ok(SessionEnd::Stopped);
                }
                frame = mic.recv(), if mic_open => match frame {
                    Some(samples) => {
                        self.transport.send(ClientMessage::audio(encode_blob(&samples, self.input_rate))).await?;
                        self.frames_sent += 1;
                    }
                    None => {
                        info!(frames = self.frames_sent, "Microphone input ended");
                        mic_open = false;
                    }
                },
                inbound = self.transport.recv() => match inbound {
                    Some(Ok(message)) => self.handle_message(message).await?,
                    Some(Err(e)) => return Err(e),
                    None => {
                        info!("Voice session closed by service");
                        return Ok(SessionEnd::Closed);
                    }
                },
            }
        }
    }

    async fn handle_message(&mut self, message: ServerMessage) -> Result<(), VoiceError> {
        if message.setup_complete.is_some() {
            info!("Live session setup complete");
        }
        if message.go_away.is_some() {
            warn!("Live service announced disconnect");
        }
        if message.interrupted() {
            debug!("VoiceBridge::handle_message: interrupted, dropping queued audio");
            self.scheduler.reset();
        }

        for blob in message.audio_chunks() {
            let samples = match decode_blob(&blob.data) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable audio chunk");
                    continue;
                }
            };
            let duration = samples.len() as f64 / f64::from(self.output_rate);
            let start = self.scheduler.schedule(self.sink.now(), duration);
            self.sink.play(start, &samples)?;
            self.audio_chunks += 1;
            self.audio_seconds += duration;
        }

        for call in message.function_calls() {
            let response = self.dispatch(call).await;
            self.transport.send(ClientMessage::tool_ack(&call.id, &call.name, response)).await?;
            self.tool_calls += 1;
        }
        Ok(())
    }

    /// Apply one tool call to the state; the value is the acknowledgement payload
    async fn dispatch(&self, call: &FunctionCall) -> Value {
        debug!(id = %call.id, name = %call.name, args = %call.args, "VoiceBridge::dispatch: called");
        let result = match call.name.as_str() {
            ADD_TASK_TOOL => {
                let Some(text) = call.args.get("text").and_then(Value::as_str).map(str::trim).filter(|t| !t.is_empty())
                else {
                    warn!(id = %call.id, "addTask without text");
                    return json!({ "ok": false, "error": "missing text" });
                };
                let priority = call
                    .args
                    .get("priority")
                    .and_then(Value::as_str)
                    .map(Priority::from_label)
                    .unwrap_or_default();
                self.state
                    .add_task(Task::new(text).with_priority(priority))
                    .await
                    .map(|task| info!(task_id = %task.id, "Voice added task"))
            }
            UPDATE_HEALTH_TOOL => {
                let update = HealthUpdate {
                    steps: count_arg(&call.args, "steps"),
                    water_intake: count_arg(&call.args, "waterIntake"),
                    ..Default::default()
                };
                self.state
                    .update_health(update)
                    .await
                    .map(|health| info!(steps = health.steps, water = health.water_intake, "Voice updated health"))
            }
            other => {
                warn!(name = %other, "Unknown tool called");
                return json!({ "ok": false, "error": format!("unknown tool {}", other) });
            }
        };

        match result {
            Ok(()) => json!({ "ok": true }),
            Err(e) => {
                warn!(error = %e, name = %call.name, "Tool dispatch failed");
                json!({ "ok": false, "error": e.to_string() })
            }
        }
    }
}

/// Non-negative whole number argument; models send these as JSON numbers
fn count_arg(args: &Value, key: &str) -> Option<u32> {
    args.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round().min(f64::from(u32::MAX)) as u32)
}

struct ActiveSession {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<SessionSummary, VoiceError>>,
}

/// Switches the voice session on and off
///
/// At most one session runs at a time. A session that ends on its own
/// (service close or failure) leaves the controller inactive; there is no
/// reconnection.
pub struct VoiceController {
    state: StateManager,
    connector: Arc<dyn LiveConnector>,
    prompts: Arc<PromptLoader>,
    config: VoiceConfig,
    session: Option<ActiveSession>,
}

impl VoiceController {
    pub fn new(
        state: StateManager,
        connector: Arc<dyn LiveConnector>,
        prompts: Arc<PromptLoader>,
        config: VoiceConfig,
    ) -> Self {
        Self {
            state,
            connector,
            prompts,
            config,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.handle.is_finished())
    }

    /// Switch on: notify, acquire the microphone, connect, start the loop
    ///
    /// On failure the controller stays inactive and the error is returned.
    pub async fn activate(
        &mut self,
        mut source: Box<dyn AudioSource>,
        sink: Box<dyn AudioSink>,
    ) -> Result<(), VoiceError> {
        debug!("VoiceController::activate: called");
        if self.is_active() {
            return Err(VoiceError::AlreadyActive);
        }
        self.session = None;

        self.state.notify(ACTIVATED_MESSAGE, NotificationKind::Success).await?;
        match self.open(source.as_mut(), sink).await {
            Ok(session) => {
                info!(model = %self.config.model, "Voice session active");
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Voice activation failed, back to inactive");
                Err(e)
            }
        }
    }

    async fn open(&self, source: &mut dyn AudioSource, sink: Box<dyn AudioSink>) -> Result<ActiveSession, VoiceError> {
        let snapshot = self.state.snapshot().await?;
        let system = self
            .prompts
            .voice_system(&VoicePromptContext {
                name: &snapshot.profile.name,
            })
            .map_err(|e| VoiceError::Prompt(e.to_string()))?;

        let mic = source.start()?;
        let transport = self.connector.connect().await?;

        let setup = ClientMessage::setup(&self.config.model, &system, &voice_tools());
        let bridge = VoiceBridge::new(self.state.clone(), transport, sink, &self.config);
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(bridge.run(setup, mic, stop_rx));
        Ok(ActiveSession { stop, handle })
    }

    /// Switch off; returns how the session went, or `None` if nothing was running
    pub async fn deactivate(&mut self) -> Option<Result<SessionSummary, VoiceError>> {
        debug!("VoiceController::deactivate: called");
        let session = self.session.take()?;
        let _ = session.stop.send(());
        Some(join_session(session.handle).await)
    }

    /// Wait for the running session to end on its own
    pub async fn wait(&mut self) -> Option<Result<SessionSummary, VoiceError>> {
        debug!("VoiceController::wait: called");
        let session = self.session.as_mut()?;
        let result = join_session(&mut session.handle).await;
        self.session = None;
        Some(result)
    }
}

async fn join_session(
    handle: impl std::future::Future<Output = Result<Result<SessionSummary, VoiceError>, tokio::task::JoinError>>,
) -> Result<SessionSummary, VoiceError> {
    handle
        .await
        .map_err(|e| VoiceError::Transport(format!("session task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::state::StateOptions;
    use crate::voice::{ChannelTransport, PcmReaderSource, encode_pcm16};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Replays scripted inbound messages, then reports the service closed
    /// (or a transport failure when `fail_at_end` is set)
    struct ScriptedTransport {
        inbound: VecDeque<ServerMessage>,
        fail_at_end: bool,
        log: Log,
    }

    #[async_trait]
    impl LiveTransport for ScriptedTransport {
        async fn send(&mut self, message: ClientMessage) -> Result<(), VoiceError> {
            let entry = match &message {
                ClientMessage::Setup(_) => "setup".to_string(),
                ClientMessage::RealtimeInput(_) => "audio".to_string(),
                ClientMessage::ToolResponse(r) => format!(
                    "ack:{}:{}",
                    r.function_responses[0].id, r.function_responses[0].response["ok"]
                ),
            };
            self.log.lock().unwrap().push(entry);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<ServerMessage, VoiceError>> {
            match self.inbound.pop_front() {
                Some(message) => Some(Ok(message)),
                None if self.fail_at_end => Some(Err(VoiceError::Transport("connection reset".to_string()))),
                None => None,
            }
        }

        async fn close(&mut self) -> Result<(), VoiceError> {
            self.log.lock().unwrap().push("close".to_string());
            Ok(())
        }
    }

    struct RecordingSink {
        now: f64,
        log: Log,
        starts: Arc<Mutex<Vec<f64>>>,
    }

    impl AudioSink for RecordingSink {
        fn now(&self) -> f64 {
            self.now
        }

        fn play(&mut self, start: f64, samples: &[f32]) -> Result<(), VoiceError> {
            self.log.lock().unwrap().push(format!("play:{}", samples.len()));
            self.starts.lock().unwrap().push(start);
            Ok(())
        }
    }

    fn message(json: Value) -> ServerMessage {
        serde_json::from_value(json).unwrap()
    }

    fn audio_message(samples: usize) -> ServerMessage {
        use base64::Engine;
        let data = base64::engine::general_purpose::STANDARD.encode(encode_pcm16(&vec![0.1; samples]));
        message(json!({
            "serverContent": { "modelTurn": { "parts": [ { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": data } } ] } }
        }))
    }

    fn setup_state() -> (StateManager, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = StateManager::spawn(dir.path(), StateOptions::default()).unwrap();
        (state, dir)
    }

    fn bridge(state: &StateManager, inbound: Vec<ServerMessage>, log: &Log, starts: &Arc<Mutex<Vec<f64>>>) -> VoiceBridge {
        let transport = ScriptedTransport {
            inbound: inbound.into(),
            fail_at_end: false,
            log: log.clone(),
        };
        let sink = RecordingSink {
            now: 0.0,
            log: log.clone(),
            starts: starts.clone(),
        };
        VoiceBridge::new(state.clone(), Box::new(transport), Box::new(sink), &VoiceConfig::default())
    }

    #[tokio::test]
    async fn test_tool_calls_acknowledged_before_next_message() {
        let (state, _dir) = setup_state();
        let log = Log::default();
        let starts = Arc::new(Mutex::new(Vec::new()));
        let inbound = vec![
            message(json!({ "setupComplete": {} })),
            message(json!({ "toolCall": { "functionCalls": [
                { "id": "c1", "name": "addTask", "args": { "text": "Call the dentist", "priority": "High" } },
                { "id": "c2", "name": "updateHealth", "args": { "steps": 9000, "waterIntake": 1750.4 } }
            ] } })),
            audio_message(2400),
        ];
        let (_stop_tx, stop_rx) = oneshot::channel();
        let (_mic_tx, mic_rx) = mpsc::unbounded_channel();

        let summary = bridge(&state, inbound, &log, &starts)
            .run(ClientMessage::setup("m", "sys", &voice_tools()), mic_rx, stop_rx)
            .await
            .unwrap();

        assert_eq!(summary.end, SessionEnd::Closed);
        assert_eq!(summary.tool_calls, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["setup", "ack:c1:true", "ack:c2:true", "play:2400", "close"]
        );

        let snapshot = state.snapshot().await.unwrap();
        assert_eq!(snapshot.tasks[0].text, "Call the dentist");
        assert_eq!(snapshot.tasks[0].priority, Priority::High);
        assert_eq!(snapshot.health.steps, 9000);
        assert_eq!(snapshot.health.water_intake, 1750);
    }

    #[tokio::test]
    async fn test_bad_tool_calls_still_acknowledged() {
        let (state, _dir) = setup_state();
        let log = Log::default();
        let starts = Arc::new(Mutex::new(Vec::new()));
        let inbound = vec![message(json!({ "toolCall": { "functionCalls": [
            { "id": "c1", "name": "addTask", "args": {} },
            { "id": "c2", "name": "launchRocket", "args": {} }
        ] } }))];
        let (_stop_tx, stop_rx) = oneshot::channel();
        let (_mic_tx, mic_rx) = mpsc::unbounded_channel();

        bridge(&state, inbound, &log, &starts)
            .run(ClientMessage::setup("m", "sys", &[]), mic_rx, stop_rx)
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["setup", "ack:c1:false", "ack:c2:false", "close"]);
        assert_eq!(state.snapshot().await.unwrap().tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_still_closes() {
        let (state, _dir) = setup_state();
        let log = Log::default();
        let transport = ScriptedTransport {
            inbound: vec![message(json!({ "setupComplete": {} }))].into(),
            fail_at_end: true,
            log: log.clone(),
        };
        let sink = RecordingSink {
            now: 0.0,
            log: log.clone(),
            starts: Arc::new(Mutex::new(Vec::new())),
        };
        let (_stop_tx, stop_rx) = oneshot::channel();
        let (_mic_tx, mic_rx) = mpsc::unbounded_channel();

        let result = VoiceBridge::new(state, Box::new(transport), Box::new(sink), &VoiceConfig::default())
            .run(ClientMessage::setup("m", "sys", &[]), mic_rx, stop_rx)
            .await;

        assert!(matches!(result, Err(VoiceError::Transport(_))));
        assert_eq!(*log.lock().unwrap(), vec!["setup", "close"]);
    }

    #[tokio::test]
    async fn test_audio_scheduled_back_to_back_and_reset_on_interrupt() {
        let (state, _dir) = setup_state();
        let log = Log::default();
        let starts = Arc::new(Mutex::new(Vec::new()));
        let inbound = vec![
            audio_message(24_000),
            audio_message(12_000),
            message(json!({ "serverContent": { "interrupted": true } })),
            audio_message(2_400),
        ];
        let (_stop_tx, stop_rx) = oneshot::channel();
        let (_mic_tx, mic_rx) = mpsc::unbounded_channel();

        let summary = bridge(&state, inbound, &log, &starts)
            .run(ClientMessage::setup("m", "sys", &[]), mic_rx, stop_rx)
            .await
            .unwrap();

        assert_eq!(*starts.lock().unwrap(), vec![0.0, 1.0, 0.0]);
        assert_eq!(summary.audio_chunks, 3);
        assert!((summary.audio_seconds - 1.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_microphone_frames_streamed_until_stopped() {
        let (state, _dir) = setup_state();
        let (transport, mut sent, _inbound) = ChannelTransport::pair();
        let sink = RecordingSink {
            now: 0.0,
            log: Log::default(),
            starts: Arc::new(Mutex::new(Vec::new())),
        };
        let bridge = VoiceBridge::new(state.clone(), Box::new(transport), Box::new(sink), &VoiceConfig::default());
        let (stop_tx, stop_rx) = oneshot::channel();
        let (mic_tx, mic_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(bridge.run(ClientMessage::setup("m", "sys", &[]), mic_rx, stop_rx));
        assert!(matches!(sent.recv().await, Some(ClientMessage::Setup(_))));

        mic_tx.send(vec![0.5; 8]).unwrap();
        match sent.recv().await {
            Some(ClientMessage::RealtimeInput(input)) => {
                assert_eq!(input.audio.mime_type, "audio/pcm;rate=16000");
            }
            other => panic!("expected audio, got {:?}", other),
        }

        stop_tx.send(()).unwrap();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert_eq!(summary.frames_sent, 1);
    }

    struct FailingConnector;

    #[async_trait]
    impl LiveConnector for FailingConnector {
        async fn connect(&self) -> Result<Box<dyn LiveTransport>, VoiceError> {
            Err(VoiceError::Transport("unreachable".to_string()))
        }
    }

    /// Hands out one channel transport; the test keeps the far ends
    struct ChannelConnector {
        transport: Mutex<Option<ChannelTransport>>,
    }

    #[async_trait]
    impl LiveConnector for ChannelConnector {
        async fn connect(&self) -> Result<Box<dyn LiveTransport>, VoiceError> {
            let transport = self.transport.lock().unwrap().take();
            transport
                .map(|t| Box::new(t) as Box<dyn LiveTransport>)
                .ok_or_else(|| VoiceError::Transport("already used".to_string()))
        }
    }

    fn silent_sink() -> Box<dyn AudioSink> {
        Box::new(RecordingSink {
            now: 0.0,
            log: Log::default(),
            starts: Arc::new(Mutex::new(Vec::new())),
        })
    }

    #[tokio::test]
    async fn test_activation_failure_reverts_to_inactive() {
        let (state, _dir) = setup_state();
        let mut controller = VoiceController::new(
            state.clone(),
            Arc::new(FailingConnector),
            Arc::new(PromptLoader::embedded_only()),
            VoiceConfig::default(),
        );

        let source = Box::new(PcmReaderSource::from_reader(std::io::Cursor::new(Vec::new())));
        let result = controller.activate(source, silent_sink()).await;

        assert!(matches!(result, Err(VoiceError::Transport(_))));
        assert!(!controller.is_active());
        let snapshot = state.snapshot().await.unwrap();
        assert_eq!(snapshot.notifications.history()[0].message, ACTIVATED_MESSAGE);
    }

    #[tokio::test]
    async fn test_microphone_failure_reverts_to_inactive() {
        let (state, dir) = setup_state();
        let (transport, _sent, _inbound) = ChannelTransport::pair();
        let mut controller = VoiceController::new(
            state,
            Arc::new(ChannelConnector {
                transport: Mutex::new(Some(transport)),
            }),
            Arc::new(PromptLoader::embedded_only()),
            VoiceConfig::default(),
        );

        let source = Box::new(PcmReaderSource::from_path(dir.path().join("no-mic")));
        assert!(matches!(
            controller.activate(source, silent_sink()).await,
            Err(VoiceError::Audio(_))
        ));
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_toggle_lifecycle() {
        let (state, _dir) = setup_state();
        let (transport, mut sent, inbound) = ChannelTransport::pair();
        let mut controller = VoiceController::new(
            state,
            Arc::new(ChannelConnector {
                transport: Mutex::new(Some(transport)),
            }),
            Arc::new(PromptLoader::embedded_only()),
            VoiceConfig::default(),
        );

        let (_mic_writer, mic_reader) = tokio::io::duplex(64);
        let source = Box::new(PcmReaderSource::from_reader(mic_reader));
        controller.activate(source, silent_sink()).await.unwrap();
        assert!(controller.is_active());

        match sent.recv().await {
            Some(ClientMessage::Setup(setup)) => {
                assert!(setup.system_instruction.parts[0].text.contains("User is"));
                assert_eq!(setup.tools.len(), 1);
            }
            other => panic!("expected setup, got {:?}", other),
        }

        let source = Box::new(PcmReaderSource::from_reader(std::io::Cursor::new(Vec::new())));
        assert!(matches!(
            controller.activate(source, silent_sink()).await,
            Err(VoiceError::AlreadyActive)
        ));

        let summary = controller.deactivate().await.unwrap().unwrap();
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert!(!controller.is_active());
        assert!(controller.deactivate().await.is_none());
        drop(inbound);
    }

    #[tokio::test]
    async fn test_service_close_ends_session() {
        let (state, _dir) = setup_state();
        let (transport, _sent, inbound) = ChannelTransport::pair();
        let mut controller = VoiceController::new(
            state,
            Arc::new(ChannelConnector {
                transport: Mutex::new(Some(transport)),
            }),
            Arc::new(PromptLoader::embedded_only()),
            VoiceConfig::default(),
        );

        let (_mic_writer, mic_reader) = tokio::io::duplex(64);
        controller
            .activate(Box::new(PcmReaderSource::from_reader(mic_reader)), silent_sink())
            .await
            .unwrap();
        drop(inbound);

        let summary = controller.wait().await.unwrap().unwrap();
        assert_eq!(summary.end, SessionEnd::Closed);
        assert!(!controller.is_active());
    }
}
