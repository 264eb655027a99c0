//! Integration tests for Tasky
//!
//! End-to-end behavior of plan generation, the task board, persistence,
//! notifications and the voice bridge, with scripted model clients.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use slicestore::SliceStore;
use tempfile::TempDir;

use tasky::domain::{ArtifactStatus, NotificationKind, PLAN_STYLES, Priority, Task};
use tasky::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use tasky::planner::{ARCHITECTED_MESSAGE, GeneratorOptions, PlanGenerator, UNAVAILABLE_MESSAGE};
use tasky::prompts::PromptLoader;
use tasky::state::{PROFILE_KEY, SESSIONS_KEY, StateManager, StateOptions, TASKS_KEY, default_tasks};
use tasky::voice::{
    ACTIVATED_MESSAGE, ChannelTransport, ClientMessage, LiveConnector, LiveTransport, PcmReaderSource, PcmWriterSink,
    ServerMessage, SessionEnd, VoiceController, VoiceError,
};

// =============================================================================
// Helpers
// =============================================================================

type Respond = dyn Fn(&str) -> Result<CompletionResponse, LlmError> + Send + Sync;

/// Model client that answers by plan style, so concurrent slots are deterministic
struct StyleScriptedClient {
    respond: Box<Respond>,
    calls: AtomicUsize,
}

impl StyleScriptedClient {
    fn new(respond: impl Fn(&str) -> Result<CompletionResponse, LlmError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for StyleScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Slots finish in a different order than they start
        let style = style_of(&request);
        let delay = match style {
            "Balanced Harmony" => 30,
            "Peak Focus Sprint" => 10,
            _ => 20,
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        (self.respond)(style)
    }
}

fn style_of(request: &CompletionRequest) -> &'static str {
    let user = &request.messages[0].content;
    PLAN_STYLES
        .iter()
        .copied()
        .find(|style| user.contains(&format!("Mode: {}.", style)))
        .unwrap_or("unknown")
}

fn plan_json(style: &str, count: usize) -> String {
    let tasks: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "text": format!("{} task {}", style, i),
                "priority": if i == 0 { "High" } else { "low" },
                "estimatedTime": "20m",
                "dueDate": "Today"
            })
        })
        .collect();
    json!({ "summary": format!("{} summary", style), "tasks": tasks }).to_string()
}

fn task_count(style: &str) -> usize {
    match style {
        "Balanced Harmony" => 3,
        "Peak Focus Sprint" => 4,
        _ => 2,
    }
}

fn spawn_state(dir: &TempDir) -> StateManager {
    StateManager::spawn(dir.path().join("store"), StateOptions::default()).expect("Failed to spawn state manager")
}

fn generator(state: &StateManager, llm: Arc<dyn LlmClient>, options: GeneratorOptions) -> PlanGenerator {
    PlanGenerator::new(llm, state.clone(), Arc::new(PromptLoader::embedded_only()), options)
}

fn unavailable() -> LlmError {
    LlmError::ApiError {
        status: 503,
        message: "overloaded".to_string(),
    }
}

// =============================================================================
// Plan Generation
// =============================================================================

#[tokio::test]
async fn test_plan_my_monday_all_succeed() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|style| Ok(CompletionResponse::text(plan_json(style, task_count(style)))));
    let planner = generator(&state, llm.clone(), GeneratorOptions::default());

    let report = planner.run_goal("Plan my Monday").await.unwrap().expect("generation should start");
    assert_eq!(llm.calls(), 3);
    assert_eq!(report.completed(), 3);

    let snapshot = state.snapshot().await.unwrap();
    assert!(!snapshot.busy);
    assert_eq!(snapshot.sessions.len(), 1);

    let session = snapshot.current_session().unwrap();
    assert_eq!(session.prompt, "Plan my Monday");
    let styles: Vec<&str> = session.artifacts.iter().map(|a| a.style_name.as_str()).collect();
    assert_eq!(styles, PLAN_STYLES.to_vec());

    let mut ids = HashSet::new();
    for artifact in &session.artifacts {
        assert_eq!(artifact.status, ArtifactStatus::Complete);
        assert_eq!(artifact.tasks.len(), task_count(&artifact.style_name));
        assert_eq!(artifact.summary, format!("{} summary", artifact.style_name));
        assert_eq!(artifact.tasks[0].priority, Priority::High);
        for task in &artifact.tasks {
            assert!(ids.insert(task.id.clone()), "task ids must be unique");
        }
    }

    let history = snapshot.notifications.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, ARCHITECTED_MESSAGE);
    assert_eq!(history[0].kind, NotificationKind::Success);
}

#[tokio::test]
async fn test_invalid_json_leaves_slot_streaming() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|style| {
        if style == PLAN_STYLES[1] {
            Ok(CompletionResponse::text("{ this is not a plan"))
        } else {
            Ok(CompletionResponse::text(plan_json(style, 2)))
        }
    });
    let planner = generator(&state, llm, GeneratorOptions::default());

    planner.run_goal("Plan my Monday").await.unwrap().unwrap();

    let snapshot = state.snapshot().await.unwrap();
    assert!(!snapshot.busy, "busy must clear even with a failed slot");
    let session = snapshot.current_session().unwrap();
    assert_eq!(session.artifacts[0].status, ArtifactStatus::Complete);
    assert_eq!(session.artifacts[1].status, ArtifactStatus::Streaming);
    assert!(session.artifacts[1].tasks.is_empty());
    assert_eq!(session.artifacts[2].status, ArtifactStatus::Complete);

    // A parse failure is not an outage
    let history = snapshot.notifications.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, ARCHITECTED_MESSAGE);
}

#[tokio::test]
async fn test_invalid_json_marked_error_when_configured() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|style| {
        if style == PLAN_STYLES[1] {
            Ok(CompletionResponse::text("nope"))
        } else {
            Ok(CompletionResponse::text(plan_json(style, 2)))
        }
    });
    let options = GeneratorOptions {
        mark_failed_artifacts: true,
        ..Default::default()
    };
    generator(&state, llm, options).run_goal("Plan my Monday").await.unwrap().unwrap();

    let snapshot = state.snapshot().await.unwrap();
    let session = snapshot.current_session().unwrap();
    assert_eq!(session.artifacts[1].status, ArtifactStatus::Error);
    assert!(session.is_settled());
}

#[tokio::test]
async fn test_all_requests_fail_emits_one_unavailable_notification() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|_| Err(unavailable()));
    let planner = generator(&state, llm, GeneratorOptions::default());

    let report = planner.run_goal("Plan my Monday").await.unwrap().unwrap();
    assert!(report.all_unavailable());

    let snapshot = state.snapshot().await.unwrap();
    assert!(!snapshot.busy);
    let session = snapshot.current_session().unwrap();
    assert_eq!(session.count_status(ArtifactStatus::Streaming), 3);

    let history = snapshot.notifications.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, UNAVAILABLE_MESSAGE);
    assert_eq!(history[0].kind, NotificationKind::Overdue);
}

#[tokio::test]
async fn test_empty_replies_are_not_an_outage() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|_| Err(LlmError::InvalidResponse("Response contained no candidates".to_string())));

    let report = generator(&state, llm, GeneratorOptions::default())
        .run_goal("Plan my Monday")
        .await
        .unwrap()
        .unwrap();
    assert!(!report.all_unavailable());
    assert_eq!(report.completed(), 0);

    let snapshot = state.snapshot().await.unwrap();
    assert!(!snapshot.busy);
    let session = snapshot.current_session().unwrap();
    assert_eq!(session.count_status(ArtifactStatus::Streaming), 3);

    let history = snapshot.notifications.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, ARCHITECTED_MESSAGE);
    assert_eq!(history[0].kind, NotificationKind::Success);
}

#[tokio::test]
async fn test_partial_outage_is_still_success() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|style| {
        if style == PLAN_STYLES[0] {
            Ok(CompletionResponse::text(plan_json(style, 1)))
        } else {
            Err(unavailable())
        }
    });

    let report = generator(&state, llm, GeneratorOptions::default())
        .run_goal("Plan my Monday")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.completed(), 1);
    assert_eq!(report.notification.message, ARCHITECTED_MESSAGE);
}

#[tokio::test]
async fn test_busy_rejects_second_goal() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|style| Ok(CompletionResponse::text(plan_json(style, 1))));
    let planner = generator(&state, llm.clone(), GeneratorOptions::default());

    let first = planner.submit_goal("Plan my Monday").await.unwrap();
    assert!(first.is_some());
    assert!(state.snapshot().await.unwrap().busy);

    let second = planner.submit_goal("Plan my Tuesday").await.unwrap();
    assert!(second.is_none(), "a goal submitted while busy is ignored");

    let blank = planner.submit_goal("   ").await.unwrap();
    assert!(blank.is_none());

    // Wait for the first generation to settle
    let mut events = state.subscribe_events();
    while state.snapshot().await.unwrap().busy {
        let _ = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
    }
    let snapshot = state.snapshot().await.unwrap();
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(llm.calls(), 3);
}

// =============================================================================
// Task Board
// =============================================================================

#[tokio::test]
async fn test_sync_twice_grows_board_with_disjoint_ids() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let llm = StyleScriptedClient::new(|style| Ok(CompletionResponse::text(plan_json(style, task_count(style)))));
    generator(&state, llm, GeneratorOptions::default())
        .run_goal("Plan my Monday")
        .await
        .unwrap()
        .unwrap();

    let snapshot = state.snapshot().await.unwrap();
    let artifact = snapshot.current_session().unwrap().artifacts[1].clone();
    let before = snapshot.tasks.len();

    let first = state.sync_artifact(&artifact.id).await.unwrap();
    let second = state.sync_artifact(&artifact.id).await.unwrap();
    assert_eq!(first.len(), artifact.tasks.len());

    let snapshot = state.snapshot().await.unwrap();
    assert_eq!(snapshot.tasks.len(), before + 2 * artifact.tasks.len());

    let board_ids: HashSet<&str> = snapshot.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(board_ids.len(), snapshot.tasks.len(), "board ids must be unique");
    for task in first.iter().chain(second.iter()) {
        assert!(artifact.tasks.iter().all(|a| a.id != task.id));
        assert!(!task.completed);
    }

    let session = snapshot.current_session().unwrap();
    assert_eq!(session.selected_plan_id.as_deref(), Some(artifact.id.as_str()));
    // Newest sync sits at the top
    assert_eq!(snapshot.tasks[0].id, second[0].id);
}

#[tokio::test]
async fn test_board_survives_restart() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    {
        let state = spawn_state(&temp);
        state
            .add_task(Task::new("Water the plants").with_priority(Priority::Low))
            .await
            .unwrap();
        state.shutdown().await.unwrap();
    }

    let state = spawn_state(&temp);
    let snapshot = state.snapshot().await.unwrap();
    assert_eq!(snapshot.tasks.len(), default_tasks().len() + 1);
    assert_eq!(snapshot.tasks[0].text, "Water the plants");
    assert_eq!(snapshot.tasks[0].due_date.as_deref(), Some("Today"));
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_malformed_slice_falls_back_alone() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    {
        let state = spawn_state(&temp);
        state.add_task(Task::new("Keep me")).await.unwrap();
        let mut profile = state.snapshot().await.unwrap().profile.clone();
        profile.name = "Ada".to_string();
        state.update_profile(profile).await.unwrap();
        state.shutdown().await.unwrap();
    }

    let store = SliceStore::open(temp.path().join("store")).unwrap();
    store.write_raw(PROFILE_KEY, "{ definitely not json").unwrap();
    store.write_raw(SESSIONS_KEY, "[]").unwrap();

    let state = spawn_state(&temp);
    let snapshot = state.snapshot().await.unwrap();
    assert_eq!(snapshot.profile.name, "User", "corrupt profile falls back to default");
    assert_eq!(snapshot.tasks[0].text, "Keep me", "tasks slice is untouched");
    assert!(snapshot.sessions.is_empty());

    // The store still holds the tasks written before
    assert!(store.read_raw(TASKS_KEY).unwrap().unwrap().contains("Keep me"));
}

// =============================================================================
// Notifications
// =============================================================================

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_staggered_toasts_expire_independently() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = StateManager::spawn(
        temp.path(),
        StateOptions {
            toast_ttl: Duration::from_millis(5000),
        },
    )
    .unwrap();

    state.notify("first", NotificationKind::Success).await.unwrap();
    tokio::time::advance(Duration::from_millis(2000)).await;
    state.notify("second", NotificationKind::Reminder).await.unwrap();

    tokio::time::advance(Duration::from_millis(3001)).await;
    settle().await;
    let snapshot = state.snapshot().await.unwrap();
    let active: Vec<&str> = snapshot.notifications.active().iter().map(|n| n.message.as_str()).collect();
    assert_eq!(active, vec!["second"]);

    tokio::time::advance(Duration::from_millis(2000)).await;
    settle().await;
    let snapshot = state.snapshot().await.unwrap();
    assert!(snapshot.notifications.active().is_empty());
    let history: Vec<&str> = snapshot.notifications.history().iter().map(|n| n.message.as_str()).collect();
    assert_eq!(history, vec!["first", "second"]);
}

// =============================================================================
// Voice Bridge
// =============================================================================

struct OneShotConnector {
    transport: Mutex<Option<ChannelTransport>>,
}

#[async_trait]
impl LiveConnector for OneShotConnector {
    async fn connect(&self) -> Result<Box<dyn LiveTransport>, VoiceError> {
        self.transport
            .lock()
            .unwrap()
            .take()
            .map(|t| Box::new(t) as Box<dyn LiveTransport>)
            .ok_or_else(|| VoiceError::Transport("no more connections".to_string()))
    }
}

fn server_message(value: serde_json::Value) -> ServerMessage {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_voice_tool_calls_update_state_before_ack() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn_state(&temp);
    let (transport, mut sent, inbound) = ChannelTransport::pair();
    let connector = Arc::new(OneShotConnector {
        transport: Mutex::new(Some(transport)),
    });
    let mut voice = VoiceController::new(
        state.clone(),
        connector,
        Arc::new(PromptLoader::embedded_only()),
        Default::default(),
    );

    let (_mic, mic_reader) = tokio::io::duplex(1024);
    voice
        .activate(
            Box::new(PcmReaderSource::from_reader(mic_reader)),
            Box::new(PcmWriterSink::new(Vec::new(), 24_000)),
        )
        .await
        .unwrap();
    assert!(voice.is_active());
    assert!(matches!(sent.recv().await, Some(ClientMessage::Setup(_))));

    inbound
        .send(server_message(json!({ "toolCall": { "functionCalls": [
            { "id": "call-1", "name": "addTask", "args": { "text": "Book flights", "priority": "high" } }
        ] } })))
        .unwrap();
    match sent.recv().await {
        Some(ClientMessage::ToolResponse(ack)) => {
            assert_eq!(ack.function_responses[0].id, "call-1");
            assert_eq!(ack.function_responses[0].response, json!({ "ok": true }));
        }
        other => panic!("expected tool response, got {:?}", other),
    }
    let snapshot = state.snapshot().await.unwrap();
    assert_eq!(snapshot.tasks[0].text, "Book flights");
    assert_eq!(snapshot.tasks[0].priority, Priority::High);

    inbound
        .send(server_message(json!({ "toolCall": { "functionCalls": [
            { "id": "call-2", "name": "updateHealth", "args": { "waterIntake": 2100 } }
        ] } })))
        .unwrap();
    assert!(matches!(sent.recv().await, Some(ClientMessage::ToolResponse(_))));
    assert_eq!(state.snapshot().await.unwrap().health.water_intake, 2100);

    // The service hanging up ends the session
    drop(inbound);
    let summary = voice.wait().await.unwrap().unwrap();
    assert_eq!(summary.end, SessionEnd::Closed);
    assert_eq!(summary.tool_calls, 2);
    assert!(!voice.is_active());

    let messages: Vec<String> = state
        .snapshot()
        .await
        .unwrap()
        .notifications
        .history()
        .iter()
        .map(|n| n.message.clone())
        .collect();
    assert_eq!(messages[0], ACTIVATED_MESSAGE);
    assert!(messages.contains(&"Task Added: Book flights".to_string()));
}
