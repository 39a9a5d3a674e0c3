use super::*;
use crate::engine::{EngineConversation, EngineEvent, EngineRequest, ToolResultSubmission};
use crate::error::{EngineError, PersistenceError};
use crate::sinks::StopSubscription;
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use mcp_router_common::{
    ChatMessage, Event, EventBus, MessagePart, NotificationType, Role, Session, StopRequest,
    StreamEnvelope, StreamEvent, ToolCall, ToolInvocation, ToolInvocationState, ToolPermission,
    UiMessage, UiRole,
};
use mcp_router_store::{Database, SessionRepository};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// -- scripted engine ------------------------------------------------------

#[derive(Clone)]
enum Step {
    Event(EngineEvent),
    /// Never yields another event.
    Hang,
}

#[derive(Default)]
struct Recorded {
    agent_ids: Vec<String>,
    tool_names: Vec<String>,
    initial_lens: Vec<usize>,
    appended: Vec<UiMessage>,
    tool_results: Vec<ToolResultSubmission>,
}

#[derive(Default)]
struct ScriptedEngine {
    script: Vec<Step>,
    fail_connect: bool,
    fail_append: bool,
    recorded: Arc<Mutex<Recorded>>,
}

struct ScriptedConversation {
    steps: VecDeque<Step>,
    fail_append: bool,
    aborted: bool,
    recorded: Arc<Mutex<Recorded>>,
}

#[async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn connect(
        &self,
        request: EngineRequest,
    ) -> Result<Box<dyn EngineConversation>, EngineError> {
        if self.fail_connect {
            return Err(EngineError::NetworkError("connection refused".into()));
        }
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.agent_ids.push(request.agent_id.clone());
            recorded
                .tool_names
                .extend(request.tools.iter().map(|t| t.name.clone()));
            recorded.initial_lens.push(request.initial_messages.len());
        }
        Ok(Box::new(ScriptedConversation {
            steps: self.script.iter().cloned().collect(),
            fail_append: self.fail_append,
            aborted: false,
            recorded: self.recorded.clone(),
        }))
    }
}

#[async_trait]
impl EngineConversation for ScriptedConversation {
    async fn append(&mut self, message: UiMessage) -> Result<(), EngineError> {
        if self.fail_append {
            return Err(EngineError::Unauthorized);
        }
        self.recorded.lock().unwrap().appended.push(message);
        Ok(())
    }

    async fn add_tool_result(
        &mut self,
        submission: ToolResultSubmission,
    ) -> Result<(), EngineError> {
        self.recorded.lock().unwrap().tool_results.push(submission);
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        if self.aborted {
            return None;
        }
        match self.steps.front() {
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                None
            }
            Some(Step::Event(_)) => match self.steps.pop_front() {
                Some(Step::Event(event)) => Some(event),
                _ => None,
            },
            None => None,
        }
    }
}

// -- sinks ----------------------------------------------------------------

struct RecordingTransport {
    bus: EventBus,
    emitted: Mutex<Vec<StreamEnvelope>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            bus: EventBus::new(64),
            emitted: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<StreamEnvelope> {
        self.emitted.lock().unwrap().clone()
    }

    fn request_stop(&self, agent_id: &str) {
        self.bus.publish(Event::StopRequested(StopRequest {
            agent_id: agent_id.into(),
        }));
    }
}

impl TransportSink for RecordingTransport {
    fn emit(&self, envelope: StreamEnvelope) {
        self.emitted.lock().unwrap().push(envelope);
    }

    fn subscribe_stop(&self) -> StopSubscription {
        StopSubscription::new(self.bus.subscribe_stops())
    }
}

struct FailingPersistence;

#[async_trait]
impl PersistenceSink for FailingPersistence {
    async fn create_session(
        &self,
        _agent_id: &str,
        _messages: Vec<ChatMessage>,
        _source: &str,
    ) -> Result<Session, PersistenceError> {
        Err(PersistenceError::Store(
            mcp_router_store::StoreError::Poisoned,
        ))
    }

    async fn update_session_messages(
        &self,
        _session_id: &str,
        _messages: Vec<ChatMessage>,
    ) -> Result<Option<Session>, PersistenceError> {
        Ok(None)
    }
}

// -- harness --------------------------------------------------------------

struct Harness {
    coordinator: SessionCoordinator,
    transport: Arc<RecordingTransport>,
    recorded: Arc<Mutex<Recorded>>,
    sessions: SessionRepository,
}

impl Harness {
    fn kinds(&self) -> Vec<&'static str> {
        self.transport
            .events()
            .iter()
            .map(|e| match e.event {
                StreamEvent::Start { .. } => "start",
                StreamEvent::Chunk { .. } => "chunk",
                StreamEvent::ToolInvocation { .. } => "tool",
                StreamEvent::End { .. } => "end",
                StreamEvent::Error { .. } => "error",
            })
            .collect()
    }

    fn last(&self) -> StreamEnvelope {
        self.transport.events().last().cloned().unwrap()
    }

    fn saved_count(&self) -> u64 {
        self.sessions.session_count_by_agent("agent-1").unwrap()
    }
}

fn build(engine: ScriptedEngine, tools: ToolRegistry, settings: CoordinatorSettings) -> Harness {
    let recorded = engine.recorded.clone();
    let transport = Arc::new(RecordingTransport::new());
    let sessions = SessionRepository::new(Database::open_in_memory().unwrap());
    let coordinator = SessionCoordinator::new(
        Arc::new(engine),
        transport.clone(),
        Arc::new(sessions.clone()),
        Arc::new(tools),
    )
    .with_settings(settings);
    Harness {
        coordinator,
        transport,
        recorded,
        sessions,
    }
}

fn harness(script: Vec<Step>) -> Harness {
    build(
        ScriptedEngine {
            script,
            ..Default::default()
        },
        ToolRegistry::new(),
        CoordinatorSettings::default(),
    )
}

fn agent() -> AgentConfig {
    let mut agent = AgentConfig {
        id: "agent-1".into(),
        name: "Helper".into(),
        instructions: "Be helpful.".into(),
        ..Default::default()
    };
    agent.tool_permissions.insert(
        "srv-1".into(),
        vec![ToolPermission {
            tool_name: "lookup".into(),
            description: "Look something up".into(),
            input_schema: json!({"type": "object"}),
            enabled: true,
        }],
    );
    agent
}

fn request(query: &str) -> ExchangeRequest {
    ExchangeRequest {
        session_key: SessionKey::from("bg-1"),
        agent: agent(),
        agent_id: "agent-1".into(),
        query: query.into(),
        auth_token: Some("token".into()),
        history: Vec::new(),
        chat_history_session_id: None,
        source: None,
    }
}

fn snapshot(assistant: UiMessage) -> Step {
    Step::Event(EngineEvent::Messages(vec![
        UiMessage::new("system-1", UiRole::System, "Be helpful."),
        UiMessage::new("u1", UiRole::User, "hi"),
        assistant,
    ]))
}

fn text(content: &str) -> Step {
    snapshot(UiMessage::new("a1", UiRole::Assistant, content))
}

fn finish(reason: FinishReason) -> Step {
    Step::Event(EngineEvent::Finish(reason))
}

fn tool_message(result: Option<Value>, content: &str) -> UiMessage {
    let mut message = UiMessage::new("a1", UiRole::Assistant, content);
    message.parts.push(MessagePart::ToolInvocation {
        tool_invocation: ToolInvocation {
            state: if result.is_some() {
                ToolInvocationState::Result
            } else {
                ToolInvocationState::Call
            },
            tool_call_id: "c1".into(),
            tool_name: "lookup".into(),
            args: json!({"q": "answer"}),
            result,
        },
    });
    message
}

fn tool_script() -> Vec<Step> {
    vec![
        snapshot(tool_message(None, "")),
        Step::Event(EngineEvent::ToolCall(ToolCall {
            id: "c1".into(),
            name: "lookup".into(),
            arguments: json!({"q": "answer"}),
        })),
        snapshot(tool_message(Some(json!(42)), "The answer is 42")),
        finish(FinishReason::Stop),
    ]
}

fn auto_agent_request() -> ExchangeRequest {
    let mut req = request("what is the answer?");
    req.agent.auto_execute_tool = true;
    req
}

// -- tests ----------------------------------------------------------------

#[tokio::test]
async fn stop_finish_streams_and_creates_session() {
    let h = harness(vec![
        text("Hel"),
        text("Hello"),
        finish(FinishReason::Stop),
    ]);
    let outcome = h.coordinator.run(request("hi")).await.unwrap();

    let ExchangeOutcome::Completed {
        finish_reason,
        session_id: Some(session_id),
    } = outcome
    else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(finish_reason, FinishReason::Stop);
    assert_eq!(h.kinds(), vec!["start", "chunk", "chunk", "end"]);

    let end = h.last();
    assert_eq!(end.notification_type, Some(NotificationType::Finish));
    assert_eq!(
        end.event,
        StreamEvent::End {
            finish_reason: FinishReason::Stop,
            can_continue: true
        }
    );

    let session = h.sessions.get(&session_id).unwrap().unwrap();
    assert_eq!(session.agent_id, "agent-1");
    assert_eq!(session.source, "ui");
    assert_eq!(session.messages.len(), 3);
    assert_eq!(session.messages[2].content, "Hello");
    assert!(!h.coordinator.is_live(&SessionKey::from("bg-1")));
}

#[tokio::test]
async fn identical_rerenders_emit_one_chunk() {
    let h = harness(vec![
        text("Hello"),
        text("Hello"),
        text("Hello"),
        finish(FinishReason::Stop),
    ]);
    h.coordinator.run(request("hi")).await.unwrap();
    assert_eq!(h.kinds(), vec!["start", "chunk", "end"]);
}

#[tokio::test]
async fn start_event_carries_query_and_envelope_fields() {
    let h = harness(vec![text("Hi"), finish(FinishReason::Stop)]);
    let mut req = request("  hi  ");
    req.source = Some("cli".into());
    h.coordinator.run(req).await.unwrap();

    let first = h.transport.events()[0].clone();
    assert_eq!(first.event, StreamEvent::Start { query: "hi".into() });
    assert_eq!(first.session_key, SessionKey::from("bg-1"));
    assert_eq!(first.agent_id, "agent-1");
    assert_eq!(first.source.as_deref(), Some("cli"));
    assert!(first.notification_type.is_none());
}

#[tokio::test]
async fn existing_session_is_updated_not_created() {
    let h = harness(vec![text("Hello again"), finish(FinishReason::Stop)]);
    let existing = h
        .sessions
        .create_session(
            "agent-1",
            vec![ChatMessage::new(Role::User, "earlier")],
            "ui",
            mcp_router_common::SessionStatus::Completed,
        )
        .unwrap();

    let mut req = request("hi");
    req.chat_history_session_id = Some(existing.id.clone());
    let outcome = h.coordinator.run(req).await.unwrap();

    assert_eq!(
        outcome,
        ExchangeOutcome::Completed {
            finish_reason: FinishReason::Stop,
            session_id: Some(existing.id.clone()),
        }
    );
    assert_eq!(h.saved_count(), 1);
    let session = h.sessions.get(&existing.id).unwrap().unwrap();
    assert_eq!(session.messages.len(), 3);
    assert_eq!(session.messages[2].content, "Hello again");
}

#[tokio::test]
async fn non_stop_finish_reasons_do_not_persist() {
    for reason in [
        FinishReason::Length,
        FinishReason::ContentFilter,
        FinishReason::ToolCalls,
        FinishReason::Error,
        FinishReason::Other,
        FinishReason::Unknown,
    ] {
        let h = harness(vec![text("partial"), finish(reason)]);
        let outcome = h.coordinator.run(request("hi")).await.unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::Completed {
                finish_reason: reason,
                session_id: None,
            }
        );
        let end = h.last();
        assert_eq!(
            end.event,
            StreamEvent::End {
                finish_reason: reason,
                can_continue: false
            }
        );
        assert!(end.notification_type.is_none());
        assert_eq!(h.saved_count(), 0, "{reason} must not persist");
        assert!(!h.coordinator.is_live(&SessionKey::from("bg-1")));
    }
}

#[tokio::test]
async fn stop_request_for_own_agent_ends_exchange() {
    let h = harness(vec![text("Thinking"), Step::Hang]);
    let key = SessionKey::from("bg-1");

    let run = h.coordinator.run(request("hi"));
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.transport.request_stop("someone-else");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.coordinator.is_live(&key), "foreign stop must be ignored");
        h.transport.request_stop("agent-1");
    };
    let (outcome, ()) = tokio::join!(run, stopper);

    assert_eq!(outcome.unwrap(), ExchangeOutcome::Stopped);
    assert_eq!(h.kinds(), vec!["start", "chunk", "end"]);
    assert_eq!(
        h.last().event,
        StreamEvent::End {
            finish_reason: FinishReason::Stop,
            can_continue: false
        }
    );
    assert!(h.last().notification_type.is_none());
    assert_eq!(h.saved_count(), 0);
    assert!(!h.coordinator.is_live(&key));
}

#[tokio::test]
async fn stop_during_slow_tool_survives_other_traffic() {
    let mut tools = ToolRegistry::new();
    tools.register("lookup", |_| async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(json!(42))
    });
    let h = build(
        ScriptedEngine {
            script: tool_script(),
            ..Default::default()
        },
        tools,
        CoordinatorSettings {
            response_timeout: Duration::from_millis(500),
            ..Default::default()
        },
    );

    let run = h.coordinator.run(auto_agent_request());
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.transport.request_stop("agent-1");
        // More than the bus capacity, published while the tool is still running.
        for i in 0..100 {
            h.transport
                .bus
                .publish(Event::WorkspaceSwitched(format!("ws-{i}")));
        }
    };
    let (outcome, ()) = tokio::join!(run, stopper);

    assert_eq!(outcome.unwrap(), ExchangeOutcome::Stopped);
    assert_eq!(h.kinds(), vec!["start", "tool", "end"]);
    assert!(h.recorded.lock().unwrap().tool_results.is_empty());
    assert_eq!(h.saved_count(), 0);
}

#[tokio::test]
async fn same_query_twice_appends_once() {
    let h = harness(vec![text("Hello"), finish(FinishReason::Stop)]);
    let first = h.coordinator.run(request("hi")).await.unwrap();
    let second = h.coordinator.run(request("hi")).await.unwrap();

    assert!(matches!(first, ExchangeOutcome::Completed { .. }));
    assert_eq!(second, ExchangeOutcome::Ignored);
    assert_eq!(h.recorded.lock().unwrap().appended.len(), 1);
}

#[tokio::test]
async fn surrounding_whitespace_does_not_make_a_new_query() {
    let h = harness(vec![text("Hello"), finish(FinishReason::Stop)]);
    h.coordinator.run(request("hi")).await.unwrap();
    let again = h.coordinator.run(request("  hi \n")).await.unwrap();

    assert_eq!(again, ExchangeOutcome::Ignored);
    assert_eq!(h.recorded.lock().unwrap().appended.len(), 1);
}

#[tokio::test]
async fn concurrent_queries_on_one_key() {
    let h = harness(vec![Step::Hang]);

    let run = h.coordinator.run(request("first"));
    let probe = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let duplicate = h.coordinator.run(request("first")).await.unwrap();
        let busy = h.coordinator.run(request("second")).await.unwrap_err();
        h.transport.request_stop("agent-1");
        (duplicate, busy)
    };
    let (outcome, (duplicate, busy)) = tokio::join!(run, probe);

    assert_eq!(outcome.unwrap(), ExchangeOutcome::Stopped);
    assert_eq!(duplicate, ExchangeOutcome::Ignored);
    assert!(matches!(busy, CoordinatorError::SessionBusy(_)));
    assert_eq!(h.recorded.lock().unwrap().appended.len(), 1);
}

#[tokio::test]
async fn auto_executed_tool_result_is_submitted() {
    let mut tools = ToolRegistry::new();
    tools.register("lookup", |_| async { Ok(json!(42)) });
    let h = build(
        ScriptedEngine {
            script: tool_script(),
            ..Default::default()
        },
        tools,
        CoordinatorSettings::default(),
    );

    let outcome = h.coordinator.run(auto_agent_request()).await.unwrap();

    let recorded = h.recorded.lock().unwrap();
    assert_eq!(
        recorded.tool_results,
        vec![ToolResultSubmission {
            tool_call_id: "c1".into(),
            result: json!(42),
        }]
    );
    drop(recorded);
    assert_eq!(h.kinds(), vec!["start", "tool", "tool", "end"]);

    let ExchangeOutcome::Completed {
        session_id: Some(id),
        ..
    } = outcome
    else {
        panic!("expected a saved session");
    };
    let session = h.sessions.get(&id).unwrap().unwrap();
    let results = session.messages[2].tool_results.as_ref().unwrap();
    assert_eq!(results[0].content, json!(42));
}

#[tokio::test]
async fn tool_failures_become_error_results() {
    let mut tools = ToolRegistry::new();
    tools.register("lookup", |_| async { Err(String::new()) });
    let h = build(
        ScriptedEngine {
            script: tool_script(),
            ..Default::default()
        },
        tools,
        CoordinatorSettings::default(),
    );
    h.coordinator.run(auto_agent_request()).await.unwrap();
    assert_eq!(
        h.recorded.lock().unwrap().tool_results[0].result,
        json!({"error": "Tool execution failed"})
    );

    // No handler registered at all.
    let h = harness(tool_script());
    h.coordinator.run(auto_agent_request()).await.unwrap();
    assert_eq!(
        h.recorded.lock().unwrap().tool_results[0].result,
        json!({"error": "tool not found: lookup"})
    );
}

#[tokio::test]
async fn slow_tool_times_out_into_error_result() {
    let mut tools = ToolRegistry::new();
    tools.register("lookup", |_| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!(1))
    });
    let h = build(
        ScriptedEngine {
            script: tool_script(),
            ..Default::default()
        },
        tools,
        CoordinatorSettings {
            tool_timeout: Duration::from_millis(30),
            ..Default::default()
        },
    );
    h.coordinator.run(auto_agent_request()).await.unwrap();
    let result = h.recorded.lock().unwrap().tool_results[0].result.clone();
    assert!(result["error"]
        .as_str()
        .unwrap()
        .starts_with("tool execution timed out"));
}

#[tokio::test]
async fn manual_tools_are_not_executed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut tools = ToolRegistry::new();
    tools.register("lookup", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(json!(42)) }
    });
    let h = build(
        ScriptedEngine {
            script: tool_script(),
            ..Default::default()
        },
        tools,
        CoordinatorSettings::default(),
    );
    h.coordinator.run(request("hi")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(h.recorded.lock().unwrap().tool_results.is_empty());
}

#[tokio::test]
async fn append_failure_emits_error_without_end() {
    let h = build(
        ScriptedEngine {
            script: vec![text("never"), finish(FinishReason::Stop)],
            fail_append: true,
            ..Default::default()
        },
        ToolRegistry::new(),
        CoordinatorSettings::default(),
    );
    let outcome = h.coordinator.run(request("hi")).await.unwrap();

    assert!(matches!(outcome, ExchangeOutcome::Errored(_)));
    assert_eq!(h.kinds(), vec!["start", "error"]);
    assert_eq!(h.last().notification_type, Some(NotificationType::Error));
    assert!(!h.coordinator.is_live(&SessionKey::from("bg-1")));
}

#[tokio::test]
async fn connect_failure_emits_error() {
    let h = build(
        ScriptedEngine {
            fail_connect: true,
            ..Default::default()
        },
        ToolRegistry::new(),
        CoordinatorSettings::default(),
    );
    h.coordinator.run(request("hi")).await.unwrap();
    assert_eq!(h.kinds(), vec!["start", "error"]);
}

#[tokio::test]
async fn history_is_prefixed_with_system_message() {
    let h = harness(vec![text("ok"), finish(FinishReason::Stop)]);
    let mut req = request("hi");
    req.history = (0..100)
        .map(|i| ChatMessage::new(Role::User, format!("m{i}")))
        .collect();
    h.coordinator.run(req).await.unwrap();

    let recorded = h.recorded.lock().unwrap();
    assert_eq!(recorded.initial_lens, vec![101]);
    assert_eq!(recorded.tool_names, vec!["lookup"]);
    assert_eq!(recorded.appended[0].content, "hi");
}

#[tokio::test]
async fn server_agent_id_is_sent_to_engine() {
    let h = harness(vec![finish(FinishReason::Stop)]);
    let mut req = request("hi");
    req.agent.server_agent_id = Some("remote-agent".into());
    h.coordinator.run(req).await.unwrap();
    assert_eq!(h.recorded.lock().unwrap().agent_ids, vec!["remote-agent"]);
}

#[tokio::test]
async fn silent_engine_times_out() {
    let h = build(
        ScriptedEngine {
            script: vec![Step::Hang],
            ..Default::default()
        },
        ToolRegistry::new(),
        CoordinatorSettings {
            response_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let outcome = h.coordinator.run(request("hi")).await.unwrap();

    let ExchangeOutcome::Errored(message) = outcome else {
        panic!("expected timeout error");
    };
    assert!(message.starts_with("no response from completion engine"));
    assert_eq!(h.kinds(), vec!["start", "error"]);
    assert!(!h.coordinator.is_live(&SessionKey::from("bg-1")));
}

#[tokio::test]
async fn closed_stream_is_an_error() {
    let h = harness(vec![text("partial")]);
    let outcome = h.coordinator.run(request("hi")).await.unwrap();
    assert_eq!(
        outcome,
        ExchangeOutcome::Errored("completion stream closed unexpectedly".into())
    );
    assert_eq!(h.kinds(), vec!["start", "chunk", "error"]);
}

#[tokio::test]
async fn engine_error_is_forwarded() {
    let h = harness(vec![Step::Event(EngineEvent::Error("overloaded".into()))]);
    h.coordinator.run(request("hi")).await.unwrap();
    assert_eq!(
        h.last().event,
        StreamEvent::Error {
            message: "overloaded".into()
        }
    );
}

#[tokio::test]
async fn save_failure_follows_end_with_error() {
    let transport = Arc::new(RecordingTransport::new());
    let coordinator = SessionCoordinator::new(
        Arc::new(ScriptedEngine {
            script: vec![text("Hello"), finish(FinishReason::Stop)],
            ..Default::default()
        }),
        transport.clone(),
        Arc::new(FailingPersistence),
        Arc::new(ToolRegistry::new()),
    );
    let outcome = coordinator.run(request("hi")).await.unwrap();

    let ExchangeOutcome::Errored(message) = outcome else {
        panic!("expected save failure");
    };
    assert!(message.starts_with("Session save failed:"));
    let events = transport.events();
    let n = events.len();
    assert!(matches!(events[n - 2].event, StreamEvent::End { .. }));
    assert!(matches!(events[n - 1].event, StreamEvent::Error { .. }));
    assert_eq!(
        events[n - 1].notification_type,
        Some(NotificationType::Error)
    );
    assert!(!coordinator.is_live(&SessionKey::from("bg-1")));
}

#[tokio::test]
async fn missing_session_on_update_is_a_save_failure() {
    let h = harness(vec![text("Hello"), finish(FinishReason::Stop)]);
    let mut req = request("hi");
    req.chat_history_session_id = Some("gone".into());
    let outcome = h.coordinator.run(req).await.unwrap();
    assert_eq!(
        outcome,
        ExchangeOutcome::Errored("Session save failed: session not found: gone".into())
    );
    assert_eq!(h.saved_count(), 0);
}

#[tokio::test]
async fn completion_hook_runs_once_per_exchange() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let transport = Arc::new(RecordingTransport::new());
    let coordinator = SessionCoordinator::new(
        Arc::new(ScriptedEngine {
            script: vec![text("Hello"), finish(FinishReason::Length)],
            ..Default::default()
        }),
        transport,
        Arc::new(FailingPersistence),
        Arc::new(ToolRegistry::new()),
    )
    .with_completion_hook(move |key| {
        assert_eq!(key.as_str(), "bg-1");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    coordinator.run(request("one")).await.unwrap();
    coordinator.run(request("two")).await.unwrap();
    coordinator.run(request("two")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn blank_query_is_rejected() {
    let h = harness(Vec::new());
    let err = h.coordinator.run(request("   ")).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::EmptyQuery));
    assert!(h.transport.events().is_empty());
}
