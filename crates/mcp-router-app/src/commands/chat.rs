//! `mcp-router chat`: one exchange, streamed to the terminal.

use mcp_router_agent::{ExchangeOutcome, ExchangeRequest};
use mcp_router_common::{
    Event, FinishReason, RouterError, SessionKey, StopRequest, StreamEvent, ToolInvocationState,
};
use mcp_router_platform::PlatformApi;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::boot::Runtime;
use crate::cli::ChatArgs;

const DEFAULT_SOURCE: &str = "cli";

/// Turns cumulative chunk snapshots into terminal output.
#[derive(Default)]
struct Printer {
    printed: HashMap<String, usize>,
    tool_states: HashSet<(String, &'static str)>,
    last_message: Option<String>,
}

fn state_label(state: ToolInvocationState) -> &'static str {
    match state {
        ToolInvocationState::PartialCall => "preparing",
        ToolInvocationState::Call => "called",
        ToolInvocationState::Result => "done",
    }
}

impl Printer {
    fn render(&mut self, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::Start { .. } | StreamEvent::Error { .. } => None,
            StreamEvent::Chunk { text, message_id } => {
                let mut out = String::new();
                if self.last_message.as_ref().is_some_and(|m| m != message_id) {
                    out.push('\n');
                }
                let already = self.printed.get(message_id).copied().unwrap_or(0);
                match text.get(already..) {
                    Some(delta) => out.push_str(delta),
                    None => {
                        // Snapshot shrank or was rewritten; print it whole.
                        out.push('\n');
                        out.push_str(text);
                    }
                }
                self.printed.insert(message_id.clone(), text.len());
                self.last_message = Some(message_id.clone());
                (!out.is_empty()).then_some(out)
            }
            StreamEvent::ToolInvocation { message, .. } => {
                let mut out = String::new();
                for call in message.tool_invocations() {
                    let label = state_label(call.state);
                    if self.tool_states.insert((call.tool_call_id.clone(), label)) {
                        out.push_str(&format!("\n[tool {} {label}]", call.tool_name));
                    }
                }
                if out.is_empty() {
                    return None;
                }
                out.push('\n');
                self.last_message = None;
                Some(out)
            }
            StreamEvent::End { .. } => Some("\n".to_string()),
        }
    }
}

pub async fn run(runtime: &Runtime, args: ChatArgs) -> Result<ExitCode, RouterError> {
    let platform = runtime.platform()?;
    let agent = platform
        .agents()
        .get(&args.agent)
        .await?
        .ok_or_else(|| RouterError::Other(format!("agent not found: {}", args.agent)))?;

    let history = match &args.session {
        Some(id) => {
            runtime
                .ctx
                .sessions()?
                .get(id)?
                .ok_or_else(|| RouterError::Other(format!("session not found: {id}")))?
                .messages
        }
        None => Vec::new(),
    };

    for server_id in agent.tool_permissions.keys() {
        match runtime.local.servers().start(server_id).await {
            Ok(_) => debug!(server_id = %server_id, "server ready"),
            Err(e) => warn!(server_id = %server_id, error = %e, "server unavailable for this chat"),
        }
    }

    let coordinator = runtime.coordinator()?;
    let key = SessionKey::new();
    let mut events = runtime.bus.subscribe();
    let printer_key = key.clone();
    let printer = tokio::spawn(async move {
        let mut printer = Printer::default();
        let mut stdout = std::io::stdout();
        loop {
            match events.recv().await {
                Ok(Event::Stream(envelope)) if envelope.session_key == printer_key => {
                    if let StreamEvent::Error { message } = &envelope.event {
                        eprintln!("error: {message}");
                    } else if let Some(text) = printer.render(&envelope.event) {
                        let _ = stdout.write_all(text.as_bytes());
                        let _ = stdout.flush();
                    }
                }
                Ok(Event::SessionCompleted(done)) if done == printer_key => break,
                Ok(Event::Shutdown) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "output lagged"),
            }
        }
    });

    let request = ExchangeRequest {
        session_key: key.clone(),
        agent_id: agent.id.clone(),
        agent,
        query: args.query.join(" "),
        auth_token: runtime.auth.auth_token(),
        history,
        chat_history_session_id: args.session,
        source: Some(args.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string())),
    };
    let agent_id = request.agent_id.clone();

    let exchange = coordinator.run(request);
    tokio::pin!(exchange);
    let mut stop_sent = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut exchange => break outcome,
            signal = tokio::signal::ctrl_c(), if !stop_sent => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                stop_sent = true;
                runtime.bus.publish(Event::StopRequested(StopRequest {
                    agent_id: agent_id.clone(),
                }));
            }
        }
    };

    // The completion hook skips ignored exchanges; close the printer either way.
    runtime.bus.publish(Event::SessionCompleted(key));
    let _ = printer.await;

    let code = match outcome? {
        ExchangeOutcome::Completed {
            finish_reason,
            session_id,
        } => {
            if let Some(id) = session_id {
                eprintln!("saved session {id}");
            }
            if finish_reason == FinishReason::Stop {
                ExitCode::SUCCESS
            } else {
                eprintln!("finished: {finish_reason}");
                ExitCode::from(2)
            }
        }
        ExchangeOutcome::Stopped => {
            eprintln!("stopped");
            ExitCode::from(130)
        }
        ExchangeOutcome::Errored(_) => ExitCode::FAILURE,
        ExchangeOutcome::Ignored => ExitCode::SUCCESS,
    };
    Ok(code)
}
