//! Line-oriented data stream parser.
//!
//! The completion endpoint answers with one part per line, each written as
//! `<code>:<json>`. Codes this router understands are mapped to
//! `StreamPart`; unknown codes are skipped so newer servers stay readable.

use futures_util::{Stream, StreamExt};
use mcp_router_common::FinishReason;
use serde::Deserialize;
use serde_json::Value;
use std::pin::Pin;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::error::EngineError;

/// A single decoded part of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    Text(String),
    ToolCallStreamingStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    StartStep {
        message_id: Option<String>,
    },
    FinishStep {
        finish_reason: FinishReason,
        is_continued: bool,
    },
    FinishMessage {
        finish_reason: FinishReason,
    },
    Error(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallPayload {
    tool_call_id: String,
    tool_name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultPayload {
    tool_call_id: String,
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartStepPayload {
    #[serde(default)]
    message_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    is_continued: bool,
}

fn decode<T: serde::de::DeserializeOwned>(code: &str, body: &str) -> Result<T, EngineError> {
    serde_json::from_str(body)
        .map_err(|e| EngineError::ParseError(format!("part {code}: {e}")))
}

fn finish_reason(raw: Option<String>) -> FinishReason {
    raw.as_deref()
        .map(FinishReason::parse)
        .unwrap_or(FinishReason::Unknown)
}

/// Parse one line. `Ok(None)` for blank lines and unknown codes.
pub fn parse_line(line: &str) -> Result<Option<StreamPart>, EngineError> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return Ok(None);
    }
    let Some((code, body)) = line.split_once(':') else {
        return Err(EngineError::ParseError(format!(
            "missing part code in line: {line}"
        )));
    };

    let part = match code {
        "0" => StreamPart::Text(decode(code, body)?),
        "b" => {
            let p: ToolCallPayload = decode(code, body)?;
            StreamPart::ToolCallStreamingStart {
                tool_call_id: p.tool_call_id,
                tool_name: p.tool_name,
            }
        }
        "9" => {
            let p: ToolCallPayload = decode(code, body)?;
            StreamPart::ToolCall {
                tool_call_id: p.tool_call_id,
                tool_name: p.tool_name,
                args: p.args,
            }
        }
        "a" => {
            let p: ToolResultPayload = decode(code, body)?;
            StreamPart::ToolResult {
                tool_call_id: p.tool_call_id,
                result: p.result,
            }
        }
        "f" => {
            let p: StartStepPayload = decode(code, body)?;
            StreamPart::StartStep {
                message_id: p.message_id,
            }
        }
        "e" => {
            let p: FinishPayload = decode(code, body)?;
            StreamPart::FinishStep {
                finish_reason: finish_reason(p.finish_reason),
                is_continued: p.is_continued,
            }
        }
        "d" => {
            let p: FinishPayload = decode(code, body)?;
            StreamPart::FinishMessage {
                finish_reason: finish_reason(p.finish_reason),
            }
        }
        "3" => StreamPart::Error(decode(code, body)?),
        _ => return Ok(None),
    };
    Ok(Some(part))
}

pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, std::io::Error>> + Send>>;

/// Turn a streaming response body into a stream of text lines.
pub fn response_lines(response: reqwest::Response) -> LineStream {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));

    let lines = futures_util::stream::unfold(reader.lines(), |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok(line), lines)),
            Ok(None) => None,
            Err(e) => Some((Err(e), lines)),
        }
    });
    Box::pin(lines)
}
