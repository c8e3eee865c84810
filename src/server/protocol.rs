//! Wire messages exchanged with the browser client
//!
//! One JSON object per line, tagged by `"type"`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Optional first line carrying the stable identity from the auth layer
    Hello {
        #[serde(default)]
        identity: Option<String>,
    },
    Create {
        seq: u64,
        cols: u16,
        rows: u16,
    },
    Data {
        id: String,
        data: String,
    },
    Resize {
        id: String,
        cols: u16,
        rows: u16,
    },
    Kill {
        id: String,
    },
    Process {
        seq: u64,
        id: String,
    },
    RequestPaste {
        seq: u64,
    },
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `create`, `process` and `request_paste`
    Ack {
        seq: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
    Data {
        id: String,
        data: String,
    },
    /// The PTY ended on its own
    Kill {
        id: String,
    },
    /// Sent on reconnection: every surviving session
    Sync {
        terms: BTreeMap<String, TermInfo>,
    },
}

impl ServerMessage {
    pub fn ack_ok(seq: u64, result: impl Serialize) -> Self {
        let result = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
        ServerMessage::Ack {
            seq,
            error: None,
            result: Some(result),
        }
    }

    pub fn ack_err(seq: u64, error: impl std::fmt::Display) -> Self {
        ServerMessage::Ack {
            seq,
            error: Some(error.to_string()),
            result: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermInfo {
    pub cols: u16,
    pub rows: u16,
    pub process: String,
}

/// Result payload of a successful `create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResult {
    pub id: String,
    pub process: String,
}

/// Parse one line from the client
pub fn decode_line(line: &str) -> serde_json::Result<ClientMessage> {
    serde_json::from_str(line.trim_end_matches(['\r', '\n']))
}

/// Serialize a message followed by a newline
pub fn encode(message: &ServerMessage) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}
