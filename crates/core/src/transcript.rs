//! Turn and Transcript domain types.
//!
//! The transcript is the canonical conversation log: an ordered, append-only
//! sequence of turns, owned exclusively by the orchestrator. The only
//! mutations are `append`, bounded `rollback` (error recovery and tier-switch
//! discard), `restore` from a snapshot, and `clear`.

use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (also carries injected binary content, which the
    /// generation service requires to arrive as user-authored content).
    User,
    /// The generation service.
    Model,
    /// Tool execution results.
    Tool,
}

/// A binary blob attached to a tool result or inlined into a user turn.
///
/// Bytes are held in memory as raw bytes and serialized as base64 in
/// snapshots and on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryPayload {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl BinaryPayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// One piece of a turn's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Plain text.
    Text { text: String },

    /// The model asking for a tool invocation.
    ToolCallRequest {
        name: String,
        arguments: serde_json::Value,
    },

    /// The outcome of a tool invocation. A result stored in a `tool` turn
    /// never carries a binary payload; binary content is relocated to a
    /// follow-up `user` turn before the result is appended.
    ToolCallResult {
        name: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        binary: Option<BinaryPayload>,
    },

    /// Binary content inlined into a user turn.
    InlineBinary {
        mime_type: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Part::ToolCallRequest { .. })
    }
}

/// A single entry in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// A user turn holding a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Whether any part of this turn requests a tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(Part::is_tool_call)
    }

    /// All `Text` parts joined with newlines.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The ordered conversation log.
///
/// Append-only apart from bounded rollback; snapshots serialize the full
/// ordered turn list as a UTF-8 JSON array.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Remove the last `n` turns. Returns `false` (and changes nothing) when
    /// fewer than `n` turns exist — callers must check.
    pub fn rollback(&mut self, n: usize) -> bool {
        if self.turns.len() < n {
            return false;
        }
        self.turns.truncate(self.turns.len() - n);
        true
    }

    /// Serialize the full transcript as a JSON array of turn objects.
    pub fn snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.turns)
    }

    /// Replace the transcript with the contents of a snapshot.
    ///
    /// Atomic: on parse failure the existing transcript is left untouched.
    pub fn restore(&mut self, snapshot: &str) -> serde_json::Result<()> {
        let turns: Vec<Turn> = serde_json::from_str(snapshot)?;
        self.turns = turns;
        Ok(())
    }

    /// Discard all turns.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Role of the final turn, if any. Used by the orchestrator to detect a
    /// dangling model turn after a failed round.
    pub fn last_role(&self) -> Option<Role> {
        self.turns.last().map(|t| t.role)
    }
}

/// Serde helper: `Vec<u8>` as a base64 string.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
