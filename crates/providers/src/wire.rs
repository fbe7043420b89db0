//! The Gemini `generateContent` wire schema.
//!
//! Typed request/response records mirroring the documented API shape, plus
//! the conversions between them and the domain transcript types. Parsing is
//! strict: a candidate or part that does not match the documented structure
//! is a [`ClientError::ResponseParse`], never silently skipped.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use skyhook_core::client::{ToolDeclaration, UsageStats};
use skyhook_core::error::ClientError;
use skyhook_core::transcript::{Part, Role, Turn};

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Serialize)]
pub struct WireRequest {
    pub contents: Vec<WireContent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireToolGroup>>,

    #[serde(rename = "system_instruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<WireSystemInstruction>,
}

/// The API groups function declarations under a `tools` array entry.
#[derive(Debug, Serialize)]
pub struct WireToolGroup {
    pub function_declarations: Vec<ToolDeclaration>,
}

#[derive(Debug, Serialize)]
pub struct WireSystemInstruction {
    pub parts: Vec<WireTextPart>,
}

#[derive(Debug, Serialize)]
pub struct WireTextPart {
    pub text: String,
}

/// One `{role, parts}` content object, request or response side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireContent {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

/// One part. Exactly one of the fields is expected to be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(
        rename = "functionCall",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub function_call: Option<WireFunctionCall>,

    #[serde(
        rename = "functionResponse",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub function_response: Option<WireFunctionResponse>,

    #[serde(
        rename = "inline_data",
        alias = "inlineData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub inline_data: Option<WireInlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionResponse {
    pub name: String,
    pub response: WireFunctionResponsePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionResponsePayload {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireInlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// Response body of `generateContent`.
#[derive(Debug, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub candidates: Vec<WireCandidate>,

    #[serde(rename = "usageMetadata", default)]
    pub usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct WireCandidate {
    #[serde(default)]
    pub content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
pub struct WireUsage {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    pub total_token_count: u32,
}

impl From<WireUsage> for UsageStats {
    fn from(w: WireUsage) -> Self {
        UsageStats {
            prompt_tokens: w.prompt_token_count,
            response_tokens: w.candidates_token_count,
            total_tokens: w.total_token_count,
        }
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
        // Tool results travel under the API's "function" role
        Role::Tool => "function",
    }
}

/// Convert transcript turns into wire contents.
pub fn to_wire_contents(turns: &[Turn]) -> Vec<WireContent> {
    turns
        .iter()
        .map(|turn| WireContent {
            role: Some(wire_role(turn.role).to_string()),
            parts: turn.parts.iter().map(to_wire_part).collect(),
        })
        .collect()
}

fn to_wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text { text } => WirePart {
            text: Some(text.clone()),
            ..Default::default()
        },
        Part::ToolCallRequest { name, arguments } => WirePart {
            function_call: Some(WireFunctionCall {
                name: name.clone(),
                args: arguments.clone(),
            }),
            ..Default::default()
        },
        // Binary payloads never reach the wire inside a tool result; the
        // injector relocates them to a user turn before append.
        Part::ToolCallResult { name, text, .. } => WirePart {
            function_response: Some(WireFunctionResponse {
                name: name.clone(),
                response: WireFunctionResponsePayload {
                    content: text.clone(),
                },
            }),
            ..Default::default()
        },
        Part::InlineBinary { mime_type, bytes } => WirePart {
            inline_data: Some(WireInlineData {
                mime_type: mime_type.clone(),
                data: STANDARD.encode(bytes),
            }),
            ..Default::default()
        },
    }
}

/// Build the full request body.
pub fn build_request(
    contents: &[Turn],
    tools: &[ToolDeclaration],
    system_instruction: Option<&str>,
) -> WireRequest {
    WireRequest {
        contents: to_wire_contents(contents),
        tools: if tools.is_empty() {
            None
        } else {
            Some(vec![WireToolGroup {
                function_declarations: tools.to_vec(),
            }])
        },
        system_instruction: system_instruction.map(|text| WireSystemInstruction {
            parts: vec![WireTextPart { text: text.into() }],
        }),
    }
}

/// Extract the model turn from a parsed response.
///
/// Validates the candidate/part structure; malformed shapes are parse
/// errors, not silently dropped content.
pub fn parse_model_turn(response: WireResponse) -> Result<(Turn, Option<UsageStats>), ClientError> {
    let usage = response.usage_metadata.map(UsageStats::from);

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::ResponseParse("response carried no candidates".into()))?;

    let content = candidate
        .content
        .ok_or_else(|| ClientError::ResponseParse("candidate carried no content".into()))?;

    let mut parts = Vec::with_capacity(content.parts.len());
    for wire_part in content.parts {
        parts.push(parse_part(wire_part)?);
    }

    Ok((Turn::new(Role::Model, parts), usage))
}

fn parse_part(part: WirePart) -> Result<Part, ClientError> {
    if let Some(text) = part.text {
        return Ok(Part::Text { text });
    }
    if let Some(call) = part.function_call {
        let arguments = if call.args.is_null() {
            serde_json::json!({})
        } else {
            call.args
        };
        return Ok(Part::ToolCallRequest {
            name: call.name,
            arguments,
        });
    }
    Err(ClientError::ResponseParse(
        "part carried neither text nor functionCall".into(),
    ))
}
