//! Experts capability module — named sub-expert sessions.
//!
//! The main conversation can spin up named experts, each with its own role
//! (system instruction) and private multi-turn history, consult them
//! repeatedly, and dismiss them. A failed consult rolls its question back
//! out of the expert's history so a retry starts clean.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use skyhook_core::client::{GenerateClient, GenerateRequest, ToolDeclaration};
use skyhook_core::module::{CapabilityModule, Dispatch, ToolCall, ToolOutput};
use skyhook_core::progress::ProgressSink;
use skyhook_core::tier::ModelTier;
use skyhook_core::transcript::Turn;

struct ExpertSession {
    role: String,
    history: Vec<Turn>,
}

pub struct ExpertsModule {
    client: Arc<dyn GenerateClient>,
    sessions: Mutex<HashMap<String, ExpertSession>>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ExpertsModule {
    pub fn new(client: Arc<dyn GenerateClient>) -> Self {
        Self {
            client,
            sessions: Mutex::new(HashMap::new()),
            sink: None,
        }
    }

    /// Surface expert activity on the given sink as it happens.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn report(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.report_info(message);
        }
    }

    async fn consult(&self, name: &str, question: &str, role: Option<&str>) -> String {
        let mut sessions = self.sessions.lock().await;

        let is_new = !sessions.contains_key(name);
        if is_new {
            let Some(role) = role.filter(|r| !r.is_empty()) else {
                return format!(
                    "[System Error]: creating expert '{name}' requires a 'role' \
                     (background and guiding principles)."
                );
            };
            sessions.insert(
                name.to_string(),
                ExpertSession {
                    role: role.to_string(),
                    history: Vec::new(),
                },
            );
            self.report(&format!("[Expert: {name}] new session, role: {}", truncate(role, 80)));
        } else if let Some(role) = role.filter(|r| !r.is_empty()) {
            // Existing expert, new role supplied: retarget it.
            if let Some(session) = sessions.get_mut(name) {
                session.role = role.to_string();
            }
        }

        let session = match sessions.get_mut(name) {
            Some(s) => s,
            None => return format!("[System Error]: expert '{name}' vanished."),
        };
        self.report(&format!("[Expert: {name}] question: {}", truncate(question, 120)));

        session.history.push(Turn::user_text(question));

        let result = self
            .client
            .generate(GenerateRequest {
                contents: &session.history,
                tools: &[],
                system_instruction: Some(&session.role),
            })
            .await;

        match result {
            Ok(response) => {
                let text = response.turn.joined_text();
                if text.trim().is_empty() {
                    session.history.pop();
                    return format!("[System]: expert {name} gave no response.");
                }
                session.history.push(response.turn);
                let turn_count = session.history.len() / 2;
                debug!(expert = %name, turn = turn_count, "Expert consult completed");
                self.report(&format!("[Expert: {name}] response (turn {turn_count})"));

                let session_info = if is_new {
                    format!(" (new session, role: {})", truncate(&session.role, 50))
                } else {
                    format!(" (turn {turn_count})")
                };
                format!("[Expert {name} response]{session_info}:\n{}", text.trim())
            }
            Err(e) => {
                // Roll the question back so state cannot corrupt across calls.
                session.history.pop();
                if is_new {
                    sessions.remove(name);
                }
                warn!(expert = %name, error = %e, "Expert consult failed");
                format!("[System Error] consulting expert {name} failed: {e}")
            }
        }
    }

    async fn list(&self) -> String {
        let sessions = self.sessions.lock().await;
        if sessions.is_empty() {
            return "No active expert sessions.".into();
        }

        let mut names: Vec<_> = sessions.keys().collect();
        names.sort();

        let mut out = format!("{} active expert(s):\n", sessions.len());
        for name in names {
            let session = &sessions[name];
            out.push_str(&format!(
                "  [{name}] turns: {} | role: {}\n",
                session.history.len() / 2,
                truncate(&session.role, 60)
            ));
        }
        out.trim_end().to_string()
    }

    async fn dismiss(&self, name: &str) -> String {
        if name.is_empty() {
            return "[System]: specify the name of the expert to dismiss.".into();
        }
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(name) {
            Some(session) => format!(
                "Dismissed expert {name} (after {} turn(s) of conversation).",
                session.history.len() / 2
            ),
            None => format!("[System]: no expert named {name}."),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[async_trait]
impl CapabilityModule for ExpertsModule {
    fn declare_tools(&self, _tier: ModelTier) -> Vec<ToolDeclaration> {
        vec![
            ToolDeclaration {
                name: "consult_expert".into(),
                description: "Consult a domain-specific AI expert; supports multi-turn \
                              conversation. Reusing the same expert_name continues the earlier \
                              conversation. Creating a new expert requires 'role'; follow-up \
                              questions only need expert_name and question."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "expert_name": { "type": "string", "description": "Identifier for the expert (e.g. 'security_expert'), reused across turns" },
                        "question": { "type": "string", "description": "The concrete question or task for the expert" },
                        "role": { "type": "string", "description": "The expert's role and background (system instruction). Required on first creation, optional afterwards" }
                    },
                    "required": ["expert_name", "question"]
                }),
            },
            ToolDeclaration {
                name: "list_experts".into(),
                description: "List all active expert sessions with name, role, and turn count."
                    .into(),
                parameters: serde_json::json!({ "type": "object", "properties": {} }),
            },
            ToolDeclaration {
                name: "dismiss_expert".into(),
                description: "End an expert's session and release its history.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "expert_name": { "type": "string", "description": "Name of the expert to dismiss" }
                    },
                    "required": ["expert_name"]
                }),
            },
        ]
    }

    async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        let args = &call.arguments;
        match call.name.as_str() {
            "consult_expert" => {
                let name = args["expert_name"].as_str().unwrap_or("default");
                let question = args["question"].as_str().unwrap_or("");
                let role = args["role"].as_str();
                Dispatch::Handled(ToolOutput::text(self.consult(name, question, role).await))
            }
            "list_experts" => Dispatch::Handled(ToolOutput::text(self.list().await)),
            "dismiss_expert" => {
                let name = args["expert_name"].as_str().unwrap_or("");
                Dispatch::Handled(ToolOutput::text(self.dismiss(name).await))
            }
            _ => Dispatch::NotHandled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyhook_core::client::GenerateResponse;
    use skyhook_core::error::ClientError;
    use skyhook_core::transcript::{Part, Role};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Echoes the question count back; optionally fails every call.
    struct ScriptedExpert {
        fail: AtomicBool,
    }

    impl ScriptedExpert {
        fn ok() -> Self {
            Self {
                fail: AtomicBool::new(false),
            }
        }

        fn failing() -> Self {
            Self {
                fail: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl GenerateClient for ScriptedExpert {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: GenerateRequest<'_>,
        ) -> Result<GenerateResponse, ClientError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Network("no route".into()));
            }
            let reply = format!("answer after {} turn(s)", request.contents.len());
            Ok(GenerateResponse {
                turn: Turn::new(Role::Model, vec![Part::text(reply)]),
                usage: None,
            })
        }
    }

    fn consult_call(name: &str, question: &str, role: Option<&str>) -> ToolCall {
        let mut args = serde_json::json!({"expert_name": name, "question": question});
        if let Some(role) = role {
            args["role"] = serde_json::Value::String(role.into());
        }
        ToolCall::new("consult_expert", args)
    }

    async fn text_of(m: &ExpertsModule, c: ToolCall) -> String {
        match m.dispatch(&c).await {
            Dispatch::Handled(o) => o.text,
            Dispatch::NotHandled => panic!("call not handled"),
        }
    }

    #[tokio::test]
    async fn first_consult_requires_role() {
        let m = ExpertsModule::new(Arc::new(ScriptedExpert::ok()));
        let out = text_of(&m, consult_call("sec", "is this safe?", None)).await;
        assert!(out.contains("requires a 'role'"));

        let listed = text_of(&m, ToolCall::new("list_experts", serde_json::json!({}))).await;
        assert_eq!(listed, "No active expert sessions.");
    }

    #[tokio::test]
    async fn consults_accumulate_history() {
        let m = ExpertsModule::new(Arc::new(ScriptedExpert::ok()));

        let first = text_of(&m, consult_call("sec", "q1", Some("security reviewer"))).await;
        assert!(first.contains("answer after 1 turn(s)"));
        assert!(first.contains("new session"));

        let second = text_of(&m, consult_call("sec", "q2", None)).await;
        // History: q1, a1, q2 = 3 turns sent.
        assert!(second.contains("answer after 3 turn(s)"));
        assert!(second.contains("turn 2"));
    }

    #[tokio::test]
    async fn failed_consult_rolls_back_question() {
        let client = Arc::new(ScriptedExpert::failing());
        let m = ExpertsModule::new(Arc::clone(&client) as Arc<dyn GenerateClient>);

        // Seed a working session first.
        client.fail.store(false, Ordering::SeqCst);
        text_of(&m, consult_call("sec", "q1", Some("reviewer"))).await;

        client.fail.store(true, Ordering::SeqCst);
        let out = text_of(&m, consult_call("sec", "q2", None)).await;
        assert!(out.contains("[System Error]"));

        // The failed question must not linger: next consult sends q1, a1, q3.
        client.fail.store(false, Ordering::SeqCst);
        let next = text_of(&m, consult_call("sec", "q3", None)).await;
        assert!(next.contains("answer after 3 turn(s)"));
    }

    #[tokio::test]
    async fn failed_creation_leaves_no_session() {
        let m = ExpertsModule::new(Arc::new(ScriptedExpert::failing()));
        let out = text_of(&m, consult_call("arch", "q1", Some("architect"))).await;
        assert!(out.contains("[System Error]"));

        let listed = text_of(&m, ToolCall::new("list_experts", serde_json::json!({}))).await;
        assert_eq!(listed, "No active expert sessions.");
    }

    #[tokio::test]
    async fn list_and_dismiss() {
        let m = ExpertsModule::new(Arc::new(ScriptedExpert::ok()));
        text_of(&m, consult_call("sec", "q", Some("security reviewer"))).await;
        text_of(&m, consult_call("arch", "q", Some("architect"))).await;

        let listed = text_of(&m, ToolCall::new("list_experts", serde_json::json!({}))).await;
        assert!(listed.contains("2 active expert(s)"));
        assert!(listed.contains("[arch]"));
        assert!(listed.contains("[sec]"));

        let dismissed = text_of(
            &m,
            ToolCall::new("dismiss_expert", serde_json::json!({"expert_name": "sec"})),
        )
        .await;
        assert!(dismissed.contains("Dismissed expert sec"));

        let listed = text_of(&m, ToolCall::new("list_experts", serde_json::json!({}))).await;
        assert!(listed.contains("1 active expert(s)"));
        assert!(!listed.contains("[sec]"));
    }

    #[tokio::test]
    async fn dismiss_unknown_expert() {
        let m = ExpertsModule::new(Arc::new(ScriptedExpert::ok()));
        let out = text_of(
            &m,
            ToolCall::new("dismiss_expert", serde_json::json!({"expert_name": "ghost"})),
        )
        .await;
        assert!(out.contains("no expert named ghost"));
    }
}
