//! The tool-calling round loop.
//!
//! One `run()` call handles one user message end to end: request a
//! completion from the active tier, execute every requested tool in order,
//! append the results, and loop until the model answers with plain text. A
//! failed round rolls back any dangling model turn and leaves a recovery
//! snapshot on disk; hitting the round bound asks the user whether to keep
//! going.

use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use skyhook_core::client::GenerateRequest;
use skyhook_core::error::{ClientError, Error, Result};
use skyhook_core::module::{ModuleRegistry, ToolCall};
use skyhook_core::progress::{NullRecorder, ProgressSink, UsageRecorder};
use skyhook_core::tier::{SharedTierSelector, TierSelector};
use skyhook_core::transcript::{Part, Role, Transcript, Turn};

use crate::injector::{self, MediaPolicy};

/// Snapshot written when a round fails.
pub const RECOVERY_FILE: &str = "recovery_history.json";

/// Snapshot written when the user declines to continue past the round bound.
pub const INTERRUPTED_FILE: &str = "interrupted_history.json";

const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Observable loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingResponse,
    ProcessingToolCalls,
    Done,
    Failed,
}

/// How a completed `run()` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced a final text answer.
    Done,
    /// The user declined to continue past the round bound.
    Interrupted,
}

pub struct Orchestrator {
    selector: SharedTierSelector,
    registry: ModuleRegistry,
    transcript: Transcript,
    sink: Arc<dyn ProgressSink>,
    recorder: Arc<dyn UsageRecorder>,
    system_instruction: Option<String>,
    max_iterations: u32,
    media_policy: MediaPolicy,
    /// Directory recovery snapshots are written to.
    snapshot_dir: PathBuf,
    state: LoopState,
}

impl Orchestrator {
    pub fn new(
        selector: SharedTierSelector,
        registry: ModuleRegistry,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            selector,
            registry,
            transcript: Transcript::new(),
            sink,
            recorder: Arc::new(NullRecorder),
            system_instruction: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            media_policy: MediaPolicy::default(),
            snapshot_dir: PathBuf::from("."),
            state: LoopState::Idle,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Rounds per user message before the continuation prompt fires.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_media_policy(mut self, policy: MediaPolicy) -> Self {
        self.media_policy = policy;
        self
    }

    /// Where `recovery_history.json` / `interrupted_history.json` land.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub(crate) fn set_state(&mut self, state: LoopState) {
        self.state = state;
    }

    fn selector(&self) -> MutexGuard<'_, TierSelector> {
        match self.selector.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Process one user message to completion.
    ///
    /// On a round error the transcript is cleaned up (any dangling model
    /// turn rolled back), a recovery snapshot is written, the state becomes
    /// `Failed`, and the error is returned. A user-declined continuation is
    /// not an error: it returns `Ok(RunOutcome::Interrupted)`.
    pub async fn run(&mut self, user_message: &str) -> Result<RunOutcome> {
        self.transcript.append(Turn::user_text(user_message));
        info!(turns = self.transcript.len(), "Processing user message");

        let mut round: u32 = 0;
        loop {
            round += 1;

            // The tier is sampled once per round; a switch mid-round only
            // affects the next one.
            let (tier, client) = {
                let selector = self.selector();
                (selector.active(), selector.client())
            };
            let model = client.model_name().to_string();

            self.state = LoopState::AwaitingResponse;
            self.sink.report_thinking(round, &model);
            debug!(round, %tier, model = %model, "Round start");

            let declarations = self.registry.declarations(tier);
            let started = Instant::now();
            let response = match client
                .generate(GenerateRequest {
                    contents: self.transcript.turns(),
                    tools: &declarations,
                    system_instruction: self.system_instruction.as_deref(),
                })
                .await
            {
                Ok(r) => r,
                Err(e) => return self.fail_round(e),
            };

            if let Some(usage) = response.usage {
                self.recorder
                    .record_round(&model, started.elapsed().as_millis() as u64, &usage);
            }

            for part in &response.turn.parts {
                if let Part::Text { text } = part {
                    self.sink.report_text(text, &model);
                }
            }

            let calls: Vec<ToolCall> = response
                .turn
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::ToolCallRequest { name, arguments } => {
                        Some(ToolCall::new(name.clone(), arguments.clone()))
                    }
                    _ => None,
                })
                .collect();

            self.transcript.append(response.turn);

            if calls.is_empty() {
                self.state = LoopState::Done;
                return Ok(RunOutcome::Done);
            }

            self.state = LoopState::ProcessingToolCalls;
            let mut result_parts = Vec::with_capacity(calls.len());
            let mut follow_ups = Vec::new();

            for call in &calls {
                let arguments =
                    serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".into());
                self.sink.report_tool_call(&call.name, &arguments);

                let output = self.registry.dispatch(call).await;
                let reframed = injector::reframe(&self.media_policy, &call.name, output);

                self.recorder
                    .record_action(&call.name, &truncate(&reframed.display, 200));
                self.sink.report_tool_result(&reframed.display);

                result_parts.push(reframed.result_part);
                if let Some(turn) = reframed.follow_up {
                    follow_ups.push(turn);
                }
            }

            let had_binary = !follow_ups.is_empty();
            self.transcript.append(Turn::new(Role::Tool, result_parts));
            for turn in follow_ups {
                self.transcript.append(turn);
            }

            // Tier-switch discard: when the round did nothing but switch the
            // tier, drop the switch exchange so the new model re-answers the
            // original request with a clean context. Rounds that mixed the
            // switch with other work, or injected binary content, keep their
            // turns.
            let tier_after = self.selector().active();
            if tier_after != tier && calls.len() == 1 && !had_binary {
                if self.transcript.rollback(2) {
                    debug!(from = %tier, to = %tier_after, "Discarded tier-switch round");
                }
            }

            if round >= self.max_iterations {
                let keep_going = self
                    .sink
                    .prompt_continue(&format!(
                        "Reached the per-message round limit ({}); the task is not finished.",
                        self.max_iterations
                    ))
                    .await;
                if keep_going {
                    round = 0;
                } else {
                    self.sink.report_error("Task interrupted by user.");
                    self.write_snapshot(INTERRUPTED_FILE);
                    self.state = LoopState::Failed;
                    return Ok(RunOutcome::Interrupted);
                }
            }
        }
    }

    fn fail_round(&mut self, error: ClientError) -> Result<RunOutcome> {
        warn!(error = %error, "Round failed");
        self.recorder.record_error(&format!("Agent error: {error}"));
        self.sink.report_error(&error.to_string());

        // A valid transcript ends on a user or tool turn; a trailing model
        // turn means the round died between append and tool results.
        if self.transcript.last_role() == Some(Role::Model) {
            self.transcript.rollback(1);
        }

        if let Some(path) = self.write_snapshot(RECOVERY_FILE) {
            self.sink.report_info(&format!(
                "Conversation backed up to {}. Use /load {} to resume.",
                path.display(),
                path.display()
            ));
        }

        self.state = LoopState::Failed;
        Err(Error::Client(error))
    }

    /// Best-effort snapshot write; returns the path on success.
    fn write_snapshot(&self, file_name: &str) -> Option<PathBuf> {
        let path = self.snapshot_dir.join(file_name);
        match self.try_write_snapshot(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write snapshot");
                self.sink.report_error("Could not back up the conversation.");
                None
            }
        }
    }

    fn try_write_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = self.transcript.snapshot()?;
        std::fs::write(path, snapshot)?;
        Ok(())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skyhook_core::client::{
        GenerateClient, GenerateResponse, ToolDeclaration, UsageStats,
    };
    use skyhook_core::module::{CapabilityModule, Dispatch, ToolOutput};
    use skyhook_core::tier::ModelTier;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves scripted responses in order, shared by both tiers.
    struct Script {
        responses: Mutex<VecDeque<std::result::Result<Turn, ClientError>>>,
    }

    impl Script {
        fn new(
            responses: Vec<std::result::Result<Turn, ClientError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    struct ScriptedClient {
        name: &'static str,
        script: Arc<Script>,
    }

    #[async_trait]
    impl GenerateClient for ScriptedClient {
        fn model_name(&self) -> &str {
            self.name
        }

        async fn generate(
            &self,
            _request: GenerateRequest<'_>,
        ) -> std::result::Result<GenerateResponse, ClientError> {
            let next = self
                .responses()
                .pop_front()
                .expect("script exhausted");
            next.map(|turn| GenerateResponse {
                turn,
                usage: Some(UsageStats {
                    prompt_tokens: 10,
                    response_tokens: 5,
                    total_tokens: 15,
                }),
            })
        }
    }

    impl ScriptedClient {
        fn responses(
            &self,
        ) -> std::sync::MutexGuard<'_, VecDeque<std::result::Result<Turn, ClientError>>> {
            self.script.responses.lock().unwrap()
        }
    }

    /// Records events; answers continuation prompts from a queue
    /// (default: no).
    #[derive(Default)]
    struct RecordingSink {
        thinking: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
        prompts: Mutex<u32>,
        continue_answers: Mutex<VecDeque<bool>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        fn report_thinking(&self, _round: u32, model: &str) {
            self.thinking.lock().unwrap().push(model.to_string());
        }
        fn report_tool_call(&self, _name: &str, _arguments: &str) {}
        fn report_tool_result(&self, _summary: &str) {}
        fn report_text(&self, _text: &str, _model: &str) {}
        fn report_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
        fn report_info(&self, _message: &str) {}
        async fn prompt_continue(&self, _message: &str) -> bool {
            *self.prompts.lock().unwrap() += 1;
            self.continue_answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(false)
        }
    }

    /// Echoes every tool it is asked for; optionally switches the tier or
    /// attaches binary output.
    struct EchoModule {
        selector: Option<SharedTierSelector>,
        binary_tools: Vec<&'static str>,
    }

    impl EchoModule {
        fn plain() -> Self {
            Self {
                selector: None,
                binary_tools: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CapabilityModule for EchoModule {
        fn declare_tools(&self, _tier: ModelTier) -> Vec<ToolDeclaration> {
            Vec::new()
        }

        async fn dispatch(&self, call: &ToolCall) -> Dispatch {
            if call.name == "switch_model_mode" {
                if let Some(selector) = &self.selector {
                    let mode: ModelTier = call.arguments["mode"]
                        .as_str()
                        .unwrap_or("fast")
                        .parse()
                        .unwrap();
                    selector.lock().unwrap().switch(mode);
                }
                return Dispatch::Handled(ToolOutput::text("switched"));
            }
            if self.binary_tools.contains(&call.name.as_str()) {
                // A 1x1 PNG, well within default policy bounds.
                let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(1, 1));
                let mut buf = std::io::Cursor::new(Vec::new());
                img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
                return Dispatch::Handled(ToolOutput::with_binary(
                    "[Read image]",
                    "image/png",
                    buf.into_inner(),
                ));
            }
            Dispatch::Handled(ToolOutput::text(format!("result of {}", call.name)))
        }
    }

    fn text_turn(text: &str) -> Turn {
        Turn::new(Role::Model, vec![Part::text(text)])
    }

    fn call_turn(calls: &[(&str, serde_json::Value)]) -> Turn {
        Turn::new(
            Role::Model,
            calls
                .iter()
                .map(|(name, args)| Part::ToolCallRequest {
                    name: name.to_string(),
                    arguments: args.clone(),
                })
                .collect(),
        )
    }

    struct Harness {
        orchestrator: Orchestrator,
        sink: Arc<RecordingSink>,
        selector: SharedTierSelector,
        _dir: tempfile::TempDir,
    }

    fn harness(
        script: Arc<Script>,
        module: Option<EchoModule>,
    ) -> Harness {
        let fast = Arc::new(ScriptedClient {
            name: "flash",
            script: Arc::clone(&script),
        });
        let capable = Arc::new(ScriptedClient {
            name: "pro",
            script,
        });
        let selector = TierSelector::shared(fast, capable);

        let mut registry = ModuleRegistry::new();
        let module = module.unwrap_or_else(|| EchoModule {
            selector: Some(Arc::clone(&selector)),
            binary_tools: Vec::new(),
        });
        registry.register(Box::new(module));

        let sink = Arc::new(RecordingSink::default());
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(
            Arc::clone(&selector),
            registry,
            Arc::clone(&sink) as Arc<dyn ProgressSink>,
        )
        .with_snapshot_dir(dir.path());

        Harness {
            orchestrator,
            sink,
            selector,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn text_only_round_adds_two_turns() {
        let script = Script::new(vec![Ok(text_turn("hello!"))]);
        let mut h = harness(script, Some(EchoModule::plain()));

        let outcome = h.orchestrator.run("hi").await.unwrap();
        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(h.orchestrator.state(), LoopState::Done);

        let turns = h.orchestrator.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Model);
    }

    #[tokio::test]
    async fn tool_results_keep_request_order() {
        let script = Script::new(vec![
            Ok(call_turn(&[
                ("alpha", serde_json::json!({})),
                ("beta", serde_json::json!({})),
            ])),
            Ok(text_turn("done")),
        ]);
        let mut h = harness(script, Some(EchoModule::plain()));

        h.orchestrator.run("do both").await.unwrap();

        let turns = h.orchestrator.transcript().turns();
        // user, model(calls), tool, model(text)
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].role, Role::Tool);
        let names: Vec<_> = turns[2]
            .parts
            .iter()
            .map(|p| match p {
                Part::ToolCallResult { name, .. } => name.as_str(),
                other => panic!("unexpected part: {other:?}"),
            })
            .collect();
        assert_eq!(names, ["alpha", "beta"]);
    }

    #[tokio::test]
    async fn binary_result_injects_user_turn_after_tool_turn() {
        let script = Script::new(vec![
            Ok(call_turn(&[("read_file", serde_json::json!({"file_name": "p.png"}))])),
            Ok(text_turn("I see a picture")),
        ]);
        let module = EchoModule {
            selector: None,
            binary_tools: vec!["read_file"],
        };
        let mut h = harness(script, Some(module));

        h.orchestrator.run("look at p.png").await.unwrap();

        let turns = h.orchestrator.transcript().turns();
        // user, model(call), tool, user(image), model(text)
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[2].role, Role::Tool);
        assert_eq!(turns[3].role, Role::User);
        assert!(matches!(&turns[3].parts[0], Part::InlineBinary { .. }));
        // The tool turn itself carries no bytes.
        assert!(matches!(
            &turns[2].parts[0],
            Part::ToolCallResult { binary: None, .. }
        ));
    }

    #[tokio::test]
    async fn round_error_rolls_back_and_snapshots() {
        let script = Script::new(vec![Err(ClientError::QuotaExceeded(
            "daily limit".into(),
        ))]);
        let mut h = harness(script, Some(EchoModule::plain()));

        let err = h.orchestrator.run("hi").await.unwrap_err();
        assert!(matches!(err, Error::Client(ClientError::QuotaExceeded(_))));
        assert_eq!(h.orchestrator.state(), LoopState::Failed);

        // The user turn survives; nothing dangling after it.
        let turns = h.orchestrator.transcript().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);

        let recovery = h._dir.path().join(RECOVERY_FILE);
        assert!(recovery.exists());
        let saved = std::fs::read_to_string(recovery).unwrap();
        assert!(saved.contains("hi"));
    }

    #[tokio::test]
    async fn tier_switch_round_is_discarded() {
        let script = Script::new(vec![
            Ok(call_turn(&[(
                "switch_model_mode",
                serde_json::json!({"mode": "smart"}),
            )])),
            Ok(text_turn("answering with the stronger model")),
        ]);
        let mut h = harness(script, None);

        h.orchestrator.run("hard question").await.unwrap();

        // The switch exchange vanished: user + final model turn only.
        let turns = h.orchestrator.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Model);

        // Round 1 ran on the fast client, round 2 on the capable one.
        let models = h.sink.thinking.lock().unwrap().clone();
        assert_eq!(models, ["flash", "pro"]);
        assert_eq!(
            h.selector.lock().unwrap().active(),
            ModelTier::Capable
        );
    }

    #[tokio::test]
    async fn mixed_switch_round_is_kept() {
        let script = Script::new(vec![
            Ok(call_turn(&[
                ("switch_model_mode", serde_json::json!({"mode": "smart"})),
                ("alpha", serde_json::json!({})),
            ])),
            Ok(text_turn("done")),
        ]);
        let mut h = harness(script, None);

        h.orchestrator.run("switch and work").await.unwrap();

        // Real work happened, so the round stays in the transcript.
        let turns = h.orchestrator.transcript().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].role, Role::Tool);
        assert_eq!(turns[2].parts.len(), 2);
    }

    #[tokio::test]
    async fn declined_continuation_interrupts() {
        // Every response requests another tool call; the loop only stops at
        // the bound.
        let script = Script::new(vec![
            Ok(call_turn(&[("alpha", serde_json::json!({}))]));
            3
        ]);
        let mut h = harness(script, Some(EchoModule::plain()));
        h.orchestrator = h.orchestrator.with_max_iterations(3);

        let outcome = h.orchestrator.run("loop forever").await.unwrap();
        assert_eq!(outcome, RunOutcome::Interrupted);
        assert_eq!(h.orchestrator.state(), LoopState::Failed);

        // Prompted exactly once, at the bound.
        assert_eq!(*h.sink.prompts.lock().unwrap(), 1);
        assert!(h._dir.path().join(INTERRUPTED_FILE).exists());
    }

    #[tokio::test]
    async fn accepted_continuation_resets_the_round_counter() {
        let script = Script::new(vec![
            Ok(call_turn(&[("alpha", serde_json::json!({}))])),
            Ok(call_turn(&[("alpha", serde_json::json!({}))])),
            Ok(text_turn("finally done")),
        ]);
        let mut h = harness(script, Some(EchoModule::plain()));
        h.orchestrator = h.orchestrator.with_max_iterations(2);
        h.sink.continue_answers.lock().unwrap().push_back(true);

        let outcome = h.orchestrator.run("long task").await.unwrap();
        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(*h.sink.prompts.lock().unwrap(), 1);
        assert_eq!(h.sink.thinking.lock().unwrap().len(), 3);
    }
}
