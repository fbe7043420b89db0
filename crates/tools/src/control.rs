//! Model-control capability module — lets the model switch its own tier.
//!
//! The declaration text reflects the tier that is active when declarations
//! are collected, nudging the model toward the cheaper tier for simple work
//! and the stronger one for hard work.

use async_trait::async_trait;
use tracing::info;

use skyhook_core::client::ToolDeclaration;
use skyhook_core::module::{CapabilityModule, Dispatch, ToolCall, ToolOutput};
use skyhook_core::tier::{ModelTier, SharedTierSelector};

pub struct ControlModule {
    selector: SharedTierSelector,
}

impl ControlModule {
    pub fn new(selector: SharedTierSelector) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl CapabilityModule for ControlModule {
    fn declare_tools(&self, tier: ModelTier) -> Vec<ToolDeclaration> {
        let description = match tier {
            ModelTier::Capable => {
                "Switch the thinking mode. Currently in smart mode. For simple tasks, \
                 switching to 'fast' saves resources."
            }
            ModelTier::Fast => {
                "Switch the thinking mode. Currently in fast mode. For complex tasks, \
                 switching to 'smart' gives better reasoning."
            }
        };

        vec![ToolDeclaration {
            name: "switch_model_mode".into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "mode": {
                        "type": "string",
                        "description": "Mode name (smart or fast)",
                        "enum": ["smart", "fast"]
                    }
                },
                "required": ["mode"]
            }),
        }]
    }

    async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        if call.name != "switch_model_mode" {
            return Dispatch::NotHandled;
        }
        let Some(mode) = call.arguments["mode"].as_str() else {
            return Dispatch::Handled(ToolOutput::text("Error: missing 'mode' argument."));
        };
        let tier: ModelTier = match mode.parse() {
            Ok(t) => t,
            Err(_) => {
                return Dispatch::Handled(ToolOutput::text(format!(
                    "Error: unknown mode '{mode}'. Use 'smart' or 'fast'."
                )))
            }
        };

        let changed = match self.selector.lock() {
            Ok(mut selector) => selector.switch(tier),
            Err(poisoned) => poisoned.into_inner().switch(tier),
        };
        if changed {
            info!(%tier, "Model tier switched by tool call");
            Dispatch::Handled(ToolOutput::text(format!(
                "Success: switched to {mode} mode. Subsequent responses will use this tier."
            )))
        } else {
            Dispatch::Handled(ToolOutput::text(format!("Already in {mode} mode.")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyhook_core::client::{GenerateClient, GenerateRequest, GenerateResponse};
    use skyhook_core::error::ClientError;
    use skyhook_core::tier::TierSelector;
    use std::sync::Arc;

    struct NamedClient(&'static str);

    #[async_trait]
    impl GenerateClient for NamedClient {
        fn model_name(&self) -> &str {
            self.0
        }

        async fn generate(
            &self,
            _request: GenerateRequest<'_>,
        ) -> Result<GenerateResponse, ClientError> {
            unimplemented!("not used in control tests")
        }
    }

    fn shared_selector() -> SharedTierSelector {
        TierSelector::shared(Arc::new(NamedClient("flash")), Arc::new(NamedClient("pro")))
    }

    #[tokio::test]
    async fn switch_to_smart_activates_capable() {
        let selector = shared_selector();
        let m = ControlModule::new(Arc::clone(&selector));

        let out = m
            .dispatch(&ToolCall::new(
                "switch_model_mode",
                serde_json::json!({"mode": "smart"}),
            ))
            .await;
        match out {
            Dispatch::Handled(o) => assert!(o.text.contains("switched to smart")),
            Dispatch::NotHandled => panic!("call not handled"),
        }
        assert_eq!(selector.lock().unwrap().active(), ModelTier::Capable);
    }

    #[tokio::test]
    async fn same_tier_switch_reports_noop() {
        let selector = shared_selector();
        let m = ControlModule::new(Arc::clone(&selector));

        let out = m
            .dispatch(&ToolCall::new(
                "switch_model_mode",
                serde_json::json!({"mode": "fast"}),
            ))
            .await;
        match out {
            Dispatch::Handled(o) => assert!(o.text.contains("Already in fast mode")),
            Dispatch::NotHandled => panic!("call not handled"),
        }
        assert_eq!(selector.lock().unwrap().active(), ModelTier::Fast);
    }

    #[tokio::test]
    async fn unknown_mode_is_error_text() {
        let m = ControlModule::new(shared_selector());
        let out = m
            .dispatch(&ToolCall::new(
                "switch_model_mode",
                serde_json::json!({"mode": "turbo"}),
            ))
            .await;
        match out {
            Dispatch::Handled(o) => assert!(o.text.contains("unknown mode 'turbo'")),
            Dispatch::NotHandled => panic!("call not handled"),
        }
    }

    #[test]
    fn declaration_reflects_active_tier() {
        let m = ControlModule::new(shared_selector());

        let fast_decl = &m.declare_tools(ModelTier::Fast)[0];
        assert!(fast_decl.description.contains("fast mode"));

        let capable_decl = &m.declare_tools(ModelTier::Capable)[0];
        assert!(capable_decl.description.contains("smart mode"));
    }
}
