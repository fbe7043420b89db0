//! HTTP capability module — outbound GET and POST on the model's behalf.
//!
//! Responses come back as plain text (`Status: ...` + body) so the model can
//! reason about them; transport failures become error text rather than
//! round-level errors.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use skyhook_core::client::ToolDeclaration;
use skyhook_core::module::{CapabilityModule, Dispatch, ToolCall, ToolOutput};
use skyhook_core::tier::ModelTier;

pub struct HttpModule {
    http: reqwest::Client,
}

impl HttpModule {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { http }
    }

    fn apply_headers(
        mut request: reqwest::RequestBuilder,
        headers: Option<&serde_json::Value>,
    ) -> reqwest::RequestBuilder {
        let Some(map) = headers.and_then(|h| h.as_object()) else {
            return request;
        };
        for (name, value) in map {
            match value.as_str() {
                Some(v) => request = request.header(name.as_str(), v),
                None => warn!(header = %name, "Skipping non-string header value"),
            }
        }
        request
    }

    async fn run(request: reqwest::RequestBuilder) -> String {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return format!("Error: request failed: {e}"),
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return format!("Error: failed to read response body: {e}"),
        };
        format!("Status: {status}\nContent: {body}")
    }
}

impl Default for HttpModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityModule for HttpModule {
    fn declare_tools(&self, _tier: ModelTier) -> Vec<ToolDeclaration> {
        vec![
            ToolDeclaration {
                name: "http_get".into(),
                description: "Send an HTTP GET request and return the response.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Target URL" },
                        "headers": {
                            "type": "object",
                            "description": "Optional headers as key-value pairs (e.g. {\"Authorization\": \"Bearer ...\"})",
                            "additionalProperties": { "type": "string" }
                        }
                    },
                    "required": ["url"]
                }),
            },
            ToolDeclaration {
                name: "http_post".into(),
                description: "Send an HTTP POST request with a body and return the response."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Target URL" },
                        "body": { "type": "string", "description": "POST body (usually a JSON string)" },
                        "content_type": { "type": "string", "description": "Optional, defaults to application/json" },
                        "headers": {
                            "type": "object",
                            "description": "Optional headers as key-value pairs",
                            "additionalProperties": { "type": "string" }
                        }
                    },
                    "required": ["url", "body"]
                }),
            },
        ]
    }

    async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        let args = &call.arguments;
        match call.name.as_str() {
            "http_get" => {
                let Some(url) = args["url"].as_str() else {
                    return Dispatch::Handled(ToolOutput::text("Error: missing 'url' argument."));
                };
                let request = Self::apply_headers(self.http.get(url), args.get("headers"));
                Dispatch::Handled(ToolOutput::text(Self::run(request).await))
            }
            "http_post" => {
                let Some(url) = args["url"].as_str() else {
                    return Dispatch::Handled(ToolOutput::text("Error: missing 'url' argument."));
                };
                let Some(body) = args["body"].as_str() else {
                    return Dispatch::Handled(ToolOutput::text("Error: missing 'body' argument."));
                };
                let content_type = args["content_type"].as_str().unwrap_or("application/json");
                let request = Self::apply_headers(self.http.post(url), args.get("headers"))
                    .header("content-type", content_type)
                    .body(body.to_string());
                Dispatch::Handled(ToolOutput::text(Self::run(request).await))
            }
            _ => Dispatch::NotHandled,
        }
    }
}
