//! Gemini `generateContent` client.
//!
//! One instance is bound to one model name; the tier selector holds two of
//! these (fast and capable). Error mapping follows the API's documented
//! behavior: 429 is a quota problem, a 400 whose body complains about
//! function calling means the model cannot do tool use, everything else
//! non-2xx is a generic service error with status and body retained.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use skyhook_core::client::{
    GenerateClient, GenerateRequest, GenerateResponse, ModelInfo,
};
use skyhook_core::error::ClientError;
use skyhook_core::progress::UsageRecorder;

use crate::wire::{self, WireResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Body phrases that identify "this model cannot do tool calling" 400s.
const FUNCTION_CALLING_UNSUPPORTED: &[&str] = &[
    "does not support function calling",
    "models not supported",
    "not support tools",
    "Function calling is not enabled",
];

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
    recorder: Option<Arc<dyn UsageRecorder>>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.into(),
            http,
            recorder: None,
        }
    }

    /// Point the client at a non-default endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Attach a recorder that receives API error dumps.
    pub fn with_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Classify a non-2xx response into the domain error taxonomy.
    fn map_error_status(model: &str, status: u16, body: &str) -> ClientError {
        if status == 429 {
            return ClientError::QuotaExceeded(
                "API quota exceeded (429). Check your plan or retry later.".into(),
            );
        }
        if status == 400
            && FUNCTION_CALLING_UNSUPPORTED
                .iter()
                .any(|phrase| body.contains(phrase))
        {
            return ClientError::UnsupportedOperation {
                model: model.to_string(),
                message: "switch to a tool-capable model (e.g. gemini-2.5-flash)".into(),
            };
        }
        ClientError::Service {
            status,
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl GenerateClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> Result<GenerateResponse, ClientError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = wire::build_request(request.contents, request.tools, request.system_instruction);

        debug!(model = %self.model, turns = request.contents.len(), "Gemini generateContent request");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, model = %self.model, "Gemini API error");
            if let Some(recorder) = &self.recorder {
                let request_json = serde_json::to_string(&body).unwrap_or_default();
                recorder.record_api_error(
                    &format!("API error: HTTP {status}"),
                    &request_json,
                    &error_body,
                );
            }
            return Err(Self::map_error_status(&self.model, status, &error_body));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| ClientError::ResponseParse(e.to_string()))?;

        let (turn, usage) = wire::parse_model_turn(parsed)?;
        Ok(GenerateResponse { turn, usage })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_error_status(&self.model, status, &body));
        }

        #[derive(serde::Deserialize)]
        struct Listing {
            #[serde(default)]
            models: Vec<ListedModel>,
        }

        #[derive(serde::Deserialize)]
        struct ListedModel {
            name: String,
            #[serde(rename = "displayName", default)]
            display_name: String,
            #[serde(rename = "supportedGenerationMethods", default)]
            supported_generation_methods: Vec<String>,
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| ClientError::ResponseParse(e.to_string()))?;

        Ok(listing
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| ModelInfo {
                name: m.name.trim_start_matches("models/").to_string(),
                display_name: m.display_name,
            })
            .collect())
    }
}
