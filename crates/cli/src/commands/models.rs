//! `skyhook models` — List models available to the configured API key.

use std::path::Path;

use skyhook_config::AppConfig;
use skyhook_core::client::GenerateClient;
use skyhook_providers::GeminiClient;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    config.validate()?;
    let api_key = config.api_key.clone().unwrap_or_default();

    let client = GeminiClient::new(api_key, config.capable_model.clone());
    let models = client.list_models().await?;

    if models.is_empty() {
        println!("No content-generation models are available to this key.");
        return Ok(());
    }

    for model in &models {
        println!("{:<32} {}", model.name, model.display_name);
    }
    Ok(())
}
