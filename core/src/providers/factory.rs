use crate::config::Config;
use crate::error::ScoutError;
use crate::providers::GroqProvider;
use crate::traits::Provider;
use anyhow::{Result, anyhow};

/// Builds the model client for this session. The key must already be
/// resolved; an empty key is rejected before any client is constructed.
pub fn create_provider(config: &Config, api_key: &str) -> Result<Box<dyn Provider>> {
    if api_key.trim().is_empty() {
        return Err(ScoutError::MissingCredential.into());
    }

    let provider_name = config.provider.as_deref().unwrap_or("groq");

    match provider_name.to_lowercase().as_str() {
        "groq" => {
            let mut provider = GroqProvider::new(api_key.trim())
                .with_model(config.model.clone())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Box::new(provider))
        }
        _ => Err(anyhow!("Unknown provider: {}. Available: groq", provider_name)),
    }
}
