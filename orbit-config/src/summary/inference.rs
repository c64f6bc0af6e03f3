//! Inference config block for the run config summary. Never includes `api_key`.

use super::ConfigSection;
use crate::OrbitConfig;

pub struct InferenceConfigSummary {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_configured: bool,
}

impl From<&OrbitConfig> for InferenceConfigSummary {
    fn from(config: &OrbitConfig) -> Self {
        Self {
            provider: config.inference.provider.clone(),
            model: config.inference.model.clone(),
            base_url: config.inference.base_url.clone(),
            api_key_configured: !config.inference.api_key.is_empty(),
        }
    }
}

impl ConfigSection for InferenceConfigSummary {
    fn section_name(&self) -> &str {
        "inference"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("provider", self.provider.clone()),
            ("model", self.model.clone()),
            ("base_url", self.base_url.clone().unwrap_or_else(|| "default".to_string())),
            ("api_key_configured", self.api_key_configured.to_string()),
        ]
    }
}
