//! Security config block for the run config summary. Never includes the
//! Redis URL (it may carry embedded credentials).

use super::ConfigSection;
use crate::OrbitConfig;

pub struct SecurityConfigSummary {
    pub rate_limiting_enabled: bool,
    pub redis_enabled: bool,
    pub per_minute: u32,
    pub per_hour: u32,
}

impl From<&OrbitConfig> for SecurityConfigSummary {
    fn from(config: &OrbitConfig) -> Self {
        Self {
            rate_limiting_enabled: config.security.rate_limiting.enabled,
            redis_enabled: config.internal_services.redis.enabled,
            per_minute: config.security.rate_limiting.api_key_limits.per_minute,
            per_hour: config.security.rate_limiting.api_key_limits.per_hour,
        }
    }
}

impl ConfigSection for SecurityConfigSummary {
    fn section_name(&self) -> &str {
        "security"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("rate_limiting_enabled", self.rate_limiting_enabled.to_string()),
            ("redis_enabled", self.redis_enabled.to_string()),
            ("api_key_limits_per_minute", self.per_minute.to_string()),
            ("api_key_limits_per_hour", self.per_hour.to_string()),
        ]
    }
}
