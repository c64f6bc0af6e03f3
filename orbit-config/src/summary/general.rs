//! General config block for the run config summary.

use super::ConfigSection;
use crate::OrbitConfig;

pub struct GeneralConfigSummary {
    pub host: String,
    pub port: u16,
    pub verbose: bool,
}

impl From<&OrbitConfig> for GeneralConfigSummary {
    fn from(config: &OrbitConfig) -> Self {
        Self {
            host: config.general.host.clone(),
            port: config.general.port,
            verbose: config.general.verbose,
        }
    }
}

impl ConfigSection for GeneralConfigSummary {
    fn section_name(&self) -> &str {
        "general"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.host.clone()),
            ("port", self.port.to_string()),
            ("verbose", self.verbose.to_string()),
        ]
    }
}
