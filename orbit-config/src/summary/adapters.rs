//! Adapter roster block for the run config summary: names and count only.

use super::ConfigSection;
use crate::OrbitConfig;

pub struct AdaptersConfigSummary {
    pub names: Vec<String>,
}

impl From<&OrbitConfig> for AdaptersConfigSummary {
    fn from(config: &OrbitConfig) -> Self {
        Self {
            names: config.adapters.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

impl ConfigSection for AdaptersConfigSummary {
    fn section_name(&self) -> &str {
        "adapters"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("count", self.names.len().to_string()),
            ("names", self.names.join(",")),
        ]
    }
}
