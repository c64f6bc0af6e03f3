//! Redacted run-config summary, printed once at gateway startup.
//!
//! [`ConfigSection`] is implemented by [`GeneralConfigSummary`],
//! [`InferenceConfigSummary`], [`AdaptersConfigSummary`], and
//! [`SecurityConfigSummary`]. [`RunConfigSummary`] holds them in order and
//! prints one line per section (API keys, datasource credentials and the
//! inference API key are never included).

use std::io::Write;

mod adapters;
mod general;
mod inference;
mod security;

pub use adapters::AdaptersConfigSummary;
pub use general::GeneralConfigSummary;
pub use inference::InferenceConfigSummary;
pub use security::SecurityConfigSummary;

use crate::OrbitConfig;

/// One block of run config (general, inference, adapters, security) for
/// startup logging. [`entries`](ConfigSection::entries) is also usable
/// programmatically (e.g. in tests) without going through stderr.
pub trait ConfigSection: Send + Sync {
    /// Section label, e.g. `"general"`, `"inference"`.
    fn section_name(&self) -> &str;
    /// Key-value pairs. No secrets: API keys and connection strings are
    /// omitted or replaced with a presence flag.
    fn entries(&self) -> Vec<(&'static str, String)>;

    /// Formats this section as `[section_name] k1=v1 k2=v2 ...`.
    fn format_line(&self) -> String {
        let entries: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("[{}] {}", self.section_name(), entries.join(" "))
    }
}

/// Aggregated, redacted run-config summary.
pub struct RunConfigSummary {
    sections: Vec<Box<dyn ConfigSection>>,
}

impl RunConfigSummary {
    pub fn new() -> Self {
        Self { sections: vec![] }
    }

    pub fn with_section(mut self, s: Box<dyn ConfigSection>) -> Self {
        self.sections.push(s);
        self
    }

    pub fn sections(&self) -> &[Box<dyn ConfigSection>] {
        self.sections.as_slice()
    }

    /// Prints each section to stderr, one line per section. Best-effort.
    pub fn print_to_stderr(&self) {
        for s in &self.sections {
            let _ = writeln!(std::io::stderr(), "{}", s.format_line());
        }
        let _ = std::io::stderr().flush();
    }
}

impl Default for RunConfigSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the startup summary from a loaded [`OrbitConfig`].
pub fn build_config_summary(config: &OrbitConfig) -> RunConfigSummary {
    RunConfigSummary::new()
        .with_section(Box::new(GeneralConfigSummary::from(config)))
        .with_section(Box::new(InferenceConfigSummary::from(config)))
        .with_section(Box::new(AdaptersConfigSummary::from(config)))
        .with_section(Box::new(SecurityConfigSummary::from(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> OrbitConfig {
        let yaml = r#"
general:
  host: "0.0.0.0"
  port: 9090
inference:
  provider: openai
  model: gpt-4o-mini
  api_key: sk-super-secret
adapters:
  - name: qa-sql
    type: retriever
    max_results: 20
security:
  rate_limiting:
    enabled: true
"#;
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn summary_never_contains_the_api_key() {
        let config = sample_config();
        let summary = build_config_summary(&config);
        for section in summary.sections() {
            for (_, v) in section.entries() {
                assert!(!v.contains("sk-super-secret"), "leaked secret in section {}", section.section_name());
            }
        }
    }

    #[test]
    fn general_section_reports_host_and_port() {
        let config = sample_config();
        let summary = GeneralConfigSummary::from(&config);
        assert_eq!(summary.format_line(), "[general] host=0.0.0.0 port=9090 verbose=false");
    }
}
