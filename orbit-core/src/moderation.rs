//! Content moderation used by the pipeline's pre- and post-inference steps.

use async_trait::async_trait;

use crate::error::{ModerationStage, OrbitError};

#[derive(Clone, Debug)]
pub struct ModerationVerdict {
    pub flagged: bool,
    pub categories: Vec<String>,
}

impl ModerationVerdict {
    pub fn safe() -> Self {
        Self {
            flagged: false,
            categories: vec![],
        }
    }
}

/// A moderation provider. `check` never errors on the moderation call itself
/// failing open vs. closed is a policy decision left to the caller; an `Err`
/// here means the provider couldn't be reached, not that content is unsafe.
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, OrbitError>;
}

/// Keyword-based moderator: flags content containing any configured term.
/// Stand-in for a hosted moderation endpoint in tests and minimal deployments.
pub struct KeywordModerator {
    blocked_terms: Vec<String>,
}

impl KeywordModerator {
    pub fn new(blocked_terms: Vec<String>) -> Self {
        Self {
            blocked_terms: blocked_terms.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Moderator for KeywordModerator {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, OrbitError> {
        let lower = text.to_lowercase();
        let hits: Vec<String> = self
            .blocked_terms
            .iter()
            .filter(|term| lower.contains(term.as_str()))
            .cloned()
            .collect();
        Ok(ModerationVerdict {
            flagged: !hits.is_empty(),
            categories: hits,
        })
    }
}

/// Runs `moderator` over `text` and turns a flagged verdict into the pipeline's
/// terminal error.
pub async fn enforce(
    moderator: &dyn Moderator,
    text: &str,
    stage: ModerationStage,
) -> Result<ModerationVerdict, OrbitError> {
    let verdict = moderator.check(text).await?;
    if verdict.flagged {
        return Err(OrbitError::ModerationUnsafe { stage });
    }
    Ok(verdict)
}
