//! Resolves an API key to its bound adapter, mints the request's
//! `request_id`, and enforces session-id presence when configured.
//! Synchronous from the caller's perspective: it either returns an enriched
//! [`AuthContext`] or rejects before the pipeline begins.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::OrbitError;

#[derive(Clone, Debug)]
pub struct ApiKeyBinding {
    pub adapter_name: String,
    pub active: bool,
}

/// Everything the pipeline needs about the caller's identity for one request.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub request_id: String,
    pub adapter_name: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub api_key_fingerprint: Option<String>,
}

/// In-process API-key → adapter binding table. The lookup surface here is
/// intentionally the full contract so a DB-backed implementation is a
/// drop-in replacement.
pub struct AuthMiddleware {
    bindings: HashMap<String, ApiKeyBinding>,
    require_session_id: bool,
}

impl AuthMiddleware {
    pub fn new(bindings: HashMap<String, ApiKeyBinding>, require_session_id: bool) -> Self {
        Self {
            bindings,
            require_session_id,
        }
    }

    /// Resolves `api_key`, mints a `request_id`, and validates the session-id
    /// requirement. `request_override_adapter` lets a request specify an
    /// adapter explicitly, overriding the one bound to the API key.
    pub fn authenticate(
        &self,
        api_key: Option<&str>,
        session_id: Option<String>,
        user_id: Option<String>,
        request_override_adapter: Option<String>,
    ) -> Result<AuthContext, OrbitError> {
        let api_key = api_key.ok_or_else(|| OrbitError::Auth("missing API key".to_string()))?;

        let binding = self
            .bindings
            .get(api_key)
            .ok_or_else(|| OrbitError::Auth("unknown API key".to_string()))?;

        if !binding.active {
            return Err(OrbitError::Auth("API key is inactive".to_string()));
        }

        if self.require_session_id && session_id.is_none() {
            return Err(OrbitError::MissingSession);
        }

        let adapter_name = request_override_adapter.unwrap_or_else(|| binding.adapter_name.clone());

        Ok(AuthContext {
            request_id: Uuid::new_v4().to_string(),
            adapter_name,
            session_id,
            user_id,
            api_key_fingerprint: Some(fingerprint(api_key)),
        })
    }

    /// Validates an admin bearer token against an active session store.
    /// Accepted independently of API-key auth.
    pub fn authenticate_admin(
        &self,
        bearer_token: Option<&str>,
        active_tokens: &std::collections::HashSet<String>,
    ) -> Result<(), OrbitError> {
        let token = bearer_token.ok_or_else(|| OrbitError::Auth("missing bearer token".to_string()))?;
        if active_tokens.contains(token) {
            Ok(())
        } else {
            Err(OrbitError::Auth("invalid or expired admin token".to_string()))
        }
    }
}

/// A short, non-reversible identifier for logging; never the raw key.
fn fingerprint(api_key: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    api_key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
