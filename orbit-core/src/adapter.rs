//! Loads adapter descriptors, instantiates them lazily under a per-adapter
//! mutex, and supports atomic hot-reload.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::breaker::BreakerRegistry;
use crate::error::OrbitError;
use crate::retriever::Retriever;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    Retriever,
    Passthrough,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalBehavior {
    Vector,
    Sql,
    IntentTemplate,
    Http,
    Passthrough,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AdapterCapabilities {
    pub supports_autocomplete: bool,
    pub supports_files: bool,
    pub retrieval_behavior: RetrievalBehavior,
}

/// Immutable-after-load adapter descriptor.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AdapterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub adapter_type: AdapterType,
    pub datasource: Option<String>,
    pub implementation_ref: String,
    pub capabilities: AdapterCapabilities,
    pub config: JsonValue,
}

/// Constructs a [`Retriever`] instance from a descriptor. Registered once per
/// `implementation_ref` kind (e.g. "vector", "sql") at startup.
pub type AdapterFactory =
    Arc<dyn Fn(&AdapterDescriptor) -> Result<Arc<dyn Retriever>, String> + Send + Sync>;

enum Slot {
    Empty,
    Ready(Arc<dyn Retriever>),
}

struct AdapterEntry {
    descriptor: AdapterDescriptor,
    slot: Mutex<Slot>,
}

/// Owns adapter descriptors and lazily-constructed instances. `get` triggers
/// construction on first resolution; `reload` swaps the instance atomically
/// while in-flight callers keep whatever `Arc` they already cloned.
pub struct AdapterManager {
    entries: HashMap<String, AdapterEntry>,
    factories: HashMap<String, AdapterFactory>,
    api_key_bindings: HashMap<String, String>,
    breakers: Arc<BreakerRegistry>,
}

impl AdapterManager {
    /// Builds the registry from descriptors, failing fatally on duplicate
    /// names.
    pub fn new(
        descriptors: Vec<AdapterDescriptor>,
        factories: HashMap<String, AdapterFactory>,
        api_key_bindings: HashMap<String, String>,
        breakers: Arc<BreakerRegistry>,
    ) -> Result<Self, OrbitError> {
        let mut entries = HashMap::new();
        for descriptor in descriptors {
            if entries.contains_key(&descriptor.name) {
                return Err(OrbitError::Validation(format!(
                    "duplicate adapter name: {}",
                    descriptor.name
                )));
            }
            let name = descriptor.name.clone();
            entries.insert(
                name,
                AdapterEntry {
                    descriptor,
                    slot: Mutex::new(Slot::Empty),
                },
            );
        }
        Ok(Self {
            entries,
            factories,
            api_key_bindings,
            breakers,
        })
    }

    pub fn list(&self) -> Vec<AdapterDescriptor> {
        self.entries.values().map(|e| e.descriptor.clone()).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<AdapterDescriptor> {
        self.entries.get(name).map(|e| e.descriptor.clone())
    }

    pub fn resolve_for_api_key(&self, api_key: &str) -> Result<String, OrbitError> {
        self.api_key_bindings
            .get(api_key)
            .cloned()
            .ok_or_else(|| OrbitError::Auth("unknown API key".to_string()))
    }

    /// Resolves `name` to a live instance, constructing it on first call. On
    /// construction failure, immediately opens that adapter's circuit breaker
    /// and returns [`OrbitError::AdapterFailure`].
    pub async fn get(&self, name: &str) -> Result<Arc<dyn Retriever>, OrbitError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| OrbitError::AdapterNotFound(name.to_string()))?;

        let mut slot = entry.slot.lock().await;
        if let Slot::Ready(instance) = &*slot {
            return Ok(instance.clone());
        }

        let instance = self.construct(&entry.descriptor)?;
        *slot = Slot::Ready(instance.clone());
        Ok(instance)
    }

    fn construct(&self, descriptor: &AdapterDescriptor) -> Result<Arc<dyn Retriever>, OrbitError> {
        let factory = self.factories.get(&descriptor.implementation_ref).ok_or_else(|| {
            OrbitError::AdapterFailure {
                adapter: descriptor.name.clone(),
                detail: format!("no factory registered for '{}'", descriptor.implementation_ref),
            }
        })?;

        factory(descriptor).map_err(|detail| {
            self.breakers.get_or_create(&descriptor.name).force_open();
            OrbitError::AdapterFailure {
                adapter: descriptor.name.clone(),
                detail,
            }
        })
    }

    /// Reloads one adapter (or all, if `name` is `None`), reconstructing the
    /// instance from its existing descriptor. The old instance keeps serving
    /// calls already in flight since they hold their own `Arc` clone.
    pub async fn reload(&self, name: Option<&str>) -> Result<(), OrbitError> {
        match name {
            Some(name) => self.reload_one(name).await,
            None => {
                for key in self.entries.keys() {
                    self.reload_one(key).await?;
                }
                Ok(())
            }
        }
    }

    async fn reload_one(&self, name: &str) -> Result<(), OrbitError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| OrbitError::AdapterNotFound(name.to_string()))?;
        let instance = self.construct(&entry.descriptor)?;
        let mut slot = entry.slot.lock().await;
        *slot = Slot::Ready(instance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerPolicy;
    use crate::retriever::{RetrievalMeta, RetrievalOutcome, RetrievalQuery, RetrieverError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRetriever {
        #[allow(dead_code)]
        build_count: usize,
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn get_relevant_context(
            &self,
            _query: &RetrievalQuery,
        ) -> Result<RetrievalOutcome, RetrieverError> {
            Ok(RetrievalOutcome {
                docs: vec![],
                meta: RetrievalMeta::default(),
            })
        }
    }

    fn descriptor(name: &str) -> AdapterDescriptor {
        AdapterDescriptor {
            name: name.to_string(),
            adapter_type: AdapterType::Retriever,
            datasource: None,
            implementation_ref: "stub".to_string(),
            capabilities: AdapterCapabilities {
                supports_autocomplete: false,
                supports_files: false,
                retrieval_behavior: RetrievalBehavior::Passthrough,
            },
            config: JsonValue::Null,
        }
    }

    fn counting_factory(counter: Arc<AtomicUsize>) -> AdapterFactory {
        Arc::new(move |_d| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubRetriever { build_count: n }) as Arc<dyn Retriever>)
        })
    }

    #[tokio::test]
    async fn duplicate_descriptor_names_are_rejected() {
        let factories = HashMap::new();
        let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy::default()));
        let err = AdapterManager::new(
            vec![descriptor("a"), descriptor("a")],
            factories,
            HashMap::new(),
            breakers,
        )
        .unwrap_err();
        assert!(matches!(err, OrbitError::Validation(_)));
    }

    #[tokio::test]
    async fn get_constructs_lazily_and_caches() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut factories = HashMap::new();
        factories.insert("stub".to_string(), counting_factory(counter.clone()));
        let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy::default()));
        let mgr = AdapterManager::new(vec![descriptor("a")], factories, HashMap::new(), breakers)
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        mgr.get("a").await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        mgr.get("a").await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1, "second get reuses cached instance");
    }

    #[tokio::test]
    async fn unknown_adapter_name_errors() {
        let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy::default()));
        let mgr = AdapterManager::new(vec![], HashMap::new(), HashMap::new(), breakers).unwrap();
        let err = mgr.get("nope").await.unwrap_err();
        assert!(matches!(err, OrbitError::AdapterNotFound(_)));
    }

    #[tokio::test]
    async fn reload_reconstructs_instance() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut factories = HashMap::new();
        factories.insert("stub".to_string(), counting_factory(counter.clone()));
        let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy::default()));
        let mgr = AdapterManager::new(vec![descriptor("a")], factories, HashMap::new(), breakers)
            .unwrap();

        mgr.get("a").await.unwrap();
        mgr.reload(Some("a")).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resolve_for_api_key_uses_binding_map() {
        let mut bindings = HashMap::new();
        bindings.insert("K1".to_string(), "qa-sql".to_string());
        let breakers = Arc::new(BreakerRegistry::new(BreakerPolicy::default()));
        let mgr = AdapterManager::new(vec![], HashMap::new(), bindings, breakers).unwrap();
        assert_eq!(mgr.resolve_for_api_key("K1").unwrap(), "qa-sql");
        assert!(mgr.resolve_for_api_key("nope").is_err());
    }
}
