//! Intent-template retriever (NL → query): embed the NL query, match it
//! against a per-adapter template collection, rerank by domain-tag
//! weighting, extract parameters via an LLM call, then render and execute
//! the winning template through a SQL/HTTP sub-retriever.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{Retriever, RetrievalMeta, RetrievalOutcome, RetrievalQuery, RetrieverError};
use crate::llm::LlmClient;
use crate::memory::{SearchOptions, Store};
use crate::message::Message;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TemplateParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<JsonValue>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TemplateDescriptor {
    pub id: String,
    pub nl_examples: Vec<String>,
    pub sql_or_http_template: String,
    pub parameters: Vec<TemplateParameter>,
    pub semantic_tags: Vec<String>,
}

pub struct IntentTemplateRetriever {
    template_store: Arc<dyn Store>,
    template_collection_name: String,
    domain_tag_weights: HashMap<String, f64>,
    confidence_threshold: f64,
    top_m: usize,
    llm: Arc<dyn LlmClient>,
    sub_retriever: Arc<dyn Retriever>,
}

impl IntentTemplateRetriever {
    pub fn new(
        template_store: Arc<dyn Store>,
        template_collection_name: impl Into<String>,
        domain_tag_weights: HashMap<String, f64>,
        confidence_threshold: f64,
        top_m: usize,
        llm: Arc<dyn LlmClient>,
        sub_retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            template_store,
            template_collection_name: template_collection_name.into(),
            domain_tag_weights,
            confidence_threshold,
            top_m,
            llm,
            sub_retriever,
        }
    }

    fn namespace(&self) -> Vec<String> {
        vec!["templates".to_string(), self.template_collection_name.clone()]
    }

    /// Indexes a template under this adapter's scoped collection.
    pub async fn index_template(&self, template: &TemplateDescriptor) -> Result<(), RetrieverError> {
        let text = template.nl_examples.join(" . ");
        let value = serde_json::json!({
            "text": text,
            "descriptor": template,
        });
        self.template_store
            .put(&self.namespace(), &template.id, &value)
            .await
            .map_err(|e| RetrieverError::Backend(e.to_string()))
    }

    fn domain_rerank_score(base_score: f64, tags: &[String], weights: &HashMap<String, f64>) -> f64 {
        let bonus: f64 = tags.iter().filter_map(|t| weights.get(t)).sum();
        base_score + bonus
    }

    fn render_template(template: &str, params: &serde_json::Map<String, JsonValue>) -> String {
        let mut rendered = template.to_string();
        for (key, value) in params {
            let placeholder = format!("{{{{{key}}}}}");
            let replacement = match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&placeholder, &replacement);
        }
        rendered
    }

    fn validate_params(
        parameters: &[TemplateParameter],
        extracted: &serde_json::Map<String, JsonValue>,
    ) -> Result<serde_json::Map<String, JsonValue>, RetrieverError> {
        let mut result = extracted.clone();
        for param in parameters {
            match result.get(&param.name) {
                Some(value) => {
                    if !type_matches(&param.param_type, value) {
                        return Err(RetrieverError::Backend(format!(
                            "parameter '{}' has wrong type",
                            param.name
                        )));
                    }
                }
                None => {
                    if let Some(default) = &param.default {
                        result.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(RetrieverError::Backend(format!(
                            "missing required parameter '{}'",
                            param.name
                        )));
                    }
                }
            }
        }
        Ok(result)
    }

    async fn extract_parameters(
        &self,
        template: &TemplateDescriptor,
        query: &str,
    ) -> Result<serde_json::Map<String, JsonValue>, RetrieverError> {
        let schema_desc = template
            .parameters
            .iter()
            .map(|p| format!("{} ({:?}{})", p.name, p.param_type, if p.required { ", required" } else { "" }))
            .collect::<Vec<_>>()
            .join(", ");

        let system = format!(
            "Extract parameters from the user query as a JSON object. Parameters: {schema_desc}. \
             Respond with only the JSON object, no other text."
        );

        let response = self
            .llm
            .invoke(&[Message::System(system), Message::User(query.to_string())])
            .await
            .map_err(|e| RetrieverError::Backend(e.to_string()))?;

        let parsed: JsonValue = serde_json::from_str(response.content.trim())
            .map_err(|e| RetrieverError::Backend(format!("could not parse parameter JSON: {e}")))?;

        match parsed {
            JsonValue::Object(map) => Self::validate_params(&template.parameters, &map),
            _ => Err(RetrieverError::Backend("parameter extraction did not return an object".to_string())),
        }
    }
}

fn type_matches(param_type: &ParamType, value: &JsonValue) -> bool {
    match param_type {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
    }
}

#[async_trait]
impl Retriever for IntentTemplateRetriever {
    async fn get_relevant_context(
        &self,
        query: &RetrievalQuery,
    ) -> Result<RetrievalOutcome, RetrieverError> {
        let options = SearchOptions::new().with_query(query.query.clone()).with_limit(self.top_m);
        let hits = self
            .template_store
            .search(&self.namespace(), options)
            .await
            .map_err(|e| RetrieverError::Backend(e.to_string()))?;

        let mut candidates: Vec<(TemplateDescriptor, f64)> = hits
            .into_iter()
            .filter_map(|hit| {
                let descriptor: TemplateDescriptor =
                    serde_json::from_value(hit.item.value.get("descriptor")?.clone()).ok()?;
                let base_score = hit.score.unwrap_or(0.0);
                let score = Self::domain_rerank_score(base_score, &descriptor.semantic_tags, &self.domain_tag_weights);
                Some((descriptor, score))
            })
            .collect();

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let Some((template, score)) = candidates.into_iter().next() else {
            return Ok(RetrievalOutcome {
                docs: vec![],
                meta: RetrievalMeta::default(),
            });
        };

        if score < self.confidence_threshold {
            return Ok(RetrievalOutcome {
                docs: vec![],
                meta: RetrievalMeta::default(),
            });
        }

        let params = self.extract_parameters(&template, &query.query).await?;
        let rendered = Self::render_template(&template.sql_or_http_template, &params);

        let sub_query = RetrievalQuery {
            query: rendered,
            ..query.clone()
        };
        let mut outcome = self.sub_retriever.get_relevant_context(&sub_query).await?;

        for doc in outcome.docs.iter_mut() {
            doc.metadata.confidence = score.clamp(0.0, 1.0);
            doc.score = score.clamp(0.0, 1.0);
        }

        Ok(outcome)
    }
}
