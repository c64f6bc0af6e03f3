//! SQL retriever variant: parameterized templates only, never
//! string-concatenates caller values. Runs on a blocking pool since
//! `rusqlite::Connection` is synchronous.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, types::Value as SqlValue};

use super::{
    clamp_return_results, ContextDocument, ContextDocumentMetadata, Retriever, RetrievalMeta,
    RetrievalOutcome, RetrievalQuery, RetrieverError,
};

#[derive(Clone, Debug)]
pub struct SqlRetrieverConfig {
    pub adapter_name: String,
    /// The parameterized query, e.g. `SELECT id, body FROM docs WHERE body LIKE ?1`.
    pub query_template: String,
    pub query_timeout: Duration,
    pub max_results: usize,
    /// AND-ed into every query; must itself be parameter-free and admin-authored.
    pub security_filter: Option<String>,
    pub allowed_columns: Option<Vec<String>>,
    /// Required when a descriptor's query touches more than one table.
    pub approved_by_admin: bool,
}

pub struct SqlRetriever {
    conn: Arc<Mutex<Connection>>,
    config: SqlRetrieverConfig,
}

impl SqlRetriever {
    /// Refuses to construct a multi-table query template unless the
    /// descriptor was explicitly marked `approved_by_admin`.
    pub fn new(conn: Connection, config: SqlRetrieverConfig) -> Result<Self, RetrieverError> {
        if is_multi_table(&config.query_template) && !config.approved_by_admin {
            return Err(RetrieverError::Backend(format!(
                "adapter '{}': multi-table query template requires approved_by_admin=true",
                config.adapter_name
            )));
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    fn project_columns(&self, row_json: serde_json::Value) -> serde_json::Value {
        match (&self.config.allowed_columns, row_json) {
            (Some(allowed), serde_json::Value::Object(map)) => {
                let filtered: serde_json::Map<_, _> = map
                    .into_iter()
                    .filter(|(k, _)| allowed.contains(k))
                    .collect();
                serde_json::Value::Object(filtered)
            }
            (_, other) => other,
        }
    }
}

#[async_trait]
impl Retriever for SqlRetriever {
    async fn get_relevant_context(
        &self,
        query: &RetrievalQuery,
    ) -> Result<RetrievalOutcome, RetrieverError> {
        let conn = self.conn.clone();
        let config = self.config.clone();
        let search_term = format!("%{}%", query.query);

        let fut = tokio::task::spawn_blocking(move || run_query(&conn, &config, &search_term));
        let rows = match tokio::time::timeout(self.config.query_timeout, fut).await {
            Ok(Ok(Ok(rows))) => rows,
            Ok(Ok(Err(e))) => return Err(RetrieverError::Backend(e)),
            Ok(Err(_)) => return Err(RetrieverError::Backend("query task panicked".to_string())),
            Err(_) => return Err(RetrieverError::Timeout),
        };

        let total_available = rows.len();
        let return_results = clamp_return_results(self.config.max_results, self.config.max_results);
        let truncated = total_available > return_results;

        let docs: Vec<ContextDocument> = rows
            .into_iter()
            .take(return_results)
            .enumerate()
            .map(|(i, row)| {
                let content = self.project_columns(row).to_string();
                ContextDocument {
                    content,
                    metadata: ContextDocumentMetadata {
                        adapter: self.config.adapter_name.clone(),
                        source: format!("row-{i}"),
                        chunk_id: None,
                        confidence: 1.0,
                    },
                    score: 1.0,
                    truncated_flag: truncated,
                }
            })
            .collect();

        Ok(RetrievalOutcome {
            meta: RetrievalMeta {
                result_count: docs.len(),
                total_available,
                truncated,
                stages: Default::default(),
            },
            docs,
        })
    }
}

fn run_query(
    conn: &Mutex<Connection>,
    config: &SqlRetrieverConfig,
    search_term: &str,
) -> Result<Vec<serde_json::Value>, String> {
    let conn = conn.lock().map_err(|_| "sqlite connection mutex poisoned".to_string())?;

    let sql = match &config.security_filter {
        Some(filter) => format!(
            "SELECT * FROM ({}) AS t WHERE {}",
            config.query_template, filter
        ),
        None => config.query_template.clone(),
    };

    let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
    let col_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let rows = stmt
        .query_map([search_term], |row| {
            let mut obj = serde_json::Map::new();
            for (i, name) in col_names.iter().enumerate() {
                let value: SqlValue = row.get(i)?;
                obj.insert(name.clone(), sql_value_to_json(value));
            }
            Ok(serde_json::Value::Object(obj))
        })
        .map_err(|e| e.to_string())?;

    rows.collect::<Result<Vec<_>, _>>().map_err(|e| e.to_string())
}

/// A rough, conservative heuristic: a template counts as multi-table if it
/// has a `JOIN` keyword or more than one comma-separated source in its
/// `FROM` clause. False positives (rejecting a template that's actually
/// single-table) are acceptable; false negatives are not.
fn is_multi_table(template: &str) -> bool {
    let lower = template.to_lowercase();
    if lower.split_whitespace().any(|word| word == "join") {
        return true;
    }
    let Some(from_idx) = lower.find(" from ") else {
        return false;
    };
    let after_from = &lower[from_idx + 6..];
    let clause_end = ["where", "group by", "order by", "limit", ")"]
        .iter()
        .filter_map(|kw| after_from.find(kw))
        .min()
        .unwrap_or(after_from.len());
    after_from[..clause_end].contains(',')
}

fn sql_value_to_json(value: SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Integer(i) => serde_json::json!(i),
        SqlValue::Real(f) => serde_json::json!(f),
        SqlValue::Text(s) => serde_json::json!(s),
        SqlValue::Blob(b) => serde_json::json!(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE docs (id INTEGER PRIMARY KEY, body TEXT);
             INSERT INTO docs (body) VALUES ('rust programming'), ('python programming'), ('rust tooling');",
        )
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn returns_matching_rows_with_truncation() {
        let retriever = SqlRetriever::new(
            seeded_conn(),
            SqlRetrieverConfig {
                adapter_name: "qa-sql".to_string(),
                query_template: "SELECT id, body FROM docs WHERE body LIKE ?1".to_string(),
                query_timeout: Duration::from_secs(1),
                max_results: 1,
                security_filter: None,
                allowed_columns: None,
                approved_by_admin: false,
            },
        )
        .unwrap();
        let outcome = retriever
            .get_relevant_context(&RetrievalQuery {
                query: "rust".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.meta.total_available, 2);
        assert_eq!(outcome.docs.len(), 1);
        assert!(outcome.meta.truncated);
    }

    #[tokio::test]
    async fn allowed_columns_projects_output() {
        let retriever = SqlRetriever::new(
            seeded_conn(),
            SqlRetrieverConfig {
                adapter_name: "qa-sql".to_string(),
                query_template: "SELECT id, body FROM docs WHERE body LIKE ?1".to_string(),
                query_timeout: Duration::from_secs(1),
                max_results: 10,
                security_filter: None,
                allowed_columns: Some(vec!["body".to_string()]),
                approved_by_admin: false,
            },
        )
        .unwrap();
        let outcome = retriever
            .get_relevant_context(&RetrievalQuery {
                query: "rust".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        for doc in &outcome.docs {
            assert!(!doc.content.contains("\"id\""));
            assert!(doc.content.contains("\"body\""));
        }
    }

    #[tokio::test]
    async fn security_filter_is_and_ed_into_every_query() {
        let retriever = SqlRetriever::new(
            seeded_conn(),
            SqlRetrieverConfig {
                adapter_name: "qa-sql".to_string(),
                query_template: "SELECT id, body FROM docs WHERE body LIKE ?1".to_string(),
                query_timeout: Duration::from_secs(1),
                max_results: 10,
                security_filter: Some("id = 1".to_string()),
                allowed_columns: None,
                approved_by_admin: false,
            },
        )
        .unwrap();
        let outcome = retriever
            .get_relevant_context(&RetrievalQuery {
                query: "programming".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.docs.len(), 1);
    }

    #[test]
    fn unapproved_multi_table_template_is_rejected() {
        let err = SqlRetriever::new(
            seeded_conn(),
            SqlRetrieverConfig {
                adapter_name: "qa-sql".to_string(),
                query_template: "SELECT d.id FROM docs d JOIN tags t ON t.doc_id = d.id".to_string(),
                query_timeout: Duration::from_secs(1),
                max_results: 10,
                security_filter: None,
                allowed_columns: None,
                approved_by_admin: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, RetrieverError::Backend(_)));
    }

    #[test]
    fn approved_multi_table_template_is_accepted() {
        SqlRetriever::new(
            seeded_conn(),
            SqlRetrieverConfig {
                adapter_name: "qa-sql".to_string(),
                query_template: "SELECT d.id FROM docs d JOIN tags t ON t.doc_id = d.id".to_string(),
                query_timeout: Duration::from_secs(1),
                max_results: 10,
                security_filter: None,
                allowed_columns: None,
                approved_by_admin: true,
            },
        )
        .unwrap();
    }
}
