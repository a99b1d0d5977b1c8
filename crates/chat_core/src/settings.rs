//! Application settings.
//!
//! All configuration is read from the environment exactly once at startup
//! into an immutable `AppSettings` value that is passed by reference into
//! every component. No component reads ambient process state directly.
//!
//! Backend sections (`search_index`, `document_store`, ...) are `Some`
//! only when their required settings are all present; optional per-backend
//! overrides live inside the section and fall back to `SearchDefaults`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("setting {name} must be an integer, got {value:?}")]
    InvalidNumber { name: String, value: String },
    #[error("setting {name} must be a number, got {value:?}")]
    InvalidFloat { name: String, value: String },
}

/// Model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stop_sequence: Option<Vec<String>>,
    pub stream: bool,
    pub system_message: String,
}

pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are an AI assistant that helps people find information.";

/// Retrieval defaults shared by every backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchDefaults {
    pub top_k: u32,
    pub strictness: u32,
    pub in_domain: bool,
}

pub const DEFAULT_TOP_K: u32 = 5;
pub const DEFAULT_STRICTNESS: u32 = 3;

/// Full-text search index backend (highest selection priority).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexSettings {
    pub endpoint: String,
    pub index: String,
    pub key: Option<String>,
    pub use_semantic_search: bool,
    pub semantic_config: String,
    pub top_k: Option<u32>,
    pub strictness: Option<u32>,
    pub in_domain: Option<bool>,
    pub content_columns: Option<Vec<String>>,
    pub filename_column: Option<String>,
    pub title_column: Option<String>,
    pub url_column: Option<String>,
    pub vector_columns: Option<Vec<String>>,
    pub query_type: Option<String>,
    pub permitted_groups_column: Option<String>,
}

/// Document-store vector backend (always vector query mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreSettings {
    pub connection_string: String,
    pub database: String,
    pub container: String,
    pub index: String,
    pub top_k: Option<u32>,
    pub strictness: Option<u32>,
    pub in_domain: Option<bool>,
    pub content_columns: Option<Vec<String>>,
    pub filename_column: Option<String>,
    pub title_column: Option<String>,
    pub url_column: Option<String>,
    pub vector_columns: Option<Vec<String>>,
}

/// Log-search backend. The only backend that can embed natively via a
/// backend-resident model id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSearchSettings {
    pub endpoint: String,
    pub encoded_api_key: String,
    pub index: String,
    pub top_k: Option<u32>,
    pub strictness: Option<u32>,
    pub in_domain: Option<bool>,
    pub content_columns: Option<Vec<String>>,
    pub filename_column: Option<String>,
    pub title_column: Option<String>,
    pub url_column: Option<String>,
    pub vector_columns: Option<Vec<String>>,
    pub query_type: Option<String>,
    pub embedding_model_id: Option<String>,
}

/// Hosted vector-database backend (always vector query mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorServiceSettings {
    pub environment: String,
    pub api_key: String,
    pub index: String,
    pub top_k: Option<u32>,
    pub strictness: Option<u32>,
    pub in_domain: Option<bool>,
    pub content_columns: Option<Vec<String>>,
    pub filename_column: Option<String>,
    pub title_column: Option<String>,
    pub url_column: Option<String>,
    pub vector_columns: Option<Vec<String>>,
}

/// Managed index backend (embeds natively; lowest selection priority).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedIndexSettings {
    pub name: String,
    pub version: String,
    pub project_resource_id: String,
    pub top_k: Option<u32>,
    pub strictness: Option<u32>,
    pub in_domain: Option<bool>,
    pub content_columns: Option<Vec<String>>,
    pub filename_column: Option<String>,
    pub title_column: Option<String>,
    pub url_column: Option<String>,
    pub vector_columns: Option<Vec<String>>,
    pub query_type: Option<String>,
}

/// Resources for vectorizing queries when a backend cannot embed natively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub deployment_name: Option<String>,
    pub endpoint: Option<String>,
    pub key: Option<String>,
}

/// Delegated-flow invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSettings {
    pub use_flow: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub response_timeout_secs: f64,
    pub request_field: String,
    pub response_field: String,
    pub citations_field: String,
}

/// Conversation history persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    pub store_path: PathBuf,
    pub enable_feedback: bool,
    pub cascade_cleanup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub model: ModelSettings,
    pub search_defaults: SearchDefaults,
    pub search_index: Option<SearchIndexSettings>,
    pub document_store: Option<DocumentStoreSettings>,
    pub log_search: Option<LogSearchSettings>,
    pub vector_service: Option<VectorServiceSettings>,
    pub managed_index: Option<ManagedIndexSettings>,
    pub embedding: EmbeddingSettings,
    pub flow: FlowSettings,
    pub history: Option<HistorySettings>,
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Split a multi-column setting. A `|` separator wins over `,` so column
/// names containing commas stay intact.
pub fn parse_multi_columns(value: &str) -> Vec<String> {
    let separator = if value.contains('|') { '|' } else { ',' };
    value
        .split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Environment accessor indirection so settings construction is testable
/// without mutating process state.
struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> Env<'a> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| parse_bool(&v))
    }

    fn get_u32(&self, name: &str) -> Result<Option<u32>, SettingsError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value.trim().parse::<u32>().map(Some).map_err(|_| {
                SettingsError::InvalidNumber {
                    name: name.to_string(),
                    value,
                }
            }),
        }
    }

    fn get_f64(&self, name: &str) -> Result<Option<f64>, SettingsError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value.trim().parse::<f64>().map(Some).map_err(|_| {
                SettingsError::InvalidFloat {
                    name: name.to_string(),
                    value,
                }
            }),
        }
    }

    fn get_columns(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|v| parse_multi_columns(&v))
    }
}

impl AppSettings {
    /// Read settings from the process environment. Called once at startup.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup(
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let env = Env { lookup };

        let model = ModelSettings {
            endpoint: env.get("MODEL_ENDPOINT"),
            key: env.get("MODEL_KEY"),
            model: env.get("MODEL_NAME"),
            temperature: env.get_f64("MODEL_TEMPERATURE")?.unwrap_or(0.0) as f32,
            top_p: env.get_f64("MODEL_TOP_P")?.unwrap_or(1.0) as f32,
            max_tokens: env.get_u32("MODEL_MAX_TOKENS")?.unwrap_or(1000),
            stop_sequence: env.get_columns("MODEL_STOP_SEQUENCE"),
            stream: env.get_bool("MODEL_STREAM").unwrap_or(true),
            system_message: env
                .get("MODEL_SYSTEM_MESSAGE")
                .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string()),
        };

        let search_defaults = SearchDefaults {
            top_k: env.get_u32("SEARCH_TOP_K")?.unwrap_or(DEFAULT_TOP_K),
            strictness: env
                .get_u32("SEARCH_STRICTNESS")?
                .unwrap_or(DEFAULT_STRICTNESS),
            in_domain: env.get_bool("SEARCH_ENABLE_IN_DOMAIN").unwrap_or(true),
        };

        let search_index = match (env.get("SEARCH_INDEX_ENDPOINT"), env.get("SEARCH_INDEX_NAME"))
        {
            (Some(endpoint), Some(index)) => Some(SearchIndexSettings {
                endpoint,
                index,
                key: env.get("SEARCH_INDEX_KEY"),
                use_semantic_search: env
                    .get_bool("SEARCH_INDEX_USE_SEMANTIC_SEARCH")
                    .unwrap_or(false),
                semantic_config: env
                    .get("SEARCH_INDEX_SEMANTIC_CONFIG")
                    .unwrap_or_else(|| "default".to_string()),
                top_k: env.get_u32("SEARCH_INDEX_TOP_K")?,
                strictness: env.get_u32("SEARCH_INDEX_STRICTNESS")?,
                in_domain: env.get_bool("SEARCH_INDEX_ENABLE_IN_DOMAIN"),
                content_columns: env.get_columns("SEARCH_INDEX_CONTENT_COLUMNS"),
                filename_column: env.get("SEARCH_INDEX_FILENAME_COLUMN"),
                title_column: env.get("SEARCH_INDEX_TITLE_COLUMN"),
                url_column: env.get("SEARCH_INDEX_URL_COLUMN"),
                vector_columns: env.get_columns("SEARCH_INDEX_VECTOR_COLUMNS"),
                query_type: env.get("SEARCH_INDEX_QUERY_TYPE"),
                permitted_groups_column: env.get("SEARCH_INDEX_PERMITTED_GROUPS_COLUMN"),
            }),
            _ => None,
        };

        let document_store = match (
            env.get("DOCSTORE_CONNECTION_STRING"),
            env.get("DOCSTORE_DATABASE"),
            env.get("DOCSTORE_CONTAINER"),
            env.get("DOCSTORE_INDEX"),
        ) {
            (Some(connection_string), Some(database), Some(container), Some(index)) => {
                Some(DocumentStoreSettings {
                    connection_string,
                    database,
                    container,
                    index,
                    top_k: env.get_u32("DOCSTORE_TOP_K")?,
                    strictness: env.get_u32("DOCSTORE_STRICTNESS")?,
                    in_domain: env.get_bool("DOCSTORE_ENABLE_IN_DOMAIN"),
                    content_columns: env.get_columns("DOCSTORE_CONTENT_COLUMNS"),
                    filename_column: env.get("DOCSTORE_FILENAME_COLUMN"),
                    title_column: env.get("DOCSTORE_TITLE_COLUMN"),
                    url_column: env.get("DOCSTORE_URL_COLUMN"),
                    vector_columns: env.get_columns("DOCSTORE_VECTOR_COLUMNS"),
                })
            }
            _ => None,
        };

        let log_search = match (
            env.get("LOGSEARCH_ENDPOINT"),
            env.get("LOGSEARCH_ENCODED_API_KEY"),
            env.get("LOGSEARCH_INDEX"),
        ) {
            (Some(endpoint), Some(encoded_api_key), Some(index)) => Some(LogSearchSettings {
                endpoint,
                encoded_api_key,
                index,
                top_k: env.get_u32("LOGSEARCH_TOP_K")?,
                strictness: env.get_u32("LOGSEARCH_STRICTNESS")?,
                in_domain: env.get_bool("LOGSEARCH_ENABLE_IN_DOMAIN"),
                content_columns: env.get_columns("LOGSEARCH_CONTENT_COLUMNS"),
                filename_column: env.get("LOGSEARCH_FILENAME_COLUMN"),
                title_column: env.get("LOGSEARCH_TITLE_COLUMN"),
                url_column: env.get("LOGSEARCH_URL_COLUMN"),
                vector_columns: env.get_columns("LOGSEARCH_VECTOR_COLUMNS"),
                query_type: env.get("LOGSEARCH_QUERY_TYPE"),
                embedding_model_id: env.get("LOGSEARCH_EMBEDDING_MODEL_ID"),
            }),
            _ => None,
        };

        let vector_service = match (
            env.get("VECTORDB_ENVIRONMENT"),
            env.get("VECTORDB_API_KEY"),
            env.get("VECTORDB_INDEX_NAME"),
        ) {
            (Some(environment), Some(api_key), Some(index)) => Some(VectorServiceSettings {
                environment,
                api_key,
                index,
                top_k: env.get_u32("VECTORDB_TOP_K")?,
                strictness: env.get_u32("VECTORDB_STRICTNESS")?,
                in_domain: env.get_bool("VECTORDB_ENABLE_IN_DOMAIN"),
                content_columns: env.get_columns("VECTORDB_CONTENT_COLUMNS"),
                filename_column: env.get("VECTORDB_FILENAME_COLUMN"),
                title_column: env.get("VECTORDB_TITLE_COLUMN"),
                url_column: env.get("VECTORDB_URL_COLUMN"),
                vector_columns: env.get_columns("VECTORDB_VECTOR_COLUMNS"),
            }),
            _ => None,
        };

        let managed_index = match (
            env.get("MANAGED_INDEX_NAME"),
            env.get("MANAGED_INDEX_VERSION"),
            env.get("MANAGED_INDEX_PROJECT_RESOURCE_ID"),
        ) {
            (Some(name), Some(version), Some(project_resource_id)) => {
                Some(ManagedIndexSettings {
                    name,
                    version,
                    project_resource_id,
                    top_k: env.get_u32("MANAGED_INDEX_TOP_K")?,
                    strictness: env.get_u32("MANAGED_INDEX_STRICTNESS")?,
                    in_domain: env.get_bool("MANAGED_INDEX_ENABLE_IN_DOMAIN"),
                    content_columns: env.get_columns("MANAGED_INDEX_CONTENT_COLUMNS"),
                    filename_column: env.get("MANAGED_INDEX_FILENAME_COLUMN"),
                    title_column: env.get("MANAGED_INDEX_TITLE_COLUMN"),
                    url_column: env.get("MANAGED_INDEX_URL_COLUMN"),
                    vector_columns: env.get_columns("MANAGED_INDEX_VECTOR_COLUMNS"),
                    query_type: env.get("MANAGED_INDEX_QUERY_TYPE"),
                })
            }
            _ => None,
        };

        let embedding = EmbeddingSettings {
            deployment_name: env.get("EMBEDDING_DEPLOYMENT_NAME"),
            endpoint: env.get("EMBEDDING_ENDPOINT"),
            key: env.get("EMBEDDING_KEY"),
        };

        let flow = FlowSettings {
            use_flow: env.get_bool("USE_FLOW").unwrap_or(false),
            endpoint: env.get("FLOW_ENDPOINT"),
            api_key: env.get("FLOW_API_KEY"),
            response_timeout_secs: env.get_f64("FLOW_RESPONSE_TIMEOUT")?.unwrap_or(30.0),
            request_field: env
                .get("FLOW_REQUEST_FIELD_NAME")
                .unwrap_or_else(|| "question".to_string()),
            response_field: env
                .get("FLOW_RESPONSE_FIELD_NAME")
                .unwrap_or_else(|| "reply".to_string()),
            citations_field: env
                .get("FLOW_CITATIONS_FIELD_NAME")
                .unwrap_or_else(|| "documents".to_string()),
        };

        let history = env.get("HISTORY_STORE_PATH").map(|path| HistorySettings {
            store_path: PathBuf::from(path),
            enable_feedback: env.get_bool("HISTORY_ENABLE_FEEDBACK").unwrap_or(false),
            cascade_cleanup: env.get_bool("HISTORY_CASCADE_CLEANUP").unwrap_or(false),
        });

        Ok(AppSettings {
            model,
            search_defaults,
            search_index,
            document_store,
            log_search,
            vector_service,
            managed_index,
            embedding,
            flow,
            history,
        })
    }
}
