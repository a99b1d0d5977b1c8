//! The retrieval configuration sum type and its wire shapes.
//!
//! `DataSource` serializes to `{ "type": <backend-tag>, "parameters": {...} }`
//! as required by the invocation-request extension contract.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the backend resolves the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Simple,
    Semantic,
    Vector,
    VectorSimpleHybrid,
    VectorSemanticHybrid,
}

impl QueryType {
    /// Whether this mode needs query vectorization.
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            QueryType::Vector | QueryType::VectorSimpleHybrid | QueryType::VectorSemanticHybrid
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Simple => "simple",
            QueryType::Semantic => "semantic",
            QueryType::Vector => "vector",
            QueryType::VectorSimpleHybrid => "vector_simple_hybrid",
            QueryType::VectorSemanticHybrid => "vector_semantic_hybrid",
        }
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(QueryType::Simple),
            "semantic" => Ok(QueryType::Semantic),
            "vector" => Ok(QueryType::Vector),
            "vector_simple_hybrid" | "vectorsimplehybrid" => Ok(QueryType::VectorSimpleHybrid),
            "vector_semantic_hybrid" | "vectorsemantichybrid" => {
                Ok(QueryType::VectorSemanticHybrid)
            }
            other => Err(format!("unknown query type {other:?}")),
        }
    }
}

/// Authentication descriptor for a backend or embedding endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authentication {
    ApiKey { api_key: String },
    Key { key: String },
    ConnectionString { connection_string: String },
    EncodedApiKey { encoded_api_key: String },
    /// The provider's own service identity has been granted access; no
    /// credential travels with the request.
    ServiceIdentity {},
}

/// The resource used to vectorize the query for vector-mode retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbeddingDependency {
    DeploymentName {
        deployment_name: String,
    },
    Endpoint {
        endpoint: String,
        authentication: Authentication,
    },
    ModelId {
        model_id: String,
    },
}

/// Mapping from backend document fields to the roles the model needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsMapping {
    pub content_fields: Vec<String>,
    pub title_field: Option<String>,
    pub url_field: Option<String>,
    pub filepath_field: Option<String>,
    pub vector_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexParameters {
    pub endpoint: String,
    pub authentication: Authentication,
    pub index_name: String,
    pub fields_mapping: FieldsMapping,
    pub in_scope: bool,
    pub top_n_documents: u32,
    pub query_type: QueryType,
    pub semantic_configuration: String,
    pub role_information: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub strictness: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dependency: Option<EmbeddingDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStoreParameters {
    pub authentication: Authentication,
    pub database_name: String,
    pub container_name: String,
    pub index_name: String,
    pub fields_mapping: FieldsMapping,
    pub in_scope: bool,
    pub top_n_documents: u32,
    pub query_type: QueryType,
    pub role_information: String,
    pub strictness: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dependency: Option<EmbeddingDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSearchParameters {
    pub endpoint: String,
    pub authentication: Authentication,
    pub index_name: String,
    pub fields_mapping: FieldsMapping,
    pub in_scope: bool,
    pub top_n_documents: u32,
    pub query_type: QueryType,
    pub role_information: String,
    pub strictness: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dependency: Option<EmbeddingDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedIndexParameters {
    pub name: String,
    pub version: String,
    pub project_resource_id: String,
    pub fields_mapping: FieldsMapping,
    pub in_scope: bool,
    pub top_n_documents: u32,
    pub query_type: QueryType,
    pub role_information: String,
    pub strictness: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorServiceParameters {
    pub environment: String,
    pub authentication: Authentication,
    pub index_name: String,
    pub fields_mapping: FieldsMapping,
    pub in_scope: bool,
    pub top_n_documents: u32,
    pub query_type: QueryType,
    pub role_information: String,
    pub strictness: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dependency: Option<EmbeddingDependency>,
}

/// Validated retrieval configuration, one variant per backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    SearchIndex { parameters: SearchIndexParameters },
    DocumentStore { parameters: DocumentStoreParameters },
    LogSearch { parameters: LogSearchParameters },
    ManagedIndex { parameters: ManagedIndexParameters },
    VectorService { parameters: VectorServiceParameters },
}

impl DataSource {
    /// The wire tag of this variant.
    pub fn tag(&self) -> &'static str {
        match self {
            DataSource::SearchIndex { .. } => "search_index",
            DataSource::DocumentStore { .. } => "document_store",
            DataSource::LogSearch { .. } => "log_search",
            DataSource::ManagedIndex { .. } => "managed_index",
            DataSource::VectorService { .. } => "vector_service",
        }
    }

    pub fn query_type(&self) -> QueryType {
        match self {
            DataSource::SearchIndex { parameters } => parameters.query_type,
            DataSource::DocumentStore { parameters } => parameters.query_type,
            DataSource::LogSearch { parameters } => parameters.query_type,
            DataSource::ManagedIndex { parameters } => parameters.query_type,
            DataSource::VectorService { parameters } => parameters.query_type,
        }
    }

    pub fn top_n_documents(&self) -> u32 {
        match self {
            DataSource::SearchIndex { parameters } => parameters.top_n_documents,
            DataSource::DocumentStore { parameters } => parameters.top_n_documents,
            DataSource::LogSearch { parameters } => parameters.top_n_documents,
            DataSource::ManagedIndex { parameters } => parameters.top_n_documents,
            DataSource::VectorService { parameters } => parameters.top_n_documents,
        }
    }

    pub fn strictness(&self) -> u32 {
        match self {
            DataSource::SearchIndex { parameters } => parameters.strictness,
            DataSource::DocumentStore { parameters } => parameters.strictness,
            DataSource::LogSearch { parameters } => parameters.strictness,
            DataSource::ManagedIndex { parameters } => parameters.strictness,
            DataSource::VectorService { parameters } => parameters.strictness,
        }
    }

    /// The system prompt carried inside the configuration.
    pub fn role_information(&self) -> &str {
        match self {
            DataSource::SearchIndex { parameters } => &parameters.role_information,
            DataSource::DocumentStore { parameters } => &parameters.role_information,
            DataSource::LogSearch { parameters } => &parameters.role_information,
            DataSource::ManagedIndex { parameters } => &parameters.role_information,
            DataSource::VectorService { parameters } => &parameters.role_information,
        }
    }

    /// The backend authentication block. The managed-index backend carries
    /// no credential of its own.
    pub fn authentication_mut(&mut self) -> Option<&mut Authentication> {
        match self {
            DataSource::SearchIndex { parameters } => Some(&mut parameters.authentication),
            DataSource::DocumentStore { parameters } => Some(&mut parameters.authentication),
            DataSource::LogSearch { parameters } => Some(&mut parameters.authentication),
            DataSource::ManagedIndex { .. } => None,
            DataSource::VectorService { parameters } => Some(&mut parameters.authentication),
        }
    }

    pub fn embedding_dependency(&self) -> Option<&EmbeddingDependency> {
        match self {
            DataSource::SearchIndex { parameters } => parameters.embedding_dependency.as_ref(),
            DataSource::DocumentStore { parameters } => parameters.embedding_dependency.as_ref(),
            DataSource::LogSearch { parameters } => parameters.embedding_dependency.as_ref(),
            DataSource::ManagedIndex { .. } => None,
            DataSource::VectorService { parameters } => parameters.embedding_dependency.as_ref(),
        }
    }

    pub fn embedding_dependency_mut(&mut self) -> Option<&mut EmbeddingDependency> {
        match self {
            DataSource::SearchIndex { parameters } => parameters.embedding_dependency.as_mut(),
            DataSource::DocumentStore { parameters } => parameters.embedding_dependency.as_mut(),
            DataSource::LogSearch { parameters } => parameters.embedding_dependency.as_mut(),
            DataSource::ManagedIndex { .. } => None,
            DataSource::VectorService { parameters } => parameters.embedding_dependency.as_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_wire_shape() {
        let source = DataSource::LogSearch {
            parameters: LogSearchParameters {
                endpoint: "https://logs.example.test".to_string(),
                authentication: Authentication::EncodedApiKey {
                    encoded_api_key: "zzz".to_string(),
                },
                index_name: "audit".to_string(),
                fields_mapping: FieldsMapping::default(),
                in_scope: true,
                top_n_documents: 5,
                query_type: QueryType::Simple,
                role_information: "be helpful".to_string(),
                strictness: 3,
                embedding_dependency: None,
            },
        };
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value["type"], "log_search");
        assert_eq!(value["parameters"]["index_name"], "audit");
        assert_eq!(value["parameters"]["authentication"]["type"], "encoded_api_key");
        assert!(value["parameters"].get("embedding_dependency").is_none());
    }

    #[test]
    fn query_type_round_trip() {
        for (text, expected) in [
            ("simple", QueryType::Simple),
            ("vector_semantic_hybrid", QueryType::VectorSemanticHybrid),
            ("VECTOR", QueryType::Vector),
        ] {
            assert_eq!(text.parse::<QueryType>().unwrap(), expected);
        }
        assert!("fuzzy".parse::<QueryType>().is_err());
        assert!(QueryType::VectorSimpleHybrid.is_vector());
        assert!(!QueryType::Semantic.is_vector());
    }
}
