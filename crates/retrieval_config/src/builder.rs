//! Builds the retrieval configuration for a turn.
//!
//! Backend selection is a priority chain evaluated against the immutable
//! settings: search-index, then document-store, then log-search, then
//! vector-service, then managed-index. The first backend whose required
//! settings are all present wins; when none match, retrieval is disabled
//! and the turn runs as a plain system-message chat.

use crate::error::BuildError;
use crate::filter::{conversation_scope_filter, group_filter};
use crate::source::{
    Authentication, DataSource, DocumentStoreParameters, EmbeddingDependency, FieldsMapping,
    LogSearchParameters, ManagedIndexParameters, QueryType, SearchIndexParameters,
    VectorServiceParameters,
};
use chat_core::identity::CallerIdentity;
use chat_core::settings::AppSettings;
use log::debug;

/// The configured retrieval backend, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    SearchIndex,
    DocumentStore,
    LogSearch,
    VectorService,
    ManagedIndex,
}

impl BackendKind {
    /// Evaluate the selection priority chain against the settings.
    pub fn select(settings: &AppSettings) -> Option<BackendKind> {
        if settings.search_index.is_some() {
            debug!("retrieval backend: search index");
            return Some(BackendKind::SearchIndex);
        }
        if settings.document_store.is_some() {
            debug!("retrieval backend: document store");
            return Some(BackendKind::DocumentStore);
        }
        if settings.log_search.is_some() {
            debug!("retrieval backend: log search");
            return Some(BackendKind::LogSearch);
        }
        if settings.vector_service.is_some() {
            debug!("retrieval backend: vector service");
            return Some(BackendKind::VectorService);
        }
        if settings.managed_index.is_some() {
            debug!("retrieval backend: managed index");
            return Some(BackendKind::ManagedIndex);
        }
        None
    }
}

fn parse_query_type(name: &str, value: &str) -> Result<QueryType, BuildError> {
    value
        .parse::<QueryType>()
        .map_err(|e| BuildError::Configuration(format!("{name}: {e}")))
}

fn fields_mapping(
    content_columns: &Option<Vec<String>>,
    title_column: &Option<String>,
    url_column: &Option<String>,
    filename_column: &Option<String>,
    vector_columns: &Option<Vec<String>>,
) -> FieldsMapping {
    FieldsMapping {
        content_fields: content_columns.clone().unwrap_or_default(),
        title_field: title_column.clone(),
        url_field: url_column.clone(),
        filepath_field: filename_column.clone(),
        vector_fields: vector_columns.clone().unwrap_or_default(),
    }
}

/// Pure builder from settings + caller + conversation to a validated
/// `DataSource`.
pub struct DataSourceBuilder<'a> {
    settings: &'a AppSettings,
}

impl<'a> DataSourceBuilder<'a> {
    pub fn new(settings: &'a AppSettings) -> Self {
        Self { settings }
    }

    /// Build the retrieval configuration for one turn.
    pub fn build(
        &self,
        caller: &CallerIdentity,
        conversation_id: Option<&str>,
    ) -> Result<DataSource, BuildError> {
        let kind = BackendKind::select(self.settings).ok_or_else(|| {
            BuildError::Configuration("no retrieval backend is configured".to_string())
        })?;

        let mut source = match kind {
            BackendKind::SearchIndex => self.build_search_index(caller, conversation_id)?,
            BackendKind::DocumentStore => self.build_document_store()?,
            BackendKind::LogSearch => self.build_log_search()?,
            BackendKind::VectorService => self.build_vector_service()?,
            BackendKind::ManagedIndex => self.build_managed_index()?,
        };

        self.attach_embedding_dependency(kind, &mut source)?;
        Ok(source)
    }

    fn build_search_index(
        &self,
        caller: &CallerIdentity,
        conversation_id: Option<&str>,
    ) -> Result<DataSource, BuildError> {
        let search = self.settings.search_index.as_ref().ok_or_else(|| {
            BuildError::Configuration("search index settings are missing".to_string())
        })?;

        let query_type = match &search.query_type {
            Some(value) => parse_query_type("SEARCH_INDEX_QUERY_TYPE", value)?,
            None if search.use_semantic_search && !search.semantic_config.is_empty() => {
                QueryType::Semantic
            }
            None => QueryType::Simple,
        };

        // Document-level access control requires the caller's token; a
        // missing token is an authorization failure, never an open query.
        let mut filter = None;
        if let Some(column) = &search.permitted_groups_column {
            if caller.access_token.as_deref().unwrap_or("").is_empty() {
                return Err(BuildError::Authorization(
                    "document-level access control is enabled, but no user access token was provided"
                        .to_string(),
                ));
            }
            filter = Some(group_filter(column, &caller.groups));
            debug!("access filter: {filter:?}");
        }
        let filter = conversation_scope_filter(filter, &caller.user_id, conversation_id);

        let authentication = match &search.key {
            Some(key) => Authentication::ApiKey {
                api_key: key.clone(),
            },
            // Without a key the provider's own identity is assumed to
            // have been granted access to the search service.
            None => Authentication::ServiceIdentity {},
        };

        Ok(DataSource::SearchIndex {
            parameters: SearchIndexParameters {
                endpoint: search.endpoint.clone(),
                authentication,
                index_name: search.index.clone(),
                fields_mapping: fields_mapping(
                    &search.content_columns,
                    &search.title_column,
                    &search.url_column,
                    &search.filename_column,
                    &search.vector_columns,
                ),
                in_scope: search
                    .in_domain
                    .unwrap_or(self.settings.search_defaults.in_domain),
                top_n_documents: search.top_k.unwrap_or(self.settings.search_defaults.top_k),
                query_type,
                semantic_configuration: search.semantic_config.clone(),
                role_information: self.settings.model.system_message.clone(),
                filter: Some(filter),
                strictness: search
                    .strictness
                    .unwrap_or(self.settings.search_defaults.strictness),
                embedding_dependency: None,
            },
        })
    }

    fn build_document_store(&self) -> Result<DataSource, BuildError> {
        let store = self.settings.document_store.as_ref().ok_or_else(|| {
            BuildError::Configuration("document store settings are missing".to_string())
        })?;

        Ok(DataSource::DocumentStore {
            parameters: DocumentStoreParameters {
                authentication: Authentication::ConnectionString {
                    connection_string: store.connection_string.clone(),
                },
                database_name: store.database.clone(),
                container_name: store.container.clone(),
                index_name: store.index.clone(),
                fields_mapping: fields_mapping(
                    &store.content_columns,
                    &store.title_column,
                    &store.url_column,
                    &store.filename_column,
                    &store.vector_columns,
                ),
                in_scope: store
                    .in_domain
                    .unwrap_or(self.settings.search_defaults.in_domain),
                top_n_documents: store.top_k.unwrap_or(self.settings.search_defaults.top_k),
                query_type: QueryType::Vector,
                role_information: self.settings.model.system_message.clone(),
                strictness: store
                    .strictness
                    .unwrap_or(self.settings.search_defaults.strictness),
                embedding_dependency: None,
            },
        })
    }

    fn build_log_search(&self) -> Result<DataSource, BuildError> {
        let logs = self.settings.log_search.as_ref().ok_or_else(|| {
            BuildError::Configuration("log search settings are missing".to_string())
        })?;

        let query_type = match &logs.query_type {
            Some(value) => parse_query_type("LOGSEARCH_QUERY_TYPE", value)?,
            None => QueryType::Simple,
        };

        Ok(DataSource::LogSearch {
            parameters: LogSearchParameters {
                endpoint: logs.endpoint.clone(),
                authentication: Authentication::EncodedApiKey {
                    encoded_api_key: logs.encoded_api_key.clone(),
                },
                index_name: logs.index.clone(),
                fields_mapping: fields_mapping(
                    &logs.content_columns,
                    &logs.title_column,
                    &logs.url_column,
                    &logs.filename_column,
                    &logs.vector_columns,
                ),
                in_scope: logs
                    .in_domain
                    .unwrap_or(self.settings.search_defaults.in_domain),
                top_n_documents: logs.top_k.unwrap_or(self.settings.search_defaults.top_k),
                query_type,
                role_information: self.settings.model.system_message.clone(),
                strictness: logs
                    .strictness
                    .unwrap_or(self.settings.search_defaults.strictness),
                embedding_dependency: None,
            },
        })
    }

    fn build_vector_service(&self) -> Result<DataSource, BuildError> {
        let vectors = self.settings.vector_service.as_ref().ok_or_else(|| {
            BuildError::Configuration("vector service settings are missing".to_string())
        })?;

        Ok(DataSource::VectorService {
            parameters: VectorServiceParameters {
                environment: vectors.environment.clone(),
                authentication: Authentication::Key {
                    key: vectors.api_key.clone(),
                },
                index_name: vectors.index.clone(),
                fields_mapping: fields_mapping(
                    &vectors.content_columns,
                    &vectors.title_column,
                    &vectors.url_column,
                    &vectors.filename_column,
                    &vectors.vector_columns,
                ),
                in_scope: vectors
                    .in_domain
                    .unwrap_or(self.settings.search_defaults.in_domain),
                top_n_documents: vectors.top_k.unwrap_or(self.settings.search_defaults.top_k),
                query_type: QueryType::Vector,
                role_information: self.settings.model.system_message.clone(),
                strictness: vectors
                    .strictness
                    .unwrap_or(self.settings.search_defaults.strictness),
                embedding_dependency: None,
            },
        })
    }

    fn build_managed_index(&self) -> Result<DataSource, BuildError> {
        let managed = self.settings.managed_index.as_ref().ok_or_else(|| {
            BuildError::Configuration("managed index settings are missing".to_string())
        })?;

        let query_type = match &managed.query_type {
            Some(value) => parse_query_type("MANAGED_INDEX_QUERY_TYPE", value)?,
            None => QueryType::Simple,
        };

        Ok(DataSource::ManagedIndex {
            parameters: ManagedIndexParameters {
                name: managed.name.clone(),
                version: managed.version.clone(),
                project_resource_id: managed.project_resource_id.clone(),
                fields_mapping: fields_mapping(
                    &managed.content_columns,
                    &managed.title_column,
                    &managed.url_column,
                    &managed.filename_column,
                    &managed.vector_columns,
                ),
                in_scope: managed
                    .in_domain
                    .unwrap_or(self.settings.search_defaults.in_domain),
                top_n_documents: managed.top_k.unwrap_or(self.settings.search_defaults.top_k),
                query_type,
                role_information: self.settings.model.system_message.clone(),
                strictness: managed
                    .strictness
                    .unwrap_or(self.settings.search_defaults.strictness),
            },
        })
    }

    /// Resolve the embedding dependency when the query mode requires
    /// vectorization. The managed-index backend embeds natively and is
    /// exempt; for every other backend the absence of a resolvable
    /// dependency is a configuration error, not a runtime fallback.
    fn attach_embedding_dependency(
        &self,
        kind: BackendKind,
        source: &mut DataSource,
    ) -> Result<(), BuildError> {
        if !source.query_type().is_vector() || kind == BackendKind::ManagedIndex {
            return Ok(());
        }

        let embedding = &self.settings.embedding;
        let dependency = if let Some(deployment_name) = &embedding.deployment_name {
            EmbeddingDependency::DeploymentName {
                deployment_name: deployment_name.clone(),
            }
        } else if let (Some(endpoint), Some(key)) = (&embedding.endpoint, &embedding.key) {
            EmbeddingDependency::Endpoint {
                endpoint: endpoint.clone(),
                authentication: Authentication::ApiKey {
                    api_key: key.clone(),
                },
            }
        } else if let (BackendKind::LogSearch, Some(model_id)) = (
            kind,
            self.settings
                .log_search
                .as_ref()
                .and_then(|l| l.embedding_model_id.clone()),
        ) {
            EmbeddingDependency::ModelId { model_id }
        } else {
            return Err(BuildError::Configuration(format!(
                "vector query type ({}) is selected for data source {} but no embedding dependency is configured",
                source.query_type().as_str(),
                source.tag(),
            )));
        };

        match source {
            DataSource::SearchIndex { parameters } => {
                parameters.embedding_dependency = Some(dependency)
            }
            DataSource::DocumentStore { parameters } => {
                parameters.embedding_dependency = Some(dependency)
            }
            DataSource::LogSearch { parameters } => {
                parameters.embedding_dependency = Some(dependency)
            }
            DataSource::VectorService { parameters } => {
                parameters.embedding_dependency = Some(dependency)
            }
            DataSource::ManagedIndex { .. } => {}
        }
        Ok(())
    }
}
