//! # Data Store
//!
//! [`SdmxDataStore`] is the entry point for readers. It owns the provider
//! client and the store-scoped caches:
//!
//! - the dataflow catalog, fetched once
//! - resolved dimension structures, per dataflow
//! - feature schemas, per type name (dataflows and dimension code lists)
//!
//! Each dataflow is exposed as a type named after its id. Each of its
//! dimensions is also exposed as a code-list type named
//! `<dataflow>__<dimension>`.
//!
//! Caches are never invalidated except by [`SdmxDataStore::dispose`].
//! Two threads populating the same entry at once may both compute it; the
//! first insert wins and later results are discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use crate::{
    CodeListStream, DIMENSION_TYPE_SEPARATOR, Dataflow, DataflowStructure, FeatureSchema,
    FeatureStream, Filter, ObservationStream, Result, SdmxClient, SdmxError, all_constraint,
    build_schema, code_list_schema, translate,
};

/// Connection settings of a store.
#[derive(Clone)]
pub struct StoreConfig {
    /// Display name of the provider (e.g. `ABS`)
    pub name: String,
    /// Namespace of the exposed type names
    pub namespace: Url,
    /// Provider endpoint
    pub endpoint: Url,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl StoreConfig {
    /// # Errors
    ///
    /// [`SdmxError::InvalidConfig`] when `namespace` or `endpoint` is not a
    /// valid absolute URL.
    pub fn new(name: impl Into<String>, namespace: &str, endpoint: &str) -> Result<Self> {
        let namespace = Url::parse(namespace).map_err(|e| {
            SdmxError::InvalidConfig(format!("namespace '{}': {}", namespace, e))
        })?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SdmxError::InvalidConfig(format!("endpoint '{}': {}", endpoint, e)))?;
        Ok(Self {
            name: name.into(),
            namespace,
            endpoint,
            user: None,
            password: None,
        })
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("name", &self.name)
            .field("namespace", &self.namespace.as_str())
            .field("endpoint", &self.endpoint.as_str())
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

pub struct SdmxDataStore {
    config: StoreConfig,
    client: Arc<dyn SdmxClient>,
    entries: RwLock<Option<Vec<Arc<Dataflow>>>>,
    structures: RwLock<HashMap<String, Arc<DataflowStructure>>>,
    schemas: RwLock<HashMap<String, Arc<FeatureSchema>>>,
}

impl SdmxDataStore {
    pub fn new(config: StoreConfig, client: Arc<dyn SdmxClient>) -> Self {
        Self {
            config,
            client,
            entries: RwLock::new(None),
            structures: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Name of the code-list type exposing one dimension of a dataflow.
    pub fn dimension_type_name(dataflow: &str, dimension: &str) -> String {
        format!("{}{}{}", dataflow, DIMENSION_TYPE_SEPARATOR, dimension)
    }

    /// Splits a code-list type name into its dataflow and dimension ids.
    pub fn split_dimension_type_name(type_name: &str) -> Option<(&str, &str)> {
        type_name
            .rsplit_once(DIMENSION_TYPE_SEPARATOR)
            .filter(|(dataflow, dimension)| !dataflow.is_empty() && !dimension.is_empty())
    }

    /// The dataflow catalog, fetched from the provider on first use.
    pub fn dataflows(&self) -> Result<Vec<Arc<Dataflow>>> {
        if let Some(entries) = self.entries.read().as_ref() {
            return Ok(entries.clone());
        }

        let dataflows = self.client.dataflows().map_err(|e| {
            SdmxError::StructureUnavailable(format!(
                "dataflow catalog of '{}' at {}: {}",
                self.config.name,
                self.client.endpoint(),
                e
            ))
        })?;
        debug!(
            "Fetched {} dataflows from {}",
            dataflows.len(),
            self.client.endpoint()
        );

        let mut entries = self.entries.write();
        let cached = entries.get_or_insert_with(|| dataflows.into_iter().map(Arc::new).collect());
        Ok(cached.clone())
    }

    /// Ids of every dataflow, which are also their type names.
    pub fn type_names(&self) -> Result<Vec<String>> {
        Ok(self.dataflows()?.iter().map(|d| d.id.clone()).collect())
    }

    pub fn dataflow(&self, type_name: &str) -> Result<Arc<Dataflow>> {
        self.dataflows()?
            .into_iter()
            .find(|d| d.id == type_name)
            .ok_or_else(|| {
                SdmxError::TypeNotFound(format!(
                    "'{}' is not a dataflow of '{}'",
                    type_name, self.config.name
                ))
            })
    }

    /// The dimension structure of a dataflow, fetched once per dataflow.
    pub fn structure(&self, type_name: &str) -> Result<Arc<DataflowStructure>> {
        if let Some(structure) = self.structures.read().get(type_name) {
            debug!("Structure cache hit for '{}'", type_name);
            return Ok(Arc::clone(structure));
        }

        let dataflow = self.dataflow(type_name)?;
        let structure = self.client.dataflow_structure(&dataflow).map_err(|e| {
            SdmxError::StructureUnavailable(format!(
                "structure '{}' of dataflow '{}': {}",
                dataflow.dsd_id, dataflow.id, e
            ))
        })?;

        Ok(Arc::clone(
            self.structures
                .write()
                .entry(type_name.to_string())
                .or_insert_with(|| Arc::new(structure)),
        ))
    }

    /// Code-list type names of every dimension of a dataflow, in structure order.
    pub fn dimension_type_names(&self, type_name: &str) -> Result<Vec<String>> {
        Ok(self
            .structure(type_name)?
            .dimensions()
            .iter()
            .map(|d| Self::dimension_type_name(type_name, &d.id))
            .collect())
    }

    /// The feature schema of a dataflow or code-list type name.
    pub fn schema(&self, type_name: &str) -> Result<Arc<FeatureSchema>> {
        if let Some(schema) = self.schemas.read().get(type_name) {
            debug!("Schema cache hit for '{}'", type_name);
            return Ok(Arc::clone(schema));
        }

        let schema = if self.is_dataflow(type_name)? {
            let structure = self.structure(type_name)?;
            build_schema(type_name, &structure)?
        } else {
            let (dataflow, dimension) = self.resolve_dimension_type(type_name)?;
            self.structure(dataflow)?.dimension(dimension)?;
            code_list_schema(type_name)
        };

        Ok(Arc::clone(
            self.schemas
                .write()
                .entry(type_name.to_string())
                .or_insert_with(|| Arc::new(schema)),
        ))
    }

    /// Opens a stream over the time series of a dataflow, one record each.
    ///
    /// The filter is translated before the provider is queried, so an
    /// unsupported filter never causes a remote call. `None` reads every
    /// series.
    pub fn read(&self, type_name: &str, filter: Option<&Filter>) -> Result<FeatureStream> {
        let dataflow = self.dataflow(type_name)?;
        let structure = self.structure(type_name)?;
        let constraint = match filter {
            Some(filter) => translate(filter, &structure)?,
            None => all_constraint(&structure),
        };
        let schema = self.schema(type_name)?;

        let mut stream = ObservationStream::new(schema, dataflow, structure, constraint);
        stream.open(self.client.as_ref())?;
        Ok(FeatureStream::Observations(stream))
    }

    /// Opens a stream over the codes of one dimension of a dataflow.
    pub fn read_codes(&self, dataflow: &str, dimension: &str) -> Result<FeatureStream> {
        let structure = self.structure(dataflow)?;
        let stream = CodeListStream::open(&structure, dimension)?;
        let schema = self.schema(&Self::dimension_type_name(dataflow, dimension))?;
        Ok(FeatureStream::Codes(stream.with_schema(schema)))
    }

    /// Opens a reader for any type name this store exposes.
    ///
    /// Code-list types cannot be filtered; any filter except
    /// [`Filter::Include`] is rejected for them.
    pub fn read_type(&self, type_name: &str, filter: Option<&Filter>) -> Result<FeatureStream> {
        if self.is_dataflow(type_name)? {
            return self.read(type_name, filter);
        }
        let (dataflow, dimension) = self.resolve_dimension_type(type_name)?;
        match filter {
            None | Some(Filter::Include) => self.read_codes(dataflow, dimension),
            Some(other) => Err(SdmxError::UnsupportedFilter(format!(
                "code list type '{}' cannot be filtered by [{}]",
                type_name, other
            ))),
        }
    }

    /// Drops every cached catalog entry, structure and schema.
    pub fn dispose(&self) {
        debug!("Disposing store '{}'", self.config.name);
        *self.entries.write() = None;
        self.structures.write().clear();
        self.schemas.write().clear();
    }

    fn is_dataflow(&self, type_name: &str) -> Result<bool> {
        Ok(self.dataflows()?.iter().any(|d| d.id == type_name))
    }

    fn resolve_dimension_type<'a>(&self, type_name: &'a str) -> Result<(&'a str, &'a str)> {
        let not_found = || {
            SdmxError::TypeNotFound(format!(
                "'{}' is neither a dataflow nor a dimension type of '{}'",
                type_name, self.config.name
            ))
        };
        let (dataflow, dimension) =
            Self::split_dimension_type_name(type_name).ok_or_else(not_found)?;
        if !self.is_dataflow(dataflow)? {
            return Err(not_found());
        }
        Ok((dataflow, dimension))
    }
}
