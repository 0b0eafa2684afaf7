//! # SDMX Feature Store
//!
//! This crate exposes SDMX (Statistical Data and Metadata eXchange) time-series
//! data sets as flat, typed feature records that generic query engines can
//! consume. A dataflow's dimensional structure becomes a feature schema, a
//! generic attribute filter becomes the provider's positional constraint key,
//! and the returned time series are streamed lazily as records.
//!
//! ## Architecture
//!
//! - **Structure** ([`DataflowStructure`], [`Dimension`], [`CodeList`]): the
//!   ordered dimension contract of a dataflow
//! - **Schema builder** ([`build_schema`]): one string column per dimension,
//!   one double column per code of the `MEASURE` dimension
//! - **Constraint translator** ([`translate`], [`all_constraint`]): filters to
//!   dot-separated keys such as `*.TOT.TOT.1.STE.1+2+3+4.A`
//! - **Feature streams** ([`FeatureStream`]): observation records or the
//!   code/label pairs of a single dimension
//! - **Data store** ([`SdmxDataStore`]): store-scoped catalog and caches, the
//!   entry point for readers
//! - **Client seam** ([`SdmxClient`]): the remote provider, with a JSON
//!   snapshot implementation in [`fixture`]
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use atrius_sdmx::{SdmxDataStore, StoreConfig, parse_filter};
//! use atrius_sdmx::fixture::JsonFixtureClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = JsonFixtureClient::from_path("abs.json")?;
//! let config = StoreConfig::new("ABS", "http://aurin.org.au", client.endpoint_url())?;
//! let store = SdmxDataStore::new(config, Arc::new(client));
//!
//! let filter = parse_filter("MSTP='TOT' and REGION in ('1','2')")?;
//! let mut reader = store.read("ABS_CENSUS2011_T04", Some(&filter))?;
//! while reader.has_next() {
//!     let feature = reader.next_feature()?;
//!     println!("{} {:?}", feature.id(), feature.values());
//! }
//! reader.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`SdmxError`]. The provider's reserved
//! "no results" response is not an error: it yields an empty stream.

pub mod client;
pub mod constraint;
pub mod filter;
pub mod fixture;
pub mod output;
pub mod schema;
pub mod store;
pub mod stream;
pub mod structure;
pub mod timeseries;

pub use client::{NO_RESULTS_RESPONSE_CODE, ProviderError, SdmxClient, TimeSeriesOptions};
pub use constraint::{ConstraintExpression, all_constraint, translate};
pub use filter::{ComparisonOp, Filter, parse_filter};
pub use output::{ContentType, write_records};
pub use schema::{AttributeDescriptor, AttributeType, FeatureSchema, build_schema, code_list_schema};
pub use store::{SdmxDataStore, StoreConfig};
pub use stream::{
    CodeListStream, FeatureRecord, FeatureStream, FeatureValue, ObservationStream, StreamState,
};
pub use structure::{Code, CodeList, Dataflow, DataflowStructure, Dimension};
pub use timeseries::TimeSeries;

/// Separator between the per-dimension slots of a constraint expression.
pub const DIMENSION_SEPARATOR: char = '.';
/// Separator between alternative codes within one constraint slot.
pub const OR_SEPARATOR: char = '+';
/// Constraint slot selecting every code of a dimension.
pub const ALL_CODES: &str = "*";
/// Reserved dimension whose codes become numeric columns (case-insensitive).
pub const MEASURE_DIMENSION: &str = "MEASURE";
/// Joins `MEASURE` and a measure code into a column name.
pub const MEASURE_SEPARATOR: &str = "_";
/// Name of the geometry placeholder attribute.
pub const GEOMETRY_ATTR: &str = "geometry";
/// Name of the observation time attribute.
pub const TIME_ATTR: &str = "TIME_PERIOD";
/// Name of the observation value column for structures without a measure dimension.
pub const OBS_VALUE_ATTR: &str = "OBS_VALUE";
/// Code column of dimension code-list features.
pub const CODE_ATTR: &str = "CODE";
/// Label column of dimension code-list features.
pub const DESCRIPTION_ATTR: &str = "DESCRIPTION";
/// Joins a dataflow id and a dimension id into a code-list type name.
pub const DIMENSION_TYPE_SEPARATOR: &str = "__";

/// Comprehensive error type for SDMX feature operations.
///
/// Structural and remote failures are surfaced to the caller of the
/// operation that triggered them. The provider's "no results" response is
/// never mapped to an error.
///
/// # Examples
///
/// ```rust
/// use atrius_sdmx::{SdmxError, parse_filter};
///
/// match parse_filter("AGE = ") {
///     Err(SdmxError::FilterParse(msg)) => eprintln!("bad filter: {}", msg),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SdmxError {
    /// Dataflow catalog or structural metadata could not be fetched.
    #[error("Structure unavailable: {0}")]
    StructureUnavailable(String),

    /// The feature schema could not be derived from the dimension structure.
    #[error("Schema build failed: {0}")]
    SchemaBuildFailed(String),

    /// A feature schema was requested before it was built.
    #[error("Schema not ready: {0}")]
    SchemaNotReady(String),

    /// The filter uses constructs that cannot be expressed as a constraint key.
    ///
    /// Only conjunctions of equality and same-dimension OR/IN predicates are
    /// supported. This is raised before any remote call is made.
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// The provider failed to answer a time-series query.
    #[error("Remote query failed: {0}")]
    RemoteQueryFailed(String),

    /// The named dimension is not part of the dataflow structure.
    #[error("Dimension not found: {0}")]
    DimensionNotFound(String),

    /// The dimension's code list could not be resolved.
    #[error("Code list unavailable: {0}")]
    CodeListUnavailable(String),

    /// `next` was called on a stream with no remaining features.
    #[error("Stream exhausted: {0}")]
    ExhaustedStream(String),

    /// The logical type name is not known to the store.
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// A textual filter could not be parsed.
    #[error("Filter parse error: {0}")]
    FilterParse(String),

    /// Store configuration is malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A snapshot file could not be found.
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// A snapshot file does not contain a valid provider document.
    #[error("Invalid source content: {0}")]
    InvalidSourceContent(String),

    /// Unsupported output content type requested.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// CSV output failed.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// File I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for SDMX feature operations.
pub type Result<T> = std::result::Result<T, SdmxError>;
