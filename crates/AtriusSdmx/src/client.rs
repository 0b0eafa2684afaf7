//! # Provider Client Seam
//!
//! The SDMX provider is an external collaborator: this module only defines
//! the interface the feature store talks to. Transport, wire parsing,
//! timeouts and retries all belong to the implementation behind
//! [`SdmxClient`].
//!
//! Calls are blocking. The store never retries a failed call.

use std::fmt;

use crate::{Dataflow, DataflowStructure, TimeSeries};

/// Response code the provider uses to report that a query matched no data.
///
/// A response carrying this code is a successful empty result, not a
/// failure.
pub const NO_RESULTS_RESPONSE_CODE: u16 = 404;

/// An error reported by the provider, optionally carrying its response code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// The reserved "no matching data" response.
    pub fn no_results(message: impl Into<String>) -> Self {
        Self::with_code(NO_RESULTS_RESPONSE_CODE, message)
    }

    pub fn is_no_results(&self) -> bool {
        self.code == Some(NO_RESULTS_RESPONSE_CODE)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (response code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Flags of a time-series retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSeriesOptions {
    pub with_attributes: bool,
    pub with_annotations: bool,
    /// Only list the distinct series keys, without observations
    pub series_keys_only: bool,
}

impl TimeSeriesOptions {
    /// The flags used for feature reads: no attributes, no annotations,
    /// full observations.
    pub fn observations_only() -> Self {
        Self::default()
    }
}

/// The remote SDMX provider.
///
/// # Examples
///
/// ```rust
/// use atrius_sdmx::{Dataflow, DataflowStructure, ProviderError, SdmxClient, TimeSeries, TimeSeriesOptions};
///
/// struct Offline;
///
/// impl SdmxClient for Offline {
///     fn endpoint(&self) -> &str {
///         "http://localhost/sdmx"
///     }
///     fn dataflows(&self) -> Result<Vec<Dataflow>, ProviderError> {
///         Ok(Vec::new())
///     }
///     fn dataflow_structure(&self, dataflow: &Dataflow) -> Result<DataflowStructure, ProviderError> {
///         Err(ProviderError::new(format!("no structure for {}", dataflow.id)))
///     }
///     fn time_series(
///         &self,
///         _dataflow: &Dataflow,
///         _structure: &DataflowStructure,
///         constraint: &str,
///         _options: &TimeSeriesOptions,
///     ) -> Result<Vec<TimeSeries>, ProviderError> {
///         Err(ProviderError::no_results(format!("nothing matches {}", constraint)))
///     }
/// }
/// ```
pub trait SdmxClient: Send + Sync {
    /// Provider endpoint, used in log messages.
    fn endpoint(&self) -> &str;

    /// Every dataflow the provider publishes.
    fn dataflows(&self) -> Result<Vec<Dataflow>, ProviderError>;

    /// The resolved dimension structure of a dataflow, code lists included.
    fn dataflow_structure(&self, dataflow: &Dataflow) -> Result<DataflowStructure, ProviderError>;

    /// Time series matching a constraint key such as `*.TOT.1+2.A`.
    fn time_series(
        &self,
        dataflow: &Dataflow,
        structure: &DataflowStructure,
        constraint: &str,
        options: &TimeSeriesOptions,
    ) -> Result<Vec<TimeSeries>, ProviderError>;
}
