//! # JSON Snapshot Client
//!
//! An [`SdmxClient`] that answers from a JSON snapshot of a provider instead
//! of the network. Used for offline runs of the CLI and for tests.
//!
//! ## Document Layout
//!
//! ```json
//! {
//!   "endpoint": "http://stat.data.abs.gov.au/sdmxws/sdmx.asmx",
//!   "dataflows": [
//!     { "id": "ABS_CENSUS2011_T04", "name": "Census T04", "dsdId": "ABS_CENSUS2011_T04" }
//!   ],
//!   "structures": [
//!     { "id": "ABS_CENSUS2011_T04", "dimensions": [
//!         { "id": "MEASURE", "codeList": { "id": "CL_MEASURE", "codes": [
//!             { "code": "3", "label": "Persons" } ] } },
//!         { "id": "FREQUENCY" }
//!     ] }
//!   ],
//!   "series": {
//!     "ABS_CENSUS2011_T04": [
//!       { "key": "3.A", "timeSlots": ["2011"], "observations": [1.0] }
//!     ]
//!   }
//! }
//! ```
//!
//! A series without a `dimensions` map gets one derived from its key.
//! Constraint slots match a series when they are `*` (or empty), or when one
//! of their `+`-separated codes equals the series' code for that dimension.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    ALL_CODES, DIMENSION_SEPARATOR, Dataflow, DataflowStructure, OR_SEPARATOR, ProviderError,
    Result, SdmxClient, SdmxError, TimeSeries, TimeSeriesOptions,
};

/// Endpoint reported when the document does not name one.
pub const DEFAULT_FIXTURE_ENDPOINT: &str = "file:///fixture";

/// Response code returned for malformed constraint keys.
const BAD_REQUEST: u16 = 400;

fn default_endpoint() -> String {
    DEFAULT_FIXTURE_ENDPOINT.to_string()
}

/// The parsed snapshot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub dataflows: Vec<Dataflow>,
    #[serde(default)]
    pub structures: Vec<DataflowStructure>,
    #[serde(default)]
    pub series: HashMap<String, Vec<TimeSeries>>,
}

pub struct JsonFixtureClient {
    source: String,
    document: FixtureDocument,
}

impl JsonFixtureClient {
    /// Loads a snapshot from a local path.
    ///
    /// # Errors
    ///
    /// [`SdmxError::SourceNotFound`] when the file does not exist and
    /// [`SdmxError::InvalidSourceContent`] when it is not a valid document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SdmxError::SourceNotFound(format!(
                "File not found: {}",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents, &path.to_string_lossy())
    }

    /// Loads a snapshot from a `file://` URL or a plain path.
    pub fn from_source(source: &str) -> Result<Self> {
        let path = match Url::parse(source) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| SdmxError::SourceNotFound(format!("Invalid file URL: {}", url)))?,
            Ok(url) if url.scheme().len() > 1 => {
                return Err(SdmxError::SourceNotFound(format!(
                    "Unsupported snapshot source: {}",
                    url
                )));
            }
            // Windows drive letters parse as one-letter schemes.
            _ => PathBuf::from(source),
        };
        Self::from_path(path)
    }

    /// Parses a snapshot document; `source_name` only appears in errors.
    pub fn from_json(contents: &str, source_name: &str) -> Result<Self> {
        let mut document: FixtureDocument = serde_json::from_str(contents).map_err(|e| {
            SdmxError::InvalidSourceContent(format!(
                "Failed to parse JSON from '{}': {}",
                source_name, e
            ))
        })?;

        for dataflow in &document.dataflows {
            if !document.structures.iter().any(|s| s.id == dataflow.dsd_id) {
                return Err(SdmxError::InvalidSourceContent(format!(
                    "Dataflow '{}' in '{}' references unknown structure '{}'",
                    dataflow.id, source_name, dataflow.dsd_id
                )));
            }
        }

        let structures: HashMap<String, DataflowStructure> = document
            .dataflows
            .iter()
            .filter_map(|d| {
                document
                    .structures
                    .iter()
                    .find(|s| s.id == d.dsd_id)
                    .map(|s| (d.id.clone(), s.clone()))
            })
            .collect();
        for (dataflow, series) in document.series.iter_mut() {
            if let Some(structure) = structures.get(dataflow) {
                series.iter_mut().for_each(|s| fill_dimensions(s, structure));
            }
        }

        debug!(
            "Loaded snapshot '{}' with {} dataflows",
            source_name,
            document.dataflows.len()
        );
        Ok(Self {
            source: source_name.to_string(),
            document,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn endpoint_url(&self) -> &str {
        &self.document.endpoint
    }

    pub fn document(&self) -> &FixtureDocument {
        &self.document
    }
}

fn fill_dimensions(series: &mut TimeSeries, structure: &DataflowStructure) {
    if !series.dimensions.is_empty() || series.key.is_empty() {
        return;
    }
    let codes: Vec<&str> = series.key.split(DIMENSION_SEPARATOR).collect();
    if codes.len() != structure.len() {
        return;
    }
    for (dimension, code) in structure.dimensions().iter().zip(codes) {
        series.dimensions.insert(dimension.id.clone(), code.to_string());
    }
}

fn slot_matches(slot: &str, code: Option<&str>) -> bool {
    if slot.is_empty() || slot == ALL_CODES {
        return true;
    }
    code.is_some_and(|code| slot.split(OR_SEPARATOR).any(|alt| alt == code))
}

impl SdmxClient for JsonFixtureClient {
    fn endpoint(&self) -> &str {
        &self.document.endpoint
    }

    fn dataflows(&self) -> std::result::Result<Vec<Dataflow>, ProviderError> {
        Ok(self.document.dataflows.clone())
    }

    fn dataflow_structure(
        &self,
        dataflow: &Dataflow,
    ) -> std::result::Result<DataflowStructure, ProviderError> {
        self.document
            .structures
            .iter()
            .find(|s| s.id == dataflow.dsd_id)
            .cloned()
            .ok_or_else(|| {
                ProviderError::no_results(format!(
                    "no structure '{}' in {}",
                    dataflow.dsd_id, self.source
                ))
            })
    }

    fn time_series(
        &self,
        dataflow: &Dataflow,
        structure: &DataflowStructure,
        constraint: &str,
        options: &TimeSeriesOptions,
    ) -> std::result::Result<Vec<TimeSeries>, ProviderError> {
        let slots: Vec<&str> = if structure.is_empty() {
            Vec::new()
        } else {
            constraint.split(DIMENSION_SEPARATOR).collect()
        };
        if slots.len() != structure.len() {
            return Err(ProviderError::with_code(
                BAD_REQUEST,
                format!(
                    "constraint '{}' has {} slots, structure '{}' has {} dimensions",
                    constraint,
                    slots.len(),
                    structure.id,
                    structure.len()
                ),
            ));
        }

        let selected: Vec<TimeSeries> = self
            .document
            .series
            .get(&dataflow.id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|series| {
                structure
                    .dimensions()
                    .iter()
                    .zip(&slots)
                    .all(|(dimension, slot)| slot_matches(slot, series.dimension(&dimension.id)))
            })
            .map(|series| {
                let mut series = series.clone();
                if !options.with_attributes {
                    series.attributes.clear();
                }
                if options.series_keys_only {
                    series.time_slots.clear();
                    series.observations.clear();
                }
                series
            })
            .collect();

        if selected.is_empty() {
            return Err(ProviderError::no_results(format!(
                "no series of '{}' match '{}'",
                dataflow.id, constraint
            )));
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "dataflows": [{ "id": "DF", "name": "Test", "dsdId": "DSD" }],
        "structures": [{ "id": "DSD", "dimensions": [
            { "id": "MEASURE", "codeList": { "id": "CL_M", "codes": [{ "code": "A", "label": "a" }] } },
            { "id": "REGION" }
        ] }],
        "series": { "DF": [
            { "key": "A.1", "timeSlots": ["2011"], "observations": [1.0], "attributes": { "UNIT": "persons" } },
            { "key": "A.2", "timeSlots": ["2011"], "observations": [2.0] }
        ] }
    }"#;

    fn client() -> JsonFixtureClient {
        JsonFixtureClient::from_json(DOCUMENT, "inline").unwrap()
    }

    fn series(constraint: &str, options: TimeSeriesOptions) -> std::result::Result<Vec<TimeSeries>, ProviderError> {
        let client = client();
        let dataflow = client.dataflows().unwrap().remove(0);
        let structure = client.dataflow_structure(&dataflow).unwrap();
        client.time_series(&dataflow, &structure, constraint, &options)
    }

    #[test]
    fn test_dimensions_derived_from_key() {
        let client = client();
        let first = &client.document().series["DF"][0];
        assert_eq!(first.dimension("MEASURE"), Some("A"));
        assert_eq!(first.dimension("REGION"), Some("1"));
        assert_eq!(client.endpoint(), DEFAULT_FIXTURE_ENDPOINT);
    }

    #[test]
    fn test_slot_matching() {
        assert_eq!(series("*.*", TimeSeriesOptions::default()).unwrap().len(), 2);
        assert_eq!(series("A.2", TimeSeriesOptions::default()).unwrap()[0].key, "A.2");
        assert_eq!(series(".1+2", TimeSeriesOptions::default()).unwrap().len(), 2);
        assert!(series("A.3", TimeSeriesOptions::default()).unwrap_err().is_no_results());
        assert_eq!(
            series("A", TimeSeriesOptions::default()).unwrap_err().code,
            Some(BAD_REQUEST)
        );
    }

    #[test]
    fn test_options_shape_results() {
        let plain = series("A.1", TimeSeriesOptions::observations_only()).unwrap();
        assert!(plain[0].attributes.is_empty());

        let with_attributes = TimeSeriesOptions {
            with_attributes: true,
            ..Default::default()
        };
        assert_eq!(series("A.1", with_attributes).unwrap()[0].attributes["UNIT"], "persons");

        let keys_only = TimeSeriesOptions {
            series_keys_only: true,
            ..Default::default()
        };
        assert!(series("*.*", keys_only).unwrap().iter().all(TimeSeries::is_empty));
    }

    #[test]
    fn test_unknown_structure_is_rejected() {
        let document = r#"{ "dataflows": [{ "id": "DF", "dsdId": "MISSING" }] }"#;
        assert!(matches!(
            JsonFixtureClient::from_json(document, "inline"),
            Err(SdmxError::InvalidSourceContent(_))
        ));
    }
}
