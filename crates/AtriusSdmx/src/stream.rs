//! # Feature Streams
//!
//! Pull-based cursors that turn provider results into [`FeatureRecord`]s.
//!
//! - [`ObservationStream`]: one record per time series matching a
//!   constraint key
//! - [`CodeListStream`]: one record per code of a single dimension
//!
//! Both are wrapped by [`FeatureStream`], which is what the store hands out.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> Fetching -> Streaming -> Closed
//!                          \-> Empty ----/
//!                          \-> Failed
//! ```
//!
//! The provider's "no results" response moves an observation stream to
//! `Empty`, which is a successful open. Any other provider error moves it to
//! `Failed` and is returned to the caller. `close` is idempotent and is also
//! run when a [`FeatureStream`] is dropped.

use std::sync::Arc;
use std::vec;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::schema::measure_column_name;
use crate::{
    AttributeType, Code, ConstraintExpression, Dataflow, DataflowStructure, FeatureSchema,
    OBS_VALUE_ATTR, Result, SdmxClient, SdmxError, TIME_ATTR, TimeSeries, TimeSeriesOptions,
};

/// A single attribute value of a feature record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Null,
    String(String),
    Double(f64),
}

impl FeatureValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FeatureValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// A flat record whose values line up with the schema's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    id: String,
    schema: Arc<FeatureSchema>,
    values: Vec<FeatureValue>,
}

impl FeatureRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    /// Value of the named attribute, `None` if the schema has no such column.
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.schema.index_of(name).and_then(|i| self.values.get(i))
    }

    /// The geometry attribute. Statistical features carry no geometry, so
    /// this is always [`FeatureValue::Null`].
    pub fn geometry(&self) -> &FeatureValue {
        self.schema
            .attributes()
            .iter()
            .position(|a| a.binding == AttributeType::Geometry)
            .and_then(|i| self.values.get(i))
            .unwrap_or(&FeatureValue::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Uninitialized,
    Fetching,
    Streaming,
    Empty,
    Failed,
    Closed,
}

// Where each schema column takes its value from.
#[derive(Debug, Clone, PartialEq)]
enum ColumnSource {
    Geometry,
    Time,
    Dimension(String),
    Measure(String),
    ObsValue,
}

fn column_sources(schema: &FeatureSchema, structure: &DataflowStructure) -> Vec<ColumnSource> {
    let measure_codes: Vec<(String, String)> = structure
        .measure_dimension()
        .and_then(|d| d.code_list())
        .map(|list| {
            list.iter()
                .map(|c| (measure_column_name(&c.code), c.code.clone()))
                .collect()
        })
        .unwrap_or_default();

    schema
        .attributes()
        .iter()
        .map(|attribute| {
            if attribute.binding == AttributeType::Geometry {
                return ColumnSource::Geometry;
            }
            if attribute.name == TIME_ATTR {
                return ColumnSource::Time;
            }
            if attribute.binding == AttributeType::Double {
                if let Some((_, code)) = measure_codes.iter().find(|(n, _)| *n == attribute.name) {
                    return ColumnSource::Measure(code.clone());
                }
                if attribute.name == OBS_VALUE_ATTR {
                    return ColumnSource::ObsValue;
                }
            }
            ColumnSource::Dimension(attribute.name.clone())
        })
        .collect()
}

/// Streams one record per time series matching a constraint.
///
/// A record carries the series' latest observation: its period label fills
/// `TIME_PERIOD` and its value fills the measure column of the series'
/// `MEASURE` code (or `OBS_VALUE`). A series without observations gives null
/// time and values.
pub struct ObservationStream {
    schema: Arc<FeatureSchema>,
    dataflow: Arc<Dataflow>,
    structure: Arc<DataflowStructure>,
    constraint: ConstraintExpression,
    columns: Vec<ColumnSource>,
    state: StreamState,
    series: vec::IntoIter<TimeSeries>,
    emitted: usize,
}

impl ObservationStream {
    /// Creates an unopened stream; nothing is fetched until [`open`](Self::open).
    pub fn new(
        schema: Arc<FeatureSchema>,
        dataflow: Arc<Dataflow>,
        structure: Arc<DataflowStructure>,
        constraint: ConstraintExpression,
    ) -> Self {
        let columns = column_sources(&schema, &structure);
        Self {
            schema,
            dataflow,
            structure,
            constraint,
            columns,
            state: StreamState::Uninitialized,
            series: Vec::new().into_iter(),
            emitted: 0,
        }
    }

    /// Runs the provider query.
    ///
    /// Opening a stream that has already been opened is a no-op.
    ///
    /// # Errors
    ///
    /// [`SdmxError::RemoteQueryFailed`] for any provider error other than
    /// the reserved "no results" response.
    pub fn open(&mut self, client: &dyn SdmxClient) -> Result<()> {
        if self.state != StreamState::Uninitialized {
            debug!(
                "Stream over '{}' already opened ({:?})",
                self.dataflow.id, self.state
            );
            return Ok(());
        }

        self.state = StreamState::Fetching;
        let constraint = self.constraint.to_string();
        info!(
            "Querying {} for dataflow '{}' with constraint {}",
            client.endpoint(),
            self.dataflow.id,
            constraint
        );

        match client.time_series(
            &self.dataflow,
            &self.structure,
            &constraint,
            &TimeSeriesOptions::observations_only(),
        ) {
            Ok(series) => {
                debug!(
                    "Provider returned {} series for '{}'",
                    series.len(),
                    self.dataflow.id
                );
                self.series = series.into_iter();
                self.state = StreamState::Streaming;
                Ok(())
            }
            Err(e) if e.is_no_results() => {
                warn!(
                    "No results for dataflow '{}' with constraint {}: {}",
                    self.dataflow.id, constraint, e
                );
                self.state = StreamState::Empty;
                Ok(())
            }
            Err(e) => {
                error!(
                    "Query for dataflow '{}' with constraint {} failed: {}",
                    self.dataflow.id, constraint, e
                );
                self.state = StreamState::Failed;
                Err(SdmxError::RemoteQueryFailed(format!(
                    "dataflow '{}' with constraint {}: {}",
                    self.dataflow.id, constraint, e
                )))
            }
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn constraint(&self) -> &ConstraintExpression {
        &self.constraint
    }

    pub fn feature_type(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn has_next(&self) -> bool {
        if self.state != StreamState::Streaming {
            return false;
        }
        self.series.len() > 0
    }

    /// Returns the next record.
    ///
    /// # Errors
    ///
    /// [`SdmxError::ExhaustedStream`] when [`has_next`](Self::has_next) is false.
    pub fn next_feature(&mut self) -> Result<FeatureRecord> {
        if !self.has_next() {
            return Err(self.exhausted());
        }
        let series = self.series.next().ok_or_else(|| self.exhausted())?;

        let observation = series.observations().last();
        let value = observation
            .map(|(_, v)| v)
            .filter(|v| !v.is_nan())
            .map(FeatureValue::Double)
            .unwrap_or(FeatureValue::Null);
        let measure_code = self
            .structure
            .measure_dimension()
            .and_then(|d| series.dimension(&d.id));

        let values = self
            .columns
            .iter()
            .map(|column| match column {
                ColumnSource::Geometry => FeatureValue::Null,
                ColumnSource::Time => observation
                    .map(|(period, _)| FeatureValue::String(period.to_string()))
                    .unwrap_or(FeatureValue::Null),
                ColumnSource::Dimension(id) => series
                    .dimension(id)
                    .map(|code| FeatureValue::String(code.to_string()))
                    .unwrap_or(FeatureValue::Null),
                ColumnSource::Measure(code) if measure_code == Some(code.as_str()) => value.clone(),
                ColumnSource::Measure(_) => FeatureValue::Null,
                ColumnSource::ObsValue => value.clone(),
            })
            .collect();

        // The ordinal keeps ids of identical series apart.
        let id = format!(
            "{}.{:016x}.{}",
            self.dataflow.id,
            series.stable_hash(),
            self.emitted
        );
        self.emitted += 1;

        Ok(FeatureRecord {
            id,
            schema: Arc::clone(&self.schema),
            values,
        })
    }

    pub fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        debug!("Closing stream over '{}'", self.dataflow.id);
        self.series = Vec::new().into_iter();
        self.state = StreamState::Closed;
    }

    fn exhausted(&self) -> SdmxError {
        SdmxError::ExhaustedStream(format!(
            "no more features of '{}' ({:?})",
            self.schema.name(),
            self.state
        ))
    }
}

/// Streams the codes of one dimension as `geometry, CODE, DESCRIPTION`
/// records whose id is the code.
pub struct CodeListStream {
    dimension_id: String,
    schema: Option<Arc<FeatureSchema>>,
    codes: vec::IntoIter<Code>,
    state: StreamState,
}

impl CodeListStream {
    /// Opens a stream over the code list of `dimension_id`.
    ///
    /// # Errors
    ///
    /// [`SdmxError::DimensionNotFound`] for an unknown dimension and
    /// [`SdmxError::CodeListUnavailable`] when its codes were not resolved.
    pub fn open(structure: &DataflowStructure, dimension_id: &str) -> Result<Self> {
        let dimension = structure.dimension(dimension_id)?;
        let list = dimension.code_list().ok_or_else(|| {
            SdmxError::CodeListUnavailable(format!(
                "dimension '{}' of structure '{}' has no code list",
                dimension_id, structure.id
            ))
        })?;
        debug!(
            "Enumerating {} codes of dimension '{}'",
            list.len(),
            dimension_id
        );
        Ok(Self {
            dimension_id: dimension_id.to_string(),
            schema: None,
            codes: list.codes().to_vec().into_iter(),
            state: StreamState::Streaming,
        })
    }

    pub fn with_schema(mut self, schema: Arc<FeatureSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn set_schema(&mut self, schema: Arc<FeatureSchema>) {
        self.schema = Some(schema);
    }

    pub fn dimension_id(&self) -> &str {
        &self.dimension_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// # Errors
    ///
    /// [`SdmxError::SchemaNotReady`] until a schema has been set.
    pub fn feature_type(&self) -> Result<&Arc<FeatureSchema>> {
        self.schema.as_ref().ok_or_else(|| self.not_ready())
    }

    pub fn has_next(&self) -> bool {
        self.state == StreamState::Streaming && self.codes.len() > 0
    }

    pub fn next_feature(&mut self) -> Result<FeatureRecord> {
        let schema = Arc::clone(self.feature_type()?);
        let code = self.codes.next().ok_or_else(|| {
            SdmxError::ExhaustedStream(format!(
                "no more codes of dimension '{}'",
                self.dimension_id
            ))
        })?;
        Ok(FeatureRecord {
            id: code.code.clone(),
            schema,
            values: vec![
                FeatureValue::Null,
                FeatureValue::String(code.code),
                FeatureValue::String(code.label),
            ],
        })
    }

    pub fn close(&mut self) {
        self.codes = Vec::new().into_iter();
        self.state = StreamState::Closed;
    }

    fn not_ready(&self) -> SdmxError {
        SdmxError::SchemaNotReady(format!(
            "code list schema of dimension '{}' has not been built",
            self.dimension_id
        ))
    }
}

/// Either kind of stream, as returned by the data store.
///
/// Iterating yields `Result<FeatureRecord>`; an error ends the iteration.
/// Dropping the stream closes it.
pub enum FeatureStream {
    Observations(ObservationStream),
    Codes(CodeListStream),
}

impl FeatureStream {
    pub fn has_next(&self) -> bool {
        match self {
            FeatureStream::Observations(s) => s.has_next(),
            FeatureStream::Codes(s) => s.has_next(),
        }
    }

    pub fn next_feature(&mut self) -> Result<FeatureRecord> {
        match self {
            FeatureStream::Observations(s) => s.next_feature(),
            FeatureStream::Codes(s) => s.next_feature(),
        }
    }

    pub fn close(&mut self) {
        match self {
            FeatureStream::Observations(s) => s.close(),
            FeatureStream::Codes(s) => s.close(),
        }
    }

    pub fn state(&self) -> StreamState {
        match self {
            FeatureStream::Observations(s) => s.state(),
            FeatureStream::Codes(s) => s.state(),
        }
    }

    pub fn feature_type(&self) -> Result<Arc<FeatureSchema>> {
        match self {
            FeatureStream::Observations(s) => Ok(Arc::clone(s.feature_type())),
            FeatureStream::Codes(s) => s.feature_type().map(Arc::clone),
        }
    }
}

impl From<ObservationStream> for FeatureStream {
    fn from(stream: ObservationStream) -> Self {
        FeatureStream::Observations(stream)
    }
}

impl From<CodeListStream> for FeatureStream {
    fn from(stream: CodeListStream) -> Self {
        FeatureStream::Codes(stream)
    }
}

impl Iterator for FeatureStream {
    type Item = Result<FeatureRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        match self.next_feature() {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl Drop for FeatureStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::all_constraint;
    use crate::{CodeList, Dimension, ProviderError, build_schema, code_list_schema};

    struct StaticClient(std::result::Result<Vec<TimeSeries>, ProviderError>);

    impl SdmxClient for StaticClient {
        fn endpoint(&self) -> &str {
            "http://localhost/sdmx"
        }

        fn dataflows(&self) -> std::result::Result<Vec<Dataflow>, ProviderError> {
            Ok(Vec::new())
        }

        fn dataflow_structure(
            &self,
            dataflow: &Dataflow,
        ) -> std::result::Result<DataflowStructure, ProviderError> {
            Err(ProviderError::new(format!("no structure for {}", dataflow.id)))
        }

        fn time_series(
            &self,
            _dataflow: &Dataflow,
            _structure: &DataflowStructure,
            _constraint: &str,
            _options: &TimeSeriesOptions,
        ) -> std::result::Result<Vec<TimeSeries>, ProviderError> {
            self.0.clone()
        }
    }

    fn structure() -> Arc<DataflowStructure> {
        Arc::new(DataflowStructure::new(
            "DSD",
            vec![
                Dimension::new("MEASURE", CodeList::from_pairs("CL_M", [("A", "a"), ("B", "b")])),
                Dimension::new("REGION", CodeList::from_pairs("CL_R", [("1", "NSW"), ("2", "Vic.")])),
            ],
        ))
    }

    fn stream() -> ObservationStream {
        let structure = structure();
        let schema = Arc::new(build_schema("DF", &structure).unwrap());
        let constraint = all_constraint(&structure);
        ObservationStream::new(schema, Arc::new(Dataflow::new("DF", "Test", "DSD")), structure, constraint)
    }

    #[test]
    fn test_one_record_per_series() {
        let series = vec![
            TimeSeries::new("B.1")
                .with_dimension("MEASURE", "B")
                .with_dimension("REGION", "1")
                .with_observation("2006", 10.0)
                .with_observation("2011", 12.0),
            TimeSeries::new("A.1")
                .with_dimension("MEASURE", "A")
                .with_dimension("REGION", "1")
                .with_observation("2006", 4.0)
                .with_observation("2011", f64::NAN),
            TimeSeries::new("A.2")
                .with_dimension("MEASURE", "A")
                .with_dimension("REGION", "2"),
        ];
        let mut stream = stream();
        stream.open(&StaticClient(Ok(series))).unwrap();
        assert_eq!(stream.state(), StreamState::Streaming);

        let first = stream.next_feature().unwrap();
        assert!(first.geometry().is_null());
        assert_eq!(first.get("TIME_PERIOD").and_then(FeatureValue::as_str), Some("2011"));
        assert_eq!(first.get("REGION").and_then(FeatureValue::as_str), Some("1"));
        assert_eq!(first.get("MEASURE_B").and_then(FeatureValue::as_f64), Some(12.0));
        assert!(first.get("MEASURE_A").unwrap().is_null());
        assert!(first.id().starts_with("DF."));

        let second = stream.next_feature().unwrap();
        assert_eq!(second.get("TIME_PERIOD").and_then(FeatureValue::as_str), Some("2011"));
        assert!(second.get("MEASURE_A").unwrap().is_null());
        assert!(second.get("MEASURE_B").unwrap().is_null());
        assert_ne!(first.id(), second.id());

        let third = stream.next_feature().unwrap();
        assert!(third.get("TIME_PERIOD").unwrap().is_null());
        assert_eq!(third.get("REGION").and_then(FeatureValue::as_str), Some("2"));

        assert!(!stream.has_next());
        assert!(matches!(stream.next_feature(), Err(SdmxError::ExhaustedStream(_))));
    }

    #[test]
    fn test_identical_series_get_distinct_ids() {
        let series = TimeSeries::new("A.1")
            .with_dimension("MEASURE", "A")
            .with_dimension("REGION", "1")
            .with_observation("2011", 1.0);
        let mut stream = stream();
        stream
            .open(&StaticClient(Ok(vec![series.clone(), series])))
            .unwrap();

        let first = stream.next_feature().unwrap();
        let second = stream.next_feature().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.values(), second.values());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut stream = stream();
        stream
            .open(&StaticClient(Ok(vec![TimeSeries::new("A.1").with_observation("2011", 1.0)])))
            .unwrap();
        stream.close();
        stream.close();
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(!stream.has_next());
    }

    #[test]
    fn test_unopened_stream_is_exhausted() {
        let mut stream = stream();
        assert_eq!(stream.state(), StreamState::Uninitialized);
        assert!(!stream.has_next());
        assert!(matches!(stream.next_feature(), Err(SdmxError::ExhaustedStream(_))));
    }

    #[test]
    fn test_code_stream_requires_schema() {
        let structure = structure();
        let mut codes = CodeListStream::open(&structure, "REGION").unwrap();
        assert!(matches!(codes.feature_type(), Err(SdmxError::SchemaNotReady(_))));
        assert!(matches!(codes.next_feature(), Err(SdmxError::SchemaNotReady(_))));

        codes.set_schema(Arc::new(code_list_schema("DF__REGION")));
        let record = codes.next_feature().unwrap();
        assert_eq!(record.id(), "1");
        assert_eq!(record.get("DESCRIPTION").and_then(FeatureValue::as_str), Some("NSW"));
    }

    #[test]
    fn test_code_stream_errors() {
        let structure = DataflowStructure::new("DSD", vec![Dimension::without_codes("FREQ")]);
        assert!(matches!(
            CodeListStream::open(&structure, "FREQ"),
            Err(SdmxError::CodeListUnavailable(_))
        ));
        assert!(matches!(
            CodeListStream::open(&structure, "AGE"),
            Err(SdmxError::DimensionNotFound(_))
        ));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let structure = structure();
        let mut stream = FeatureStream::from(CodeListStream::open(&structure, "REGION").unwrap());
        assert!(matches!(stream.next(), Some(Err(SdmxError::SchemaNotReady(_)))));
        assert!(stream.next().is_none());
        assert_eq!(stream.state(), StreamState::Closed);
    }
}
