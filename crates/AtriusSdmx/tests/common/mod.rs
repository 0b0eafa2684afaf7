#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use atrius_sdmx::{
    CodeList, Dataflow, DataflowStructure, Dimension, ProviderError, SdmxClient, SdmxDataStore,
    StoreConfig, TimeSeries, TimeSeriesOptions,
};
use parking_lot::Mutex;

pub const CENSUS: &str = "ABS_CENSUS2011_T04";

/// The dimensions of the ABS census table T04, in structure order.
pub const CENSUS_DIMENSIONS: [&str; 7] = [
    "MEASURE",
    "MSTP",
    "AGE",
    "STATE",
    "REGIONTYPE",
    "REGION",
    "FREQUENCY",
];

pub fn census_dataflow() -> Dataflow {
    Dataflow::new(CENSUS, "Census 2011, T04 Age by Sex (ASGS)", CENSUS)
}

pub fn census_structure() -> DataflowStructure {
    DataflowStructure::new(
        CENSUS,
        vec![
            Dimension::new(
                "MEASURE",
                CodeList::from_pairs("CL_MEASURE", [("1", "Males"), ("2", "Females"), ("3", "Persons")]),
            ),
            Dimension::new("MSTP", CodeList::from_pairs("CL_MSTP", [("TOT", "Total"), ("1", "Married")])),
            Dimension::new("AGE", CodeList::from_pairs("CL_AGE", [("TOT", "Total"), ("15", "15-19")])),
            Dimension::new(
                "STATE",
                CodeList::from_pairs("CL_STATE", [("1", "New South Wales"), ("2", "Victoria")]),
            ),
            Dimension::new(
                "REGIONTYPE",
                CodeList::from_pairs("CL_REGIONTYPE", [("STE", "States and Territories")]),
            ),
            Dimension::new(
                "REGION",
                CodeList::from_pairs(
                    "CL_REGION",
                    [
                        ("1", "New South Wales"),
                        ("2", "Victoria"),
                        ("3", "Queensland"),
                        ("4", "South Australia"),
                    ],
                ),
            ),
            Dimension::new("FREQUENCY", CodeList::from_pairs("CL_FREQUENCY", [("A", "Annual")])),
        ],
    )
}

/// A census series for one measure and region, observed in 2011.
pub fn census_series(measure: &str, region: &str, value: f64) -> TimeSeries {
    let codes = [measure, "TOT", "TOT", "1", "STE", region, "A"];
    let mut series = TimeSeries::new(codes.join("."));
    for (id, code) in CENSUS_DIMENSIONS.iter().zip(codes) {
        series = series.with_dimension(*id, code);
    }
    series.with_observation("2011", value)
}

/// Six series: persons, males and females in regions 1 and 2.
pub fn six_census_series() -> Vec<TimeSeries> {
    let mut all = Vec::new();
    for region in ["1", "2"] {
        for (measure, value) in [("1", 100.0), ("2", 110.0), ("3", 210.0)] {
            all.push(census_series(measure, region, value));
        }
    }
    all
}

/// A scripted provider that counts its calls.
pub struct MockClient {
    pub dataflows: Result<Vec<Dataflow>, ProviderError>,
    pub structure: Result<DataflowStructure, ProviderError>,
    pub series: Result<Vec<TimeSeries>, ProviderError>,
    pub dataflow_calls: AtomicUsize,
    pub structure_calls: AtomicUsize,
    pub series_calls: AtomicUsize,
    pub constraints: Mutex<Vec<String>>,
    pub options: Mutex<Vec<TimeSeriesOptions>>,
}

impl MockClient {
    pub fn census(series: Result<Vec<TimeSeries>, ProviderError>) -> Self {
        Self {
            dataflows: Ok(vec![census_dataflow()]),
            structure: Ok(census_structure()),
            series,
            dataflow_calls: AtomicUsize::new(0),
            structure_calls: AtomicUsize::new(0),
            series_calls: AtomicUsize::new(0),
            constraints: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        }
    }

    pub fn with_structure(mut self, structure: Result<DataflowStructure, ProviderError>) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_dataflows(mut self, dataflows: Result<Vec<Dataflow>, ProviderError>) -> Self {
        self.dataflows = dataflows;
        self
    }

    pub fn dataflow_calls(&self) -> usize {
        self.dataflow_calls.load(Ordering::SeqCst)
    }

    pub fn structure_calls(&self) -> usize {
        self.structure_calls.load(Ordering::SeqCst)
    }

    pub fn series_calls(&self) -> usize {
        self.series_calls.load(Ordering::SeqCst)
    }

    pub fn last_constraint(&self) -> Option<String> {
        self.constraints.lock().last().cloned()
    }
}

impl SdmxClient for MockClient {
    fn endpoint(&self) -> &str {
        "http://stat.data.abs.gov.au/sdmxws/sdmx.asmx"
    }

    fn dataflows(&self) -> Result<Vec<Dataflow>, ProviderError> {
        self.dataflow_calls.fetch_add(1, Ordering::SeqCst);
        self.dataflows.clone()
    }

    fn dataflow_structure(&self, _dataflow: &Dataflow) -> Result<DataflowStructure, ProviderError> {
        self.structure_calls.fetch_add(1, Ordering::SeqCst);
        self.structure.clone()
    }

    fn time_series(
        &self,
        _dataflow: &Dataflow,
        _structure: &DataflowStructure,
        constraint: &str,
        options: &TimeSeriesOptions,
    ) -> Result<Vec<TimeSeries>, ProviderError> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        self.constraints.lock().push(constraint.to_string());
        self.options.lock().push(*options);
        self.series.clone()
    }
}

pub fn store_with(client: Arc<MockClient>) -> SdmxDataStore {
    let config = StoreConfig::new("ABS", "http://aurin.org.au", client.endpoint())
        .expect("valid test configuration");
    SdmxDataStore::new(config, client)
}

pub fn test_data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
        .join(name)
}
