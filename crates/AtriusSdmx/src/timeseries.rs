//! Time series returned by the provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One time series of a dataflow: a dimension key plus ordered observations.
///
/// `time_slots` and `observations` are parallel; a missing observation is
/// stored as `NaN` (JSON `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Series key, the dot-joined dimension codes (e.g. `3.TOT.TOT.1.STE.1.A`)
    #[serde(default)]
    pub key: String,
    /// Code of this series for each dimension id
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default, rename = "timeSlots", alias = "time_slots")]
    pub time_slots: Vec<String>,
    #[serde(default, with = "nullable_values")]
    pub observations: Vec<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl TimeSeries {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_dimension(mut self, id: impl Into<String>, code: impl Into<String>) -> Self {
        self.dimensions.insert(id.into(), code.into());
        self
    }

    pub fn with_observation(mut self, period: impl Into<String>, value: f64) -> Self {
        self.time_slots.push(period.into());
        self.observations.push(value);
        self
    }

    pub fn dimension(&self, id: &str) -> Option<&str> {
        self.dimensions.get(id).map(String::as_str)
    }

    /// Number of observations; time slots without a value are not counted.
    pub fn len(&self) -> usize {
        self.time_slots.len().min(self.observations.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(period, value)` pairs in provider order.
    pub fn observations(&self) -> impl Iterator<Item = (&str, f64)> {
        self.time_slots
            .iter()
            .map(String::as_str)
            .zip(self.observations.iter().copied())
    }

    /// Deterministic hash of the key, dimensions and observations: the first
    /// eight bytes of their SHA-256 digest.
    ///
    /// Record identities built from it are reproducible across runs.
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = Sha256::new();
        update_str(&mut hasher, &self.key);
        for (id, code) in &self.dimensions {
            update_str(&mut hasher, id);
            update_str(&mut hasher, code);
        }
        for period in &self.time_slots {
            update_str(&mut hasher, period);
        }
        for value in &self.observations {
            hasher.update(value.to_bits().to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }
}

// Length prefix keeps ("ab", "c") and ("a", "bc") apart.
fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

mod nullable_values {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| if v.is_nan() { None } else { Some(*v) }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash_is_deterministic() {
        let a = TimeSeries::new("3.TOT.A")
            .with_dimension("MEASURE", "3")
            .with_observation("2011", 1.5);
        let b = a.clone();
        assert_eq!(a.stable_hash(), b.stable_hash());

        let c = a.clone().with_observation("2012", 2.0);
        assert_ne!(a.stable_hash(), c.stable_hash());
    }

    #[test]
    fn test_stable_hash_separates_field_boundaries() {
        let a = TimeSeries::new("ab").with_dimension("c", "1");
        let b = TimeSeries::new("a").with_dimension("bc", "1");
        assert_ne!(a.stable_hash(), b.stable_hash());
    }

    #[test]
    fn test_null_observations_round_trip_as_nan() {
        let json = r#"{"key": "A", "timeSlots": ["2010", "2011"], "observations": [null, 4.0]}"#;
        let series: TimeSeries = serde_json::from_str(json).unwrap();
        assert!(series.observations[0].is_nan());
        assert_eq!(series.observations[1], 4.0);
        assert_eq!(series.len(), 2);

        let back = serde_json::to_value(&series).unwrap();
        assert!(back["observations"][0].is_null());
    }
}
