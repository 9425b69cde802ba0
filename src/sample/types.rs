//! Core sample types
//!
//! - `Sample`: one time/value observation with series identity
//! - `Tags`: the shared, read-only tag set of a series
//! - `SeriesKey`: the (name, tags) identity of a series

use super::value::AuxValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Immutable tag set identifying a series
///
/// Cloning is cheap: every sample of a series shares one map. Keys are kept
/// sorted so two tag sets built in different orders compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Tags(Arc<BTreeMap<String, String>>);

impl Tags {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tag set from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Return a copy of this tag set with one more entry
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut map = (*self.0).clone();
        map.insert(key.into(), value.into());
        Tags(Arc::new(map))
    }

    /// Get a tag value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether both tag sets are the same shared map or hold equal entries
    pub fn same_as(&self, other: &Tags) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }

    /// Canonical `k=v,k2=v2` rendering
    pub fn id(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(Arc::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }
}

/// Identity of one series: measurement name plus tag set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SeriesKey {
    pub name: String,
    pub tags: Tags,
}

impl SeriesKey {
    pub fn new(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }

    /// Whether a sample belongs to this series
    pub fn matches<V>(&self, sample: &Sample<V>) -> bool {
        self.name == sample.name && self.tags.same_as(&sample.tags)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{},{}", self.name, self.tags.id())
        }
    }
}

/// A single time-series sample
///
/// `time` is nanoseconds since the Unix epoch and may be negative.
/// `aggregated` counts the raw samples an upstream aggregate folded into
/// this one; 0 marks a raw sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample<V> {
    /// Measurement name
    pub name: String,
    /// Series tags
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    /// Timestamp in nanoseconds
    pub time: i64,
    /// Primary value
    pub value: V,
    /// Pass-through projection values
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aux: Vec<AuxValue>,
    /// Number of raw samples folded into this one
    #[serde(skip_serializing_if = "is_zero")]
    pub aggregated: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl<V> Sample<V> {
    /// Create a raw sample with no tags
    pub fn new(name: impl Into<String>, time: i64, value: V) -> Self {
        Self {
            name: name.into(),
            tags: Tags::new(),
            time,
            value,
            aux: Vec::new(),
            aggregated: 0,
        }
    }

    /// Builder method: set the tag set
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Builder method: add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags = self.tags.with(key, value);
        self
    }

    /// Builder method: set auxiliary values
    pub fn with_aux(mut self, aux: Vec<AuxValue>) -> Self {
        self.aux = aux;
        self
    }

    /// Builder method: set the aggregate weight
    pub fn aggregated(mut self, count: u32) -> Self {
        self.aggregated = count;
        self
    }

    /// Identity of the series this sample belongs to
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::new(self.name.clone(), self.tags.clone())
    }

    /// New sample of the same series carrying this sample's aux values
    pub fn derive<W>(&self, time: i64, value: W) -> Sample<W> {
        Sample {
            name: self.name.clone(),
            tags: self.tags.clone(),
            time,
            value,
            aux: self.aux.clone(),
            aggregated: 0,
        }
    }
}
