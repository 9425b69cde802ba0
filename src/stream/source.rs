//! Raw-sample sources
//!
//! A `SampleSource` is the boundary between the transform engine and the
//! storage that holds raw samples. It enumerates series and opens one stream
//! per series, already filtered to the requested range and ordered by the
//! requested direction.

use super::{AnySample, AnyStream};
use crate::error::{TransformError, TransformResult};
use crate::sample::{Sample, SeriesKey, StreamOptions, Value, ValueKind};
use std::collections::BTreeMap;

/// Provider of per-series raw sample streams
pub trait SampleSource {
    /// Series with at least one sample inside `options.range`, in key order
    fn series(&self, options: &StreamOptions) -> TransformResult<Vec<SeriesKey>>;

    /// Open the stream of one series
    fn open(&self, series: &SeriesKey, options: &StreamOptions) -> TransformResult<AnyStream>;
}

/// An in-memory source, one kind per series
#[derive(Debug, Default)]
pub struct MemorySource {
    series: BTreeMap<SeriesKey, Vec<AnySample>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample
    ///
    /// A series holds a single value kind; adding a sample of another kind
    /// to an existing series fails.
    pub fn insert(&mut self, sample: impl Into<AnySample>) -> TransformResult<()> {
        let sample = sample.into();
        let samples = self.series.entry(sample.series_key()).or_default();

        if let Some(first) = samples.first() {
            if first.kind() != sample.kind() {
                return Err(TransformError::KindMismatch {
                    declared: first.kind(),
                    actual: sample.kind(),
                });
            }
        }

        samples.push(sample);
        Ok(())
    }

    /// Add many samples of one kind
    pub fn extend<V: Value>(
        &mut self,
        samples: impl IntoIterator<Item = Sample<V>>,
    ) -> TransformResult<()> {
        for sample in samples {
            self.insert(sample)?;
        }
        Ok(())
    }

    /// Kind stored for a series
    pub fn kind_of(&self, series: &SeriesKey) -> Option<ValueKind> {
        self.series.get(series).and_then(|s| s.first()).map(AnySample::kind)
    }

    /// Total number of stored samples
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl SampleSource for MemorySource {
    fn series(&self, options: &StreamOptions) -> TransformResult<Vec<SeriesKey>> {
        Ok(self
            .series
            .iter()
            .filter(|(_, samples)| samples.iter().any(|s| options.range.contains(s.time())))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn open(&self, series: &SeriesKey, options: &StreamOptions) -> TransformResult<AnyStream> {
        let stored = self
            .series
            .get(series)
            .ok_or_else(|| TransformError::from_source(format!("series not found: {}", series)))?;

        if let Some(kind) = self.kind_of(series) {
            if kind != options.kind {
                return Err(TransformError::KindMismatch {
                    declared: options.kind,
                    actual: kind,
                });
            }
        }

        let mut selected: Vec<&AnySample> = stored
            .iter()
            .filter(|s| options.range.contains(s.time()))
            .collect();

        // Stable sort: samples sharing a timestamp keep insertion order
        if options.is_ascending() {
            selected.sort_by_key(|s| s.time());
        } else {
            selected.sort_by(|a, b| b.time().cmp(&a.time()));
        }

        tracing::trace!(series = %series, samples = selected.len(), "Opened series stream");

        Ok(match options.kind {
            ValueKind::Float => typed::<f64>(&selected),
            ValueKind::Integer => typed::<i64>(&selected),
            ValueKind::String => typed::<String>(&selected),
            ValueKind::Boolean => typed::<bool>(&selected),
        })
    }
}

fn typed<V: Value>(samples: &[&AnySample]) -> AnyStream {
    AnyStream::from_samples(
        samples
            .iter()
            .filter_map(|s| V::unwrap_sample(s))
            .cloned()
            .collect::<Vec<Sample<V>>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Tags, TimeRange};
    use crate::stream::fixtures::points;

    fn source() -> MemorySource {
        let mut source = MemorySource::new();
        source
            .extend([
                Sample::new("cpu", 8, 3.0).tag("host", "b"),
                Sample::new("cpu", 0, 1.0).tag("host", "b"),
                Sample::new("cpu", 4, 2.0).tag("host", "b"),
                Sample::new("cpu", 4, 9.0).tag("host", "a"),
            ])
            .unwrap();
        source.insert(Sample::new("status", 1, "up".to_string())).unwrap();
        source
    }

    fn key(host: &str) -> SeriesKey {
        SeriesKey::new("cpu", Tags::from_pairs([("host", host)]))
    }

    #[test]
    fn test_series_in_key_order() {
        let source = source();
        let options = StreamOptions::new(ValueKind::Float);

        let series = source.series(&options).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0], key("a"));
        assert_eq!(series[1], key("b"));
        assert_eq!(source.len(), 5);
    }

    #[test]
    fn test_open_sorts_and_filters() {
        let source = source();
        let options = StreamOptions::new(ValueKind::Float).range(TimeRange::new(0, 8).unwrap());

        let stream = source.open(&key("b"), &options).unwrap();
        let samples = stream.into_float().unwrap().collect_samples().unwrap();
        let times: Vec<i64> = samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0, 4]);

        let options = options.descending();
        let stream = source.open(&key("b"), &options).unwrap();
        let samples = stream.into_float().unwrap().collect_samples().unwrap();
        assert_eq!(points(&samples).len(), 2);
        assert_eq!(samples[0].time, 4);
        assert_eq!(samples[1].time, 0);
    }

    #[test]
    fn test_series_skips_out_of_range() {
        let source = source();
        let options = StreamOptions::new(ValueKind::Float).range(TimeRange::new(5, 100).unwrap());

        let series = source.series(&options).unwrap();
        assert_eq!(series, vec![key("b")]);
    }

    #[test]
    fn test_kind_checks() {
        let mut source = source();
        let err = source.insert(Sample::new("cpu", 12, 1i64).tag("host", "a"));
        assert!(matches!(err, Err(TransformError::KindMismatch { .. })));

        let status = SeriesKey::new("status", Tags::new());
        assert_eq!(source.kind_of(&status), Some(ValueKind::String));

        let err = source.open(&status, &StreamOptions::new(ValueKind::Float));
        assert!(matches!(err, Err(TransformError::KindMismatch { .. })));
    }

    #[test]
    fn test_unknown_series_is_source_error() {
        let source = source();
        let err = source
            .open(&SeriesKey::new("mem", Tags::new()), &StreamOptions::new(ValueKind::Float))
            .unwrap_err();
        assert!(matches!(err, TransformError::Source(_)));
    }
}
