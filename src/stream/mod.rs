//! Sample Streams
//!
//! A stream is a finite, single-pass, pull-based sequence of samples of one
//! value kind. Every transform is itself a stream that pulls from the stream
//! it wraps:
//!
//! ```text
//! Source → Upstream → Transform → (caller pulls next_sample)
//! ```
//!
//! - **upstream**: error/close bookkeeping shared by every transform
//! - **memory**: in-memory streams
//! - **source**: the raw-sample source boundary

pub mod memory;
pub mod source;
pub mod upstream;

#[cfg(test)]
pub(crate) mod fixtures;

pub use memory::VecStream;
pub use source::{MemorySource, SampleSource};
pub use upstream::{ChainStream, Upstream};

use crate::error::TransformResult;
use crate::sample::{Sample, Value, ValueKind};
use serde::Serialize;

/// A pull-based stream of samples of one kind
///
/// Once `next_sample` returns `Ok(None)` or an error, the stream is finished
/// and every later call returns `Ok(None)`.
pub trait SampleStream<V>: Send {
    /// Pull the next sample
    ///
    /// Returns:
    /// - `Ok(Some(sample))` - next sample in traversal order
    /// - `Ok(None)` - end of stream
    /// - `Err(e)` - the pipeline is aborted
    fn next_sample(&mut self) -> TransformResult<Option<Sample<V>>>;

    /// Release held resources and stop consuming upstream. Idempotent.
    fn close(&mut self);

    /// Operator name for logging
    fn name(&self) -> &'static str;

    /// Drain every remaining sample
    fn collect_samples(&mut self) -> TransformResult<Vec<Sample<V>>> {
        let mut samples = Vec::new();
        while let Some(sample) = self.next_sample()? {
            samples.push(sample);
        }
        Ok(samples)
    }
}

/// Owned, type-erased stream of one kind
pub type BoxStream<V> = Box<dyn SampleStream<V>>;

/// A stream tagged with its value kind
pub enum AnyStream {
    Float(BoxStream<f64>),
    Integer(BoxStream<i64>),
    String(BoxStream<String>),
    Boolean(BoxStream<bool>),
}

impl AnyStream {
    /// Wrap in-memory samples as a stream
    pub fn from_samples<V: Value>(samples: Vec<Sample<V>>) -> Self {
        V::wrap(Box::new(VecStream::new(samples)))
    }

    /// Kind of the samples this stream yields
    pub fn kind(&self) -> ValueKind {
        match self {
            AnyStream::Float(_) => ValueKind::Float,
            AnyStream::Integer(_) => ValueKind::Integer,
            AnyStream::String(_) => ValueKind::String,
            AnyStream::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Name of the outermost operator
    pub fn name(&self) -> &'static str {
        match self {
            AnyStream::Float(s) => s.name(),
            AnyStream::Integer(s) => s.name(),
            AnyStream::String(s) => s.name(),
            AnyStream::Boolean(s) => s.name(),
        }
    }

    /// Pull the next sample, whatever its kind
    pub fn next_any(&mut self) -> TransformResult<Option<AnySample>> {
        Ok(match self {
            AnyStream::Float(s) => s.next_sample()?.map(AnySample::Float),
            AnyStream::Integer(s) => s.next_sample()?.map(AnySample::Integer),
            AnyStream::String(s) => s.next_sample()?.map(AnySample::String),
            AnyStream::Boolean(s) => s.next_sample()?.map(AnySample::Boolean),
        })
    }

    /// Drain every remaining sample
    pub fn collect_any(&mut self) -> TransformResult<Vec<AnySample>> {
        let mut samples = Vec::new();
        while let Some(sample) = self.next_any()? {
            samples.push(sample);
        }
        Ok(samples)
    }

    pub fn close(&mut self) {
        match self {
            AnyStream::Float(s) => s.close(),
            AnyStream::Integer(s) => s.close(),
            AnyStream::String(s) => s.close(),
            AnyStream::Boolean(s) => s.close(),
        }
    }

    pub fn into_float(self) -> Option<BoxStream<f64>> {
        match self {
            AnyStream::Float(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_integer(self) -> Option<BoxStream<i64>> {
        match self {
            AnyStream::Integer(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<BoxStream<String>> {
        match self {
            AnyStream::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_boolean(self) -> Option<BoxStream<bool>> {
        match self {
            AnyStream::Boolean(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AnyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnyStream<{}>({})", self.kind(), self.name())
    }
}

/// A sample tagged with its value kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnySample {
    Float(Sample<f64>),
    Integer(Sample<i64>),
    String(Sample<String>),
    Boolean(Sample<bool>),
}

impl AnySample {
    pub fn kind(&self) -> ValueKind {
        match self {
            AnySample::Float(_) => ValueKind::Float,
            AnySample::Integer(_) => ValueKind::Integer,
            AnySample::String(_) => ValueKind::String,
            AnySample::Boolean(_) => ValueKind::Boolean,
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            AnySample::Float(s) => s.time,
            AnySample::Integer(s) => s.time,
            AnySample::String(s) => s.time,
            AnySample::Boolean(s) => s.time,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnySample::Float(s) => &s.name,
            AnySample::Integer(s) => &s.name,
            AnySample::String(s) => &s.name,
            AnySample::Boolean(s) => &s.name,
        }
    }

    pub fn series_key(&self) -> crate::sample::SeriesKey {
        match self {
            AnySample::Float(s) => s.series_key(),
            AnySample::Integer(s) => s.series_key(),
            AnySample::String(s) => s.series_key(),
            AnySample::Boolean(s) => s.series_key(),
        }
    }

    /// Render the primary value as text
    pub fn value_string(&self) -> String {
        match self {
            AnySample::Float(s) => s.value.to_string(),
            AnySample::Integer(s) => s.value.to_string(),
            AnySample::String(s) => s.value.clone(),
            AnySample::Boolean(s) => s.value.to_string(),
        }
    }
}

impl<V: Value> From<Sample<V>> for AnySample {
    fn from(sample: Sample<V>) -> Self {
        V::wrap_sample(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_stream_kind_and_drain() {
        let mut stream = AnyStream::from_samples(vec![
            Sample::new("cpu", 0, 1i64),
            Sample::new("cpu", 1, 2i64),
        ]);

        assert_eq!(stream.kind(), ValueKind::Integer);
        let samples = stream.collect_any().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].time(), 1);
        assert_eq!(samples[1].value_string(), "2");
        assert!(stream.next_any().unwrap().is_none());
    }

    #[test]
    fn test_any_sample_conversion() {
        let sample: AnySample = Sample::new("cpu", 5, true).into();
        assert_eq!(sample.kind(), ValueKind::Boolean);
        assert_eq!(sample.name(), "cpu");

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["value"], true);
    }

    #[test]
    fn test_into_typed_stream() {
        let stream = AnyStream::from_samples(vec![Sample::new("cpu", 0, 1.0)]);
        assert!(stream.into_float().is_some());

        let stream = AnyStream::from_samples(vec![Sample::new("cpu", 0, 1.0)]);
        assert!(stream.into_integer().is_none());
    }
}
