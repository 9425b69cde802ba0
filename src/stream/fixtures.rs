//! Test fixtures shared by the transform tests
//!
//! Point times are given in seconds and converted to nanoseconds.

use super::{BoxStream, SampleStream, VecStream};
use crate::error::{TransformError, TransformResult};
use crate::sample::{Sample, SECOND};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Samples of the `cpu` series at `(seconds, value)` points
pub fn samples<V: Clone>(points: &[(i64, V)]) -> Vec<Sample<V>> {
    points
        .iter()
        .map(|(t, v)| Sample::new("cpu", t * SECOND, v.clone()))
        .collect()
}

pub fn floats(points: &[(i64, f64)]) -> BoxStream<f64> {
    Box::new(VecStream::new(samples(points)))
}

pub fn integers(points: &[(i64, i64)]) -> BoxStream<i64> {
    Box::new(VecStream::new(samples(points)))
}

/// `(seconds, value)` view of output samples
pub fn points<V: Clone>(samples: &[Sample<V>]) -> Vec<(i64, V)> {
    samples.iter().map(|s| (s.time / SECOND, s.value.clone())).collect()
}

pub fn times<V>(samples: &[Sample<V>]) -> Vec<i64> {
    samples.iter().map(|s| s.time / SECOND).collect()
}

/// Assert float outputs match `(seconds, value)` pairs within 1e-9
pub fn assert_float_points(actual: &[Sample<f64>], expected: &[(i64, f64)]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "got {:?}, want {:?}",
        points(actual),
        expected
    );
    for (sample, (t, v)) in actual.iter().zip(expected) {
        assert_eq!(sample.time, t * SECOND, "got {:?}, want {:?}", points(actual), expected);
        assert!(
            (sample.value - v).abs() < 1e-9,
            "at {}s: got {}, want {}",
            t,
            sample.value,
            v
        );
    }
}

/// Yields the given points, then either ends or fails, and records close
pub struct FailingStream<V> {
    samples: VecDeque<Sample<V>>,
    fail: bool,
    closed: Arc<AtomicBool>,
}

impl<V: Clone> FailingStream<V> {
    pub fn new(points: Vec<(i64, V)>, fail: bool) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let stream = Self {
            samples: samples(&points).into(),
            fail,
            closed: Arc::clone(&closed),
        };
        (stream, closed)
    }
}

impl<V: Send> SampleStream<V> for FailingStream<V> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<V>>> {
        if let Some(sample) = self.samples.pop_front() {
            return Ok(Some(sample));
        }
        if self.fail {
            self.fail = false;
            return Err(TransformError::from_source("shard unavailable"));
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
