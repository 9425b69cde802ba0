//! In-memory streams

use super::SampleStream;
use crate::error::TransformResult;
use crate::sample::Sample;
use std::collections::VecDeque;

/// A stream over samples already held in memory
///
/// Yields samples in the order given; ordering is the producer's contract.
pub struct VecStream<V> {
    samples: VecDeque<Sample<V>>,
}

impl<V> VecStream<V> {
    pub fn new(samples: Vec<Sample<V>>) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

impl<V: Send> SampleStream<V> for VecStream<V> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<V>>> {
        Ok(self.samples.pop_front())
    }

    fn close(&mut self) {
        self.samples.clear();
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
