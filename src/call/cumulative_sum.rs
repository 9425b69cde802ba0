//! cumulative_sum()
//!
//! Running total emitted for every input sample at its own time, in the
//! input kind. Duplicate timestamps are not collapsed.

use crate::error::TransformResult;
use crate::sample::{Numeric, Sample, StreamOptions};
use crate::stream::{BoxStream, SampleStream, Upstream};
use crate::window::SegmentTracker;

pub struct CumulativeSumStream<V> {
    input: Upstream<V>,
    tracker: SegmentTracker,
    total: V,
}

impl<V: Numeric> CumulativeSumStream<V> {
    pub fn new(input: BoxStream<V>, options: &StreamOptions) -> Self {
        Self {
            input: Upstream::new(input),
            tracker: SegmentTracker::new(options),
            total: V::zero(),
        }
    }
}

impl<V: Numeric> SampleStream<V> for CumulativeSumStream<V> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<V>>> {
        let Some(sample) = self.input.pull()? else {
            self.total = V::zero();
            return Ok(None);
        };

        if self.tracker.observe(&sample).is_reset() {
            self.total = V::zero();
        }
        self.total = self.total.accumulate(sample.value);
        Ok(Some(sample.derive(sample.time, self.total)))
    }

    fn close(&mut self) {
        self.input.close();
        self.total = V::zero();
    }

    fn name(&self) -> &'static str {
        "cumulative_sum"
    }
}
