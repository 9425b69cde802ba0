//! moving_average(n)
//!
//! Mean of the last `n` samples of a window, emitted at the newest sample's
//! time once `n` samples have been seen. The sum is recomputed over the ring
//! of the last `n` values on every emission.

use crate::error::TransformResult;
use crate::sample::{Numeric, Sample, StreamOptions};
use crate::stream::{BoxStream, SampleStream, Upstream};
use crate::window::SegmentTracker;
use std::collections::VecDeque;

pub struct MovingAverageStream<V> {
    input: Upstream<V>,
    n: usize,
    tracker: SegmentTracker,
    values: VecDeque<V>,
}

impl<V: Numeric> MovingAverageStream<V> {
    /// `n` must be at least 1
    pub fn new(input: BoxStream<V>, n: usize, options: &StreamOptions) -> Self {
        Self {
            input: Upstream::new(input),
            n,
            tracker: SegmentTracker::new(options),
            values: VecDeque::with_capacity(n),
        }
    }

    fn reset(&mut self) {
        self.values.clear();
    }

    fn mean(&self) -> f64 {
        let sum = self.values.iter().fold(V::zero(), |acc, v| acc.accumulate(*v));
        sum.to_f64() / self.n as f64
    }
}

impl<V: Numeric> SampleStream<f64> for MovingAverageStream<V> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<f64>>> {
        while let Some(sample) = self.input.pull()? {
            if self.tracker.observe(&sample).is_reset() {
                self.reset();
            }

            if self.values.len() == self.n {
                self.values.pop_front();
            }
            self.values.push_back(sample.value);

            if self.values.len() == self.n {
                let mean = self.mean();
                let weight = u32::try_from(self.n).unwrap_or(u32::MAX);
                return Ok(Some(sample.derive(sample.time, mean).aggregated(weight)));
            }
        }

        self.reset();
        Ok(None)
    }

    fn close(&mut self) {
        self.input.close();
        self.reset();
    }

    fn name(&self) -> &'static str {
        "moving_average"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{TimeRange, ValueKind, SECOND};
    use crate::stream::fixtures::{assert_float_points, floats, integers, FailingStream};
    use std::sync::atomic::Ordering;

    fn options() -> StreamOptions {
        StreamOptions::new(ValueKind::Float).range(TimeRange::new(0, 16 * SECOND).unwrap())
    }

    #[test]
    fn test_moving_average_float() {
        let input = floats(&[(0, 20.0), (4, 10.0), (8, 19.0), (12, 3.0)]);
        let output = MovingAverageStream::new(input, 2, &options())
            .collect_samples()
            .unwrap();

        assert_float_points(&output, &[(4, 15.0), (8, 14.5), (12, 11.0)]);
        assert!(output.iter().all(|s| s.aggregated == 2));
    }

    #[test]
    fn test_moving_average_integer_promotes() {
        let input = integers(&[(0, 20), (4, 10), (8, 19), (12, 3)]);
        let output = MovingAverageStream::new(input, 2, &options())
            .collect_samples()
            .unwrap();

        assert_float_points(&output, &[(4, 15.0), (8, 14.5), (12, 11.0)]);
    }

    #[test]
    fn test_window_of_one_is_identity() {
        let input = floats(&[(0, 1.5), (1, 2.5)]);
        let output = MovingAverageStream::new(input, 1, &options())
            .collect_samples()
            .unwrap();

        assert_float_points(&output, &[(0, 1.5), (1, 2.5)]);
    }

    #[test]
    fn test_large_value_leaves_no_residue() {
        let input = floats(&[(0, 1e16), (1, 1.0), (2, 1.0), (3, 1.0)]);
        let output = MovingAverageStream::new(input, 2, &options())
            .collect_samples()
            .unwrap();

        let means: Vec<f64> = output.iter().map(|s| s.value).collect();
        assert_eq!(means, vec![5e15, 1.0, 1.0]);
    }

    #[test]
    fn test_exactly_n_samples_emit_one_point() {
        let input = floats(&[(0, 2.0), (4, 4.0), (8, 9.0)]);
        let output = MovingAverageStream::new(input, 3, &options())
            .collect_samples()
            .unwrap();

        assert_float_points(&output, &[(8, 5.0)]);
        assert_eq!(output[0].aggregated, 3);
    }

    #[test]
    fn test_short_window_emits_nothing() {
        let input = floats(&[(0, 1.0), (4, 2.0)]);
        let output = MovingAverageStream::new(input, 3, &options())
            .collect_samples()
            .unwrap();

        assert!(output.is_empty());
    }

    #[test]
    fn test_resets_per_window() {
        let input = floats(&[(0, 1.0), (4, 3.0), (8, 5.0), (10, 7.0), (12, 9.0)]);
        let output = MovingAverageStream::new(input, 2, &options().group_by(10 * SECOND))
            .collect_samples()
            .unwrap();

        assert_float_points(&output, &[(4, 2.0), (8, 4.0), (12, 8.0)]);
    }

    #[test]
    fn test_close_discards_state() {
        let (input, closed) = FailingStream::new(vec![(0, 1.0), (4, 3.0)], false);
        let mut stream = MovingAverageStream::new(Box::new(input), 2, &options());

        stream.close();
        assert!(closed.load(Ordering::SeqCst));
        assert!(stream.next_sample().unwrap().is_none());
    }
}
