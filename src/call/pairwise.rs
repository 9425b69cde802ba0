//! Pairwise transforms
//!
//! derivative, non_negative_derivative, difference, non_negative_difference
//! and elapsed all walk consecutive pairs `(p0, p1)` of a window in traversal
//! order and emit at most one point per pair, at `p1.time`.
//!
//! Samples sharing a timestamp collapse to the first one seen: later
//! duplicates are dropped before differencing. A skipped (negative) result
//! still advances the anchor to `p1`.

use crate::error::TransformResult;
use crate::sample::{Direction, Numeric, Sample, StreamOptions, Value};
use crate::stream::{BoxStream, SampleStream, Upstream};
use crate::window::{Boundary, SegmentTracker};
use std::marker::PhantomData;

/// Computes the output of one consecutive pair
pub trait PairOp<V>: Send {
    type Output: Value;

    /// Call name, for logging
    fn name(&self) -> &'static str;

    /// Result for the pair, or None to skip it
    fn apply(&self, p0: &Sample<V>, p1: &Sample<V>, direction: Direction) -> Option<Self::Output>;
}

/// Rate of change per `unit`
#[derive(Debug, Clone, Copy)]
pub struct Derivative {
    pub unit: i64,
    pub non_negative: bool,
}

impl<V: Numeric> PairOp<V> for Derivative {
    type Output = f64;

    fn name(&self) -> &'static str {
        if self.non_negative {
            "non_negative_derivative"
        } else {
            "derivative"
        }
    }

    fn apply(&self, p0: &Sample<V>, p1: &Sample<V>, direction: Direction) -> Option<f64> {
        let mut elapsed = p1.time.wrapping_sub(p0.time);
        if !direction.is_ascending() {
            elapsed = -elapsed;
        }

        let diff = p1.value.delta(p0.value).to_f64();
        let rate = diff / (elapsed as f64 / self.unit as f64);
        if self.non_negative && rate < 0.0 {
            return None;
        }
        Some(rate)
    }
}

/// Change between consecutive values, in the input kind
#[derive(Debug, Clone, Copy)]
pub struct Difference {
    pub non_negative: bool,
}

impl<V: Numeric> PairOp<V> for Difference {
    type Output = V;

    fn name(&self) -> &'static str {
        if self.non_negative {
            "non_negative_difference"
        } else {
            "difference"
        }
    }

    fn apply(&self, p0: &Sample<V>, p1: &Sample<V>, _direction: Direction) -> Option<V> {
        let diff = p1.value.delta(p0.value);
        if self.non_negative && diff.is_negative() {
            return None;
        }
        Some(diff)
    }
}

/// Time between consecutive samples in whole `unit`s
#[derive(Debug, Clone, Copy)]
pub struct Elapsed {
    pub unit: i64,
}

impl<V: Value> PairOp<V> for Elapsed {
    type Output = i64;

    fn name(&self) -> &'static str {
        "elapsed"
    }

    fn apply(&self, p0: &Sample<V>, p1: &Sample<V>, _direction: Direction) -> Option<i64> {
        Some(p1.time.wrapping_sub(p0.time) / self.unit)
    }
}

/// Drives a `PairOp` over the pairs of each window
pub struct PairwiseStream<V, O> {
    input: Upstream<V>,
    op: O,
    tracker: SegmentTracker,
    direction: Direction,
    prev: Option<Sample<V>>,
    _kind: PhantomData<fn() -> V>,
}

impl<V: Value, O: PairOp<V>> PairwiseStream<V, O> {
    pub fn new(input: BoxStream<V>, op: O, options: &StreamOptions) -> Self {
        Self {
            input: Upstream::new(input),
            op,
            tracker: SegmentTracker::new(options),
            direction: options.direction,
            prev: None,
            _kind: PhantomData,
        }
    }
}

impl<V: Value, O: PairOp<V>> SampleStream<O::Output> for PairwiseStream<V, O> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<O::Output>>> {
        while let Some(sample) = self.input.pull()? {
            let boundary = self.tracker.observe(&sample);
            if boundary.is_reset() {
                if boundary != Boundary::Start {
                    tracing::trace!(call = self.op.name(), time = sample.time, "Window reset");
                }
                self.prev = None;
            }

            let Some(prev) = self.prev.take() else {
                self.prev = Some(sample);
                continue;
            };
            if prev.time == sample.time {
                self.prev = Some(prev);
                continue;
            }

            let output = self
                .op
                .apply(&prev, &sample, self.direction)
                .map(|value| sample.derive(sample.time, value));
            self.prev = Some(sample);

            if output.is_some() {
                return Ok(output);
            }
        }

        self.prev = None;
        Ok(None)
    }

    fn close(&mut self) {
        self.input.close();
        self.prev = None;
    }

    fn name(&self) -> &'static str {
        self.op.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{TimeRange, ValueKind, SECOND};
    use crate::stream::fixtures::{
        assert_float_points, floats, integers, points, samples, FailingStream,
    };
    use crate::stream::VecStream;
    use std::sync::atomic::Ordering;

    fn ascending() -> StreamOptions {
        StreamOptions::new(ValueKind::Float).range(TimeRange::new(0, 16 * SECOND).unwrap())
    }

    fn derivative() -> Derivative {
        Derivative {
            unit: SECOND,
            non_negative: false,
        }
    }

    fn run<V: Value, O: PairOp<V>>(
        input: BoxStream<V>,
        op: O,
        options: &StreamOptions,
    ) -> Vec<Sample<O::Output>> {
        PairwiseStream::new(input, op, options).collect_samples().unwrap()
    }

    #[test]
    fn test_derivative_float() {
        let input = floats(&[(0, 20.0), (4, 10.0), (8, 19.0), (12, 3.0)]);
        let output = run(input, derivative(), &ascending());
        assert_float_points(&output, &[(4, -2.5), (8, 2.25), (12, -4.0)]);
    }

    #[test]
    fn test_derivative_integer_promotes() {
        let input = integers(&[(0, 20), (4, 10), (8, 19), (12, 3)]);
        let output = run(input, derivative(), &ascending());
        assert_float_points(&output, &[(4, -2.5), (8, 2.25), (12, -4.0)]);
    }

    #[test]
    fn test_derivative_descending() {
        let input = floats(&[(12, 3.0), (8, 19.0), (4, 10.0), (0, 20.0)]);
        let output = run(input, derivative(), &ascending().descending());
        assert_float_points(&output, &[(8, 4.0), (4, -2.25), (0, 2.5)]);
    }

    #[test]
    fn test_derivative_collapses_duplicates() {
        let input = floats(&[(0, 20.0), (0, 19.0), (4, 10.0), (4, 3.0)]);
        let output = run(input, derivative(), &ascending());
        assert_float_points(&output, &[(4, -2.5)]);
    }

    #[test]
    fn test_derivative_unit_scaling() {
        let input = floats(&[(0, 0.0), (2, 10.0)]);
        let op = Derivative {
            unit: 10 * SECOND,
            non_negative: false,
        };
        assert_float_points(&run(input, op, &ascending()), &[(2, 50.0)]);
    }

    #[test]
    fn test_non_negative_derivative() {
        let input = floats(&[(0, 20.0), (4, 10.0), (8, 18.0), (12, 3.0), (16, 5.0)]);
        let op = Derivative {
            unit: SECOND,
            non_negative: true,
        };
        assert_float_points(&run(input, op, &ascending()), &[(8, 2.0), (16, 0.5)]);
    }

    #[test]
    fn test_difference() {
        let input = floats(&[(0, 20.0), (4, 10.0), (8, 19.0), (12, 3.0)]);
        let output = run(input, Difference { non_negative: false }, &ascending());
        assert_eq!(points(&output), vec![(4, -10.0), (8, 9.0), (12, -16.0)]);

        let input = integers(&[(0, 20), (4, 10), (8, 19), (12, 3)]);
        let output = run(input, Difference { non_negative: false }, &ascending());
        assert_eq!(points(&output), vec![(4, -10), (8, 9), (12, -16)]);
    }

    #[test]
    fn test_difference_collapses_duplicates() {
        let input = floats(&[(0, 20.0), (0, 19.0), (4, 10.0), (4, 3.0)]);
        let output = run(input, Difference { non_negative: false }, &ascending());
        assert_eq!(points(&output), vec![(4, -10.0)]);
    }

    #[test]
    fn test_non_negative_difference() {
        let input = floats(&[(0, 20.0), (4, 10.0), (8, 29.0), (12, 3.0), (16, 39.0)]);
        let output = run(input, Difference { non_negative: true }, &ascending());
        assert_eq!(points(&output), vec![(8, 19.0), (16, 36.0)]);

        let input = integers(&[(0, 20), (4, 10), (8, 21), (12, 3)]);
        let output = run(input, Difference { non_negative: true }, &ascending());
        assert_eq!(points(&output), vec![(8, 11)]);
    }

    #[test]
    fn test_non_negative_difference_duplicates() {
        let input = integers(&[
            (0, 20),
            (0, 19),
            (4, 10),
            (4, 3),
            (8, 30),
            (8, 19),
            (12, 10),
            (12, 3),
            (16, 40),
            (16, 3),
        ]);
        let output = run(input, Difference { non_negative: true }, &ascending());
        assert_eq!(points(&output), vec![(8, 20), (16, 30)]);
    }

    #[test]
    fn test_elapsed_any_kind() {
        let times = [0, 4, 8, 11];

        let strings: Vec<(i64, String)> = times.iter().map(|t| (*t, format!("v{}", t))).collect();
        let input: BoxStream<String> = Box::new(VecStream::new(samples(&strings)));
        let output = run(input, Elapsed { unit: SECOND }, &ascending());
        assert_eq!(points(&output), vec![(4, 4), (8, 4), (11, 3)]);

        let bools: Vec<(i64, bool)> = times.iter().map(|t| (*t, t % 2 == 0)).collect();
        let input: BoxStream<bool> = Box::new(VecStream::new(samples(&bools)));
        let output = run(input, Elapsed { unit: SECOND }, &ascending());
        assert_eq!(points(&output), vec![(4, 4), (8, 4), (11, 3)]);
    }

    #[test]
    fn test_elapsed_truncates() {
        let input = floats(&[(0, 1.0), (3, 1.0)]);
        let output = run(input, Elapsed { unit: 2 * SECOND }, &ascending());
        assert_eq!(output[0].value, 1);

        let input = floats(&[(0, 1.0), (4, 1.0)]);
        let output = run(input, Elapsed { unit: 1 }, &ascending());
        assert_eq!(output[0].value, 4 * SECOND);
    }

    #[test]
    fn test_resets_per_window() {
        let options = ascending().group_by(10 * SECOND);
        let input = floats(&[(0, 1.0), (4, 2.0), (8, 4.0), (12, 8.0), (16, 16.0)]);

        let output = run(input, Difference { non_negative: false }, &options);
        assert_eq!(points(&output), vec![(4, 1.0), (8, 2.0), (16, 8.0)]);
    }

    #[test]
    fn test_resets_per_series() {
        let mut input = samples(&[(0, 1.0), (4, 3.0)]);
        input.extend(
            samples(&[(0, 10.0), (4, 30.0)])
                .into_iter()
                .map(|s| s.tag("host", "b")),
        );

        let output = run(
            Box::new(VecStream::new(input)),
            Difference { non_negative: false },
            &ascending(),
        );
        assert_eq!(points(&output), vec![(4, 2.0), (4, 20.0)]);
        assert_eq!(output[1].tags.get("host"), Some("b"));
    }

    #[test]
    fn test_window_below_minimum_emits_nothing() {
        let output = run(floats(&[(0, 1.0)]), derivative(), &ascending());
        assert!(output.is_empty());

        let output = run(floats(&[]), derivative(), &ascending());
        assert!(output.is_empty());
    }

    #[test]
    fn test_upstream_error_aborts() {
        let (input, closed) = FailingStream::new(vec![(0, 1.0), (4, 2.0)], true);
        let mut stream = PairwiseStream::new(Box::new(input), derivative(), &ascending());

        assert!(stream.next_sample().unwrap().is_some());
        assert!(stream.next_sample().is_err());
        assert!(closed.load(Ordering::SeqCst));
        assert!(stream.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_close_propagates() {
        let (input, closed) = FailingStream::new(vec![(0, 1.0), (4, 2.0)], false);
        let mut stream = PairwiseStream::new(Box::new(input), derivative(), &ascending());

        stream.close();
        stream.close();
        assert!(closed.load(Ordering::SeqCst));
        assert!(stream.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_output_carries_aux_of_later_sample() {
        use crate::sample::AuxValue;

        let input = vec![
            Sample::new("cpu", 0, 1.0).with_aux(vec![AuxValue::String("a".into())]),
            Sample::new("cpu", SECOND, 2.0).with_aux(vec![AuxValue::String("b".into())]),
        ];
        let output = run(Box::new(VecStream::new(input)), derivative(), &ascending());
        assert_eq!(output[0].aux, vec![AuxValue::String("b".into())]);
    }
}
