//! integral(unit)
//!
//! Trapezoidal area under the value/time curve, one point per window at the
//! window start (time 0 when ungrouped). A window holding a single sample
//! has zero area.
//!
//! A segment crossing a window boundary is handled two ways:
//!
//! - without interpolation it counts wholly toward the window being closed
//! - with interpolation a virtual sample is placed on the boundary, so each
//!   window only gets the part of the segment inside it
//!
//! Samples sharing a timestamp are not summed. The zero-width segment
//! between them adds no area, and the later duplicate becomes the anchor of
//! the next segment.

use crate::error::TransformResult;
use crate::sample::{Direction, Numeric, Sample, StreamOptions, Tags};
use crate::stream::{BoxStream, SampleStream, Upstream};
use crate::window::{linear, Boundary, SegmentTracker, Window};
use std::marker::PhantomData;

type Point = (i64, f64);

pub struct IntegralStream<V> {
    input: Upstream<V>,
    unit: f64,
    interpolate: bool,
    direction: Direction,
    tracker: SegmentTracker,
    area: f64,
    prev: Option<Point>,
    _kind: PhantomData<fn() -> V>,
}

impl<V: Numeric> IntegralStream<V> {
    /// `unit` must be greater than zero
    pub fn new(input: BoxStream<V>, unit: i64, options: &StreamOptions) -> Self {
        Self {
            input: Upstream::new(input),
            unit: unit as f64,
            interpolate: options.interpolate,
            direction: options.direction,
            tracker: SegmentTracker::new(options),
            area: 0.0,
            prev: None,
            _kind: PhantomData,
        }
    }

    fn trapezoid(&self, p0: Point, p1: Point) -> f64 {
        let width = p1.0.abs_diff(p0.0) as f64;
        (p0.1 + p1.1) * width / 2.0 / self.unit
    }

    fn begin(&mut self, point: Point) {
        self.area = 0.0;
        self.prev = Some(point);
    }

    fn advance(&mut self, point: Point) {
        if let Some(prev) = self.prev {
            if prev.0 != point.0 {
                self.area += self.trapezoid(prev, point);
            }
        }
        self.prev = Some(point);
    }

    /// Emit the area of `window` and reset the accumulator
    fn finish(&mut self, name: &str, tags: &Tags, window: &Window) -> Sample<f64> {
        let time = self.tracker.bucketer().output_time(window);
        let area = std::mem::take(&mut self.area);
        tracing::trace!(time, area, "Integral window flushed");
        Sample::new(name, time, area).with_tags(tags.clone())
    }

    /// Drop the open window without emitting it
    fn discard(&mut self) {
        self.tracker.take();
        self.prev = None;
        self.area = 0.0;
    }

    /// Close `previous` and open the window `point` falls in
    fn cross(&mut self, previous: Window, point: Point, sample: &Sample<V>) -> Sample<f64> {
        let Some(prev) = self.prev else {
            self.begin(point);
            return self.finish(&sample.name, &sample.tags, &previous);
        };

        if !self.interpolate {
            self.area += self.trapezoid(prev, point);
            let output = self.finish(&sample.name, &sample.tags, &previous);
            self.begin(point);
            return output;
        }

        let edge = previous.trailing_edge(self.direction);
        if prev.0 != edge {
            let virtual_point = (edge, linear(edge, prev.0, prev.1, point.0, point.1));
            self.area += self.trapezoid(prev, virtual_point);
        }
        let output = self.finish(&sample.name, &sample.tags, &previous);

        let lead = self
            .tracker
            .bucketer()
            .window(point.0)
            .leading_edge(self.direction);
        if point.0 == lead {
            self.begin(point);
        } else {
            self.begin((lead, linear(lead, prev.0, prev.1, point.0, point.1)));
            self.advance(point);
        }
        output
    }
}

impl<V: Numeric> SampleStream<f64> for IntegralStream<V> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<f64>>> {
        loop {
            let sample = match self.input.pull() {
                Ok(Some(sample)) => sample,
                Ok(None) => break,
                Err(e) => {
                    self.discard();
                    return Err(e);
                }
            };
            let point = (sample.time, sample.value.to_f64());

            match self.tracker.observe(&sample) {
                Boundary::Start => self.begin(point),
                Boundary::Continue => self.advance(point),
                Boundary::NewWindow { previous } => {
                    return Ok(Some(self.cross(previous, point, &sample)));
                }
                Boundary::NewSeries { previous } => {
                    let output = self.finish(&previous.name, &previous.tags, &previous.window);
                    self.begin(point);
                    return Ok(Some(output));
                }
            }
        }

        match self.tracker.take() {
            Some(segment) => {
                let output = self.finish(&segment.name, &segment.tags, &segment.window);
                self.prev = None;
                Ok(Some(output))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.discard();
    }

    fn name(&self) -> &'static str {
        "integral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{TimeRange, ValueKind, SECOND};
    use crate::stream::fixtures::{assert_float_points, floats, integers, samples, FailingStream};
    use crate::stream::VecStream;
    use std::sync::atomic::Ordering;

    fn ungrouped() -> StreamOptions {
        StreamOptions::new(ValueKind::Float)
    }

    fn grouped(interpolate: bool) -> StreamOptions {
        StreamOptions::new(ValueKind::Float)
            .range(TimeRange::new(1, 60 * SECOND).unwrap())
            .group_by(20 * SECOND)
            .interpolate(interpolate)
    }

    fn integral<V: Numeric>(
        input: BoxStream<V>,
        unit: i64,
        options: &StreamOptions,
    ) -> Vec<Sample<f64>> {
        IntegralStream::new(input, unit, options).collect_samples().unwrap()
    }

    #[test]
    fn test_integral_ungrouped() {
        let input = floats(&[(10, 20.0), (15, 10.0), (20, 0.0), (30, -10.0)]);
        let output = integral(input, SECOND, &ungrouped());
        assert_float_points(&output, &[(0, 50.0)]);
    }

    #[test]
    fn test_integral_integer() {
        let input = integers(&[(0, 20), (5, 10), (10, 0), (20, -10)]);
        let output = integral(input, SECOND, &ungrouped());
        assert_float_points(&output, &[(0, 50.0)]);
    }

    #[test]
    fn test_integral_grouped() {
        for interpolate in [false, true] {
            let input = floats(&[(10, 20.0), (15, 10.0), (20, 0.0), (30, -10.0)]);
            let output = integral(input, SECOND, &grouped(interpolate));
            assert_float_points(&output, &[(0, 100.0), (20, -50.0)]);
        }
    }

    #[test]
    fn test_integral_interpolated() {
        let input = floats(&[(10, 20.0), (15, 10.0), (25, 0.0), (30, -10.0)]);
        let output = integral(input, SECOND, &grouped(true));
        assert_float_points(&output, &[(0, 112.5), (20, -12.5)]);
    }

    #[test]
    fn test_integral_without_interpolation_closes_on_crossing() {
        let input = floats(&[(10, 20.0), (15, 10.0), (25, 0.0), (30, -10.0)]);
        let output = integral(input, SECOND, &grouped(false));
        assert_float_points(&output, &[(0, 125.0), (20, -25.0)]);
    }

    #[test]
    fn test_integral_interpolated_descending() {
        let input = floats(&[(30, -10.0), (25, 0.0), (15, 10.0), (10, 20.0)]);
        let output = integral(input, SECOND, &grouped(true).descending());
        assert_float_points(&output, &[(20, -12.5), (0, 112.5)]);
    }

    #[test]
    fn test_split_windows_sum_to_whole() {
        let points = [(5, 2.0), (15, 4.0), (25, 6.0), (35, 8.0)];
        let whole = integral(floats(&points), SECOND, &ungrouped());
        assert_float_points(&whole, &[(0, 150.0)]);

        let mut reversed = points;
        reversed.reverse();

        for interpolate in [false, true] {
            for (input, options) in [
                (points, grouped(interpolate)),
                (reversed, grouped(interpolate).descending()),
            ] {
                let split = integral(floats(&input), SECOND, &options);
                assert_eq!(split.len(), 2);

                let total: f64 = split.iter().map(|s| s.value).sum();
                assert!(
                    (total - whole[0].value).abs() < 1e-9,
                    "interpolate={} direction={:?}: {} != {}",
                    interpolate,
                    options.direction,
                    total,
                    whole[0].value
                );
            }
        }
    }

    #[test]
    fn test_integral_interpolates_across_empty_window() {
        let input = floats(&[(5, 10.0), (45, 50.0)]);
        let output = integral(input, SECOND, &grouped(true));
        assert_float_points(&output, &[(0, 262.5), (40, 237.5)]);
    }

    #[test]
    fn test_integral_duplicates_last_value_wins() {
        let input = floats(&[(0, 20.0), (5, 10.0), (5, 30.0), (10, 40.0)]);
        assert_float_points(&integral(input, SECOND, &ungrouped()), &[(0, 250.0)]);

        let input = integers(&[(0, 20), (5, 10), (5, 30), (10, 40)]);
        assert_float_points(&integral(input, 2 * SECOND, &ungrouped()), &[(0, 125.0)]);
    }

    #[test]
    fn test_single_sample_window_is_zero() {
        let output = integral(floats(&[(3, 7.0)]), SECOND, &ungrouped());
        assert_float_points(&output, &[(0, 0.0)]);

        assert!(integral(floats(&[]), SECOND, &ungrouped()).is_empty());
    }

    #[test]
    fn test_integral_per_series() {
        let mut input = samples(&[(0, 1.0), (2, 1.0)]);
        input.extend(samples(&[(0, 2.0), (4, 2.0)]).into_iter().map(|s| s.tag("host", "b")));

        let output = integral(Box::new(VecStream::new(input)), SECOND, &ungrouped());
        assert_float_points(&output, &[(0, 2.0), (0, 8.0)]);
        assert!(output[0].tags.is_empty());
        assert_eq!(output[1].tags.get("host"), Some("b"));
        assert_eq!(output[1].name, "cpu");
    }

    #[test]
    fn test_close_discards_partial_window() {
        let (input, closed) = FailingStream::new(vec![(0, 1.0), (4, 3.0)], false);
        let mut stream = IntegralStream::new(Box::new(input), SECOND, &ungrouped());

        stream.close();
        assert!(closed.load(Ordering::SeqCst));
        assert!(stream.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_error_emits_no_partial_result() {
        let (input, _) = FailingStream::new(vec![(0, 1.0), (4, 3.0)], true);
        let mut stream = IntegralStream::new(Box::new(input), SECOND, &ungrouped());

        assert!(stream.next_sample().is_err());
        assert!(stream.next_sample().unwrap().is_none());
    }
}
