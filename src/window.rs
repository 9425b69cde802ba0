//! Interval bucketer
//!
//! Maps timestamps to GROUP BY time windows and tracks when a stream crosses
//! from one window (or series) into the next.
//!
//! With grouping, windows are half-open `[start, start + interval)` aligned
//! to `offset`:
//!
//! ```text
//! window_start(t) = floor((t - offset) / interval) * interval + offset
//! ```
//!
//! Without grouping the whole range is a single window, and points anchored
//! on it are emitted at time 0.

use crate::error::{TransformError, TransformResult};
use crate::sample::{Direction, Interval, Sample, StreamOptions, Tags, TimeRange};

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: i64) -> bool {
        time >= self.start && time < self.end
    }

    /// Edge a traversal leaves the window through
    pub fn trailing_edge(&self, direction: Direction) -> i64 {
        match direction {
            Direction::Ascending => self.end,
            Direction::Descending => self.start,
        }
    }

    /// Edge a traversal enters the window through
    pub fn leading_edge(&self, direction: Direction) -> i64 {
        match direction {
            Direction::Ascending => self.start,
            Direction::Descending => self.end,
        }
    }
}

/// Window arithmetic for one set of stream options
#[derive(Debug, Clone, Copy)]
pub struct Bucketer {
    interval: Interval,
    range: TimeRange,
    direction: Direction,
}

impl Bucketer {
    pub fn new(options: &StreamOptions) -> Self {
        Self {
            interval: options.interval,
            range: options.range,
            direction: options.direction,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.interval.is_grouped()
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Start of the window containing `time`
    pub fn window_start(&self, time: i64) -> i64 {
        if !self.is_grouped() {
            return self.range.start;
        }

        let interval = i128::from(self.interval.duration);
        let offset = i128::from(self.interval.offset).rem_euclid(interval);
        let start = (i128::from(time) - offset).div_euclid(interval) * interval + offset;
        clamp(start)
    }

    /// Window containing `time`
    pub fn window(&self, time: i64) -> Window {
        if !self.is_grouped() {
            return Window::new(self.range.start, self.range.end);
        }

        let start = self.window_start(time);
        Window::new(start, start.saturating_add(self.interval.duration))
    }

    /// Timestamp of a point anchored on `window`
    pub fn output_time(&self, window: &Window) -> i64 {
        if self.is_grouped() {
            window.start
        } else {
            0
        }
    }

    /// Enumerate the windows covering the range in traversal order
    ///
    /// Grouped enumeration needs a bounded range.
    pub fn windows(&self) -> TransformResult<Windows> {
        if !self.is_grouped() {
            return Ok(Windows {
                bucketer: *self,
                next: Some(Window::new(self.range.start, self.range.end)),
            });
        }
        if !self.range.is_bounded() {
            return Err(TransformError::InvalidTimeRange(
                "cannot enumerate windows over an unbounded range".to_string(),
            ));
        }

        let first = match self.direction {
            Direction::Ascending => self.window(self.range.start),
            Direction::Descending => self.window(self.range.end - 1),
        };
        Ok(Windows {
            bucketer: *self,
            next: Some(first),
        })
    }
}

fn clamp(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Iterator over window boundaries
pub struct Windows {
    bucketer: Bucketer,
    next: Option<Window>,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let current = self.next.take()?;
        let b = &self.bucketer;

        if b.is_grouped() {
            self.next = match b.direction {
                Direction::Ascending if current.end < b.range.end => Some(b.window(current.end)),
                Direction::Descending if current.start > b.range.start => {
                    Some(b.window(current.start - 1))
                }
                _ => None,
            };
        }
        Some(current)
    }
}

/// Linear interpolation of the value at `time` on the line through
/// `(t0, v0)` and `(t1, v1)`
pub fn linear(time: i64, t0: i64, v0: f64, t1: i64, v1: f64) -> f64 {
    if t0 == t1 {
        return v0;
    }
    let slope = (v1 - v0) / (t1 - t0) as f64;
    slope * (time - t0) as f64 + v0
}

/// The series and window a run of samples belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    pub tags: Tags,
    pub window: Window,
}

impl Segment {
    fn holds<V>(&self, sample: &Sample<V>) -> bool {
        self.name == sample.name && self.tags.same_as(&sample.tags)
    }
}

/// How a sample relates to the one observed before it
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// First sample of the stream
    Start,
    /// Same series, same window
    Continue,
    /// Same series, next window
    NewWindow { previous: Window },
    /// A different series begins
    NewSeries { previous: Segment },
}

impl Boundary {
    /// Whether accumulated state must be discarded before this sample
    pub fn is_reset(&self) -> bool {
        !matches!(self, Boundary::Continue)
    }
}

/// Detects window and series changes in a stream
#[derive(Debug)]
pub struct SegmentTracker {
    bucketer: Bucketer,
    current: Option<Segment>,
}

impl SegmentTracker {
    pub fn new(options: &StreamOptions) -> Self {
        Self {
            bucketer: Bucketer::new(options),
            current: None,
        }
    }

    pub fn bucketer(&self) -> &Bucketer {
        &self.bucketer
    }

    /// Place `sample` and report the boundary crossed to reach it
    pub fn observe<V>(&mut self, sample: &Sample<V>) -> Boundary {
        let window = self.bucketer.window(sample.time);

        match &mut self.current {
            Some(segment) if segment.holds(sample) => {
                if segment.window == window {
                    Boundary::Continue
                } else {
                    let previous = segment.window;
                    segment.window = window;
                    Boundary::NewWindow { previous }
                }
            }
            current => {
                let next = Segment {
                    name: sample.name.clone(),
                    tags: sample.tags.clone(),
                    window,
                };
                match current.replace(next) {
                    Some(previous) => Boundary::NewSeries { previous },
                    None => Boundary::Start,
                }
            }
        }
    }

    /// Take the current segment, leaving the tracker empty
    pub fn take(&mut self) -> Option<Segment> {
        self.current.take()
    }
}
