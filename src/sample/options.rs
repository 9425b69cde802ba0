//! Stream options
//!
//! `StreamOptions` is built once per query invocation and shared by
//! reference across every stage of a pipeline. It carries the time range,
//! traversal direction, grouping interval, interpolation flag, auxiliary
//! field descriptors and the declared input kind.

use super::value::ValueKind;
use crate::error::{TransformError, TransformResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Smallest representable timestamp, used for an unbounded range start
pub const MIN_TIME: i64 = i64::MIN;

/// Largest representable timestamp, used for an unbounded range end
pub const MAX_TIME: i64 = i64::MAX;

/// Time range for a query (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in nanoseconds
    pub start: i64,
    /// End timestamp (exclusive), in nanoseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a new time range, rejecting empty ranges
    pub fn new(start: i64, end: i64) -> TransformResult<Self> {
        Self::try_new(start, end).ok_or_else(|| {
            TransformError::InvalidTimeRange(format!(
                "start ({}) must be less than end ({})",
                start, end
            ))
        })
    }

    /// Create a time range, returning None if invalid
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Range with neither bound set
    pub fn unbounded() -> Self {
        Self {
            start: MIN_TIME,
            end: MAX_TIME,
        }
    }

    /// Range from `start` with no upper bound
    pub fn since(start: i64) -> Self {
        Self {
            start,
            end: MAX_TIME,
        }
    }

    /// Range up to `end` with no lower bound
    pub fn until(end: i64) -> Self {
        Self {
            start: MIN_TIME,
            end,
        }
    }

    /// Create a range from two UTC datetimes
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> TransformResult<Self> {
        let to_nanos = |dt: DateTime<Utc>| {
            dt.timestamp_nanos_opt().ok_or_else(|| {
                TransformError::InvalidTimeRange(format!("{} is outside the nanosecond range", dt))
            })
        };
        Self::new(to_nanos(start)?, to_nanos(end)?)
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn has_start(&self) -> bool {
        self.start != MIN_TIME
    }

    pub fn has_end(&self) -> bool {
        self.end != MAX_TIME
    }

    /// Whether both bounds are set
    pub fn is_bounded(&self) -> bool {
        self.has_start() && self.has_end()
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Order in which a stream yields timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn is_ascending(&self) -> bool {
        *self == Direction::Ascending
    }
}

/// GROUP BY time interval
///
/// A zero duration means no grouping: the whole range is one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Interval {
    /// Window length in nanoseconds
    pub duration: i64,
    /// Window alignment offset in nanoseconds
    pub offset: i64,
}

impl Interval {
    /// No grouping
    pub fn none() -> Self {
        Self::default()
    }

    /// Windows of the given length aligned to the epoch
    pub fn every(duration: i64) -> Self {
        Self {
            duration,
            offset: 0,
        }
    }

    /// Builder method: set the alignment offset
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn is_grouped(&self) -> bool {
        self.duration > 0
    }
}

/// Descriptor of an auxiliary field carried for projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuxField {
    pub name: String,
    pub kind: ValueKind,
}

impl AuxField {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Configuration consumed by every stage of one pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamOptions {
    /// Time range to evaluate
    pub range: TimeRange,
    /// Traversal direction
    pub direction: Direction,
    /// Grouping interval
    pub interval: Interval,
    /// Interpolate virtual samples at window edges
    pub interpolate: bool,
    /// Auxiliary fields attached to each sample
    pub aux: Vec<AuxField>,
    /// Declared kind of the input stream
    pub kind: ValueKind,
}

impl StreamOptions {
    /// Ascending, ungrouped options over an unbounded range
    pub fn new(kind: ValueKind) -> Self {
        Self {
            range: TimeRange::unbounded(),
            direction: Direction::Ascending,
            interval: Interval::none(),
            interpolate: false,
            aux: Vec::new(),
            kind,
        }
    }

    /// Builder method: set the time range
    pub fn range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    /// Builder method: set the traversal direction
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Builder method: traverse newest first
    pub fn descending(self) -> Self {
        self.direction(Direction::Descending)
    }

    /// Builder method: group into windows of `duration` nanoseconds
    pub fn group_by(mut self, duration: i64) -> Self {
        self.interval.duration = duration;
        self
    }

    /// Builder method: shift window alignment by `offset` nanoseconds
    pub fn offset(mut self, offset: i64) -> Self {
        self.interval.offset = offset;
        self
    }

    /// Builder method: enable interpolation at window edges
    pub fn interpolate(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    /// Builder method: append an auxiliary field descriptor
    pub fn aux_field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.aux.push(AuxField::new(name, kind));
        self
    }

    pub fn is_ascending(&self) -> bool {
        self.direction.is_ascending()
    }

    /// Check the options are internally consistent
    pub fn validate(&self) -> TransformResult<()> {
        if self.range.start >= self.range.end {
            return Err(TransformError::InvalidTimeRange(format!(
                "start ({}) must be less than end ({})",
                self.range.start, self.range.end
            )));
        }
        if self.interval.duration < 0 {
            return Err(TransformError::InvalidTimeRange(format!(
                "grouping interval must not be negative: {}",
                self.interval.duration
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(1000, 2000).unwrap();

        assert!(!range.contains(999));
        assert!(range.contains(1000));
        assert!(range.contains(1999));
        assert!(!range.contains(2000));
    }

    #[test]
    fn test_time_range_rejects_empty() {
        assert!(TimeRange::new(5, 5).is_err());
        assert!(TimeRange::try_new(6, 5).is_none());
    }

    #[test]
    fn test_unbounded_ranges() {
        let range = TimeRange::unbounded();
        assert!(range.contains(i64::MIN));
        assert!(range.contains(-1));
        assert!(!range.is_bounded());

        assert!(TimeRange::since(0).has_start());
        assert!(!TimeRange::since(0).has_end());
        assert!(TimeRange::until(0).has_end());
    }

    #[test]
    fn test_range_between_datetimes() {
        let start = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 16).unwrap();
        let range = TimeRange::between(start, end).unwrap();

        assert_eq!(range.start, 0);
        assert_eq!(range.end, 16_000_000_000);
    }

    #[test]
    fn test_options_builder() {
        let opts = StreamOptions::new(ValueKind::Float)
            .range(TimeRange::new(0, 60).unwrap())
            .descending()
            .group_by(20)
            .offset(5)
            .interpolate(true)
            .aux_field("host", ValueKind::String);

        assert_eq!(opts.direction, Direction::Descending);
        assert_eq!(opts.interval, Interval::every(20).with_offset(5));
        assert!(opts.interval.is_grouped());
        assert!(opts.interpolate);
        assert_eq!(opts.aux, vec![AuxField::new("host", ValueKind::String)]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let opts = StreamOptions::new(ValueKind::Float).group_by(-1);
        assert!(matches!(opts.validate(), Err(TransformError::InvalidTimeRange(_))));
    }
}
