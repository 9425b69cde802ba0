//! Sample Model
//!
//! The data every stage of a pipeline exchanges:
//!
//! - **types**: `Sample`, `Tags`, `SeriesKey`
//! - **value**: value kinds and the `Value`/`Numeric` traits
//! - **options**: `StreamOptions`, `TimeRange`, `Direction`, `Interval`
//! - **duration**: duration literals (`1s`, `500ms`, `1h30m`)

pub mod duration;
pub mod options;
pub mod types;
pub mod value;

pub use duration::{
    format_duration, parse_duration, DAY, HOUR, MICROSECOND, MILLISECOND, MINUTE, NANOSECOND,
    SECOND, WEEK,
};
pub use options::{
    AuxField, Direction, Interval, StreamOptions, TimeRange, MAX_TIME, MIN_TIME,
};
pub use types::{Sample, SeriesKey, Tags};
pub use value::{AuxValue, Numeric, Value, ValueKind};
