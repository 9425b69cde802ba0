//! # Chronicle Transform
//!
//! Call-transform engine for Chronicle time-series queries. Turns an ordered
//! stream of raw samples into the output of a call such as `derivative`,
//! `integral` or `holt_winters`, honouring the query's time range, traversal
//! direction and GROUP BY interval.
//!
//! ## Modules
//!
//! - [`sample`]: samples, value kinds, stream options, duration literals
//! - [`stream`]: pull-based sample streams and raw-sample sources
//! - [`window`]: window bucketing and series/window boundary tracking
//! - [`call`]: the transforms themselves
//! - [`engine`]: call resolution and pipeline construction
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use chronicle_transform::*;
//!
//! let samples = vec![
//!     Sample::new("cpu", 0, 20.0),
//!     Sample::new("cpu", 4 * SECOND, 10.0),
//!     Sample::new("cpu", 8 * SECOND, 19.0),
//! ];
//!
//! let engine = Engine::new();
//! let options = StreamOptions::new(ValueKind::Float);
//! let call = engine.parse_call("derivative", &[CallArg::Duration(SECOND)])?;
//!
//! let mut output = engine.build(call, &options, AnyStream::from_samples(samples))?;
//! let rates = output.collect_any()?;
//!
//! assert_eq!(rates.len(), 2);
//! assert_eq!(rates[0].value_string(), "-2.5");
//! # Ok::<(), TransformError>(())
//! ```

pub mod call;
pub mod config;
pub mod engine;
pub mod error;
pub mod sample;
pub mod stream;
pub mod window;

// Re-export top-level types for convenience
pub use call::{Call, CallArg, Optimizer};
pub use config::{Config, ConfigError, EngineConfig};
pub use engine::{Engine, SeriesStream};
pub use error::{TransformError, TransformResult};
pub use sample::{
    Direction, Interval, Sample, SeriesKey, StreamOptions, Tags, TimeRange, ValueKind, SECOND,
};
pub use stream::{AnySample, AnyStream, BoxStream, MemorySource, SampleSource, SampleStream};
