//! Transform Engine
//!
//! Wires a raw-sample stream through the transform selected by a call:
//!
//! ```text
//! SampleSource → open(series) → Engine::build(call) → output stream
//! ```
//!
//! Configuration errors (unknown call, bad arguments, unsupported input
//! kind, invalid options) are raised here, before any sample is pulled.
//! Integer input to a Float-output call is promoted inside the transform;
//! Float input is never demoted.

use crate::call::{
    Call, CallArg, CumulativeSumStream, Derivative, Difference, Elapsed, HoltWintersParams,
    HoltWintersStream, IntegralStream, MovingAverageStream, Optimizer, PairOp, PairwiseStream,
};
use crate::config::EngineConfig;
use crate::error::{TransformError, TransformResult};
use crate::sample::{Numeric, SeriesKey, StreamOptions, Value, ValueKind, SECOND};
use crate::stream::{AnyStream, BoxStream, ChainStream, SampleSource};

/// One output stream per series
#[derive(Debug)]
pub struct SeriesStream {
    pub series: SeriesKey,
    pub stream: AnyStream,
}

/// Builds transform pipelines
#[derive(Debug, Clone)]
pub struct Engine {
    default_unit: i64,
    optimizer: Optimizer,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with a 1s default unit and the default optimiser
    pub fn new() -> Self {
        Self {
            default_unit: SECOND,
            optimizer: Optimizer::default(),
        }
    }

    /// Engine configured from the `[engine]` table
    pub fn with_config(config: &EngineConfig) -> TransformResult<Self> {
        let default_unit = config.default_unit_nanos()?;
        if default_unit <= 0 {
            return Err(TransformError::InvalidDuration(format!(
                "default unit must be greater than zero: {}",
                config.default_unit
            )));
        }

        Ok(Self {
            default_unit,
            optimizer: config.holt_winters.optimizer(),
        })
    }

    /// Resolve a call name and its literal arguments
    pub fn parse_call(&self, name: &str, args: &[CallArg]) -> TransformResult<Call> {
        Call::parse_with_default_unit(name, args, self.default_unit)
    }

    /// Check that `call` can run with `options`
    pub fn check(&self, call: Call, options: &StreamOptions) -> TransformResult<ValueKind> {
        options.validate()?;
        let output = call.output_kind(options.kind)?;

        if matches!(call, Call::HoltWinters { .. } | Call::HoltWintersWithFit { .. })
            && !options.interval.is_grouped()
        {
            return Err(TransformError::invalid_argument(
                call.name(),
                "a grouping interval is required",
            ));
        }
        Ok(output)
    }

    /// Build the output stream of `call` over `input`
    pub fn build(
        &self,
        call: Call,
        options: &StreamOptions,
        input: AnyStream,
    ) -> TransformResult<AnyStream> {
        let mut input = input;
        if input.kind() != options.kind {
            input.close();
            return Err(TransformError::KindMismatch {
                declared: options.kind,
                actual: input.kind(),
            });
        }
        let output_kind = match self.check(call, options) {
            Ok(kind) => kind,
            Err(e) => {
                input.close();
                return Err(e);
            }
        };

        let output = match (call, input) {
            (Call::Elapsed { unit }, AnyStream::String(s)) => elapsed(s, unit, options),
            (Call::Elapsed { unit }, AnyStream::Boolean(s)) => elapsed(s, unit, options),
            (call, AnyStream::Float(s)) => self.numeric(call, s, options),
            (call, AnyStream::Integer(s)) => self.numeric(call, s, options),
            (call, mut other) => {
                other.close();
                return Err(TransformError::UnsupportedKind {
                    call: call.name().to_string(),
                    kind: other.kind(),
                });
            }
        };

        tracing::debug!(
            call = %call,
            input = %options.kind,
            output = %output_kind,
            direction = ?options.direction,
            interval = options.interval.duration,
            interpolate = options.interpolate,
            "Built transform pipeline"
        );
        Ok(output)
    }

    /// Resolve a call by name and build its output stream
    pub fn build_call(
        &self,
        name: &str,
        args: &[CallArg],
        options: &StreamOptions,
        input: AnyStream,
    ) -> TransformResult<AnyStream> {
        let call = match self.parse_call(name, args) {
            Ok(call) => call,
            Err(e) => {
                let mut input = input;
                input.close();
                return Err(e);
            }
        };
        self.build(call, options, input)
    }

    /// Build one output stream per series of `source`
    pub fn execute<S: SampleSource + ?Sized>(
        &self,
        source: &S,
        call: Call,
        options: &StreamOptions,
    ) -> TransformResult<Vec<SeriesStream>> {
        self.check(call, options)?;

        let series = source.series(options)?;
        let mut streams: Vec<SeriesStream> = Vec::with_capacity(series.len());

        for key in series {
            let built = source
                .open(&key, options)
                .and_then(|input| self.build(call, options, input));
            match built {
                Ok(stream) => streams.push(SeriesStream { series: key, stream }),
                Err(e) => {
                    for opened in &mut streams {
                        opened.stream.close();
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(call = %call, series = streams.len(), "Executed call");
        Ok(streams)
    }

    /// Build a single stream yielding every series in turn
    pub fn execute_merged<S: SampleSource + ?Sized>(
        &self,
        source: &S,
        call: Call,
        options: &StreamOptions,
    ) -> TransformResult<AnyStream> {
        let kind = self.check(call, options)?;
        let streams = self
            .execute(source, call, options)?
            .into_iter()
            .map(|s| s.stream);

        Ok(match kind {
            ValueKind::Float => chain(streams.filter_map(AnyStream::into_float).collect()),
            ValueKind::Integer => chain(streams.filter_map(AnyStream::into_integer).collect()),
            ValueKind::String => chain(streams.filter_map(AnyStream::into_string).collect()),
            ValueKind::Boolean => chain(streams.filter_map(AnyStream::into_boolean).collect()),
        })
    }

    fn numeric<V: Numeric>(
        &self,
        call: Call,
        input: BoxStream<V>,
        options: &StreamOptions,
    ) -> AnyStream {
        match call {
            Call::Derivative { unit } => pairwise(
                input,
                Derivative {
                    unit,
                    non_negative: false,
                },
                options,
            ),
            Call::NonNegativeDerivative { unit } => pairwise(
                input,
                Derivative {
                    unit,
                    non_negative: true,
                },
                options,
            ),
            Call::Difference => pairwise(input, Difference { non_negative: false }, options),
            Call::NonNegativeDifference => {
                pairwise(input, Difference { non_negative: true }, options)
            }
            Call::Elapsed { unit } => elapsed(input, unit, options),
            Call::Integral { unit } => {
                AnyStream::Float(Box::new(IntegralStream::new(input, unit, options)))
            }
            Call::MovingAverage { n } => {
                AnyStream::Float(Box::new(MovingAverageStream::new(input, n, options)))
            }
            Call::CumulativeSum => V::wrap(Box::new(CumulativeSumStream::new(input, options))),
            Call::HoltWinters { h, m } => self.holt_winters(input, h, m, false, options),
            Call::HoltWintersWithFit { h, m } => self.holt_winters(input, h, m, true, options),
        }
    }

    fn holt_winters<V: Numeric>(
        &self,
        input: BoxStream<V>,
        h: usize,
        m: usize,
        include_fit: bool,
        options: &StreamOptions,
    ) -> AnyStream {
        let params = HoltWintersParams {
            h,
            m,
            interval: options.interval.duration,
            include_fit,
        };
        AnyStream::Float(Box::new(HoltWintersStream::new(
            input,
            params,
            self.optimizer,
            options,
        )))
    }
}

fn pairwise<V, O>(input: BoxStream<V>, op: O, options: &StreamOptions) -> AnyStream
where
    V: Value,
    O: PairOp<V> + 'static,
{
    <O::Output as Value>::wrap(Box::new(PairwiseStream::new(input, op, options)))
}

fn elapsed<V: Value>(input: BoxStream<V>, unit: i64, options: &StreamOptions) -> AnyStream {
    pairwise(input, Elapsed { unit }, options)
}

fn chain<V: Value>(streams: Vec<BoxStream<V>>) -> AnyStream {
    V::wrap(Box::new(ChainStream::new(streams)))
}
