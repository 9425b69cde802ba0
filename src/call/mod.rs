//! Call Transforms
//!
//! Stateful stream operators selected by call name:
//!
//! - **pairwise**: derivative, difference, elapsed and their non-negative forms
//! - **moving_average**: mean of the last n samples
//! - **cumulative_sum**: running total
//! - **integral**: trapezoidal area per window
//! - **holt_winters**: seasonal forecasting, fitted with **neldermead**
//!
//! Every transform resets its state when the window or the series changes.

pub mod cumulative_sum;
pub mod holt_winters;
pub mod integral;
pub mod moving_average;
pub mod neldermead;
pub mod pairwise;

pub use cumulative_sum::CumulativeSumStream;
pub use holt_winters::{forecast, HoltWintersParams, HoltWintersStream};
pub use integral::IntegralStream;
pub use moving_average::MovingAverageStream;
pub use neldermead::Optimizer;
pub use pairwise::{Derivative, Difference, Elapsed, PairOp, PairwiseStream};

use crate::error::{TransformError, TransformResult};
use crate::sample::{format_duration, parse_duration, ValueKind, NANOSECOND, SECOND};
use std::fmt;

/// A literal call argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallArg {
    /// Duration literal, in nanoseconds
    Duration(i64),
    Integer(i64),
}

impl CallArg {
    /// Parse a textual argument: a duration literal, else an integer
    pub fn parse(text: &str) -> TransformResult<Self> {
        let text = text.trim();
        if let Ok(n) = text.parse::<i64>() {
            return Ok(CallArg::Integer(n));
        }
        parse_duration(text).map(CallArg::Duration)
    }

    fn describe(&self) -> String {
        match self {
            CallArg::Duration(d) => format!("duration {}", format_duration(*d)),
            CallArg::Integer(n) => format!("integer {}", n),
        }
    }
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallArg::Duration(d) => write!(f, "{}", format_duration(*d)),
            CallArg::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// A resolved call with validated arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Derivative { unit: i64 },
    NonNegativeDerivative { unit: i64 },
    Difference,
    NonNegativeDifference,
    Elapsed { unit: i64 },
    Integral { unit: i64 },
    MovingAverage { n: usize },
    CumulativeSum,
    HoltWinters { h: usize, m: usize },
    HoltWintersWithFit { h: usize, m: usize },
}

impl Call {
    /// Resolve a call from its name and literal arguments, with a 1s
    /// default unit for derivative and integral
    pub fn parse(name: &str, args: &[CallArg]) -> TransformResult<Self> {
        Self::parse_with_default_unit(name, args, SECOND)
    }

    /// Resolve a call, using `default_unit` when derivative or integral
    /// omit their unit
    pub fn parse_with_default_unit(
        name: &str,
        args: &[CallArg],
        default_unit: i64,
    ) -> TransformResult<Self> {
        let call = match name {
            "derivative" => Call::Derivative {
                unit: unit_arg(name, args, default_unit)?,
            },
            "non_negative_derivative" => Call::NonNegativeDerivative {
                unit: unit_arg(name, args, default_unit)?,
            },
            "difference" => {
                no_args(name, args)?;
                Call::Difference
            }
            "non_negative_difference" => {
                no_args(name, args)?;
                Call::NonNegativeDifference
            }
            "elapsed" => Call::Elapsed {
                unit: unit_arg(name, args, NANOSECOND)?,
            },
            "integral" => Call::Integral {
                unit: unit_arg(name, args, default_unit)?,
            },
            "moving_average" => match args {
                [arg] => {
                    let n = count_arg(name, "window size", arg)?;
                    if n < 1 {
                        return Err(TransformError::invalid_argument(
                            name,
                            "window size must be at least 1",
                        ));
                    }
                    Call::MovingAverage { n }
                }
                _ => return Err(arity(name, "1", args.len())),
            },
            "cumulative_sum" => {
                no_args(name, args)?;
                Call::CumulativeSum
            }
            "holt_winters" | "holt_winters_with_fit" => match args {
                [h, m] => {
                    let h = count_arg(name, "forecast count", h)?;
                    let m = count_arg(name, "season length", m)?;
                    if name == "holt_winters" {
                        Call::HoltWinters { h, m }
                    } else {
                        Call::HoltWintersWithFit { h, m }
                    }
                }
                _ => return Err(arity(name, "2", args.len())),
            },
            _ => return Err(TransformError::UnknownCall(name.to_string())),
        };
        Ok(call)
    }

    /// Call name as written in a query
    pub fn name(&self) -> &'static str {
        match self {
            Call::Derivative { .. } => "derivative",
            Call::NonNegativeDerivative { .. } => "non_negative_derivative",
            Call::Difference => "difference",
            Call::NonNegativeDifference => "non_negative_difference",
            Call::Elapsed { .. } => "elapsed",
            Call::Integral { .. } => "integral",
            Call::MovingAverage { .. } => "moving_average",
            Call::CumulativeSum => "cumulative_sum",
            Call::HoltWinters { .. } => "holt_winters",
            Call::HoltWintersWithFit { .. } => "holt_winters_with_fit",
        }
    }

    /// Kind of the output stream for an input of `input` kind
    pub fn output_kind(&self, input: ValueKind) -> TransformResult<ValueKind> {
        match self {
            Call::Elapsed { .. } => Ok(ValueKind::Integer),
            _ if !input.is_numeric() => Err(TransformError::UnsupportedKind {
                call: self.name().to_string(),
                kind: input,
            }),
            Call::Difference | Call::NonNegativeDifference | Call::CumulativeSum => Ok(input),
            _ => Ok(ValueKind::Float),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Derivative { unit }
            | Call::NonNegativeDerivative { unit }
            | Call::Elapsed { unit }
            | Call::Integral { unit } => write!(f, "{}({})", self.name(), format_duration(*unit)),
            Call::MovingAverage { n } => write!(f, "{}({})", self.name(), n),
            Call::HoltWinters { h, m } | Call::HoltWintersWithFit { h, m } => {
                write!(f, "{}({}, {})", self.name(), h, m)
            }
            _ => write!(f, "{}()", self.name()),
        }
    }
}

fn arity(call: &str, expected: &str, got: usize) -> TransformError {
    TransformError::invalid_argument(
        call,
        format!("expected {} argument(s), got {}", expected, got),
    )
}

fn no_args(call: &str, args: &[CallArg]) -> TransformResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(arity(call, "0", args.len()))
    }
}

fn unit_arg(call: &str, args: &[CallArg], default: i64) -> TransformResult<i64> {
    let unit = match args {
        [] => default,
        [CallArg::Duration(unit)] => *unit,
        [other] => {
            return Err(TransformError::invalid_argument(
                call,
                format!("unit must be a duration, got {}", other.describe()),
            ))
        }
        _ => return Err(arity(call, "0 or 1", args.len())),
    };

    if unit <= 0 {
        return Err(TransformError::invalid_argument(
            call,
            "unit must be greater than zero",
        ));
    }
    Ok(unit)
}

fn count_arg(call: &str, what: &str, arg: &CallArg) -> TransformResult<usize> {
    match arg {
        CallArg::Integer(n) if *n >= 0 => usize::try_from(*n)
            .map_err(|_| TransformError::invalid_argument(call, format!("{} is too large", what))),
        CallArg::Integer(n) => Err(TransformError::invalid_argument(
            call,
            format!("{} must not be negative, got {}", what, n),
        )),
        other => Err(TransformError::invalid_argument(
            call,
            format!("{} must be an integer, got {}", what, other.describe()),
        )),
    }
}
