//! Value kinds
//!
//! A stream carries exactly one value kind. Arithmetic calls are generic over
//! [`Numeric`] and monomorphised for `f64` and `i64`; calls that accept any
//! kind (elapsed) are generic over [`Value`].

use super::types::Sample;
use crate::stream::{AnySample, AnyStream, BoxStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four value kinds a sample can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Float,
    Integer,
    String,
    Boolean,
}

impl ValueKind {
    /// Get all kinds for iteration
    pub fn all() -> &'static [ValueKind] {
        &[
            ValueKind::Float,
            ValueKind::Integer,
            ValueKind::String,
            ValueKind::Boolean,
        ]
    }

    /// Whether arithmetic calls accept this kind
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Float | ValueKind::Integer)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Float => write!(f, "float"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Boolean => write!(f, "boolean"),
        }
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "float" | "f" => Ok(ValueKind::Float),
            "integer" | "int" | "i" => Ok(ValueKind::Integer),
            "string" | "str" => Ok(ValueKind::String),
            "boolean" | "bool" => Ok(ValueKind::Boolean),
            other => Err(format!("unknown value kind: {}", other)),
        }
    }
}

/// A type that can be the primary value of a sample
pub trait Value: Clone + fmt::Debug + Send + 'static {
    /// Kind tag for this value type
    const KIND: ValueKind;

    /// Erase a typed stream into the kind-tagged enum
    fn wrap(stream: BoxStream<Self>) -> AnyStream;

    /// Erase a typed sample into the kind-tagged enum
    fn wrap_sample(sample: Sample<Self>) -> AnySample;

    /// Borrow the typed sample back out, if the kind matches
    fn unwrap_sample(sample: &AnySample) -> Option<&Sample<Self>>;
}

impl Value for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn wrap(stream: BoxStream<Self>) -> AnyStream {
        AnyStream::Float(stream)
    }

    fn wrap_sample(sample: Sample<Self>) -> AnySample {
        AnySample::Float(sample)
    }

    fn unwrap_sample(sample: &AnySample) -> Option<&Sample<Self>> {
        match sample {
            AnySample::Float(s) => Some(s),
            _ => None,
        }
    }
}

impl Value for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn wrap(stream: BoxStream<Self>) -> AnyStream {
        AnyStream::Integer(stream)
    }

    fn wrap_sample(sample: Sample<Self>) -> AnySample {
        AnySample::Integer(sample)
    }

    fn unwrap_sample(sample: &AnySample) -> Option<&Sample<Self>> {
        match sample {
            AnySample::Integer(s) => Some(s),
            _ => None,
        }
    }
}

impl Value for String {
    const KIND: ValueKind = ValueKind::String;

    fn wrap(stream: BoxStream<Self>) -> AnyStream {
        AnyStream::String(stream)
    }

    fn wrap_sample(sample: Sample<Self>) -> AnySample {
        AnySample::String(sample)
    }

    fn unwrap_sample(sample: &AnySample) -> Option<&Sample<Self>> {
        match sample {
            AnySample::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Value for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn wrap(stream: BoxStream<Self>) -> AnyStream {
        AnyStream::Boolean(stream)
    }

    fn wrap_sample(sample: Sample<Self>) -> AnySample {
        AnySample::Boolean(sample)
    }

    fn unwrap_sample(sample: &AnySample) -> Option<&Sample<Self>> {
        match sample {
            AnySample::Boolean(s) => Some(s),
            _ => None,
        }
    }
}

/// Value types that support the arithmetic of the numeric calls
///
/// Integer arithmetic wraps on overflow, like a 64-bit hardware counter.
pub trait Numeric: Value + Copy + PartialOrd {
    /// Additive identity
    fn zero() -> Self;

    /// Promote to floating point
    fn to_f64(self) -> f64;

    /// `self - earlier`
    fn delta(self, earlier: Self) -> Self;

    /// `self + other`
    fn accumulate(self, other: Self) -> Self;

    /// Whether the value is strictly below zero
    fn is_negative(self) -> bool {
        self < Self::zero()
    }
}

impl Numeric for f64 {
    fn zero() -> Self {
        0.0
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn delta(self, earlier: Self) -> Self {
        self - earlier
    }

    fn accumulate(self, other: Self) -> Self {
        self + other
    }
}

impl Numeric for i64 {
    fn zero() -> Self {
        0
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn delta(self, earlier: Self) -> Self {
        self.wrapping_sub(earlier)
    }

    fn accumulate(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
}

/// A secondary value carried alongside the primary one for projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AuxValue {
    Float(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
    Null,
}
