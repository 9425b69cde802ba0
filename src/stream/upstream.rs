//! Upstream bookkeeping
//!
//! Every transform owns exactly one input. `Upstream` wraps it so that end of
//! stream, errors and close all leave the input in the same finished state.

use super::{BoxStream, SampleStream};
use crate::error::TransformResult;
use crate::sample::Sample;

/// The single input of a transform
pub struct Upstream<V> {
    input: BoxStream<V>,
    exhausted: bool,
    closed: bool,
}

impl<V> Upstream<V> {
    pub fn new(input: BoxStream<V>) -> Self {
        Self {
            input,
            exhausted: false,
            closed: false,
        }
    }

    /// Pull the next input sample
    ///
    /// After end of stream or an error the input is closed and every later
    /// pull yields `Ok(None)`.
    pub fn pull(&mut self) -> TransformResult<Option<Sample<V>>> {
        if self.exhausted {
            return Ok(None);
        }

        match self.input.next_sample() {
            Ok(Some(sample)) => Ok(Some(sample)),
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(
                    input = self.input.name(),
                    error = %e,
                    "Upstream failed, aborting pipeline"
                );
                self.close();
                Err(e)
            }
        }
    }

    /// Stop consuming and close the input once
    pub fn close(&mut self) {
        self.exhausted = true;
        if !self.closed {
            self.closed = true;
            self.input.close();
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Name of the wrapped operator
    pub fn name(&self) -> &'static str {
        self.input.name()
    }
}

/// Concatenation of several streams of one kind
///
/// Used to merge per-series pipelines into one output stream.
pub struct ChainStream<V> {
    streams: Vec<Upstream<V>>,
    current: usize,
}

impl<V> ChainStream<V> {
    pub fn new(streams: Vec<BoxStream<V>>) -> Self {
        Self {
            streams: streams.into_iter().map(Upstream::new).collect(),
            current: 0,
        }
    }
}

impl<V: Send> SampleStream<V> for ChainStream<V> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<V>>> {
        while let Some(stream) = self.streams.get_mut(self.current) {
            match stream.pull() {
                Ok(Some(sample)) => return Ok(Some(sample)),
                Ok(None) => self.current += 1,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        for stream in &mut self.streams {
            stream.close();
        }
        self.current = self.streams.len();
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
