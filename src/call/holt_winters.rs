//! holt_winters(h, m) and holt_winters_with_fit(h, m)
//!
//! Two phases per series:
//!
//! 1. **Accumulate**: buffer every sample of the series.
//! 2. **Fit and forecast**: a pure function over the buffered points fits a
//!    damped Holt-Winters model by minimising the one-step-ahead SSE with
//!    Nelder-Mead from each point of a fixed starting grid, then forecasts
//!    `h` points spaced at the grouping interval after the last sample.
//!
//! The model is seasonal when `m >= 2`. Points are rounded to the interval;
//! a point landing in an already filled slot is dropped, and empty slots
//! are NaN and skipped in the SSE.

use super::neldermead::Optimizer;
use crate::error::{TransformError, TransformResult};
use crate::sample::{Direction, Numeric, Sample, SeriesKey, StreamOptions};
use crate::stream::{BoxStream, SampleStream, Upstream};
use std::collections::VecDeque;
use std::marker::PhantomData;

const CALL: &str = "holt_winters";

/// Starting grid for alpha, beta, gamma and phi: 0.3 and 0.7
const GRID_START: f64 = 0.3;
const GRID_STEP: f64 = 0.4;

/// Layout of the parameter vector: alpha, beta, gamma, phi, l0, b0, seasons...
const ALPHA: usize = 0;
const BETA: usize = 1;
const GAMMA: usize = 2;
const PHI: usize = 3;
const LEVEL: usize = 4;
const TREND: usize = 5;
const SEASONS: usize = 6;

/// Arguments of one Holt-Winters call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoltWintersParams {
    /// Number of points to forecast
    pub h: usize,
    /// Season length; seasonal when at least 2
    pub m: usize,
    /// Spacing of the input and forecast points, in nanoseconds
    pub interval: i64,
    /// Also emit the fitted values for the historical points
    pub include_fit: bool,
}

impl HoltWintersParams {
    pub fn is_seasonal(&self) -> bool {
        self.m >= 2
    }

    /// Round to the nearest interval multiple, half-interval rounding down
    fn round_time(&self, time: i64) -> TransformResult<i64> {
        let slot = time / self.interval;
        let slot = if time % self.interval > self.interval / 2 {
            slot.checked_add(1)
        } else {
            Some(slot)
        };
        slot.and_then(|s| s.checked_mul(self.interval)).ok_or_else(|| {
            TransformError::InvalidTimeRange(format!(
                "timestamp {} cannot be rounded to a {}ns interval",
                time, self.interval
            ))
        })
    }

    /// `base + interval * steps`, or None past the representable range
    fn step(&self, base: i64, steps: usize) -> Option<i64> {
        i64::try_from(steps)
            .ok()
            .and_then(|n| self.interval.checked_mul(n))
            .and_then(|d| base.checked_add(d))
    }
}

/// Fit a model to `points` (ascending by time) and forecast
///
/// Returns `(time, value)` pairs in ascending time order. NaN forecasts are
/// skipped.
pub fn forecast(
    points: &[(i64, f64)],
    params: &HoltWintersParams,
    optimizer: &Optimizer,
) -> TransformResult<Vec<(i64, f64)>> {
    if params.h == 0 {
        return Ok(Vec::new());
    }
    if params.interval <= 0 {
        return Err(TransformError::invalid_argument(
            CALL,
            "a grouping interval is required",
        ));
    }

    let (first, last) = match points {
        [first, .., last] => (*first, *last),
        _ => {
            return Err(TransformError::insufficient_data(
                CALL,
                format!("need at least 2 points, got {}", points.len()),
            ))
        }
    };
    if params.is_seasonal() && points.len() < params.m {
        return Err(TransformError::insufficient_data(
            CALL,
            format!("need at least {} points for one season, got {}", params.m, points.len()),
        ));
    }

    let start = params.round_time(first.0)?;
    let stop = params.round_time(last.0)?;
    if stop <= start {
        return Err(TransformError::insufficient_data(
            CALL,
            "all points fall within a single interval",
        ));
    }

    let y = fill_slots(points, start, params)?;
    if params.is_seasonal() && y.len() < params.m {
        return Err(TransformError::insufficient_data(
            CALL,
            format!("need at least {} intervals for one season, got {}", params.m, y.len()),
        ));
    }

    let model = Model {
        y: &y,
        seasonal: params.is_seasonal(),
    };
    let mut best = model.fit(params.m, optimizer);
    let forecasted = model.forecast(params.h, &mut best);

    let output = if params.include_fit {
        forecasted
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .filter_map(|(i, v)| params.step(first.0, i).map(|t| (t, *v)))
            .collect()
    } else {
        forecasted[y.len()..]
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .filter_map(|(i, v)| params.step(last.0, i + 1).map(|t| (t, *v)))
            .collect()
    };
    Ok(output)
}

/// One value per interval slot from `start`, NaN where no point landed
fn fill_slots(
    points: &[(i64, f64)],
    start: i64,
    params: &HoltWintersParams,
) -> TransformResult<Vec<f64>> {
    let mut y = vec![points[0].1];
    let mut t = start;

    for &(time, value) in &points[1..] {
        let rounded = params.round_time(time)?;
        if rounded <= t {
            continue;
        }
        // Both are interval multiples, so t never steps past rounded
        t += params.interval;
        while t < rounded {
            y.push(f64::NAN);
            t += params.interval;
        }
        y.push(value);
    }
    Ok(y)
}

struct Model<'a> {
    y: &'a [f64],
    seasonal: bool,
}

impl Model<'_> {
    /// Best parameter vector over the starting grid
    fn fit(&self, m: usize, optimizer: &Optimizer) -> Vec<f64> {
        let y = self.y;

        let mut level = 0.0;
        if self.seasonal {
            for v in y.iter().take(m).filter(|v| !v.is_nan()) {
                level += (1.0 / m as f64) * v;
            }
        } else {
            level += 0.5 * y[0];
        }

        let mut trend = 0.0;
        if self.seasonal {
            let mf = m as f64;
            for i in 0..m {
                if m + i >= y.len() {
                    break;
                }
                if !y[i].is_nan() && !y[m + i].is_nan() {
                    trend += 1.0 / (mf * mf) * (y[m + i] - y[i]);
                }
            }
        } else if !y[1].is_nan() {
            trend = 0.5 * (y[1] - y[0]);
        }

        let seasons: Vec<f64> = if self.seasonal {
            y.iter()
                .take(m)
                .map(|v| if v.is_nan() { 0.0 } else { v / level })
                .collect()
        } else {
            Vec::new()
        };

        let mut params = vec![0.0; SEASONS + seasons.len()];
        params[LEVEL] = level;
        params[TREND] = trend;
        params[SEASONS..].copy_from_slice(&seasons);

        let mut min_sse = f64::INFINITY;
        let mut best: Option<Vec<f64>> = None;

        let mut alpha = GRID_START;
        while alpha < 1.0 {
            let mut beta = GRID_START;
            while beta < 1.0 {
                let mut gamma = GRID_START;
                while gamma < 1.0 {
                    let mut phi = GRID_START;
                    while phi < 1.0 {
                        params[ALPHA] = alpha;
                        params[BETA] = beta;
                        params[GAMMA] = gamma;
                        params[PHI] = phi;

                        let (sse, candidate) = optimizer.minimize(|p| self.sse(p), &params);
                        if sse < min_sse || best.is_none() {
                            min_sse = sse;
                            best = Some(candidate);
                        }
                        phi += GRID_STEP;
                    }
                    gamma += GRID_STEP;
                }
                beta += GRID_STEP;
            }
            alpha += GRID_STEP;
        }

        best.unwrap_or(params)
    }

    /// Sum of squared one-step errors over the observed slots
    fn sse(&self, params: &mut [f64]) -> f64 {
        let forecasted = self.forecast(0, params);
        let mut sse = 0.0;
        for (y, f) in self.y.iter().zip(&forecasted) {
            if y.is_nan() {
                continue;
            }
            if f.is_nan() {
                return f64::INFINITY;
            }
            let diff = f - y;
            sse += diff * diff;
        }
        sse
    }

    /// Fitted values for every slot followed by `h` forecasts
    ///
    /// Clamps the smoothing parameters to [0, 1] in place and leaves the
    /// final seasonal ring in `params`.
    fn forecast(&self, h: usize, params: &mut [f64]) -> Vec<f64> {
        for p in &mut params[..SEASONS - 2] {
            *p = p.clamp(0.0, 1.0);
        }

        let (alpha, beta, gamma, phi) = (params[ALPHA], params[BETA], params[GAMMA], params[PHI]);
        let mut y_t = self.y[0];
        let mut phi_h = phi;
        let mut level = params[LEVEL];
        let mut trend = params[TREND];

        let (m, mut offset) = if self.seasonal {
            let m = params.len() - SEASONS;
            (m, m - 1)
        } else {
            (0, 0)
        };

        let len = self.y.len() + h;
        let mut forecasted = vec![0.0; len];
        forecasted[0] = y_t;

        let (mut s_tm, mut s_tmh) = (1.0, 1.0);
        for t in 1..len {
            if self.seasonal {
                let hm = t % m;
                s_tm = params[SEASONS + (t + offset - m) % m];
                s_tmh = params[SEASONS + (t + hm + offset - m) % m];
            }

            let base = level + phi * trend;
            let next_level = alpha * (y_t / s_tm) + (1.0 - alpha) * base;
            let next_trend = beta * (next_level - level) + (1.0 - beta) * phi * trend;
            let season = gamma * (y_t / base) + (1.0 - gamma) * s_tm;
            y_t = (next_level + phi_h * next_trend) * s_tmh;
            level = next_level;
            trend = next_trend;

            phi_h += phi.powf(t as f64);
            if self.seasonal {
                params[SEASONS + (t + offset) % m] = season;
                offset += 1;
            }
            forecasted[t] = y_t;
        }
        forecasted
    }
}

/// Buffers each series, then emits its forecast
pub struct HoltWintersStream<V> {
    input: Upstream<V>,
    params: HoltWintersParams,
    optimizer: Optimizer,
    direction: Direction,
    series: Option<SeriesKey>,
    points: Vec<(i64, f64)>,
    pending: VecDeque<Sample<f64>>,
    _kind: PhantomData<fn() -> V>,
}

impl<V: Numeric> HoltWintersStream<V> {
    pub fn new(
        input: BoxStream<V>,
        params: HoltWintersParams,
        optimizer: Optimizer,
        options: &StreamOptions,
    ) -> Self {
        Self {
            input: Upstream::new(input),
            params,
            optimizer,
            direction: options.direction,
            series: None,
            points: Vec::new(),
            pending: VecDeque::new(),
            _kind: PhantomData,
        }
    }

    fn call_name(&self) -> &'static str {
        if self.params.include_fit {
            "holt_winters_with_fit"
        } else {
            CALL
        }
    }

    fn discard(&mut self) {
        self.series = None;
        self.points.clear();
        self.pending.clear();
    }

    /// Fit one buffered series and queue its output
    fn flush(&mut self, series: SeriesKey, mut points: Vec<(i64, f64)>) -> TransformResult<()> {
        points.sort_by_key(|p| p.0);

        match forecast(&points, &self.params, &self.optimizer) {
            Ok(output) => {
                tracing::trace!(
                    call = self.call_name(),
                    series = %series,
                    input = points.len(),
                    output = output.len(),
                    "Holt-Winters fit complete"
                );
                let samples = output.into_iter().map(|(time, value)| {
                    Sample::new(series.name.clone(), time, value).with_tags(series.tags.clone())
                });
                if self.direction.is_ascending() {
                    self.pending.extend(samples);
                } else {
                    self.pending.extend(samples.rev());
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    call = self.call_name(),
                    series = %series,
                    error = %e,
                    "Holt-Winters fit failed"
                );
                self.input.close();
                self.discard();
                Err(e)
            }
        }
    }
}

impl<V: Numeric> SampleStream<f64> for HoltWintersStream<V> {
    fn next_sample(&mut self) -> TransformResult<Option<Sample<f64>>> {
        loop {
            if let Some(sample) = self.pending.pop_front() {
                return Ok(Some(sample));
            }

            match self.input.pull() {
                Ok(Some(sample)) => {
                    let point = (sample.time, sample.value.to_f64());
                    if self.series.as_ref().is_some_and(|key| key.matches(&sample)) {
                        self.points.push(point);
                        continue;
                    }

                    let previous = self.series.replace(sample.series_key());
                    let buffered = std::mem::replace(&mut self.points, vec![point]);
                    if let Some(previous) = previous {
                        self.flush(previous, buffered)?;
                    }
                }
                Ok(None) => match self.series.take() {
                    Some(series) => {
                        let buffered = std::mem::take(&mut self.points);
                        self.flush(series, buffered)?;
                    }
                    None => return Ok(None),
                },
                Err(e) => {
                    self.discard();
                    return Err(e);
                }
            }
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.discard();
    }

    fn name(&self) -> &'static str {
        self.call_name()
    }
}
