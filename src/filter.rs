//! Post-processing strategies applied to raw samples before calibration.
//!
//! `PassThrough` hands the first sample straight through and is used while a
//! calibration run is active, because the solver has to see the untouched
//! contact point. `Averaging` oversamples to suppress contact noise and is
//! the normal operating mode.

use heapless::Vec;

use crate::{
    errors::{ConfigError, ProcessError},
    RawPoint, SampleSource,
};

/// Upper bound on the averaging window; sized for the on-stack sample buffer.
pub const MAX_OVERSAMPLE: usize = 16;

/// Oversampling factor used when none is configured. Larger windows trade
/// latency for smoothness.
pub const DEFAULT_OVERSAMPLE: usize = 4;

/// Validated averaging window size, always within `1..=MAX_OVERSAMPLE`.
///
/// The field stays private so every window in circulation went through
/// [`Window::new`]; the sampling loop can rely on the bound without
/// re-checking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window(usize);

impl Window {
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 || window > MAX_OVERSAMPLE {
            return Err(ConfigError::WindowOutOfRange {
                got: window,
                max: MAX_OVERSAMPLE,
            });
        }
        Ok(Self(window))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for Window {
    fn default() -> Self {
        Self(DEFAULT_OVERSAMPLE)
    }
}

/// Strategy turning a stream of raw samples into one representative point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessor {
    /// No filtering: the first sample wins.
    PassThrough,
    /// Mean of exactly `Window` consecutive samples, per axis.
    Averaging(Window),
}

impl Default for PostProcessor {
    fn default() -> Self {
        PostProcessor::Averaging(Window::default())
    }
}

impl PostProcessor {
    /// Averaging strategy with a validated window.
    pub fn averaging(window: usize) -> Result<Self, ConfigError> {
        Ok(PostProcessor::Averaging(Window::new(window)?))
    }

    /// Produces one representative raw point from `source`.
    ///
    /// The sample buffer is reset on every call; an average is only ever
    /// reported once the full window has been collected within this one
    /// acquisition. If the source stops producing valid samples mid-run the
    /// whole acquisition aborts with [`ProcessError::SampleUnavailable`] --
    /// never a stale or partially averaged point.
    pub fn process<S: SampleSource>(
        &self,
        source: &mut S,
    ) -> Result<RawPoint, ProcessError<S::Error>> {
        match self {
            PostProcessor::PassThrough => next_sample(source),
            PostProcessor::Averaging(window) => {
                let window = window.get();
                let mut samples: Vec<RawPoint, MAX_OVERSAMPLE> = Vec::new();
                while samples.len() < window {
                    // Window construction bounds it by the buffer capacity,
                    // so this push cannot drop.
                    let _ = samples.push(next_sample(source)?);
                }

                let mut sum_x = 0u32;
                let mut sum_y = 0u32;
                for sample in &samples {
                    sum_x += u32::from(sample.x);
                    sum_y += u32::from(sample.y);
                }
                let count = samples.len() as u32;
                Ok(RawPoint::new(
                    (sum_x / count) as u16,
                    (sum_y / count) as u16,
                ))
            }
        }
    }
}

fn next_sample<S: SampleSource>(source: &mut S) -> Result<RawPoint, ProcessError<S::Error>> {
    match source.try_sample() {
        Ok(Some(sample)) => Ok(sample),
        Ok(None) => Err(ProcessError::SampleUnavailable),
        Err(e) => Err(ProcessError::Sampler(e)),
    }
}
