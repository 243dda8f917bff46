//! Shared test doubles: a scripted sampler, a scripted pen line and a no-op
//! delay, so pipeline tests run deterministically on the host.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin};

use crate::{RawPoint, SampleSource};

/// Deterministic sampler feeding a fixed script, repeating the final entry
/// once exhausted.
pub(crate) struct ScriptedSampler {
    script: &'static [Option<RawPoint>],
    cursor: usize,
    pub(crate) draws: usize,
}

impl ScriptedSampler {
    pub(crate) fn new(script: &'static [Option<RawPoint>]) -> Self {
        assert!(!script.is_empty());
        Self {
            script,
            cursor: 0,
            draws: 0,
        }
    }
}

impl SampleSource for ScriptedSampler {
    type Error = Infallible;

    fn try_sample(&mut self) -> Result<Option<RawPoint>, Infallible> {
        self.draws += 1;
        let index = self.cursor.min(self.script.len() - 1);
        self.cursor += 1;
        Ok(self.script[index])
    }
}

/// Pen-down line replaying a script of levels (`true` = asserted/low),
/// repeating the final entry once exhausted.
pub(crate) struct ScriptedPen {
    script: &'static [bool],
    cursor: usize,
}

impl ScriptedPen {
    pub(crate) fn new(script: &'static [bool]) -> Self {
        assert!(!script.is_empty());
        Self { script, cursor: 0 }
    }

    fn next_level(&mut self) -> bool {
        let index = self.cursor.min(self.script.len() - 1);
        self.cursor += 1;
        self.script[index]
    }
}

impl PinErrorType for ScriptedPen {
    type Error = Infallible;
}

impl InputPin for ScriptedPen {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.next_level())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.next_level())
    }
}

/// Delay provider that only counts; tests never sleep.
#[derive(Default)]
pub(crate) struct CountingDelay {
    pub(crate) total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
