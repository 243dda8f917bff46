//! The touch panel pipeline: the interrupt-side event flag, the owned
//! acquisition state (sampler, calibration, post-processor) and the bounded
//! pen-release wait.

pub mod ads7843;

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_graphics::geometry::Point;
use embedded_hal::{delay::DelayNs, digital::InputPin};
use log::{debug, info};

use crate::{
    calibration::CalibrationModel, errors::TouchError, filter::PostProcessor, RawPoint,
    SampleSource,
};

/// Pen-down event flag shared between the edge interrupt and the dispatch
/// loop.
///
/// Single producer, single consumer: the interrupt handler only ever calls
/// [`notify`](Self::notify) (one atomic store, no blocking, no allocation),
/// the consumer loop owns [`is_pending`](Self::is_pending) and
/// [`clear`](Self::clear). The consumer clears only after the current touch
/// gesture has fully drained, i.e. after the electrical pen-down line reads
/// released.
#[derive(Debug)]
pub struct TouchSignal {
    pending: AtomicBool,
}

impl TouchSignal {
    /// `const` so the signal can live in a `static` shared with the ISR.
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Interrupt-side: record that the pen touched down.
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Relaxed);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Relaxed)
    }

    /// Consumer-side: acknowledge the gesture after it has drained.
    pub fn clear(&self) {
        self.pending.store(false, Ordering::Relaxed);
    }
}

impl Default for TouchSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing knobs for the acquisition pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Poll period of the pen-release wait loop.
    pub release_poll_ms: u32,
    /// Upper bound on the pen-release wait. The reference hardware spun
    /// without bound; a stuck line now reports `ReleaseTimeout` instead.
    pub release_timeout_ms: u32,
    /// Settle time after the pen lifts before the next target is armed.
    pub post_release_debounce_ms: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            release_poll_ms: 1,
            release_timeout_ms: 10_000,
            post_release_debounce_ms: 200,
        }
    }
}

/// A resistive touch panel: raw sampler plus the currently active
/// calibration model and post-processing strategy.
///
/// Everything here is owned, fixed-size state; nothing on the sampling path
/// allocates. Calibration replacement is the one mutation and swaps a whole
/// model value at once.
pub struct TouchPanel<S, PEN> {
    sampler: S,
    pen: PEN,
    calibration: CalibrationModel,
    post_processor: PostProcessor,
    config: PanelConfig,
}

impl<S, PEN> TouchPanel<S, PEN>
where
    S: SampleSource,
    PEN: InputPin,
{
    pub fn new(sampler: S, pen: PEN, calibration: CalibrationModel) -> Self {
        Self::with_config(sampler, pen, calibration, PanelConfig::default())
    }

    pub fn with_config(
        sampler: S,
        pen: PEN,
        calibration: CalibrationModel,
        config: PanelConfig,
    ) -> Self {
        Self {
            sampler,
            pen,
            calibration,
            post_processor: PostProcessor::default(),
            config,
        }
    }

    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    /// Replaces the active calibration wholesale. Callers only do this with
    /// a model that came out of a successful solve (or a validated persisted
    /// image), so the panel can never be left half-calibrated.
    pub fn set_calibration(&mut self, calibration: CalibrationModel) {
        info!("calibration replaced: {:?}", calibration);
        self.calibration = calibration;
    }

    pub fn post_processor(&self) -> PostProcessor {
        self.post_processor
    }

    /// Switches between accurate (averaged) and raw sampling modes.
    pub fn set_post_processor(&mut self, post_processor: PostProcessor) {
        debug!("post-processor switched: {:?}", post_processor);
        self.post_processor = post_processor;
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// One raw, unfiltered, uncalibrated sample. This is what the
    /// calibrator uses: averaging at first contact would bias against the
    /// true point under the stylus.
    pub fn raw_point(&mut self) -> Result<RawPoint, TouchError<S::Error, PEN::Error>> {
        PostProcessor::PassThrough
            .process(&mut self.sampler)
            .map_err(TouchError::from)
    }

    /// One calibrated screen coordinate via the active post-processor.
    pub fn get_point(&mut self) -> Result<Point, TouchError<S::Error, PEN::Error>> {
        let raw = self.post_processor.process(&mut self.sampler)?;
        Ok(self.calibration.to_screen(raw))
    }

    /// Whether the electrical pen-down line currently reads asserted
    /// (active low).
    pub fn pen_is_down(&mut self) -> Result<bool, TouchError<S::Error, PEN::Error>> {
        self.pen.is_low().map_err(TouchError::Pen)
    }

    /// Polls the pen line until it reads released, bounded by the configured
    /// timeout.
    pub fn wait_for_release<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), TouchError<S::Error, PEN::Error>> {
        let poll_ms = self.config.release_poll_ms.max(1);
        let mut waited_ms = 0u32;
        while self.pen_is_down()? {
            if waited_ms >= self.config.release_timeout_ms {
                return Err(TouchError::ReleaseTimeout(waited_ms));
            }
            delay.delay_ms(poll_ms);
            waited_ms = waited_ms.saturating_add(poll_ms);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationTargets, ThreePointCalibration};
    use crate::testutil::{CountingDelay, ScriptedPen, ScriptedSampler};

    const STEADY: &[Option<RawPoint>] = &[
        Some(RawPoint::new(1000, 2000)),
        Some(RawPoint::new(1004, 2004)),
        Some(RawPoint::new(996, 1996)),
        Some(RawPoint::new(1000, 2000)),
    ];

    fn panel_with(
        script: &'static [Option<RawPoint>],
        pen: &'static [bool],
        calibration: CalibrationModel,
    ) -> TouchPanel<ScriptedSampler, ScriptedPen> {
        TouchPanel::new(ScriptedSampler::new(script), ScriptedPen::new(pen), calibration)
    }

    #[test]
    fn signal_is_set_by_producer_and_cleared_by_consumer() {
        let signal = TouchSignal::new();
        assert!(!signal.is_pending());

        signal.notify();
        assert!(signal.is_pending());
        // A second edge before the consumer runs is indistinguishable; the
        // flag stays set.
        signal.notify();
        assert!(signal.is_pending());

        signal.clear();
        assert!(!signal.is_pending());
    }

    #[test]
    fn get_point_averages_then_calibrates() {
        let targets = CalibrationTargets {
            a: Point::new(20, 20),
            b: Point::new(380, 20),
            c: Point::new(200, 220),
        };
        let samples = [
            RawPoint::new(100, 3800),
            RawPoint::new(3900, 3800),
            RawPoint::new(2000, 200),
        ];
        let model = CalibrationModel::ThreePoint(
            ThreePointCalibration::solve(&targets, &samples).unwrap(),
        );

        // Four samples jittering around the first calibration tap.
        const JITTER: &[Option<RawPoint>] = &[
            Some(RawPoint::new(100, 3800)),
            Some(RawPoint::new(104, 3804)),
            Some(RawPoint::new(96, 3796)),
            Some(RawPoint::new(100, 3800)),
        ];
        let mut panel = panel_with(JITTER, &[true], model);
        panel.set_post_processor(PostProcessor::averaging(4).unwrap());

        let point = panel.get_point().unwrap();
        let expected = targets.a;
        assert!((point.x - expected.x).abs() <= 1 && (point.y - expected.y).abs() <= 1);
    }

    #[test]
    fn raw_point_bypasses_averaging_and_calibration() {
        let model = CalibrationModel::from_bytes(&CalibrationModel::PassThrough.to_bytes()).unwrap();
        let mut panel = panel_with(STEADY, &[true], model);
        panel.set_post_processor(PostProcessor::averaging(4).unwrap());

        let raw = panel.raw_point().unwrap();
        assert_eq!(raw, RawPoint::new(1000, 2000));
    }

    #[test]
    fn pen_lift_mid_acquisition_is_reported_not_fabricated() {
        const LIFTED: &[Option<RawPoint>] =
            &[Some(RawPoint::new(1000, 2000)), None, None];
        let mut panel = panel_with(LIFTED, &[true], CalibrationModel::PassThrough);
        panel.set_post_processor(PostProcessor::averaging(4).unwrap());

        assert!(matches!(
            panel.get_point(),
            Err(TouchError::SampleUnavailable)
        ));
    }

    #[test]
    fn wait_for_release_returns_once_line_deasserts() {
        let mut panel = panel_with(STEADY, &[true, true, true, false], CalibrationModel::PassThrough);
        let mut delay = CountingDelay::default();
        panel.wait_for_release(&mut delay).unwrap();
        assert!(delay.total_ns > 0);
    }

    #[test]
    fn wait_for_release_times_out_on_stuck_line() {
        let mut panel = TouchPanel::with_config(
            ScriptedSampler::new(STEADY),
            ScriptedPen::new(&[true]),
            CalibrationModel::PassThrough,
            PanelConfig {
                release_poll_ms: 1,
                release_timeout_ms: 5,
                post_release_debounce_ms: 0,
            },
        );
        let mut delay = CountingDelay::default();
        assert!(matches!(
            panel.wait_for_release(&mut delay),
            Err(TouchError::ReleaseTimeout(_))
        ));
    }
}
