//! The interactive three-point calibration sequence.
//!
//! [`CalibrationSession`] is the pure state machine: which target is up,
//! whether it still needs to be drawn, which raw samples have been captured.
//! [`run_calibration`] drives that machine against real peripherals; it never
//! touches the panel's active calibration, so an aborted run leaves the
//! previous mapping in place and the caller decides when to swap in a solved
//! model.

use core::fmt::Debug;

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Point, Size},
    mono_font::{MonoTextStyle, ascii::FONT_6X10},
    pixelcolor::RgbColor,
    primitives::{Line, Primitive, PrimitiveStyle, Rectangle},
    text::{Alignment, Text},
    Drawable,
};
use embedded_hal::{delay::DelayNs, digital::InputPin};
use heapless::Vec;
use log::{info, warn};

use crate::{
    calibration::{CalibrationModel, CalibrationTargets, ThreePointCalibration},
    errors::{CalibrateError, CalibrationError, TouchError},
    panel::{TouchPanel, TouchSignal},
    RawPoint, SampleSource,
};

/// Operator instruction shown for the whole run.
pub const CALIBRATION_PROMPT: &str = "Please tap the stylus on each red point";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// The current target still has to be drawn.
    Prompt,
    /// The target is on screen; waiting for a usable sample.
    AwaitSample,
}

/// Pure calibration-sequence state, independent of any peripheral.
#[derive(Debug)]
pub struct CalibrationSession {
    targets: CalibrationTargets,
    samples: Vec<RawPoint, 3>,
    stage: Stage,
    cancelled: bool,
}

impl CalibrationSession {
    pub fn new(targets: CalibrationTargets) -> Self {
        Self {
            targets,
            samples: Vec::new(),
            stage: Stage::Prompt,
            cancelled: false,
        }
    }

    pub fn targets(&self) -> &CalibrationTargets {
        &self.targets
    }

    /// The screen location the operator should tap next, `None` once all
    /// three samples are in (or the session was cancelled).
    pub fn current_target(&self) -> Option<Point> {
        if self.cancelled {
            return None;
        }
        self.targets.points().get(self.samples.len()).copied()
    }

    pub fn needs_prompt(&self) -> bool {
        self.current_target().is_some() && self.stage == Stage::Prompt
    }

    /// The driver has drawn the current target.
    pub fn prompt_shown(&mut self) {
        self.stage = Stage::AwaitSample;
    }

    /// A raw sample was captured for the current target.
    pub fn record_sample(&mut self, raw: RawPoint) {
        if self.samples.push(raw).is_ok() {
            self.stage = Stage::Prompt;
        }
    }

    /// The touch produced no usable sample (the pen lifted mid-read). The
    /// target is re-armed; the operator just taps again.
    pub fn sample_missed(&mut self) {
        warn!(
            "no usable sample for target {}, waiting for another tap",
            self.samples.len()
        );
        self.stage = Stage::Prompt;
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.samples.len() == 3
    }

    /// Solves the affine transform from the captured samples.
    pub fn solve(&self) -> Result<CalibrationModel, CalibrationError> {
        if self.cancelled || self.samples.len() < 3 {
            return Err(CalibrationError::Cancelled);
        }
        let samples = [self.samples[0], self.samples[1], self.samples[2]];
        ThreePointCalibration::solve(&self.targets, &samples).map(CalibrationModel::ThreePoint)
    }
}

/// Runs the full interactive calibration against the given peripherals.
///
/// The screen shows the prompt plus one target at a time; each tap is
/// sampled raw (no averaging, no calibration) and the pen must lift before
/// the next target is armed. On success the solved model is returned; the
/// panel's own calibration is deliberately left untouched.
pub fn run_calibration<S, PEN, DT, D>(
    panel: &mut TouchPanel<S, PEN>,
    signal: &TouchSignal,
    display: &mut DT,
    delay: &mut D,
) -> Result<CalibrationModel, CalibrateError<S::Error, PEN::Error, DT::Error>>
where
    S: SampleSource,
    PEN: InputPin,
    DT: DrawTarget,
    DT::Color: RgbColor,
    DT::Error: Debug,
    D: DelayNs,
{
    let size = display.bounding_box().size;
    let mut session = CalibrationSession::new(CalibrationTargets::for_panel(size));
    let debounce_ms = panel.config().post_release_debounce_ms;

    draw_backdrop(display, size).map_err(CalibrateError::Draw)?;

    while let Some(target) = session.current_target() {
        if session.needs_prompt() {
            draw_target_marker(display, target).map_err(CalibrateError::Draw)?;
            session.prompt_shown();
        }

        while !(signal.is_pending() || panel.pen_is_down()?) {
            delay.delay_us(500);
        }

        match panel.raw_point() {
            Ok(raw) => {
                session.record_sample(raw);
                panel.wait_for_release(delay)?;
                signal.clear();
                delay.delay_ms(debounce_ms);
                draw_backdrop(display, size).map_err(CalibrateError::Draw)?;
            }
            Err(TouchError::SampleUnavailable) => {
                session.sample_missed();
                signal.clear();
            }
            Err(e) => return Err(e.into()),
        }
    }

    let model = session.solve()?;
    info!("calibration run complete: {:?}", model);
    Ok(model)
}

fn draw_backdrop<DT>(display: &mut DT, size: Size) -> Result<(), DT::Error>
where
    DT: DrawTarget,
    DT::Color: RgbColor,
{
    display.clear(DT::Color::BLACK)?;
    let style = MonoTextStyle::new(&FONT_6X10, DT::Color::WHITE);
    Text::with_alignment(
        CALIBRATION_PROMPT,
        Point::new(size.width as i32 / 2, 12),
        style,
        Alignment::Center,
    )
    .draw(display)?;
    Ok(())
}

/// Red 2x2 hit point with a white crosshair, matching what the operator is
/// told to look for.
fn draw_target_marker<DT>(display: &mut DT, target: Point) -> Result<(), DT::Error>
where
    DT: DrawTarget,
    DT::Color: RgbColor,
{
    let cross = PrimitiveStyle::with_stroke(DT::Color::WHITE, 1);
    Line::new(
        Point::new(target.x - 4, target.y),
        Point::new(target.x + 4, target.y),
    )
    .into_styled(cross)
    .draw(display)?;
    Line::new(
        Point::new(target.x, target.y - 4),
        Point::new(target.x, target.y + 4),
    )
    .into_styled(cross)
    .draw(display)?;

    Rectangle::new(target - Point::new(1, 1), Size::new(2, 2))
        .into_styled(PrimitiveStyle::with_fill(DT::Color::RED))
        .draw(display)?;
    Ok(())
}
