#![no_std]

//! Platform-agnostic core of a touchscreen menu front-end for resistive
//! panels (ADS7843/XPT2046 class controllers).
//!
//! The crate covers the part of such a front-end that is actual engineering:
//! turning noisy controller readings into calibrated screen coordinates
//! through a three-point affine calibration, and packaging that into an
//! interrupt-driven acquisition and dispatch pipeline. Displays, pen lines,
//! delays and serial ports are reached through `embedded-graphics`,
//! `embedded-hal` and `embedded-io` traits, so a board crate only has to
//! supply its peripherals.
//!
//! Raw controller coordinates ([`RawPoint`]) and screen coordinates
//! (`embedded_graphics::geometry::Point`) are separate types on purpose;
//! the only way from one space to the other is a
//! [`CalibrationModel`](calibration::CalibrationModel).

use core::fmt::Debug;

pub mod calibration;
pub mod calibrator;
pub mod errors;
pub mod filter;
pub mod menu;
pub mod panel;
#[cfg(test)]
pub(crate) mod testutil;

pub use calibration::CalibrationModel;
pub use filter::PostProcessor;
pub use menu::MenuController;
pub use panel::{TouchPanel, TouchSignal};

/// One unprocessed reading from the touch controller, in controller-native
/// units (12-bit ADC codes for the supported parts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawPoint {
    pub x: u16,
    pub y: u16,
}

impl RawPoint {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// On-demand source of raw touch samples.
///
/// `Ok(None)` means the controller currently has no valid contact to report,
/// typically because the pen lifted mid-read. Callers treat that as "abort
/// this acquisition and wait for the next touch event", never as a point.
pub trait SampleSource {
    type Error: Debug;

    fn try_sample(&mut self) -> Result<Option<RawPoint>, Self::Error>;
}
