//! Error definitions for the crate.
//!
//! The split mirrors how the pipeline recovers: sample-level problems are
//! local and silent (the UI just waits for the next tap), calibration
//! problems always leave the previously active model untouched, and
//! construction problems are surfaced before the device starts serving
//! events instead of running half-initialized.

/// Rejected constructor parameters. Reported at startup, never mid-pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("averaging window must be within 1..={max}, got {got}")]
    WindowOutOfRange { got: usize, max: usize },
}

/// Why a three-point calibration produced no replacement model.
///
/// In both cases the prior calibration remains active and unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CalibrationError {
    /// The three raw samples are collinear (or numerically close to it), so
    /// the affine solve is singular and would yield an unstable transform.
    #[error("degenerate calibration geometry: raw points are collinear")]
    Degenerate,
    /// The sequence was abandoned before all three targets were sampled.
    #[error("calibration cancelled before completion")]
    Cancelled,
}

/// Failure of one post-processed acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError<E> {
    /// The pen lifted (or the reading went implausible) before the strategy
    /// collected enough samples. Recoverable: abort and go idle.
    #[error("sample unavailable before acquisition completed")]
    SampleUnavailable,
    /// The sampler transport itself failed.
    #[error("sampler transport error: {0:?}")]
    Sampler(E),
}

/// Failure in the touch panel acquisition pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TouchError<SE, PE> {
    #[error("sample unavailable before acquisition completed")]
    SampleUnavailable,
    #[error("sampler transport error: {0:?}")]
    Sampler(SE),
    #[error("pen line error: {0:?}")]
    Pen(PE),
    /// The pen-down line stayed asserted past the configured bound. The
    /// reference hardware spun forever here; a miswired line now reports
    /// instead of hanging the device.
    #[error("pen line still asserted after {0} ms")]
    ReleaseTimeout(u32),
}

impl<SE, PE> From<ProcessError<SE>> for TouchError<SE, PE> {
    fn from(value: ProcessError<SE>) -> Self {
        match value {
            ProcessError::SampleUnavailable => TouchError::SampleUnavailable,
            ProcessError::Sampler(e) => TouchError::Sampler(e),
        }
    }
}

/// Failure while running the interactive three-point calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CalibrateError<SE, PE, DE> {
    #[error(transparent)]
    Touch(TouchError<SE, PE>),
    #[error("display error: {0:?}")]
    Draw(DE),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

impl<SE, PE, DE> From<TouchError<SE, PE>> for CalibrateError<SE, PE, DE> {
    fn from(value: TouchError<SE, PE>) -> Self {
        CalibrateError::Touch(value)
    }
}

/// Failure in the menu controller event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MenuError<SE, PE, DE, UE> {
    #[error(transparent)]
    Touch(TouchError<SE, PE>),
    #[error("display error: {0:?}")]
    Draw(DE),
    #[error("serial transport error: {0:?}")]
    Serial(UE),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

impl<SE, PE, DE, UE> From<TouchError<SE, PE>> for MenuError<SE, PE, DE, UE> {
    fn from(value: TouchError<SE, PE>) -> Self {
        MenuError::Touch(value)
    }
}

impl<SE, PE, DE, UE> From<CalibrateError<SE, PE, DE>> for MenuError<SE, PE, DE, UE> {
    fn from(value: CalibrateError<SE, PE, DE>) -> Self {
        match value {
            CalibrateError::Touch(e) => MenuError::Touch(e),
            CalibrateError::Draw(e) => MenuError::Draw(e),
            CalibrateError::Calibration(e) => MenuError::Calibration(e),
        }
    }
}
