//! Affine touch calibration: the mapping between raw controller coordinates
//! and screen coordinates, its three-point solver, and the persisted form.
//!
//! The solver uses the classic three-point formulation from TI application
//! note SLYT277 ("Calibration in Touch-Screen Systems"): the six unknowns of
//! the 2x3 affine transform fall out of two independent 3x3 linear systems,
//! one per screen axis, built from the three raw samples augmented with a
//! constant column.

use embedded_graphics::geometry::{Point, Size};
use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};

use crate::{errors::CalibrationError, RawPoint};

/// Size of the persisted calibration image: six IEEE-754 doubles.
pub const CALIBRATION_BLOB_LEN: usize = 48;

/// Raw-space determinants smaller than this are treated as singular. With
/// 12-bit controller codes a healthy target spread yields determinants in
/// the millions, so anything near zero means collinear taps.
const MIN_DETERMINANT: f64 = 1e-6;

/// The six coefficients of one direction of the affine transform:
/// `x' = alpha_x * x + beta_x * y + delta_x`, same shape for `y'`.
///
/// Persisted (and serde) order is alpha_x, beta_x, delta_x, alpha_y, beta_y,
/// delta_y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineCoefficients {
    pub alpha_x: f64,
    pub beta_x: f64,
    pub delta_x: f64,
    pub alpha_y: f64,
    pub beta_y: f64,
    pub delta_y: f64,
}

impl AffineCoefficients {
    pub const IDENTITY: Self = Self {
        alpha_x: 1.0,
        beta_x: 0.0,
        delta_x: 0.0,
        alpha_y: 0.0,
        beta_y: 1.0,
        delta_y: 0.0,
    };

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.alpha_x * x + self.beta_x * y + self.delta_x,
            self.alpha_y * x + self.beta_y * y + self.delta_y,
        )
    }

    fn is_finite(&self) -> bool {
        self.alpha_x.is_finite()
            && self.beta_x.is_finite()
            && self.delta_x.is_finite()
            && self.alpha_y.is_finite()
            && self.beta_y.is_finite()
            && self.delta_y.is_finite()
    }

    /// Inverts the transform (screen back to raw space). Fails when the 2x2
    /// linear part is singular.
    fn inverted(&self) -> Result<Self, CalibrationError> {
        let det = self.alpha_x * self.beta_y - self.beta_x * self.alpha_y;
        if !det.is_finite() || (det < MIN_DETERMINANT && det > -MIN_DETERMINANT) {
            return Err(CalibrationError::Degenerate);
        }

        let inverse = Self {
            alpha_x: self.beta_y / det,
            beta_x: -self.beta_x / det,
            delta_x: (self.beta_x * self.delta_y - self.beta_y * self.delta_x) / det,
            alpha_y: -self.alpha_y / det,
            beta_y: self.alpha_x / det,
            delta_y: (self.alpha_y * self.delta_x - self.alpha_x * self.delta_y) / det,
        };
        if !inverse.is_finite() {
            return Err(CalibrationError::Degenerate);
        }
        Ok(inverse)
    }
}

/// A solved three-point calibration: the forward transform plus its
/// precomputed inverse. Immutable once built; replacing a panel's
/// calibration always swaps a whole value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreePointCalibration {
    forward: AffineCoefficients,
    inverse: AffineCoefficients,
}

impl ThreePointCalibration {
    /// Builds a calibration from already-known coefficients, e.g. factory
    /// defaults baked into the firmware image. The inverse is recomputed and
    /// the coefficients validated, so a corrupt image is rejected instead of
    /// producing an unusable panel.
    pub fn from_coefficients(forward: AffineCoefficients) -> Result<Self, CalibrationError> {
        if !forward.is_finite() {
            return Err(CalibrationError::Degenerate);
        }
        let inverse = forward.inverted()?;
        Ok(Self { forward, inverse })
    }

    pub fn coefficients(&self) -> &AffineCoefficients {
        &self.forward
    }

    /// Solves the transform from three (screen target, raw sample)
    /// correspondences via Cramer's rule on the raw-point system.
    pub fn solve(
        targets: &CalibrationTargets,
        samples: &[RawPoint; 3],
    ) -> Result<Self, CalibrationError> {
        let (sx, sy): ([f64; 3], [f64; 3]) = targets.split_axes();
        let rx = [
            f64::from(samples[0].x),
            f64::from(samples[1].x),
            f64::from(samples[2].x),
        ];
        let ry = [
            f64::from(samples[0].y),
            f64::from(samples[1].y),
            f64::from(samples[2].y),
        ];

        let det = (rx[0] - rx[2]) * (ry[1] - ry[2]) - (rx[1] - rx[2]) * (ry[0] - ry[2]);
        if !det.is_finite() || (det < MIN_DETERMINANT && det > -MIN_DETERMINANT) {
            warn!("calibration solve rejected: raw samples are collinear");
            return Err(CalibrationError::Degenerate);
        }

        // The delta numerators expand the full 3x3 determinant with the
        // constant column; alpha/beta reuse the differenced 2x2 form.
        let cross = [
            rx[1] * ry[2] - rx[2] * ry[1],
            rx[0] * ry[2] - rx[2] * ry[0],
            rx[0] * ry[1] - rx[1] * ry[0],
        ];

        let forward = AffineCoefficients {
            alpha_x: ((sx[0] - sx[2]) * (ry[1] - ry[2]) - (sx[1] - sx[2]) * (ry[0] - ry[2])) / det,
            beta_x: ((rx[0] - rx[2]) * (sx[1] - sx[2]) - (rx[1] - rx[2]) * (sx[0] - sx[2])) / det,
            delta_x: (sx[0] * cross[0] - sx[1] * cross[1] + sx[2] * cross[2]) / det,
            alpha_y: ((sy[0] - sy[2]) * (ry[1] - ry[2]) - (sy[1] - sy[2]) * (ry[0] - ry[2])) / det,
            beta_y: ((rx[0] - rx[2]) * (sy[1] - sy[2]) - (rx[1] - rx[2]) * (sy[0] - sy[2])) / det,
            delta_y: (sy[0] * cross[0] - sy[1] * cross[1] + sy[2] * cross[2]) / det,
        };

        let solved = Self::from_coefficients(forward)?;
        debug!("calibration solved: {:?}", solved.forward);
        Ok(solved)
    }
}

/// The active coordinate mapping of a touch panel.
///
/// `PassThrough` is the identity and exists for calibration runs, where the
/// solver must observe truly raw controller output. `ThreePoint` is the
/// normal operating mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationModel {
    PassThrough,
    ThreePoint(ThreePointCalibration),
}

impl CalibrationModel {
    /// Maps a raw controller reading into screen space.
    pub fn to_screen(&self, raw: RawPoint) -> Point {
        match self {
            CalibrationModel::PassThrough => Point::new(i32::from(raw.x), i32::from(raw.y)),
            CalibrationModel::ThreePoint(cal) => {
                let (x, y) = cal.forward.apply(f64::from(raw.x), f64::from(raw.y));
                Point::new(x as i32, y as i32)
            }
        }
    }

    /// Maps a screen point back into raw controller space. The reverse
    /// direction exists for verification; results are clamped to the
    /// controller's unsigned range.
    pub fn to_raw(&self, screen: Point) -> RawPoint {
        match self {
            CalibrationModel::PassThrough => RawPoint::new(
                screen.x.clamp(0, i32::from(u16::MAX)) as u16,
                screen.y.clamp(0, i32::from(u16::MAX)) as u16,
            ),
            CalibrationModel::ThreePoint(cal) => {
                let (x, y) = cal.inverse.apply(f64::from(screen.x), f64::from(screen.y));
                RawPoint::new(
                    x.clamp(0.0, f64::from(u16::MAX)) as u16,
                    y.clamp(0.0, f64::from(u16::MAX)) as u16,
                )
            }
        }
    }

    /// Encodes the model as the persisted 48-byte image: six little-endian
    /// doubles in the order alpha_x, beta_x, delta_x, alpha_y, beta_y,
    /// delta_y. `PassThrough` encodes as the identity coefficients.
    pub fn to_bytes(&self) -> [u8; CALIBRATION_BLOB_LEN] {
        let coefficients = match self {
            CalibrationModel::PassThrough => AffineCoefficients::IDENTITY,
            CalibrationModel::ThreePoint(cal) => cal.forward,
        };
        let mut blob = [0u8; CALIBRATION_BLOB_LEN];
        for (chunk, value) in blob.chunks_exact_mut(8).zip([
            coefficients.alpha_x,
            coefficients.beta_x,
            coefficients.delta_x,
            coefficients.alpha_y,
            coefficients.beta_y,
            coefficients.delta_y,
        ]) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        blob
    }

    /// Decodes a persisted image. The coefficients are kept bit-for-bit, so
    /// a round-trip through `to_bytes` reproduces identical `to_screen`
    /// results; only the inverse is recomputed.
    pub fn from_bytes(blob: &[u8; CALIBRATION_BLOB_LEN]) -> Result<Self, CalibrationError> {
        let mut values = [0f64; 6];
        for (value, chunk) in values.iter_mut().zip(blob.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *value = f64::from_le_bytes(bytes);
        }
        let forward = AffineCoefficients {
            alpha_x: values[0],
            beta_x: values[1],
            delta_x: values[2],
            alpha_y: values[3],
            beta_y: values[4],
            delta_y: values[5],
        };
        ThreePointCalibration::from_coefficients(forward).map(CalibrationModel::ThreePoint)
    }
}

/// The three known screen locations the operator is asked to tap.
///
/// The quarter-grid spread keeps the raw samples well away from collinear:
///
/// ```text
/// +-------+-------+-------+-------+
/// |       |       |       |       |
/// +-------a-------+-------+-------+
/// |       |       |       |       |
/// +-------+-------+-------c-------+
/// |       |       |       |       |
/// +-------+-------b-------+-------+
/// |       |       |       |       |
/// +-------+-------+-------+-------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTargets {
    pub a: Point,
    pub b: Point,
    pub c: Point,
}

impl CalibrationTargets {
    /// Derives target locations from the current display geometry.
    pub fn for_panel(panel_size: Size) -> Self {
        let x = panel_size.width as i32 / 4;
        let y = panel_size.height as i32 / 4;
        Self {
            a: Point::new(x, y),
            b: Point::new(2 * x, 3 * y),
            c: Point::new(3 * x, 2 * y),
        }
    }

    pub fn points(&self) -> [Point; 3] {
        [self.a, self.b, self.c]
    }

    fn split_axes(&self) -> ([f64; 3], [f64; 3]) {
        (
            [
                f64::from(self.a.x),
                f64::from(self.b.x),
                f64::from(self.c.x),
            ],
            [
                f64::from(self.a.y),
                f64::from(self.b.y),
                f64::from(self.c.y),
            ],
        )
    }
}
