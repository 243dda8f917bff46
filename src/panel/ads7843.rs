//! `SampleSource` implementation for the ADS7843 / XPT2046 controller
//! family over SPI.

use core::fmt::Debug;

use embedded_hal::spi::SpiDevice;
use log::trace;

use crate::{RawPoint, SampleSource};

// Control bytes per the ADS7843/XPT2046 datasheet: start bit, channel select
// (001 = X, 101 = Y), differential 12-bit conversion, power-down mode 00 so
// PENIRQ stays armed between conversions.
const READ_X_CONTROL: u8 = 0b1_001_0_0_00;
const READ_Y_CONTROL: u8 = 0b1_101_0_0_00;

// The conversion result trails its control byte by 3 bits on the wire.
// Shifting the control byte 5 bits into a 16-bit slot aligns each 12-bit
// result with the receive bytes, so both axes come back in one 5-byte
// transfer with no post-shift.
const READ_X_TX: [u8; 2] = ((READ_X_CONTROL as u16) << 5).to_be_bytes();
const READ_Y_TX: [u8; 2] = ((READ_Y_CONTROL as u16) << 5).to_be_bytes();

const XFER_LEN: usize = 5;

const READ_XY_TX: [u8; XFER_LEN] = [
    READ_X_TX[0],
    READ_X_TX[1],
    READ_Y_TX[0],
    READ_Y_TX[1],
    0,
];

/// Readings outside this window are edge artifacts from a lifting or
/// grazing pen, not a usable contact.
fn out_of_range(point: RawPoint) -> bool {
    point.x < 250 || point.y < 230 || point.x > 4000 || point.y > 3900
}

/// ADS7843/XPT2046 touch controller on a shared SPI bus.
pub struct Ads7843<SPI> {
    spi: SPI,
}

impl<SPI, E> Ads7843<SPI>
where
    SPI: SpiDevice<u8, Error = E>,
    E: Debug,
{
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// One throwaway conversion to leave the power-down bits in the state
    /// that keeps PENIRQ enabled.
    pub fn init(&mut self) -> Result<(), E> {
        self.read_xy().map(|_| ())
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    fn read_xy(&mut self) -> Result<RawPoint, E> {
        let mut rx = [0u8; XFER_LEN];
        self.spi.transfer(&mut rx, &READ_XY_TX)?;

        let x = u16::from_be_bytes([rx[1], rx[2]]);
        let y = u16::from_be_bytes([rx[3], rx[4]]);
        Ok(RawPoint::new(x, y))
    }
}

impl<SPI, E> SampleSource for Ads7843<SPI>
where
    SPI: SpiDevice<u8, Error = E>,
    E: Debug,
{
    type Error = E;

    fn try_sample(&mut self) -> Result<Option<RawPoint>, E> {
        let point = self.read_xy()?;
        if out_of_range(point) {
            trace!("discarding out-of-range reading {:?}", point);
            return Ok(None);
        }
        Ok(Some(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

    /// SPI double that answers every transfer with a fixed receive buffer
    /// and records the last transmitted bytes.
    struct FixedSpi {
        rx: [u8; XFER_LEN],
        last_tx: [u8; XFER_LEN],
    }

    impl FixedSpi {
        fn new(rx: [u8; XFER_LEN]) -> Self {
            Self {
                rx,
                last_tx: [0; XFER_LEN],
            }
        }
    }

    impl ErrorType for FixedSpi {
        type Error = Infallible;
    }

    impl SpiDevice<u8> for FixedSpi {
        fn transaction(
            &mut self,
            operations: &mut [Operation<'_, u8>],
        ) -> Result<(), Infallible> {
            for op in operations {
                match op {
                    Operation::Transfer(read, write) => {
                        self.last_tx[..write.len()].copy_from_slice(write);
                        read.copy_from_slice(&self.rx[..read.len()]);
                    }
                    Operation::Read(read) => read.copy_from_slice(&self.rx[..read.len()]),
                    Operation::Write(write) => {
                        self.last_tx[..write.len()].copy_from_slice(write)
                    }
                    Operation::TransferInPlace(_) | Operation::DelayNs(_) => {}
                }
            }
            Ok(())
        }
    }

    fn rx_for(x: u16, y: u16) -> [u8; XFER_LEN] {
        let xb = x.to_be_bytes();
        let yb = y.to_be_bytes();
        [0, xb[0], xb[1], yb[0], yb[1]]
    }

    #[test]
    fn decodes_both_axes_from_one_transfer() {
        let mut touch = Ads7843::new(FixedSpi::new(rx_for(1234, 2345)));
        assert_eq!(touch.try_sample().unwrap(), Some(RawPoint::new(1234, 2345)));
        assert_eq!(touch.spi.last_tx, READ_XY_TX);
    }

    #[test]
    fn implausible_readings_report_no_contact() {
        for (x, y) in [(0, 0), (100, 2000), (2000, 100), (4095, 2000), (2000, 4095)] {
            let mut touch = Ads7843::new(FixedSpi::new(rx_for(x, y)));
            assert_eq!(touch.try_sample().unwrap(), None, "({}, {})", x, y);
        }
    }

    #[test]
    fn window_edges_are_inclusive() {
        for (x, y) in [(250, 230), (4000, 3900)] {
            let mut touch = Ads7843::new(FixedSpi::new(rx_for(x, y)));
            assert_eq!(touch.try_sample().unwrap(), Some(RawPoint::new(x, y)));
        }
    }
}
