//! The button menu: layout, hit-testing and the interrupt-driven event loop
//! that turns calibrated touch points into actions.

use core::fmt::Debug;

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Point, Size},
    mono_font::{ascii::FONT_6X10, MonoFont, MonoTextStyle},
    pixelcolor::RgbColor,
    primitives::{ContainsPoint, Primitive, PrimitiveStyle, Rectangle},
    text::{Baseline, Text, TextStyleBuilder},
    Drawable,
};
use embedded_hal::{delay::DelayNs, digital::InputPin};
use embedded_io::{Read, Write};
use heapless::Vec;
use log::{debug, info};
use strum::VariantArray;

use crate::{
    calibration::CALIBRATION_BLOB_LEN,
    calibrator::run_calibration,
    errors::{MenuError, TouchError},
    filter::PostProcessor,
    panel::{TouchPanel, TouchSignal},
    SampleSource,
};

pub const BUTTON_WIDTH: u32 = 80;
pub const BUTTON_HEIGHT: u32 = 40;

/// Size of the modem response buffer.
const RESPONSE_BUF_LEN: usize = 64;

/// Where status lines from dispatched actions are printed.
const STATUS_ORIGIN: Point = Point::new(20, 160);

const MENU_FONT: &MonoFont<'_> = &FONT_6X10;

/// Everything the menu can do. The display form doubles as the on-screen
/// button label.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
    strum_macros::VariantArray,
)]
pub enum MenuAction {
    Reset,
    #[strum(to_string = "WiFi status")]
    WifiStatus,
}

impl MenuAction {
    pub fn label(&self) -> &'static str {
        (*self).into()
    }

    fn origin(&self) -> Point {
        match self {
            MenuAction::Reset => Point::new(20, 30),
            MenuAction::WifiStatus => Point::new(20, 100),
        }
    }
}

/// One on-screen button: an action plus the rectangle that triggers it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Button {
    pub action: MenuAction,
    pub area: Rectangle,
}

impl Button {
    pub fn new(action: MenuAction, area: Rectangle) -> Self {
        Self { action, area }
    }

    fn draw<DT>(&self, display: &mut DT) -> Result<(), DT::Error>
    where
        DT: DrawTarget,
        DT::Color: RgbColor,
    {
        self.area
            .into_styled(PrimitiveStyle::with_stroke(DT::Color::WHITE, 1))
            .draw(display)?;

        if let Some(anchor) = label_anchor(self.action.label(), &self.area) {
            let style = MonoTextStyle::new(MENU_FONT, DT::Color::WHITE);
            let text_style = TextStyleBuilder::new().baseline(Baseline::Top).build();
            Text::with_text_style(self.action.label(), anchor, style, text_style)
                .draw(display)?;
        }
        Ok(())
    }
}

/// Centered top-left corner for the label, `None` when the label does not
/// fit the box; the box is then drawn bare.
///
/// The fit check is box-relative: any negative centering offset suppresses
/// the label, regardless of where the box sits on screen. A label wider or
/// taller than its box never renders, even partially.
fn label_anchor(label: &str, area: &Rectangle) -> Option<Point> {
    let glyph = MENU_FONT.character_size;
    let text_width = label.len() as i32 * glyph.width as i32;
    let offset = Point::new(
        (area.size.width as i32 - text_width) / 2,
        (area.size.height as i32 - glyph.height as i32) / 2,
    );
    if offset.x >= 0 && offset.y >= 0 {
        Some(area.top_left + offset)
    } else {
        None
    }
}

/// The set of buttons currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonTable {
    buttons: Vec<Button, 8>,
}

impl ButtonTable {
    /// The stock layout: one button per action, stacked down the left edge.
    pub fn standard() -> Self {
        let buttons = MenuAction::VARIANTS
            .iter()
            .map(|&action| {
                Button::new(
                    action,
                    Rectangle::new(action.origin(), Size::new(BUTTON_WIDTH, BUTTON_HEIGHT)),
                )
            })
            .collect();
        Self { buttons }
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    /// First button whose area contains `point`. Rectangle containment is
    /// half-open: the top/left edges hit, the bottom/right edges do not.
    pub fn hit(&self, point: Point) -> Option<MenuAction> {
        self.buttons
            .iter()
            .find(|button| button.area.contains(point))
            .map(|button| button.action)
    }

    pub fn draw<DT>(&self, display: &mut DT) -> Result<(), DT::Error>
    where
        DT: DrawTarget,
        DT::Color: RgbColor,
    {
        for button in &self.buttons {
            button.draw(display)?;
        }
        Ok(())
    }
}

/// Owns the touch panel, the button table and the modem serial link, and
/// drains touch gestures flagged by the pen-down interrupt.
pub struct MenuController<S, PEN, UART> {
    panel: TouchPanel<S, PEN>,
    signal: &'static TouchSignal,
    serial: UART,
    table: ButtonTable,
    response: [u8; RESPONSE_BUF_LEN],
    received: usize,
}

impl<S, PEN, UART> MenuController<S, PEN, UART>
where
    S: SampleSource,
    PEN: InputPin,
    UART: Read + Write,
{
    pub fn new(panel: TouchPanel<S, PEN>, signal: &'static TouchSignal, serial: UART) -> Self {
        Self {
            panel,
            signal,
            serial,
            table: ButtonTable::standard(),
            response: [0; RESPONSE_BUF_LEN],
            received: 0,
        }
    }

    pub fn panel(&self) -> &TouchPanel<S, PEN> {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut TouchPanel<S, PEN> {
        &mut self.panel
    }

    pub fn table(&self) -> &ButtonTable {
        &self.table
    }

    /// Bytes of the most recent modem reply.
    pub fn last_response(&self) -> &[u8] {
        &self.response[..self.received]
    }

    /// Clears the screen and paints the button table.
    pub fn draw_menu<DT>(
        &self,
        display: &mut DT,
    ) -> Result<(), MenuError<S::Error, PEN::Error, DT::Error, UART::Error>>
    where
        DT: DrawTarget,
        DT::Color: RgbColor,
        DT::Error: Debug,
    {
        display.clear(DT::Color::BLACK).map_err(MenuError::Draw)?;
        self.table.draw(display).map_err(MenuError::Draw)?;
        Ok(())
    }

    /// Drains one pending touch gesture, dispatching every button hit made
    /// while the pen stays down, then repaints the menu. Returns whether a
    /// gesture was processed.
    ///
    /// An unusable sample (pen grazed the panel) is skipped silently; the
    /// gesture keeps draining. The drain is bounded by the panel's release
    /// timeout so a stuck pen line cannot wedge the loop.
    pub fn process_events<DT, D>(
        &mut self,
        display: &mut DT,
        delay: &mut D,
    ) -> Result<bool, MenuError<S::Error, PEN::Error, DT::Error, UART::Error>>
    where
        DT: DrawTarget,
        DT::Color: RgbColor,
        DT::Error: Debug,
        D: DelayNs,
    {
        if !self.signal.is_pending() {
            return Ok(false);
        }

        let config = *self.panel.config();
        let poll_ms = config.release_poll_ms.max(1);
        let mut drained_ms = 0u32;
        loop {
            match self.panel.get_point() {
                Ok(point) => {
                    if let Some(action) = self.table.hit(point) {
                        info!("button hit at {:?}: {}", point, action);
                        self.dispatch(action, display, delay)?;
                    }
                }
                Err(TouchError::SampleUnavailable) => {}
                Err(e) => return Err(e.into()),
            }

            if !self.panel.pen_is_down()? {
                break;
            }
            if drained_ms >= config.release_timeout_ms {
                return Err(TouchError::ReleaseTimeout(drained_ms).into());
            }
            delay.delay_ms(poll_ms);
            drained_ms = drained_ms.saturating_add(poll_ms);
        }

        self.signal.clear();
        delay.delay_ms(config.post_release_debounce_ms);
        self.draw_menu(display)?;
        Ok(true)
    }

    /// Runs the interactive three-point calibration, activates the solved
    /// model and returns its persisted image for the caller to store.
    ///
    /// Sampling runs unfiltered for the duration; the previous
    /// post-processor is restored afterwards either way. On failure the
    /// previously active calibration stays in effect.
    pub fn calibrate<DT, D>(
        &mut self,
        display: &mut DT,
        delay: &mut D,
    ) -> Result<[u8; CALIBRATION_BLOB_LEN], MenuError<S::Error, PEN::Error, DT::Error, UART::Error>>
    where
        DT: DrawTarget,
        DT::Color: RgbColor,
        DT::Error: Debug,
        D: DelayNs,
    {
        let previous = self.panel.post_processor();
        self.panel.set_post_processor(PostProcessor::PassThrough);
        let result = run_calibration(&mut self.panel, self.signal, display, delay);
        self.panel.set_post_processor(previous);

        let model = result?;
        self.panel.set_calibration(model);
        self.draw_menu(display)?;
        Ok(model.to_bytes())
    }

    fn dispatch<DT, D>(
        &mut self,
        action: MenuAction,
        display: &mut DT,
        delay: &mut D,
    ) -> Result<(), MenuError<S::Error, PEN::Error, DT::Error, UART::Error>>
    where
        DT: DrawTarget,
        DT::Color: RgbColor,
        DT::Error: Debug,
        D: DelayNs,
    {
        match action {
            MenuAction::Reset => {
                self.draw_status(display, "sending reset command")?;
                self.serial.write_all(b"AT+RST").map_err(MenuError::Serial)?;
                delay.delay_ms(10);
                self.received = self
                    .serial
                    .read(&mut self.response)
                    .map_err(MenuError::Serial)?;
                debug!("modem replied with {} bytes", self.received);
                delay.delay_ms(1000);
            }
            MenuAction::WifiStatus => {
                self.draw_status(display, "checking WiFi connection status...")?;
                delay.delay_ms(1000);
            }
        }
        Ok(())
    }

    fn draw_status<DT>(
        &self,
        display: &mut DT,
        message: &str,
    ) -> Result<(), MenuError<S::Error, PEN::Error, DT::Error, UART::Error>>
    where
        DT: DrawTarget,
        DT::Color: RgbColor,
        DT::Error: Debug,
    {
        let style = MonoTextStyle::new(MENU_FONT, DT::Color::WHITE);
        Text::new(message, STATUS_ORIGIN, style)
            .draw(display)
            .map_err(MenuError::Draw)?;
        Ok(())
    }
}
