use opencv::{core::Mat, highgui};

use crate::error::Error;

pub const WINDOW_TITLE: &str = "Real-Time Object Tracker Demo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

/// Live preview of annotated frames.
pub trait Display {
    fn show(&mut self, frame: &Mat) -> Result<KeyAction, Error>;
}

/// Used with `--no-display`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl Display for Headless {
    #[inline]
    fn show(&mut self, _frame: &Mat) -> Result<KeyAction, Error> {
        Ok(KeyAction::Continue)
    }
}

pub struct Window {
    name: &'static str,
    open: bool,
}

impl Window {
    pub fn open() -> Result<Self, Error> {
        highgui::named_window(WINDOW_TITLE, highgui::WINDOW_AUTOSIZE)?;

        Ok(Self {
            name: WINDOW_TITLE,
            open: true,
        })
    }

    pub fn release(&mut self) {
        if self.open {
            self.open = false;
            if let Err(err) = highgui::destroy_all_windows() {
                log::warn!("failed to close display window: {}", err);
            }
        }
    }
}

impl Display for Window {
    fn show(&mut self, frame: &Mat) -> Result<KeyAction, Error> {
        highgui::imshow(self.name, frame)?;

        Ok(key_action(highgui::wait_key(1)?))
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.release();
    }
}

/// `wait_key` reports -1 when nothing was pressed; only the low byte is the key.
pub fn key_action(key: i32) -> KeyAction {
    if key >= 0 && (key & 0xFF) == b'q' as i32 {
        KeyAction::Quit
    } else {
        KeyAction::Continue
    }
}
