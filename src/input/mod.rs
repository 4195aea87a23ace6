//! Mouse input for driving the game UI.
//!
//! Points are window-relative. Implementations translate them using the
//! window's position at call time and never sleep for the UI to settle;
//! callers schedule their own waits.

use crate::capture::{Point, WindowHandle};
use crate::error::Result;

#[cfg(windows)]
mod sendinput;

#[cfg(windows)]
pub use sendinput::SendInputInjector;

pub trait InputInjector {
    fn move_to(&self, handle: &WindowHandle, point: Point) -> Result<()>;

    /// Moves to `point` and performs a left click there.
    fn click(&self, handle: &WindowHandle, point: Point) -> Result<()>;
}
