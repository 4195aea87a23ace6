//! Hardware-level mouse input through `SendInput`.
//!
//! The game reads raw input and ignores posted window messages, so clicks
//! move the real cursor. The window is brought to the foreground first.

use std::time::Duration;

use tracing::debug;
use windows::Win32::Foundation::POINT;
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSE_EVENT_FLAGS, MOUSEINPUT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SetForegroundWindow, SM_CXSCREEN, SM_CYSCREEN,
};

use super::InputInjector;
use crate::capture::window::{hwnd_of, is_window};
use crate::capture::{Point, WindowHandle};
use crate::error::{CollectorError, Result};

/// Pause between the primitive events of one click, not a UI settle wait.
const EVENT_GAP: Duration = Duration::from_millis(50);

#[derive(Default)]
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }

    /// Focuses the window and returns `point` in absolute input units (0..=65535).
    fn prepare(&self, handle: &WindowHandle, point: Point) -> Result<(i32, i32)> {
        let hwnd = hwnd_of(handle);
        if !is_window(hwnd) {
            return Err(CollectorError::WindowLost);
        }

        // The operator may have clicked elsewhere since the last step
        unsafe {
            let _ = SetForegroundWindow(hwnd);
        }
        std::thread::sleep(EVENT_GAP);

        let mut screen = POINT {
            x: point.x as i32,
            y: point.y as i32,
        };
        unsafe {
            if !ClientToScreen(hwnd, &mut screen).as_bool() {
                return Err(CollectorError::Platform("ClientToScreen failed".into()));
            }
        }

        let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) }.max(1);
        let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) }.max(1);
        let norm_x = ((screen.x as i64 * 65535) / screen_width as i64) as i32;
        let norm_y = ((screen.y as i64 * 65535) / screen_height as i64) as i32;

        debug!(
            "Input at client {} = screen ({}, {}) = normalized ({}, {})",
            point, screen.x, screen.y, norm_x, norm_y
        );
        Ok((norm_x, norm_y))
    }
}

fn send_mouse(flags: MOUSE_EVENT_FLAGS, x: i32, y: i32) -> Result<()> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: x,
                dy: y,
                dwFlags: flags | MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE,
                ..Default::default()
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(CollectorError::Platform(
            "SendInput was blocked (is the game running elevated?)".into(),
        ))
    }
}

impl InputInjector for SendInputInjector {
    fn move_to(&self, handle: &WindowHandle, point: Point) -> Result<()> {
        let (x, y) = self.prepare(handle, point)?;
        send_mouse(MOUSE_EVENT_FLAGS(0), x, y)
    }

    fn click(&self, handle: &WindowHandle, point: Point) -> Result<()> {
        let (x, y) = self.prepare(handle, point)?;
        send_mouse(MOUSE_EVENT_FLAGS(0), x, y)?;
        std::thread::sleep(EVENT_GAP * 2);
        send_mouse(MOUSEEVENTF_LEFTDOWN, x, y)?;
        std::thread::sleep(EVENT_GAP);
        send_mouse(MOUSEEVENTF_LEFTUP, x, y)
    }
}
