//! Mouse input simulation.
//!
//! The sequencer drives clicks through the `InputInjector` seam. On Windows
//! the injector is backed by SendInput, which simulates hardware-level input
//! and moves the real cursor; the game window must be in the foreground.

#[cfg(any(windows, test))]
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A point in screen pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    #[cfg(any(windows, test))]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// How a pointer move is interpreted.
#[cfg(any(windows, test))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerMotion {
    /// Move to screen coordinates
    Absolute,
    /// Move by an offset from the current position
    Relative,
}

/// Window and pointer control used by the automation threads.
///
/// Pointer moves are always instant.
#[cfg(any(windows, test))]
pub trait InputInjector: Send + Sync {
    /// Whether a top-level window whose title contains `title` exists.
    fn window_exists(&self, title: &str) -> bool;

    /// Brings the window to the foreground.
    fn activate_window(&self, title: &str) -> Result<()>;

    fn move_pointer(&self, x: i32, y: i32, motion: PointerMotion) -> Result<()>;

    /// Left button press and release at the current pointer position.
    fn click(&self) -> Result<()>;
}

/// Clicks a screen point.
///
/// The one-pixel upward nudge after the absolute move makes the game register
/// a hover before the press.
#[cfg(any(windows, test))]
pub fn click_at(input: &dyn InputInjector, point: ScreenPoint) -> Result<()> {
    input.move_pointer(point.x, point.y, PointerMotion::Absolute)?;
    input.move_pointer(0, -1, PointerMotion::Relative)?;
    input.click()
}

#[cfg(windows)]
pub use self::send_input::SendInputInjector;

#[cfg(windows)]
mod send_input {
    use anyhow::{anyhow, Result};
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
        MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSE_EVENT_FLAGS, MOUSEINPUT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    use super::{InputInjector, PointerMotion};
    use crate::capture::window::{activate_window, find_window_by_title};

    /// SendInput-backed injector.
    ///
    /// Holds no window handle; HWND is not `Send`, so the window is looked
    /// up by title on every call.
    #[derive(Default)]
    pub struct SendInputInjector;

    fn mouse_input(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    dwFlags: flags,
                    ..Default::default()
                },
            },
        }
    }

    fn send(inputs: &[INPUT]) -> Result<()> {
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(anyhow!(
                "SendInput injected {} of {} events",
                sent,
                inputs.len()
            ));
        }
        Ok(())
    }

    impl InputInjector for SendInputInjector {
        fn window_exists(&self, title: &str) -> bool {
            find_window_by_title(title).is_ok()
        }

        fn activate_window(&self, title: &str) -> Result<()> {
            let hwnd = find_window_by_title(title)?;
            activate_window(hwnd)
        }

        fn move_pointer(&self, x: i32, y: i32, motion: PointerMotion) -> Result<()> {
            let input = match motion {
                PointerMotion::Absolute => {
                    let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
                    let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
                    if screen_width <= 0 || screen_height <= 0 {
                        return Err(anyhow!("Failed to query screen size"));
                    }

                    // Normalize to 0-65535 range (required by MOUSEEVENTF_ABSOLUTE)
                    let norm_x = ((x as i64 * 65535) / screen_width as i64) as i32;
                    let norm_y = ((y as i64 * 65535) / screen_height as i64) as i32;
                    mouse_input(norm_x, norm_y, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE)
                }
                PointerMotion::Relative => mouse_input(x, y, MOUSEEVENTF_MOVE),
            };
            send(&[input])
        }

        fn click(&self) -> Result<()> {
            send(&[
                mouse_input(0, 0, MOUSEEVENTF_LEFTDOWN),
                mouse_input(0, 0, MOUSEEVENTF_LEFTUP),
            ])
        }
    }
}
