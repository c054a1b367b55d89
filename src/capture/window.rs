//! Window discovery and activation for the game window.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextLengthW, GetWindowTextW, IsIconic, IsWindowVisible,
    SetForegroundWindow, ShowWindow, SW_RESTORE,
};

/// Reads a window's title; empty if it has none.
fn window_title(hwnd: HWND) -> String {
    unsafe {
        let title_len = GetWindowTextLengthW(hwnd);
        if title_len <= 0 {
            return String::new();
        }
        let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
        let copied = GetWindowTextW(hwnd, &mut title_buf);
        let copied = copied.clamp(0, title_len) as usize;
        OsString::from_wide(&title_buf[..copied])
            .to_string_lossy()
            .to_string()
    }
}

/// Finds the first visible top-level window whose title contains `title`.
///
/// Returns an error if no such window exists.
pub fn find_window_by_title(title: &str) -> Result<HWND> {
    struct EnumData<'a> {
        needle: &'a str,
        hwnd: Option<HWND>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            // Skip invisible windows
            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }

            let title = window_title(hwnd);
            if title.is_empty() || !title.contains(data.needle) {
                return TRUE;
            }

            data.hwnd = Some(hwnd);
            BOOL(0) // Stop enumeration
        }
    }

    let needle = title.trim();
    if needle.is_empty() {
        return Err(anyhow!("Window title is empty"));
    }

    let mut data = EnumData { needle, hwnd: None };
    unsafe {
        // EnumWindows returns FALSE when the callback stops it early, which
        // is expected here
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }

    data.hwnd
        .ok_or_else(|| anyhow!("Could not find a window titled '{}'", needle))
}

/// Restores the window if minimized and brings it to the foreground.
pub fn activate_window(hwnd: HWND) -> Result<()> {
    unsafe {
        if IsIconic(hwnd).as_bool() {
            let _ = ShowWindow(hwnd, SW_RESTORE);
        }
        if !SetForegroundWindow(hwnd).as_bool() {
            return Err(anyhow!("SetForegroundWindow refused to activate the window"));
        }
    }
    log::debug!("Activated window \"{}\"", window_title(hwnd));
    Ok(())
}
