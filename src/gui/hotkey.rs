//! Global start/stop hotkey (F5).
//!
//! RegisterHotKey delivers WM_HOTKEY to the registering thread's message
//! queue, so the hotkey lives on its own thread with its own message loop.

use std::sync::mpsc::{channel, Receiver};
use std::thread;

use eframe::egui;
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Input::KeyboardAndMouse::{RegisterHotKey, UnregisterHotKey, MOD_NOREPEAT};
use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

const HOTKEY_TOGGLE: i32 = 1;
const VK_F5: u32 = 0x74;

/// Spawns the hotkey thread. Each press sends `()` and wakes the GUI.
pub fn spawn_toggle_hotkey(ctx: egui::Context) -> Receiver<()> {
    let (sender, receiver) = channel();

    thread::spawn(move || {
        unsafe {
            if let Err(e) = RegisterHotKey(HWND::default(), HOTKEY_TOGGLE, MOD_NOREPEAT, VK_F5) {
                log::warn!("Failed to register F5 hotkey: {}", e);
                return;
            }
        }
        log::info!("Hotkey registered: F5 (start/stop)");

        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_TOGGLE {
                    if sender.send(()).is_err() {
                        break;
                    }
                    ctx.request_repaint();
                }
            }
            let _ = UnregisterHotKey(HWND::default(), HOTKEY_TOGGLE);
        }
    });

    receiver
}
