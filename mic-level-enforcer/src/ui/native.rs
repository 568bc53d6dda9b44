//! Native message boxes and window control.
//!
//! Tray menu handlers run outside the egui frame loop, and a hidden
//! eframe window is not repainted, so these go straight to Win32.

use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowW, MessageBoxW, PostMessageW, SetForegroundWindow, ShowWindow, MB_ICONERROR,
    MB_ICONINFORMATION, MB_OK, MESSAGEBOX_STYLE, SW_SHOWNORMAL, WM_CLOSE,
};

/// Product name shown in the tray tooltip and the About box.
pub const PRODUCT_NAME: &str = "Microphone Level Enforcer";

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn message_box(text: &str, caption: &str, icon: MESSAGEBOX_STYLE) {
    let text_wide = to_wide(text);
    let caption_wide = to_wide(caption);
    unsafe {
        MessageBoxW(
            None,
            PCWSTR(text_wide.as_ptr()),
            PCWSTR(caption_wide.as_ptr()),
            MB_OK | icon,
        );
    }
}

/// Show the About box. Blocks until dismissed.
pub fn show_about() {
    let text = format!(
        "{}\nVersion {}\n\nSACK Corporation",
        PRODUCT_NAME,
        env!("CARGO_PKG_VERSION")
    );
    message_box(&text, "About", MB_ICONINFORMATION);
}

/// Show an error message box. Blocks until dismissed.
pub fn show_error(message: &str) {
    message_box(message, PRODUCT_NAME, MB_ICONERROR);
}

fn find_window(title: &str) -> Option<HWND> {
    let title_wide = to_wide(title);
    unsafe { FindWindowW(PCWSTR::null(), PCWSTR(title_wide.as_ptr())).ok() }
}

/// Make the top-level window with this title visible and bring it forward.
pub fn show_window(title: &str) -> bool {
    let Some(hwnd) = find_window(title) else {
        return false;
    };
    unsafe {
        let _ = ShowWindow(hwnd, SW_SHOWNORMAL);
        let _ = SetForegroundWindow(hwnd);
    }
    true
}

/// Ask the top-level window with this title to close.
pub fn request_close(title: &str) -> bool {
    let Some(hwnd) = find_window(title) else {
        return false;
    };
    unsafe { PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0)).is_ok() }
}
