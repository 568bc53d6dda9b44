//! UI module for the system tray and options dialog.

pub mod native;
pub mod options;
pub mod shell;
pub mod tray;

pub use options::{DialogAction, OptionsDialog, WINDOW_SIZE, WINDOW_TITLE};
pub use shell::TrayApp;
pub use tray::{TrayError, TrayEvent, TrayManager};
