//! System tray icon management.
//!
//! Owns the tray icon and its Configure / About / Exit menu, and forwards
//! menu picks to the frame loop.

use super::native::{self, PRODUCT_NAME};
use super::options::WINDOW_TITLE;
use crate::platform::icons;
use eframe::egui;
use std::sync::mpsc::{channel, Receiver, Sender};
use thiserror::Error;
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{MouseButton, TrayIcon, TrayIconBuilder, TrayIconEvent};
use tracing::debug;

/// Events from the system tray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    /// Open the options dialog
    Configure,

    /// Shut down and exit
    Exit,
}

/// Tray service error types.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create tray icon: {0}")]
    CreateFailed(String),

    #[error("Failed to build tray icon image: {0}")]
    IconLoadFailed(String),

    #[error("Failed to create menu: {0}")]
    MenuFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Configure,
    About,
    Exit,
}

struct MenuIds {
    configure: MenuId,
    about: MenuId,
    exit: MenuId,
}

impl MenuIds {
    fn resolve(&self, id: &MenuId) -> Option<MenuAction> {
        if id == &self.configure {
            Some(MenuAction::Configure)
        } else if id == &self.about {
            Some(MenuAction::About)
        } else if id == &self.exit {
            Some(MenuAction::Exit)
        } else {
            None
        }
    }
}

/// Route a menu pick. About is answered in place; the rest go to the
/// frame loop, waking the options window so it gets a frame.
fn dispatch(action: MenuAction, sender: &Sender<TrayEvent>, ctx: &egui::Context) {
    debug!(?action, "Tray menu action");
    match action {
        MenuAction::About => native::show_about(),
        MenuAction::Configure => {
            let _ = sender.send(TrayEvent::Configure);
            native::show_window(WINDOW_TITLE);
            ctx.request_repaint();
        }
        MenuAction::Exit => {
            let _ = sender.send(TrayEvent::Exit);
            native::request_close(WINDOW_TITLE);
            ctx.request_repaint();
        }
    }
}

/// System tray manager.
pub struct TrayManager {
    tray_icon: Option<TrayIcon>,
    event_sender: Sender<TrayEvent>,
    event_receiver: Receiver<TrayEvent>,
}

impl TrayManager {
    /// Create a new TrayManager.
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            tray_icon: None,
            event_sender: sender,
            event_receiver: receiver,
        }
    }

    /// Create and show the tray icon. Menu picks repaint `ctx`.
    pub fn create(&mut self, ctx: &egui::Context) -> Result<(), TrayError> {
        let icon = icons::create_tray_icon().map_err(TrayError::IconLoadFailed)?;

        let menu = Menu::new();
        let configure_item = MenuItem::new("Configure", true, None);
        let about_item = MenuItem::new("About", true, None);
        let exit_item = MenuItem::new("Exit", true, None);
        menu.append_items(&[
            &configure_item,
            &about_item,
            &PredefinedMenuItem::separator(),
            &exit_item,
        ])
        .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

        let ids = MenuIds {
            configure: configure_item.id().clone(),
            about: about_item.id().clone(),
            exit: exit_item.id().clone(),
        };

        let sender = self.event_sender.clone();
        let menu_ctx = ctx.clone();
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            if let Some(action) = ids.resolve(&event.id) {
                dispatch(action, &sender, &menu_ctx);
            }
        }));

        // Double-clicking the icon opens the dialog, like Configure
        let sender = self.event_sender.clone();
        let icon_ctx = ctx.clone();
        TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
            if let TrayIconEvent::DoubleClick {
                button: MouseButton::Left,
                ..
            } = event
            {
                dispatch(MenuAction::Configure, &sender, &icon_ctx);
            }
        }));

        let tray_icon = TrayIconBuilder::new()
            .with_icon(icon)
            .with_tooltip(PRODUCT_NAME)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;

        self.tray_icon = Some(tray_icon);
        Ok(())
    }

    /// Get the event receiver for tray events.
    pub fn events(&self) -> &Receiver<TrayEvent> {
        &self.event_receiver
    }

    /// Remove the tray icon.
    pub fn destroy(&mut self) {
        self.tray_icon = None;
    }
}

impl Default for TrayManager {
    fn default() -> Self {
        Self::new()
    }
}
