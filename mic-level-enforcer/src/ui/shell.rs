//! The eframe application: a hidden window that becomes the options
//! dialog on demand, plus the tray icon that summons it.

use super::native;
use super::options::{DialogAction, OptionsDialog};
use super::tray::{TrayEvent, TrayManager};
use crate::app::{device_choices, AppState};
use crate::audio::WindowsGateway;
use crate::config::SettingsBackend;
use eframe::egui::{self, ViewportCommand};
use tracing::{error, info};

/// Tray application driving [`AppState`].
pub struct TrayApp<B> {
    state: AppState<B>,
    tray: TrayManager,
    dialog: Option<OptionsDialog>,
}

impl<B: SettingsBackend> TrayApp<B> {
    /// Create the app and its tray icon.
    pub fn new(cc: &eframe::CreationContext<'_>, state: AppState<B>) -> Self {
        let mut tray = TrayManager::new();
        if let Err(e) = tray.create(&cc.egui_ctx) {
            error!(error = %e, "Failed to create tray icon");
            native::show_error(&format!("Failed to create tray icon: {}", e));
        }

        Self {
            state,
            tray,
            dialog: None,
        }
    }

    fn open_dialog(&mut self, ctx: &egui::Context) {
        if self.dialog.is_none() {
            // the UI thread gets its own gateway; COM objects stay on their thread
            let devices = WindowsGateway::for_current_thread().and_then(|gateway| device_choices(&gateway));
            self.dialog = Some(OptionsDialog::open(self.state.begin_edit(), devices));
        }
        ctx.send_viewport_cmd(ViewportCommand::Visible(true));
        ctx.send_viewport_cmd(ViewportCommand::Focus);
    }

    fn close_dialog(&mut self, ctx: &egui::Context) {
        self.dialog = None;
        ctx.send_viewport_cmd(ViewportCommand::Visible(false));
    }

    fn finish_dialog(&mut self, ctx: &egui::Context, action: DialogAction) {
        let Some(mut dialog) = self.dialog.take() else {
            return;
        };

        match action {
            DialogAction::Cancel => {
                info!("Options dialog cancelled");
                self.close_dialog(ctx);
            }
            DialogAction::Accept => match self.state.commit_edit(dialog.session().clone()) {
                Ok(()) => self.close_dialog(ctx),
                Err(e) => {
                    error!(location = %self.state.settings_location(), error = %e, "Failed to save configuration");
                    // keep the edits on screen so the user can retry
                    dialog.set_error(e.to_string());
                    self.dialog = Some(dialog);
                }
            },
        }
    }
}

impl<B: SettingsBackend> eframe::App for TrayApp<B> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let events: Vec<TrayEvent> = self.tray.events().try_iter().collect();
        for event in events {
            match event {
                TrayEvent::Configure => self.open_dialog(ctx),
                TrayEvent::Exit => {
                    info!("Exit requested from tray");
                    self.state.request_exit();
                }
            }
        }

        if self.state.should_exit {
            self.tray.destroy();
            ctx.send_viewport_cmd(ViewportCommand::Close);
            return;
        }

        // The window close box hides the dialog; only Exit ends the process
        if ctx.input(|i| i.viewport().close_requested()) {
            ctx.send_viewport_cmd(ViewportCommand::CancelClose);
            self.close_dialog(ctx);
            return;
        }

        let action = match self.dialog.as_mut() {
            Some(dialog) => dialog.show(ctx),
            None => {
                egui::CentralPanel::default().show(ctx, |_ui| {});
                None
            }
        };
        if let Some(action) = action {
            self.finish_dialog(ctx, action);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.request_exit();
    }
}
