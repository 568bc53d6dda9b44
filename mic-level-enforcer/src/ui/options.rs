//! Options dialog implementation using eframe/egui.
//!
//! A form over an [`EditSession`]: pick a device, set its volume,
//! add/update or remove targets, and set the check interval.

use crate::audio::{AudioError, CaptureDevice};
use crate::config::{EditSession, Upsert, MAX_POLL_INTERVAL_SECS, MIN_POLL_INTERVAL_SECS};
use eframe::egui;

/// Title of the options window.
pub const WINDOW_TITLE: &str = "Microphone Options";

/// Window size in logical pixels.
pub const WINDOW_SIZE: [f32; 2] = [480.0, 380.0];

const DEFAULT_VOLUME: i32 = 50;

/// How the user left the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    /// Save the edits
    Accept,
    /// Discard the edits
    Cancel,
}

/// Options dialog state.
pub struct OptionsDialog {
    session: EditSession,
    devices: Vec<CaptureDevice>,
    device_error: Option<String>,
    selected_device: Option<usize>,
    volume: i32,
    selected_target: Option<usize>,
    status: Option<String>,
    error_message: Option<String>,
}

impl OptionsDialog {
    /// Open the dialog over `session`, offering `devices` in the picker.
    pub fn open(session: EditSession, devices: Result<Vec<CaptureDevice>, AudioError>) -> Self {
        let (devices, device_error) = match devices {
            Ok(devices) => (devices, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        let selected_device = if devices.is_empty() { None } else { Some(0) };

        let mut dialog = Self {
            session,
            devices,
            device_error,
            selected_device,
            volume: DEFAULT_VOLUME,
            selected_target: None,
            status: None,
            error_message: None,
        };
        dialog.prefill_volume();
        dialog
    }

    /// Start the volume input at the selected device's configured level.
    fn prefill_volume(&mut self) {
        let configured = self
            .selected_device
            .and_then(|i| self.devices.get(i))
            .and_then(|device| self.session.target(&device.id.to_string()))
            .map(|target| target.volume);
        self.volume = configured.unwrap_or(DEFAULT_VOLUME);
    }

    /// The edits made so far.
    pub fn session(&self) -> &EditSession {
        &self.session
    }

    /// Show an error under the buttons, e.g. a failed save.
    pub fn set_error(&mut self, message: String) {
        self.error_message = Some(message);
    }

    /// Render the dialog. Returns the user's choice once OK or Cancel is hit.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<DialogAction> {
        let mut action = None;

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            action = Some(DialogAction::Cancel);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.device_picker(ui);
            ui.add_space(8.0);
            self.target_list(ui);
            ui.add_space(8.0);
            self.interval_input(ui);

            ui.separator();

            if let Some(ref error) = self.error_message {
                ui.colored_label(egui::Color32::RED, format!("Error: {}", error));
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Cancel").clicked() {
                    action = Some(DialogAction::Cancel);
                }
                if ui.button("OK").clicked() {
                    action = Some(DialogAction::Accept);
                }
            });
        });

        action
    }

    fn device_picker(&mut self, ui: &mut egui::Ui) {
        ui.label("Select Microphone:");

        if let Some(ref error) = self.device_error {
            ui.colored_label(egui::Color32::RED, format!("Could not list devices: {}", error));
        }

        let selected_text = self
            .selected_device
            .and_then(|i| self.devices.get(i))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| "No microphones detected".to_string());

        let previous = self.selected_device;
        egui::ComboBox::from_id_salt("device_picker")
            .selected_text(selected_text)
            .width(ui.available_width())
            .show_ui(ui, |ui| {
                for (i, device) in self.devices.iter().enumerate() {
                    ui.selectable_value(&mut self.selected_device, Some(i), &device.name);
                }
            });
        if self.selected_device != previous {
            self.prefill_volume();
        }

        ui.horizontal(|ui| {
            ui.label("Volume (1-100):");
            ui.add(egui::DragValue::new(&mut self.volume).range(1..=100).suffix("%"));

            let can_add = self.selected_device.is_some();
            if ui.add_enabled(can_add, egui::Button::new("Add/Update")).clicked() {
                self.add_selected();
            }
        });
    }

    fn target_list(&mut self, ui: &mut egui::Ui) {
        ui.label("Configured Microphones:");

        egui::Frame::none()
            .fill(ui.style().visuals.extreme_bg_color)
            .rounding(4.0)
            .inner_margin(4.0)
            .show(ui, |ui| {
                egui::ScrollArea::vertical()
                    .max_height(140.0)
                    .auto_shrink([false, true])
                    .show(ui, |ui| {
                        if self.session.targets().is_empty() {
                            ui.weak("None yet");
                        }
                        for (i, target) in self.session.targets().iter().enumerate() {
                            let selected = self.selected_target == Some(i);
                            let response = ui
                                .selectable_label(selected, target.to_string())
                                .on_hover_text(&target.device_name);
                            if response.clicked() {
                                self.selected_target = Some(i);
                            }
                        }
                    });
            });

        ui.horizontal(|ui| {
            let can_remove = self.selected_target.is_some();
            if ui.add_enabled(can_remove, egui::Button::new("Remove")).clicked() {
                self.remove_selected();
            }
            if let Some(ref status) = self.status {
                ui.weak(status);
            }
        });
    }

    fn interval_input(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Check Interval (seconds):");
            let mut interval = self.session.poll_interval_seconds();
            let response = ui.add(
                egui::DragValue::new(&mut interval)
                    .range(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS),
            );
            if response.changed() {
                self.session.set_poll_interval_seconds(interval);
            }
        });
    }

    fn add_selected(&mut self) {
        let Some(device) = self.selected_device.and_then(|i| self.devices.get(i)) else {
            return;
        };

        let outcome = self
            .session
            .add_or_update(&device.id.to_string(), &device.name, self.volume);
        self.status = Some(match outcome {
            Upsert::Added => format!("Added {}", device.name),
            Upsert::Updated => format!("Updated {}", device.name),
        });
    }

    fn remove_selected(&mut self) {
        let Some(target) = self
            .selected_target
            .and_then(|i| self.session.targets().get(i))
            .cloned()
        else {
            return;
        };

        if self.session.remove(&target) {
            self.status = Some(format!("Removed {}", target.display_name()));
        }
        self.selected_target = None;
    }
}
