#![cfg_attr(windows, windows_subsystem = "windows")]

use anyhow::Result;
use clap::Parser;
use mic_level_enforcer::config::{default_settings_path, SettingsBackend, TomlFileBackend};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mic-level-enforcer")]
#[command(version, about = "Keeps microphone volumes at their configured levels", long_about = None)]
struct Args {
    /// Store settings in this TOML file instead of the registry
    #[arg(short, long, value_name = "PATH")]
    config_file: Option<PathBuf>,

    /// Store settings in the default TOML file instead of the registry
    #[arg(long, conflicts_with = "config_file")]
    file_settings: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    run(args)
}

fn settings_backend(args: &Args) -> Box<dyn SettingsBackend> {
    if let Some(path) = &args.config_file {
        return Box::new(TomlFileBackend::new(path.clone()));
    }

    #[cfg(windows)]
    {
        if !args.file_settings {
            return Box::new(mic_level_enforcer::platform::RegistryBackend::new());
        }
    }

    Box::new(TomlFileBackend::new(default_settings_path()))
}

#[cfg(windows)]
fn run(args: Args) -> Result<()> {
    use eframe::egui;
    use mic_level_enforcer::audio::WindowsGateway;
    use mic_level_enforcer::config::ConfigStore;
    use mic_level_enforcer::ui::{native, TrayApp, WINDOW_SIZE, WINDOW_TITLE};
    use mic_level_enforcer::AppState;
    use tracing::{error, info};

    let store = ConfigStore::new(settings_backend(&args));
    info!(location = %store.backend().location(), "Using settings store");

    let mut state = AppState::new(store);
    if let Err(e) = state.start_enforcing(WindowsGateway::for_current_thread) {
        error!(error = %e, "Failed to start volume enforcement");
        native::show_error(&format!("Failed to start volume enforcement: {}", e));
        return Err(e.into());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(WINDOW_SIZE)
            .with_resizable(false)
            .with_visible(false),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(|cc| Ok(Box::new(TrayApp::new(cc, state)))),
    )
    .map_err(|e| anyhow::anyhow!("UI event loop failed: {}", e))?;

    info!("Exited cleanly");
    Ok(())
}

#[cfg(not(windows))]
fn run(args: Args) -> Result<()> {
    let backend = settings_backend(&args);
    tracing::error!(
        location = %backend.location(),
        "Microphone volume control needs Windows Core Audio; nothing to enforce on this platform"
    );
    anyhow::bail!("unsupported platform")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
