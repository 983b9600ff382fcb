pub mod api;
pub mod audio_toolkit;
mod capture_state;
pub mod cart;
pub mod catalog;
pub mod cli;
pub mod console;
pub mod error;
pub mod managers;
pub mod models;
pub mod notifications;
pub mod recognition;
pub mod reconciler;
mod scheduler;
pub mod settings;
#[cfg(test)]
mod test_support;
pub mod view;

use anyhow::Context;
use api::HttpInventoryApi;
use audio_toolkit::audio::describe_devices;
use audio_toolkit::{list_input_devices, CpalBackend};
use cart::BorrowCart;
use clap::Parser;
use cli::CliArgs;
use console::{run_console, ConsoleNotifier};
use env_filter::Builder as EnvFilterBuilder;
use log::LevelFilter;
use managers::capture::{AudioCaptureSession, CaptureConfig};
use managers::loans::LoanDesk;
use managers::workflow::{FlowConfig, VoiceWorkflow};
use recognition::HttpRecognizer;
use settings::{default_settings_path, load_or_create_app_settings, FlowKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Console directives from RUST_LOG, or None when it is unset or invalid.
fn build_console_filter() -> Option<String> {
    match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.trim().is_empty() => {
            if let Err(err) = EnvFilterBuilder::new().try_parse(&spec) {
                eprintln!(
                    "Ignoring invalid RUST_LOG value '{}': {}. Falling back to info-level console logging",
                    spec, err
                );
                None
            } else {
                Some(spec)
            }
        }
        _ => None,
    }
}

fn console_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the console logger. Returns true when verbosity follows the
/// global max level (no RUST_LOG), so settings can still raise it.
fn init_logging(debug: bool) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.format_target(false);

    match build_console_filter() {
        Some(spec) => {
            builder.parse_filters(&spec);
            let _ = builder.try_init();
            false
        }
        None => {
            builder.filter_level(LevelFilter::Debug);
            let installed = builder.try_init().is_ok();
            if installed {
                log::set_max_level(console_level(debug));
            }
            installed
        }
    }
}

fn apply_debug_setting(debug_mode: bool, adjustable: bool) {
    if debug_mode && adjustable && log::max_level() < LevelFilter::Debug {
        log::set_max_level(LevelFilter::Debug);
        log::debug!("Debug logging enabled from settings");
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let adjustable = init_logging(args.debug);

    if args.list_devices {
        let devices = list_input_devices().context("Failed to list input devices")?;
        for name in describe_devices(&devices) {
            println!("{}", name);
        }
        return Ok(());
    }

    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_or_create_app_settings(&settings_path);
    args.apply_to(&mut settings);
    apply_debug_setting(settings.debug_mode, adjustable);
    log::info!(
        "Using {} flow against {}",
        match settings.flow {
            FlowKind::Voice => "voice",
            FlowKind::Inventory => "inventory",
        },
        settings.base_url()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?;

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build the HTTP client")?;
    let base_url = settings.base_url().to_string();

    let recognizer = Arc::new(HttpRecognizer::new(client.clone(), base_url.clone()));
    let api = Arc::new(HttpInventoryApi::new(client, base_url));
    let notifier = Arc::new(ConsoleNotifier);
    let cart = Arc::new(Mutex::new(BorrowCart::new()));

    let backend = Arc::new(CpalBackend::new(settings.selected_microphone.clone()));
    let capture = AudioCaptureSession::new(
        backend,
        CaptureConfig {
            max_duration: Duration::from_secs(settings.max_recording_secs),
            visualizer_bars: settings.visualizer_bars,
            preferred_mime_types: settings.preferred_mime_types.clone(),
        },
    );

    let flow = match settings.flow {
        FlowKind::Voice => FlowConfig::voice(settings.temporary_only),
        FlowKind::Inventory => FlowConfig::inventory(),
    };

    let mut workflow = VoiceWorkflow::new(
        flow,
        capture,
        recognizer,
        api.clone(),
        notifier.clone(),
        cart.clone(),
    );
    let desk = LoanDesk::new(api, notifier, cart);

    runtime.block_on(run_console(&mut workflow, &desk));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_level_follows_debug_flag() {
        assert_eq!(console_level(false), LevelFilter::Info);
        assert_eq!(console_level(true), LevelFilter::Debug);
    }

    #[test]
    fn test_settings_raise_level_after_logger_is_installed() {
        if build_console_filter().is_some() {
            return;
        }
        let adjustable = init_logging(false);
        assert!(adjustable);
        assert_eq!(log::max_level(), LevelFilter::Info);

        apply_debug_setting(false, adjustable);
        assert_eq!(log::max_level(), LevelFilter::Info);
        apply_debug_setting(true, adjustable);
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
}
