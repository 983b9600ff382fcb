use crate::settings::{AppSettings, FlowKind};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowArg {
    Voice,
    Inventory,
}

impl From<FlowArg> for FlowKind {
    fn from(value: FlowArg) -> Self {
        match value {
            FlowArg::Voice => FlowKind::Voice,
            FlowArg::Inventory => FlowKind::Inventory,
        }
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "inventory-voice",
    about = "Inventory Voice - dictate items into the inventory"
)]
pub struct CliArgs {
    /// Path to the settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Base URL of the inventory server
    #[arg(long)]
    pub server_url: Option<String>,

    /// Voice flow to drive
    #[arg(long, value_enum)]
    pub flow: Option<FlowArg>,

    /// Only recognise temporary items in the voice flow (true or false)
    #[arg(long, value_name = "BOOL")]
    pub temporary_only: Option<bool>,

    /// Input device name
    #[arg(long)]
    pub device: Option<String>,

    /// Print the available input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Enable debug mode with verbose logging
    #[arg(long)]
    pub debug: bool,
}

impl CliArgs {
    /// Command-line flags take precedence over the settings file.
    pub fn apply_to(&self, settings: &mut AppSettings) {
        if let Some(url) = &self.server_url {
            settings.server_url = url.clone();
        }
        if let Some(flow) = self.flow {
            settings.flow = flow.into();
        }
        if let Some(temporary_only) = self.temporary_only {
            settings.temporary_only = temporary_only;
        }
        if let Some(device) = &self.device {
            settings.selected_microphone = Some(device.clone());
        }
        if self.debug {
            settings.debug_mode = true;
        }
    }
}
