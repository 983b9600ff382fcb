use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CpalDeviceInfo {
    pub index: String,
    pub name: String,
    pub is_default: bool,
}

pub fn list_input_devices() -> Result<Vec<CpalDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;

    let mut result = Vec::new();
    for (index, device) in devices.enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let is_default = Some(name.as_str()) == default_name.as_deref();
        result.push(CpalDeviceInfo {
            index: index.to_string(),
            name,
            is_default,
        });
    }

    Ok(result)
}

/// Resolve a device by name, or the host default when no name is given.
pub(crate) fn find_input_device(name: Option<&str>) -> Option<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()
            .ok()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false)),
        None => host.default_input_device(),
    }
}

/// Lines printed by `--list-devices`.
pub fn describe_devices(devices: &[CpalDeviceInfo]) -> Vec<String> {
    let mut lines = vec!["Default".to_string()];
    lines.extend(devices.iter().map(|d| {
        if d.is_default {
            format!("{} (default)", d.name)
        } else {
            d.name.clone()
        }
    }));
    lines
}
