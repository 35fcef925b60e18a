use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device with the given name, or the host default.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        Some(target) => host
            .input_devices()
            .context("failed to enumerate input devices")?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("no input device named {target:?}")),
        None => host
            .default_input_device()
            .context("no default input device"),
    }
}

/// Finds the output device with the given name, or the host default.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    match device_name {
        Some(target) => host
            .output_devices()
            .context("failed to enumerate output devices")?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("no output device named {target:?}")),
        None => host
            .default_output_device()
            .context("no default output device"),
    }
}

fn describe(name: &str, config: Option<cpal::SupportedStreamConfig>, is_default: bool) -> String {
    let mut line = match config {
        Some(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
        None => format!(" * {}", name),
    };
    if is_default {
        line.push_str(" [default]");
    }
    line
}

/// One line per input device, the default one marked.
pub fn get_available_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let lines: Vec<String> = host
        .input_devices()
        .context("failed to enumerate input devices")?
        .filter_map(|device| {
            let name = device.name().ok()?;
            let is_default = default_name.as_deref() == Some(name.as_str());
            Some(describe(&name, device.default_input_config().ok(), is_default))
        })
        .collect();
    Ok(lines.join("\n"))
}

/// One line per output device, the default one marked.
pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let lines: Vec<String> = host
        .output_devices()
        .context("failed to enumerate output devices")?
        .filter_map(|device| {
            let name = device.name().ok()?;
            let is_default = default_name.as_deref() == Some(name.as_str());
            Some(describe(&name, device.default_output_config().ok(), is_default))
        })
        .collect();
    Ok(lines.join("\n"))
}
