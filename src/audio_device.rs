use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, HostId};

/// Resolves a host by its display name, falling back to the platform
/// default when the name is missing or unknown.
pub fn host_id_from_name(name: Option<&str>) -> HostId {
    name.and_then(|name| {
        cpal::available_hosts()
            .into_iter()
            .find(|id| id.name() == name)
    })
    .unwrap_or_else(|| cpal::default_host().id())
}

pub fn get_host_from_id(host_id: HostId) -> Result<Host> {
    cpal::host_from_id(host_id).map_err(|e| anyhow::anyhow!("Failed to get audio host: {}", e))
}

pub fn get_input_devices(host_id: HostId) -> Result<Vec<(String, Device)>> {
    let host = get_host_from_id(host_id)?;
    let devices = host.input_devices()?;
    Ok(devices
        .filter_map(|device| device.name().ok().map(|name| (name, device)))
        .collect())
}

pub fn get_output_devices(host_id: HostId) -> Result<Vec<(String, Device)>> {
    let host = get_host_from_id(host_id)?;
    let devices = host.output_devices()?;
    Ok(devices
        .filter_map(|device| device.name().ok().map(|name| (name, device)))
        .collect())
}

/// Finds an input device by name, or the host default when `name` is `None`.
pub fn find_input_device(host_id: HostId, name: Option<&str>) -> Result<Device> {
    match name {
        Some(name) => get_input_devices(host_id)?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, device)| device)
            .ok_or_else(|| anyhow::anyhow!("Input device not found: {}", name)),
        None => get_host_from_id(host_id)?
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No default input device")),
    }
}

pub fn find_output_device(host_id: HostId, name: Option<&str>) -> Result<Device> {
    match name {
        Some(name) => get_output_devices(host_id)?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, device)| device)
            .ok_or_else(|| anyhow::anyhow!("Output device not found: {}", name)),
        None => get_host_from_id(host_id)?
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No default output device")),
    }
}
