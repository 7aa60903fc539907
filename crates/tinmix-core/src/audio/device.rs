//! Output device lookup
//!
//! Devices are matched by name across every available cpal host, so a name
//! from the config (e.g. an ALSA `hw:0,0`) is found even when the default
//! host is a sound server.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::{MixerError, MixerResult};

/// An output device as shown to users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    pub name: String,
    /// Host backend, e.g. "Alsa", "Jack"
    pub host: String,
    pub is_default: bool,
}

impl std::fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)
    }
}

/// List output devices of every host, defaults first
pub fn output_devices() -> Vec<OutputDevice> {
    let mut found = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };

        let default_name = host
            .default_output_device()
            .and_then(|d: cpal::Device| d.name().ok());

        let devices = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in devices {
            let Ok(name) = device.name() else { continue };
            found.push(OutputDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                host: format!("{:?}", host_id),
                name,
            });
        }
    }

    found.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });
    found
}

/// Resolve `name` to a device, or the default host's default device
pub fn find_output_device(name: Option<&str>) -> MixerResult<cpal::Device> {
    let Some(name) = name else {
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| MixerError::NoDevice("no default output device".to_string()));
    };

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else { continue };
        let Ok(mut devices) = host.output_devices() else { continue };
        if let Some(device) = devices.find(|d: &cpal::Device| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
    }

    Err(MixerError::NoDevice(format!("device not found: {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_device_is_an_error() {
        let result = find_output_device(Some("tinmix-no-such-device"));
        assert!(matches!(result, Err(MixerError::NoDevice(_))));
    }

    #[test]
    fn test_display_includes_host() {
        let device = OutputDevice {
            name: "hw:0,0".to_string(),
            host: "Alsa".to_string(),
            is_default: false,
        };
        assert_eq!(device.to_string(), "[Alsa] hw:0,0");
    }
}
