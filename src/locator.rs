//! Finding which serial device is the fan controller.
//!
//! Controllers come and go (they are usually USB devices),
//! so the path is looked up each time the process starts.

use std::fmt::Display;

use itertools::Itertools;
use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;

/// A serial device as found by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    /// Where the device lives, e.g. `/dev/ttyACM0` or `COM3`.
    pub path: String,

    /// Human readable description, e.g. `Arduino LLC Arduino Uno`.
    /// Empty if the OS does not know.
    pub description: String,

    /// What kind of device this is, e.g. `usb 2341:0043`.
    pub hint: String,
}

impl From<SerialPortInfo> for DeviceDescriptor {
    fn from(info: SerialPortInfo) -> Self {
        let (description, hint) = match info.port_type {
            SerialPortType::UsbPort(usb) => (
                [usb.manufacturer, usb.product].into_iter().flatten().join(" "),
                format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
            ),
            SerialPortType::PciPort => (String::new(), "pci".into()),
            SerialPortType::BluetoothPort => (String::new(), "bluetooth".into()),
            SerialPortType::Unknown => (String::new(), "unknown".into()),
        };

        Self {
            path: info.port_name,
            description,
            hint,
        }
    }
}

impl Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "{} ({})", self.path, self.hint)
        } else {
            write!(f, "{} - {} ({})", self.path, self.description, self.hint)
        }
    }
}

/// Picks the fan controller among the available serial devices.
#[derive(Debug, Clone)]
pub struct DeviceLocator {
    description_markers: Vec<String>,
    path_markers: Vec<String>,
    default_path: String,
}

impl DeviceLocator {
    /// A locator using the markers and fallback of the given config.
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            description_markers: config.description_markers.clone(),
            path_markers: config.path_markers.clone(),
            default_path: config.default_path.clone(),
        }
    }

    /// Enumerate the serial devices on this machine.
    ///
    /// Failing to enumerate is treated as finding nothing.
    pub fn enumerate() -> Vec<DeviceDescriptor> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(Into::into).collect(),
            Err(e) => {
                warn!(?e, "Could not enumerate serial ports");
                vec![]
            }
        }
    }

    /// Does this device look like the controller?
    pub fn matches(&self, device: &DeviceDescriptor) -> bool {
        self.description_markers
            .iter()
            .any(|marker| device.description.contains(marker.as_str()))
            || self
                .path_markers
                .iter()
                .any(|marker| device.path.contains(marker.as_str()))
    }

    /// The first matching device, or the default path if none match.
    pub fn pick(&self, devices: &[DeviceDescriptor]) -> String {
        match devices.iter().find(|device| self.matches(device)) {
            Some(device) => {
                info!(%device, "Found controller");
                device.path.clone()
            }
            None => {
                info!(path = %self.default_path, "No controller found, using default");
                self.default_path.clone()
            }
        }
    }

    /// Find the controller's path on this machine.
    /// Never fails, see [`DeviceLocator::pick`].
    pub fn locate(&self) -> String {
        let devices = Self::enumerate();
        debug!("Enumerated {} device(s)", devices.len());

        self.pick(&devices)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn device(path: &str, description: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            path: path.into(),
            description: description.into(),
            hint: "usb 2341:0043".into(),
        }
    }

    fn locator() -> DeviceLocator {
        DeviceLocator::new(&DeviceConfig::default())
    }

    #[test]
    fn nothing_found_is_default() {
        assert_eq!(locator().pick(&[]), "/dev/ttyACM0");
    }

    #[test]
    fn no_match_is_default() {
        let devices = [device("/dev/ttyS0", ""), device("/dev/ttyS1", "16550A")];

        assert_eq!(locator().pick(&devices), "/dev/ttyACM0");
    }

    #[test]
    fn description_match() {
        let devices = [
            device("/dev/ttyS0", ""),
            device("/dev/cu.usbmodem1101", "Arduino LLC Arduino Uno"),
        ];

        assert_eq!(locator().pick(&devices), "/dev/cu.usbmodem1101");
    }

    #[test]
    fn path_match() {
        let devices = [device("/dev/ttyS0", ""), device("/dev/ttyUSB1", "CP2102")];

        assert_eq!(locator().pick(&devices), "/dev/ttyUSB1");
    }

    #[test]
    fn first_match_wins() {
        let devices = [
            device("/dev/ttyACM3", ""),
            device("/dev/ttyUSB0", "Arduino Nano"),
        ];

        assert_eq!(locator().pick(&devices), "/dev/ttyACM3");
    }

    #[test]
    fn custom_markers_and_default() {
        let config = DeviceConfig {
            path: None,
            default_path: "COM3".into(),
            description_markers: vec!["Pico".into()],
            path_markers: vec![],
        };
        let locator = DeviceLocator::new(&config);

        let devices = [
            device("/dev/ttyACM0", "Arduino Uno"),
            device("/dev/ttyACM1", "Raspberry Pi Pico"),
        ];
        assert_eq!(locator.pick(&devices), "/dev/ttyACM1");

        assert_eq!(locator.pick(&devices[..1]), "COM3");
    }

    #[test]
    fn unknown_port_type() {
        let descriptor: DeviceDescriptor = SerialPortInfo {
            port_name: "/dev/ttyS4".into(),
            port_type: SerialPortType::Unknown,
        }
        .into();

        assert_eq!(descriptor.path, "/dev/ttyS4");
        assert!(descriptor.description.is_empty());
        assert_eq!(descriptor.to_string(), "/dev/ttyS4 (unknown)");
    }
}
