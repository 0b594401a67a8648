use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How to find the fan controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Use exactly this device and skip discovery.
    pub path: Option<String>,

    /// Used when discovery finds nothing which looks like the controller.
    pub default_path: String,

    /// A device whose description contains any of these is picked.
    pub description_markers: Vec<String>,

    /// A device whose path contains any of these is picked.
    pub path_markers: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_path: "/dev/ttyACM0".into(),
            description_markers: vec!["Arduino".into()],
            path_markers: vec!["ACM".into(), "USB".into()],
        }
    }
}

/// How to open the serial port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate.
    pub baud: u32,

    /// How many times to try opening a busy port before giving up.
    pub open_attempts: u32,

    /// Pause between attempts on a busy port.
    pub busy_retry_delay_ms: u64,

    /// Pause after opening, while the controller resets itself.
    pub reset_settle_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: 115_200,
            open_attempts: 6,
            busy_retry_delay_ms: 1000,
            reset_settle_ms: 2000,
        }
    }
}

impl SerialConfig {
    pub(crate) fn busy_retry_delay(&self) -> Duration {
        Duration::from_millis(self.busy_retry_delay_ms)
    }

    pub(crate) fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }
}

/// How commands are put on wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// Pause between the channel byte and the command byte.
    pub channel_settle_ms: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            channel_settle_ms: 1,
        }
    }
}

impl CommandConfig {
    pub(crate) fn channel_settle(&self) -> Duration {
        Duration::from_millis(self.channel_settle_ms)
    }
}

/// How feedback from the controller is collected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedbackConfig {
    /// How many lines are kept. Older lines are evicted first.
    pub capacity: usize,

    /// Bytes without a newline after which the pending line is thrown away.
    pub max_line_length: usize,

    /// Back-off while the port reports errors or end of stream.
    pub poll_interval_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            max_line_length: 4096,
            poll_interval_ms: 5,
        }
    }
}

impl FeedbackConfig {
    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Where the web server listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub address: IpAddr,

    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: crate::server::DEFAULT_PORT,
        }
    }
}

/// The configuration used for running the bridge.
///
/// Every field may be omitted from a configuration file,
/// in which case its default is used.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Finding the controller.
    pub device: DeviceConfig,

    /// Opening the controller's port.
    pub serial: SerialConfig,

    /// Writing commands.
    pub commands: CommandConfig,

    /// Reading feedback.
    pub feedback: FeedbackConfig,

    /// The web server.
    pub server: ServerConfig,
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Not a valid configuration: {e}")))
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            device: DeviceConfig {
                path: Some("/dev/serial/by-id/usb-Arduino_Uno-if00".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> Result<String, Error> {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::BadConfig(format!("Could not serialize: {e}")))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let s = std::fs::read_to_string(p)?;

        Self::deserialize(&s)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<(), Error> {
        if self.serial.baud == 0 {
            return Err(Error::BadConfig("The baud rate must be non-zero".into()));
        }

        if self.serial.open_attempts == 0 {
            return Err(Error::BadConfig(
                "At least one attempt at opening the port is needed".into(),
            ));
        }

        if self.feedback.capacity == 0 {
            return Err(Error::BadConfig(
                "The feedback buffer must be able to hold at least one line".into(),
            ));
        }

        if self.feedback.max_line_length == 0 {
            return Err(Error::BadConfig(
                "The maximum line length must be non-zero".into(),
            ));
        }

        if self.device.path.is_none() && self.device.default_path.trim().is_empty() {
            return Err(Error::BadConfig(
                "Without a device path, a default path is needed for when discovery finds nothing"
                    .into(),
            ));
        }

        Ok(())
    }
}
