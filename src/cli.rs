use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use crate::{
    actions::{CommandReply, Response},
    config::Config,
    error::Error,
    locator::DeviceLocator,
    serial::FeedbackLine,
};

/// The command line interface for the fan bridge.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use this serial device instead of searching for one
    #[arg(short, long)]
    pub device: Option<String>,

    /// Port for the web server
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Talk to a simulated controller instead of a serial device
    #[arg(long)]
    pub mock: bool,

    /// Log level. `RUST_LOG` overrides this for stdout
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Also log to daily files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands. Without one, the web server is started
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Let the command line override the configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.device.path = Some(device.clone());
        }

        if let Some(port) = self.port {
            config.server.port = port;
        }
    }

    /// Where to log to file, if anywhere.
    pub fn file_logging(&self) -> Option<(Level, PathBuf)> {
        self.log_dir.clone().map(|dir| (self.log_level, dir))
    }
}

/// Commands available in the command line interface.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Control the fans from this terminal instead of serving the web interface.
    Console {
        /// Which fan to send to, for controllers with two
        #[arg(short, long, value_parser = ["a", "b"])]
        channel: Option<String>,
    },

    /// List serial devices, and show which one would be picked.
    Ports,

    /// Examples for user convenience.
    #[command(subcommand)]
    Examples(Examples),
}

/// Examples of configuration and messages.
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,

    /// Show what the server replies when given commands.
    CommandReply,

    /// Show what websocket clients receive.
    Websocket,
}

/// Print the requested example to stdout.
pub fn print_example(example: Examples) -> Result<(), Error> {
    let text = match example {
        Examples::Config => Config::example().serialize_pretty()?,
        Examples::CommandReply => [CommandReply::example_ok(), CommandReply::example_invalid()]
            .iter()
            .map(|reply| serde_json::to_string(reply).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n"),
        Examples::Websocket => {
            let feedback = FeedbackLine::new("Fan A: speed 5").map(Response::from);

            [Some(Response::from(CommandReply::example_ok())), feedback]
                .iter()
                .flatten()
                .map(Response::serialize)
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    println!("{text}");

    Ok(())
}

/// Print what serial devices there are, marking the one which would be used.
pub fn print_ports(config: &Config) {
    let locator = DeviceLocator::new(&config.device);
    let devices = DeviceLocator::enumerate();

    if devices.is_empty() {
        println!("No serial devices found");
    }

    let picked = match &config.device.path {
        Some(path) => path.clone(),
        None => locator.pick(&devices),
    };

    for device in &devices {
        let marker = if device.path == picked { "*" } else { " " };
        println!("{marker} {device}");
    }

    if !devices.iter().any(|device| device.path == picked) {
        println!("* {picked} (not present)");
    }
}
