//! Commands for the fan controller, and the gateway which puts them on wire.
//!
//! The controller understands single characters:
//! `0`-`9` sets a speed, `f` is full speed and `s` stops.
//! A controller driving two fans expects a channel byte (`a` or `b`) first.

use std::{fmt::Display, io, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, trace, Instrument};

use crate::{
    config::CommandConfig,
    serial::{error::SerialPortError, session::SessionWriter},
};

/// Why a command was not accepted.
#[derive(Debug, Error, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Rejection {
    /// Not one of `0`-`9`, `f`, `s`.
    #[error("The key `{0}` is not one of 0-9, f, s")]
    BadKey(String),

    /// Not one of `a`, `b`.
    #[error("The channel `{0}` is not one of a, b")]
    BadChannel(String),
}

/// Which fan a command is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "char", try_from = "char")]
pub enum Channel {
    /// The first fan.
    A,

    /// The second fan.
    B,
}

impl Channel {
    /// Parse a channel selector. Must be exactly `a` or `b`.
    pub fn parse(text: &str) -> Result<Self, Rejection> {
        match text {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            _ => Err(Rejection::BadChannel(text.into())),
        }
    }

    fn byte(self) -> u8 {
        match self {
            Channel::A => b'a',
            Channel::B => b'b',
        }
    }
}

impl From<Channel> for char {
    fn from(channel: Channel) -> Self {
        channel.byte() as char
    }
}

impl TryFrom<char> for Channel {
    type Error = Rejection;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Self::parse(c.encode_utf8(&mut [0; 4]))
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

/// What a fan should do.
///
/// Only valid keys can be constructed, and they are always lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "char", try_from = "char")]
pub struct Key(u8);

impl Key {
    /// Parse a key. Must be exactly one character out of `0`-`9`, `f`, `s`,
    /// in either case.
    pub fn parse(text: &str) -> Result<Self, Rejection> {
        let mut chars = text.chars();

        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                let c = c.to_ascii_lowercase();

                if c.is_ascii_digit() || c == 'f' || c == 's' {
                    Ok(Self(c as u8))
                } else {
                    Err(Rejection::BadKey(text.into()))
                }
            }
            _ => Err(Rejection::BadKey(text.into())),
        }
    }

    /// The speed step, if this key sets one.
    pub fn speed(&self) -> Option<u8> {
        (self.0 as char).to_digit(10).map(|digit| digit as u8)
    }

    /// Full speed.
    pub fn is_full(&self) -> bool {
        self.0 == b'f'
    }

    /// Stop the fan.
    pub fn is_stop(&self) -> bool {
        self.0 == b's'
    }

    fn byte(self) -> u8 {
        self.0
    }
}

impl From<Key> for char {
    fn from(key: Key) -> Self {
        key.byte() as char
    }
}

impl TryFrom<char> for Key {
    type Error = Rejection;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Self::parse(c.encode_utf8(&mut [0; 4]))
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

/// A validated command, optionally for a specific fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    /// The fan, if the controller has more than one.
    pub channel: Option<Channel>,

    /// What to do.
    pub key: Key,
}

impl Command {
    /// Validate a channel selector (if any) and a key.
    pub fn new(channel: Option<&str>, key: &str) -> Result<Self, Rejection> {
        let channel = channel.map(Channel::parse).transpose()?;
        let key = Key::parse(key)?;

        Ok(Self { channel, key })
    }

    /// Parse the wire form, i.e. `5`, `F` or `a5`.
    pub fn parse(text: &str) -> Result<Self, Rejection> {
        let text = text.trim();

        match text.char_indices().nth(1) {
            Some((split, _)) => {
                let (channel, key) = text.split_at(split);
                Self::new(Some(channel), key)
            }
            None => Self::new(None, text),
        }
    }

    /// The bytes which end up on the wire, in order.
    pub fn to_wire(&self) -> Vec<u8> {
        self.channel
            .map(Channel::byte)
            .into_iter()
            .chain([self.key.byte()])
            .collect()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.channel {
            Some(channel) => write!(f, "{channel}{}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// The only way commands reach the controller.
///
/// Holds the sending half of the session behind a lock,
/// which is kept for the whole of a command so that
/// concurrent commands never interleave on the wire.
pub struct CommandGateway {
    writer: Arc<Mutex<SessionWriter>>,
    channel_settle: Duration,
}

impl CommandGateway {
    /// Start accepting commands for the given writer.
    pub fn new(writer: SessionWriter, config: &CommandConfig) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            channel_settle: config.channel_settle(),
        }
    }

    /// Validate and send a command.
    ///
    /// Invalid input is rejected without touching the serial port.
    /// Valid input is accepted even if writing fails;
    /// such failures are logged and the command is dropped.
    pub async fn submit(&self, channel: Option<&str>, key: &str) -> Result<Command, Rejection> {
        self.accept(Command::new(channel, key)).await
    }

    /// Like [`CommandGateway::submit`], but for text in wire form such as `a5` or `f`.
    pub async fn submit_text(&self, text: &str) -> Result<Command, Rejection> {
        self.accept(Command::parse(text)).await
    }

    async fn accept(&self, parsed: Result<Command, Rejection>) -> Result<Command, Rejection> {
        let command = parsed.map_err(|rejection| {
            debug!(%rejection, "Rejected");
            rejection
        })?;

        if let Err(e) = self.send(&command).await {
            error!(?e, %command, "Write failed, command dropped");
        }

        Ok(command)
    }

    /// Put an already validated command on wire.
    ///
    /// The channel byte is sent by itself and given time to settle
    /// before the key byte, since the controller reads them as two frames.
    ///
    /// The sequence runs in its own task. Once started it completes even if
    /// the caller goes away, so a channel byte is never left without its key.
    pub async fn send(&self, command: &Command) -> Result<(), SerialPortError> {
        let writer = self.writer.clone();
        let channel_settle = self.channel_settle;
        let command = *command;

        let sequence = tokio::spawn(
            async move {
                let mut writer = writer.lock_owned().await;

                if let Some(channel) = command.channel {
                    writer.write(&[channel.byte()]).await?;
                    tokio::time::sleep(channel_settle).await;
                }

                writer.write(&[command.key.byte()]).await?;
                trace!(%command, "On wire");

                Ok::<_, SerialPortError>(())
            }
            .in_current_span(),
        );

        sequence
            .await
            .map_err(|e| SerialPortError::IO(io::Error::new(io::ErrorKind::Other, e)))?
    }

    /// Close the sending half of the session.
    pub(crate) async fn close(&self) -> Result<(), SerialPortError> {
        self.writer.lock().await.close().await
    }
}
