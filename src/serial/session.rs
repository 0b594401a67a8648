use std::fmt::Display;

use bytes::BytesMut;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};

use crate::{config::SerialConfig, error::Error, serial::error::SerialPortError};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Open the port the way the controller expects: 8N1, no flow control.
fn try_create_serial_port(path: &str, baud: u32) -> serialport::Result<tokio_serial::SerialStream> {
    tokio_serial::new(path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
}

/// Someone else has the port open.
///
/// Linux says "Device or resource busy".
/// Windows says "Access is denied", which on Linux instead means missing permissions.
fn is_busy(e: &serialport::Error) -> bool {
    let description = e.to_string().to_lowercase();

    if description.contains("busy") {
        return true;
    }

    cfg!(windows) && description.contains("denied")
}

/// The single open connection to the fan controller.
///
/// Split it with [`SerialSession::into_split`] so reading and writing
/// can happen independently.
pub struct SerialSession {
    path: String,
    baud: u32,
    attempts: u32,
    reader: SessionReader,
    writer: SessionWriter,
}

impl SerialSession {
    /// Open the serial port at `path`.
    ///
    /// A busy port is retried, see [`SerialSession::open_with`].
    pub async fn open(path: &str, config: &SerialConfig) -> Result<Self, Error> {
        Self::open_with(path, config, try_create_serial_port).await
    }

    /// Open a session using `opener` to create the transport.
    ///
    /// If the opener reports the port as busy it is tried again after a delay,
    /// up to the configured number of attempts.
    /// Any other error gives up immediately.
    ///
    /// After opening we wait for the controller to finish resetting,
    /// since bytes sent while it boots are lost.
    pub async fn open_with<T, F>(path: &str, config: &SerialConfig, mut opener: F) -> Result<Self, Error>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
        F: FnMut(&str, u32) -> serialport::Result<T>,
    {
        info!(%path, baud = %config.baud, "Opening serial port");

        for attempt in 1..=config.open_attempts {
            match opener(path, config.baud) {
                Ok(transport) => {
                    info!(%path, %attempt, "Connected");

                    debug!("Waiting {:?} for the controller to reset", config.reset_settle());
                    tokio::time::sleep(config.reset_settle()).await;

                    return Ok(Self::from_transport(path, config.baud, attempt, transport));
                }
                Err(e) if is_busy(&e) => {
                    warn!("Port busy, attempt {attempt}/{}", config.open_attempts);

                    if attempt < config.open_attempts {
                        tokio::time::sleep(config.busy_retry_delay()).await;
                    }
                }
                Err(e) => {
                    error!(?e, %path, "Could not open port");

                    return Err(Error::OpenFailed {
                        path: path.into(),
                        problem: e.to_string(),
                    });
                }
            }
        }

        Err(Error::PortBusy {
            path: path.into(),
            attempts: config.open_attempts,
        })
    }

    /// Wrap something which is already open, such as a mock or a pipe.
    pub fn from_transport<T>(path: &str, baud: u32, attempts: u32, transport: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(transport);

        Self {
            path: path.into(),
            baud,
            attempts,
            reader: SessionReader {
                inner: Box::new(reader),
            },
            writer: SessionWriter {
                inner: Box::new(writer),
            },
        }
    }

    /// The path of the port.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The baud rate the port was opened with.
    pub fn baud(&self) -> u32 {
        self.baud
    }

    /// How many attempts it took to open the port.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Separate the read and write directions.
    pub fn into_split(self) -> (SessionReader, SessionWriter) {
        (self.reader, self.writer)
    }
}

impl Display for SerialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.path, self.baud)
    }
}

/// The receiving direction of a [`SerialSession`].
pub struct SessionReader {
    inner: BoxedReader,
}

impl SessionReader {
    /// Append whatever bytes are pending to `buf`, without waiting.
    ///
    /// Returns how many bytes were appended, which is zero when nothing is pending.
    pub fn try_read(&mut self, buf: &mut BytesMut) -> Result<usize, SerialPortError> {
        match self.inner.read_buf(buf).now_or_never() {
            Some(result) => Ok(result?),
            None => Ok(0),
        }
    }

    /// Wait until some bytes arrive and append them to `buf`.
    ///
    /// Returns zero at end of stream.
    pub async fn read(&mut self, buf: &mut BytesMut) -> Result<usize, SerialPortError> {
        Ok(self.inner.read_buf(buf).await?)
    }
}

/// The sending direction of a [`SerialSession`].
pub struct SessionWriter {
    inner: BoxedWriter,
}

impl SessionWriter {
    /// Put these bytes on the wire and flush.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), SerialPortError> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;

        Ok(())
    }

    /// Flush and close the sending direction.
    pub async fn close(&mut self) -> Result<(), SerialPortError> {
        Ok(self.inner.shutdown().await?)
    }
}
