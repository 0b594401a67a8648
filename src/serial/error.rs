use std::io;

use thiserror::Error;

/// Problems while talking to an open serial port.
///
/// None of these close the session.
#[derive(Debug, Error)]
pub enum SerialPortError {
    /// IO related errors.
    #[error("Underlying IO problem")]
    IO(#[from] io::Error),

    /// The device sent more than we are willing to buffer without a newline.
    #[error("Line exceeded {0} bytes without a delimiter, discarded")]
    LineTooLong(usize),
}
