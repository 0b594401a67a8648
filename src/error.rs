use thiserror::Error;

/// Errors that may occur in this library.
///
/// Everything here is fatal to the process: once the bridge is running,
/// problems are logged and absorbed instead of being returned.
#[derive(Debug, Error)]
pub enum Error {
    /// The port kept reporting it was busy until we ran out of attempts.
    #[error("The serial port `{path}` was still busy after {attempts} attempt(s)")]
    PortBusy {
        /// The port we tried to open.
        path: String,

        /// How many times we tried.
        attempts: u32,
    },

    /// The port could not be opened for a reason which retrying will not fix.
    #[error("Could not open serial port `{path}`. Problem: {problem}")]
    OpenFailed {
        /// The port we tried to open.
        path: String,

        /// What the OS told us.
        problem: String,
    },

    /// The configuration does not make sense.
    #[error("Bad configuration. Problem: `{0}`")]
    BadConfig(String),

    /// The web server could not be started.
    #[error("The server could not start. Problem: `{0}`")]
    Server(String),

    /// IO related errors outside of the serial port itself.
    #[error("Underlying IO problem")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the inner message if this is a [`Error::BadConfig`].
    pub fn try_into_bad_config(self) -> Option<String> {
        if let Self::BadConfig(v) = self {
            Some(v)
        } else {
            None
        }
    }
}
