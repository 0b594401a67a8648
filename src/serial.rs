use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Serial port related errors.
pub mod error;

/// The exclusive connection to the fan controller.
pub mod session;

/// Codecs for decoding messages from wire.
pub(crate) mod codecs;

/// A line of text the controller sent us.
///
/// Always trimmed and never empty.
/// The contents are not interpreted in any way.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedbackLine(String);

impl FeedbackLine {
    /// Create a line from raw bytes off the wire.
    ///
    /// Bytes which are not valid utf8 are dropped, and surrounding whitespace
    /// (including any carriage return) is trimmed.
    /// Returns `None` if nothing is left.
    pub fn from_wire<B: AsRef<[u8]>>(bytes: B) -> Option<Self> {
        let text = String::from_utf8_lossy(bytes.as_ref()).replace(char::REPLACEMENT_CHARACTER, "");

        Self::new(&text)
    }

    /// Create a line from text, trimming it.
    /// Returns `None` if the text is blank.
    pub fn new(text: &str) -> Option<Self> {
        let text = text.trim();

        if text.is_empty() {
            None
        } else {
            Some(Self(text.into()))
        }
    }

    /// Borrowed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FeedbackLine {
    type Error = &'static str;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(&text).ok_or("A feedback line cannot be blank")
    }
}

impl From<FeedbackLine> for String {
    fn from(line: FeedbackLine) -> Self {
        line.0
    }
}

impl Display for FeedbackLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
