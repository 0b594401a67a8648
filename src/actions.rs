use serde::{Deserialize, Serialize};

use crate::{
    command::{Command, Rejection},
    serial::FeedbackLine,
};

/// What a client is told after submitting a command.
///
/// Serializes as `{"status":"ok","fan":"A","key":"5"}`
/// or `{"status":"invalid","reason":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommandReply {
    /// The command was put on the wire.
    Ok {
        /// The fan, uppercase, if a channel was given.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fan: Option<String>,

        /// The key, uppercase.
        key: String,
    },

    /// The command was rejected and nothing was sent.
    Invalid {
        /// Why.
        reason: String,
    },
}

impl CommandReply {
    /// Was the command accepted.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// An example of a reply to an accepted command.
    pub fn example_ok() -> Self {
        Self::from(Command::parse("a5"))
    }

    /// An example of a reply to a rejected command.
    pub fn example_invalid() -> Self {
        Self::from(Command::parse("x"))
    }
}

impl From<Result<Command, Rejection>> for CommandReply {
    fn from(result: Result<Command, Rejection>) -> Self {
        match result {
            Ok(command) => Self::Ok {
                fan: command
                    .channel
                    .map(|channel| channel.to_string().to_uppercase()),
                key: command.key.to_string().to_uppercase(),
            },
            Err(rejection) => Self::Invalid {
                reason: rejection.to_string(),
            },
        }
    }
}

/// Messages the server sends to websocket clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The outcome of a command the client sent.
    Command(CommandReply),

    /// The newest line of feedback from the controller.
    Feedback(FeedbackLine),
}

impl Response {
    /// Turn a response into serialized json.
    pub fn serialize(&self) -> String {
        // Only strings and enums inside, which cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<CommandReply> for Response {
    fn from(reply: CommandReply) -> Self {
        Self::Command(reply)
    }
}

impl From<FeedbackLine> for Response {
    fn from(line: FeedbackLine) -> Self {
        Self::Feedback(line)
    }
}
