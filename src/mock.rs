//! A mock fan controller, useful to run the bridge without the actual hardware.
//!
//! It speaks the same protocol as the firmware: single byte commands,
//! optionally preceded by a channel byte, and a line of text in reply.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    command::{Channel, Key},
    serial::session::SerialSession,
};

/// What the mock says when it boots.
pub const BANNER: &str = "Fan controller ready";

/// How the simulated fans are doing.
#[derive(Debug, Default)]
struct MockFan {
    selected: Option<Channel>,
}

impl MockFan {
    /// React to a byte from the wire, possibly with a line of feedback.
    fn handle(&mut self, byte: u8) -> Option<String> {
        let c = byte as char;

        if let Ok(channel) = Channel::try_from(c) {
            self.selected = Some(channel);
            return None;
        }

        if c.is_ascii_whitespace() {
            return None;
        }

        let Ok(key) = Key::try_from(c) else {
            return Some(format!("Unknown command: {c}"));
        };

        let fan = match self.selected.take() {
            Some(Channel::B) => 'B',
            _ => 'A',
        };

        let reply = if let Some(speed) = key.speed() {
            format!("Fan {fan}: speed {speed}")
        } else if key.is_full() {
            format!("Fan {fan}: full")
        } else {
            format!("Fan {fan}: stopped")
        };

        Some(reply)
    }
}

async fn run(device: DuplexStream) {
    let (mut rx, mut tx) = tokio::io::split(device);
    let mut fan = MockFan::default();

    if tx.write_all(format!("{BANNER}\r\n").as_bytes()).await.is_err() {
        warn!("Mock could not boot");
        return;
    }

    let mut byte = [0u8; 1];
    while let Ok(1) = rx.read(&mut byte).await {
        debug!("Got `{}`", byte[0] as char);

        if let Some(reply) = fan.handle(byte[0]) {
            if tx.write_all(format!("{reply}\r\n").as_bytes()).await.is_err() {
                break;
            }
        }
    }

    info!("Mock stopped");
}

/// A session connected to a freshly booted mock controller.
pub fn mock_session(baud: u32) -> SerialSession {
    let (host, device) = tokio::io::duplex(1024);

    tokio::spawn(run(device).instrument(info_span!("mock")));

    SerialSession::from_transport("mock", baud, 1, host)
}
