//! The bridge ties a session to the rest of the program.
//!
//! It is built once at startup and owns everything with a lifetime
//! tied to the serial port: the command gateway, the feedback buffer
//! and the task collecting feedback.

use std::sync::Arc;

use futures::Stream;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    command::{Command, CommandGateway, Rejection},
    config::Config,
    feedback::{collector::FeedbackCollector, FeedbackBuffer},
    serial::{session::SerialSession, FeedbackLine},
};

/// Cheap to clone access to a running [`Bridge`].
///
/// This is what request handlers get.
#[derive(Clone)]
pub struct BridgeHandle {
    device: Arc<str>,
    gateway: Arc<CommandGateway>,
    feedback: Arc<FeedbackBuffer>,
}

impl BridgeHandle {
    /// Validate and send a command, see [`CommandGateway::submit`].
    pub async fn submit(&self, channel: Option<&str>, key: &str) -> Result<Command, Rejection> {
        self.gateway.submit(channel, key).await
    }

    /// Validate and send a command in wire form (`a5`, `f`, ...).
    pub async fn submit_text(&self, text: &str) -> Result<Command, Rejection> {
        self.gateway.submit_text(text).await
    }

    /// Observe feedback, see [`FeedbackBuffer::subscribe`].
    pub fn subscribe(&self) -> impl Stream<Item = FeedbackLine> + Send + 'static {
        self.feedback.subscribe()
    }

    /// The buffered feedback, oldest first.
    pub fn history(&self) -> Vec<FeedbackLine> {
        self.feedback.snapshot()
    }

    /// The serial device in use.
    pub fn device(&self) -> &str {
        &self.device
    }
}

/// Owns the session for as long as the program runs.
///
/// Call [`Bridge::shutdown`] to release the port.
/// Dropping the bridge stops feedback collection but does not flush.
pub struct Bridge {
    handle: BridgeHandle,
    collector: JoinHandle<()>,
}

impl Bridge {
    /// Split the session and start collecting feedback.
    pub fn start(session: SerialSession, config: &Config) -> Self {
        info!(%session, attempts = %session.attempts(), "Starting bridge");

        let device: Arc<str> = session.path().into();
        let (reader, writer) = session.into_split();

        let feedback = Arc::new(FeedbackBuffer::new(config.feedback.capacity));
        let collector = FeedbackCollector::new(reader, feedback.clone(), &config.feedback);

        let collector = tokio::spawn(
            collector
                .run()
                .instrument(info_span!("tty", path = %device)),
        );

        Self {
            handle: BridgeHandle {
                device,
                gateway: Arc::new(CommandGateway::new(writer, &config.commands)),
                feedback,
            },
            collector,
        }
    }

    /// A handle for submitting commands and observing feedback.
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Stop collecting feedback and close the port.
    pub async fn shutdown(mut self) {
        debug!("Stopping feedback collection");
        self.collector.abort();

        if let Err(e) = (&mut self.collector).await {
            if !e.is_cancelled() {
                warn!(?e, "Collector task join error");
            }
        }

        if let Err(e) = self.handle.gateway.close().await {
            warn!(?e, "Could not close serial port cleanly");
        }

        info!(device = %self.handle.device, "Bridge stopped");
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.collector.abort();
    }
}
