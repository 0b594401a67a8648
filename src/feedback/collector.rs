use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, trace, warn};

use crate::{
    config::FeedbackConfig,
    feedback::FeedbackBuffer,
    serial::{codecs::lines::LinesCodec, session::SessionReader, FeedbackLine},
};

/// Drains the receiving half of the session into a [`FeedbackBuffer`].
pub struct FeedbackCollector {
    reader: SessionReader,
    codec: LinesCodec,
    buffer: Arc<FeedbackBuffer>,
    backoff: Duration,
}

impl FeedbackCollector {
    /// Collect from `reader` into `buffer`.
    pub fn new(reader: SessionReader, buffer: Arc<FeedbackBuffer>, config: &FeedbackConfig) -> Self {
        Self {
            reader,
            codec: LinesCodec::with_max_length(config.max_line_length),
            buffer,
            backoff: config.poll_interval(),
        }
    }

    /// Run until the task is aborted.
    ///
    /// Errors never stop collection. A port which keeps failing is retried
    /// at the poll interval.
    pub async fn run(mut self) {
        let mut accumulated = BytesMut::with_capacity(256);
        let mut healthy = true;

        loop {
            match self.reader.read(&mut accumulated).await {
                Ok(0) => {
                    if healthy {
                        warn!("Serial port reached end of stream");
                        healthy = false;
                    }
                    tokio::time::sleep(self.backoff).await;
                }
                Ok(n) => {
                    trace!("Read {n} byte(s)");
                    healthy = true;
                    self.drain(&mut accumulated);
                }
                Err(e) => {
                    if healthy {
                        warn!(?e, "Serial port read problem");
                        healthy = false;
                    } else {
                        trace!(?e, "Serial port read problem");
                    }
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    /// Move every complete line into the buffer.
    /// A partial line stays in `accumulated`.
    fn drain(&mut self, accumulated: &mut BytesMut) {
        loop {
            match self.codec.decode(accumulated) {
                Ok(Some(bytes)) => {
                    if let Some(line) = FeedbackLine::from_wire(&bytes) {
                        debug!(%line, "Feedback");
                        self.buffer.push(line);
                    }
                }
                Ok(None) => break,
                Err(e) => warn!(%e, "Discarding input"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio::{io::AsyncWriteExt, time::timeout};

    use super::*;
    use crate::serial::session::SerialSession;

    async fn wait_for(buffer: &FeedbackBuffer, appended: u64) {
        timeout(Duration::from_secs(5), async {
            while buffer.appended() < appended {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("Lines should arrive");
    }

    fn texts(buffer: &FeedbackBuffer) -> Vec<String> {
        buffer
            .snapshot()
            .iter()
            .map(|line| line.as_str().to_owned())
            .collect()
    }

    fn start(config: &FeedbackConfig) -> (Arc<FeedbackBuffer>, tokio::io::DuplexStream, tokio::task::JoinHandle<()>) {
        let (device_side, wire) = tokio::io::duplex(1024);
        let (reader, _writer) = SerialSession::from_transport("mock", 115_200, 1, device_side).into_split();

        let buffer = Arc::new(FeedbackBuffer::new(config.capacity));
        let handle = tokio::spawn(FeedbackCollector::new(reader, buffer.clone(), config).run());

        (buffer, wire, handle)
    }

    #[tokio::test]
    async fn lines_are_trimmed_and_blank_lines_skipped() {
        let (buffer, mut wire, _handle) = start(&FeedbackConfig::default());

        wire.write_all(b"  Fan A: 5\r\n\r\n\nFan B: stop\n").await.unwrap();
        wait_for(&buffer, 2).await;

        assert_eq!(texts(&buffer), vec!["Fan A: 5", "Fan B: stop"]);
    }

    #[tokio::test]
    async fn partial_line_waits_for_the_rest() {
        let (buffer, mut wire, _handle) = start(&FeedbackConfig::default());

        wire.write_all(b"first\nsec").await.unwrap();
        wait_for(&buffer, 1).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(texts(&buffer), vec!["first"]);

        wire.write_all(b"ond\n").await.unwrap();
        wait_for(&buffer, 2).await;

        assert_eq!(texts(&buffer), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn bad_input_does_not_stop_collection() {
        let config = FeedbackConfig {
            max_line_length: 16,
            ..Default::default()
        };
        let (buffer, mut wire, handle) = start(&config);

        wire.write_all(b"\xff\xfe\n").await.unwrap();
        wire.write_all(&[b'x'; 64]).await.unwrap();
        wire.write_all(b"\nstill alive\n").await.unwrap();

        timeout(Duration::from_secs(5), async {
            while buffer.latest().map(|line| line.as_str() == "still alive") != Some(true) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("Collector should keep going");

        assert!(!handle.is_finished());
    }

    #[tokio::test]
    async fn end_of_stream_does_not_stop_collection() {
        let (buffer, mut wire, handle) = start(&FeedbackConfig::default());

        wire.write_all(b"last words\n").await.unwrap();
        wait_for(&buffer, 1).await;

        drop(wire);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_finished());
        assert_eq!(texts(&buffer), vec!["last words"]);

        handle.abort();
    }
}
