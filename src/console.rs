//! Control the fans from a terminal.
//!
//! Every character typed is a key, sent on enter.
//! `q` quits.

use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::{bridge::BridgeHandle, error::Error};

const HELP: &str = "Keys: 0-9 speed, f full, s stop, q quit";

/// Run until `q` or until input ends, reading stdin and printing to stdout.
pub async fn run(bridge: BridgeHandle, channel: Option<String>) -> Result<(), Error> {
    let input = tokio::io::BufReader::new(tokio::io::stdin());

    run_with(bridge, channel, input, tokio::io::stdout()).await
}

/// Like [`run`], but with any input and output.
pub async fn run_with<R, W>(
    bridge: BridgeHandle,
    channel: Option<String>,
    input: R,
    mut output: W,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut feedback = Box::pin(bridge.subscribe());

    output.write_all(format!("{HELP}\n").as_bytes()).await?;
    if let Some(channel) = &channel {
        output
            .write_all(format!("Sending to fan {}\n", channel.to_uppercase()).as_bytes())
            .await?;
    }
    output.flush().await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Input closed");
                    break;
                };

                for key in line.chars().filter(|c| !c.is_whitespace()) {
                    if key.eq_ignore_ascii_case(&'q') {
                        output.write_all(b"Bye!\n").await?;
                        output.flush().await?;
                        return Ok(());
                    }

                    let text = match bridge.submit(channel.as_deref(), &key.to_string()).await {
                        Ok(command) => format!("-> {command}\n"),
                        Err(rejection) => format!("!! {rejection}\n"),
                    };
                    output.write_all(text.as_bytes()).await?;
                }
                output.flush().await?;
            }
            Some(line) = feedback.next() => {
                output.write_all(format!("<- {line}\n").as_bytes()).await?;
                output.flush().await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::{io::AsyncReadExt, time::timeout};

    use super::*;
    use crate::{bridge::Bridge, config::Config, serial::session::SerialSession};

    #[tokio::test]
    async fn keys_are_sent_until_quit() {
        let (device_side, mut wire) = tokio::io::duplex(1024);
        let bridge = Bridge::start(
            SerialSession::from_transport("mock", 115_200, 1, device_side),
            &Config::default(),
        );

        let input: &[u8] = b"5 f\nx\nq\n7\n";
        let mut output = vec![];

        timeout(
            Duration::from_secs(5),
            run_with(bridge.handle(), Some("b".into()), input, &mut output),
        )
        .await
        .unwrap()
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("-> b5"), "{output}");
        assert!(output.contains("-> bf"), "{output}");
        assert!(output.contains("!! The key `x`"), "{output}");
        assert!(output.ends_with("Bye!\n"), "{output}");

        bridge.shutdown().await;

        let mut sent = vec![];
        wire.read_to_end(&mut sent).await.unwrap();
        assert_eq!(sent, b"b5bf");
    }

    #[tokio::test]
    async fn input_ending_is_not_an_error() {
        let (device_side, _wire) = tokio::io::duplex(1024);
        let bridge = Bridge::start(
            SerialSession::from_transport("mock", 115_200, 1, device_side),
            &Config::default(),
        );

        let input: &[u8] = b"s";
        let mut output = vec![];

        timeout(
            Duration::from_secs(5),
            run_with(bridge.handle(), None, input, &mut output),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(String::from_utf8(output).unwrap().contains("-> s"));
    }
}
