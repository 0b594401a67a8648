#![allow(dead_code)]

use std::time::Duration;

use axum::http::StatusCode;
use color_eyre::{eyre::eyre, Result};
use fan_bridge::{
    actions::Response, bridge::Bridge, config::Config, logging, mock,
    serial::session::SerialSession, server,
};
use futures::StreamExt;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    net::TcpStream,
    sync::oneshot,
    time::timeout,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, Level};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A server whose serial port is a pipe the test holds the other end of.
pub struct TestServer {
    pub port: u16,
    pub wire: DuplexStream,
    pub bridge: Bridge,
}

async fn serve(bridge: &Bridge) -> Result<u16> {
    logging::init(Level::INFO, None).await;

    let (port_tx, port_rx) = oneshot::channel();
    let handle = bridge.handle();

    tokio::spawn(async move { server::run_any_port(Config::default(), handle, port_tx).await });

    Ok(port_rx.await?)
}

pub async fn start() -> Result<TestServer> {
    let (device_side, wire) = tokio::io::duplex(1024);
    let session = SerialSession::from_transport("test", 115_200, 1, device_side);
    let bridge = Bridge::start(session, &Config::default());

    let port = serve(&bridge).await?;
    info!("Test server on port {port}");

    Ok(TestServer { port, wire, bridge })
}

/// A server talking to the mock controller.
pub async fn start_mock() -> Result<(u16, Bridge)> {
    let bridge = Bridge::start(mock::mock_session(115_200), &Config::default());
    let port = serve(&bridge).await?;

    Ok((port, bridge))
}

/// A plain HTTP/1.1 GET, returning the status code and body.
pub async fn get(port: u16, path: &str) -> Result<(u16, String)> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes())
        .await?;

    let mut response = vec![];
    timeout(Duration::from_secs(5), stream.read_to_end(&mut response)).await??;

    let response = String::from_utf8(response)?;
    let (head, body) = response
        .split_once("\r\n\r\n")
        .ok_or_else(|| eyre!("No end of headers in {response:?}"))?;
    let status = head
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| eyre!("No status in {head:?}"))?
        .parse()?;

    Ok((status, body.to_owned()))
}

/// Like [`get`], but the body is parsed as json.
pub async fn get_json(port: u16, path: &str) -> Result<(u16, serde_json::Value)> {
    let (status, body) = get(port, path).await?;

    Ok((status, serde_json::from_str(&body)?))
}

/// Open the event stream, returning once the headers are in.
pub async fn open_stream(port: u16) -> Result<TcpStream> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    stream
        .write_all(b"GET /stream HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await?;

    let head = read_until(&mut stream, "\r\n\r\n").await?;
    if !head.contains("text/event-stream") {
        return Err(eyre!("Not an event stream: {head:?}"));
    }

    Ok(stream)
}

/// Read from the stream until `needle` has been seen, returning all text read.
pub async fn read_until(stream: &mut TcpStream, needle: &str) -> Result<String> {
    read_until_any(stream, &[needle]).await
}

/// Read from the stream until any of `needles` has been seen, returning all text read.
pub async fn read_until_any(stream: &mut TcpStream, needles: &[&str]) -> Result<String> {
    let mut seen = String::new();
    let mut chunk = [0u8; 512];

    timeout(Duration::from_secs(5), async {
        while !needles.iter().any(|needle| seen.contains(needle)) {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(eyre!("Stream ended, got {seen:?}"));
            }
            seen.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
        Ok(())
    })
    .await??;

    Ok(seen)
}

/// Read from the event stream until an event carrying `data` arrives.
///
/// A single space after the field colon is optional in event streams,
/// so both forms are accepted.
pub async fn read_event(stream: &mut TcpStream, data: &str) -> Result<String> {
    let compact = format!("data:{data}\n");
    let spaced = format!("data: {data}\n");

    read_until_any(stream, &[compact.as_str(), spaced.as_str()]).await
}

/// What the server put on the serial port.
pub async fn expect_on_wire(wire: &mut DuplexStream, expected: &[u8]) -> Result<()> {
    let mut received = vec![0u8; expected.len()];
    timeout(Duration::from_secs(5), wire.read_exact(&mut received)).await??;

    assert_eq!(received, expected);

    Ok(())
}

pub async fn connect(port: u16) -> Result<Client> {
    let (stream, http_response) =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws")).await?;

    assert_eq!(http_response.status(), StatusCode::SWITCHING_PROTOCOLS);

    Ok(stream)
}

pub async fn receive(client: &mut Client) -> Result<Response> {
    let response = timeout(Duration::from_secs(5), client.next())
        .await?
        .ok_or_else(|| eyre!("Stream closed"))??;

    let response = response.to_text()?;
    let response = serde_json::from_str(response)?;

    Ok(response)
}
