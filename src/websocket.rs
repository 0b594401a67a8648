use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension, TypedHeader,
};
use futures::{sink::Sink, stream::Stream, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::{
    actions::{CommandReply, Response},
    bridge::BridgeHandle,
    serial::FeedbackLine,
};

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(bridge): Extension<BridgeHandle>,
) -> impl IntoResponse {
    if let Some(TypedHeader(user_agent)) = user_agent {
        info!("`{}`@`{addr}` connected", user_agent.as_str());
    } else {
        info!("`{addr}` connected");
    }

    ws.on_upgrade(move |socket| {
        let span = info_span!("User", user = %addr);

        handle_websocket(socket, bridge).instrument(span)
    })
}

/// Each text message is a command in wire form.
async fn read<S>(mut receiver: S, sender: mpsc::UnboundedSender<CommandReply>, bridge: BridgeHandle)
where
    S: Unpin,
    S: Stream<Item = Result<Message, axum::Error>>,
{
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(request_text) => {
                trace!(%request_text, "Command request");

                let reply = CommandReply::from(bridge.submit_text(&request_text).await);

                if sender.send(reply).is_err() {
                    debug!("Writer gone");
                    break;
                }
            }
            Message::Binary(_) => {
                debug!("client sent binary data");
            }
            Message::Ping(_) => {
                debug!("socket ping");
            }
            Message::Pong(_) => {
                debug!("socket pong");
            }
            Message::Close(_) => {
                debug!("client disconnected");
            }
        }
    }

    debug!("no more stuff");
}

/// Replies to this client, interleaved with feedback lines.
///
/// Feedback is only pulled when the client has taken the previous message,
/// so a slow client skips lines instead of queueing them.
async fn write<F>(
    mut sender: impl Sink<Message> + Unpin,
    mut replies: mpsc::UnboundedReceiver<CommandReply>,
    feedback: F,
) where
    F: Stream<Item = FeedbackLine>,
{
    tokio::pin!(feedback);

    loop {
        let response = tokio::select! {
            Some(reply) = replies.recv() => Response::from(reply),
            Some(line) = feedback.next() => Response::from(line),
            else => break,
        };

        trace!(?response, "Sending");

        if sender.send(Message::Text(response.serialize())).await.is_err() {
            debug!("client disconnected");
            return;
        }
    }
}

async fn handle_websocket(websocket: WebSocket, bridge: BridgeHandle) {
    let (stream_sender, stream_receiver) = websocket.split();
    let (reply_sender, reply_receiver) = mpsc::unbounded_channel();

    let read_handle = tokio::spawn(
        read(stream_receiver, reply_sender, bridge.clone()).instrument(info_span!("Read")),
    );
    let write_handle = tokio::spawn(
        write(stream_sender, reply_receiver, bridge.subscribe()).instrument(info_span!("Write")),
    );

    match read_handle.await {
        Ok(()) => debug!("Read task joined"),
        Err(e) => warn!("Read task join error: {e:?}"),
    }

    debug!("Aborting write task");
    // This ensures the underlying TCP connection gets closed,
    // which signals the peer that the session is over.
    write_handle.abort();
}
