//! WebSocket upgrade bridge over a real listener.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use site_adapter::websocket::{SendStatus, WebSocketHandler};
use site_adapter::NotFoundRenderer;

mod common;

const WAIT: Duration = Duration::from_secs(3);

async fn next_message<S>(ws: &mut S) -> Message
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("read failed")
}

async fn next_text<S>(ws: &mut S) -> String
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        if let Message::Text(text) = next_message(ws).await {
            return text.as_str().to_string();
        }
    }
}

async fn upgrade_status(url: String) -> u16 {
    match connect_async(url).await {
        Ok(_) => panic!("upgrade unexpectedly accepted"),
        Err(WsError::Http(response)) => response.status().as_u16(),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn without_handler_upgrade_falls_through_to_404() {
    let bundle = common::bundle();
    let config = common::websocket_config(|_| {});
    let running = common::start(config, bundle.path(), Arc::new(NotFoundRenderer), None).await;

    let status = upgrade_status(format!("ws://{}/ws", running.addr)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn rejected_upgrade_runs_dispatch_chain() {
    let bundle = common::bundle();
    let renderer = common::RecordingRenderer::new();
    let handler: Arc<dyn WebSocketHandler> = common::EchoHandler::new();
    let config = common::websocket_config(|_| {});
    let running = common::start(config, bundle.path(), renderer.clone(), Some(handler)).await;

    let status = upgrade_status(format!("ws://{}/other", running.addr)).await;

    assert_eq!(status, 200);
    assert_eq!(renderer.calls(), 1);
    assert!(renderer.seen().unwrap().websocket);
}

#[tokio::test]
async fn missing_decision_callback_denies_unless_opted_in() {
    let bundle = common::bundle();
    let handler: Arc<dyn WebSocketHandler> = Arc::new(common::SilentHandler);

    let config = common::websocket_config(|_| {});
    let running = common::start(config, bundle.path(), Arc::new(NotFoundRenderer), Some(handler.clone())).await;
    let status = upgrade_status(format!("ws://{}/ws", running.addr)).await;
    assert_eq!(status, 404);

    let config = common::websocket_config(|c| c.websocket.accept_without_decision = true);
    let running = common::start(config, bundle.path(), Arc::new(NotFoundRenderer), Some(handler)).await;
    let (mut ws, response) = connect_async(format!("ws://{}/ws", running.addr)).await.unwrap();
    assert_eq!(response.status().as_u16(), 101);
    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn handler_errors_do_not_close_the_connection() {
    let bundle = common::bundle();
    let handler = common::EchoHandler::new();
    let config = common::websocket_config(|_| {});
    let running = common::start(
        config,
        bundle.path(),
        Arc::new(NotFoundRenderer),
        Some(handler.clone() as Arc<dyn WebSocketHandler>),
    )
    .await;

    let (mut ws, _) = connect_async(format!("ws://{}/chat", running.addr)).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "welcome:/chat");

    ws.send(Message::Text("fail".into())).await.unwrap();
    ws.send(Message::Text("panic".into())).await.unwrap();
    ws.send(Message::Text("still here".into())).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "echo:still here");

    ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
    match next_message(&mut ws).await {
        Message::Binary(bytes) => assert_eq!(&bytes[..], &[1u8, 2, 3][..]),
        other => panic!("expected binary echo, got {other:?}"),
    }
    assert!(handler.closes().is_empty());
}

#[tokio::test]
async fn client_close_reaches_close_callback() {
    let bundle = common::bundle();
    let handler = common::EchoHandler::new();
    let config = common::websocket_config(|c| c.websocket.path = Some("/ws".to_string()));
    let running = common::start(
        config,
        bundle.path(),
        Arc::new(NotFoundRenderer),
        Some(handler.clone() as Arc<dyn WebSocketHandler>),
    )
    .await;

    let (mut ws, _) = connect_async(format!("ws://{}/ws", running.addr)).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "welcome:/ws");

    ws.close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "done".into(),
    }))
    .await
    .unwrap();

    tokio::time::timeout(WAIT, handler.wait_closed()).await.unwrap();
    assert_eq!(handler.closes(), vec![1000]);
}

#[tokio::test]
async fn shutdown_closes_connections_with_going_away() {
    let bundle = common::bundle();
    let handler = common::EchoHandler::new();
    let config = common::websocket_config(|_| {});
    let running = common::start(
        config,
        bundle.path(),
        Arc::new(NotFoundRenderer),
        Some(handler.clone() as Arc<dyn WebSocketHandler>),
    )
    .await;

    let (mut ws, _) = connect_async(format!("ws://{}/ws", running.addr)).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "welcome:/ws");

    running.shutdown.trigger();

    match next_message(&mut ws).await {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1001),
        other => panic!("expected close frame, got {other:?}"),
    }

    tokio::time::timeout(WAIT, handler.wait_closed()).await.unwrap();
    assert_eq!(handler.closes(), vec![1001]);

    tokio::time::timeout(WAIT, running.handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn oversized_send_reports_backpressure_then_drains_once() {
    let bundle = common::bundle();
    let handler = common::FloodHandler::new(64);
    let config = common::websocket_config(|c| c.websocket.max_backpressure = 16);
    let running = common::start(
        config,
        bundle.path(),
        Arc::new(NotFoundRenderer),
        Some(handler.clone() as Arc<dyn WebSocketHandler>),
    )
    .await;

    let (mut ws, _) = connect_async(format!("ws://{}/ws", running.addr)).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "x".repeat(64));
    assert_eq!(next_text(&mut ws).await, "drained");

    assert_eq!(handler.open_status(), Some(SendStatus::Backpressure));
    assert_eq!(handler.drains(), 1);

    ws.close(None).await.unwrap();
}
