use futures::stream::SplitSink;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use tracing::info;
use tracing::warn;
use warp::ws::Message;
use warp::ws::WebSocket;

use crate::FailoverEvent;
use crate::InboundCommand;
use crate::TestOrchestrator;

/// Bridge one WebSocket client to the orchestrator: every event goes out,
/// `test:start` / `test:stop` come in
pub(crate) async fn client_connected(
    websocket: WebSocket,
    orchestrator: TestOrchestrator,
) {
    info!("websocket client connected");
    let (mut outbound, mut inbound) = websocket.split();
    let mut events = BroadcastStream::new(orchestrator.subscribe());

    if send_event(&mut outbound, &orchestrator.connection_status()).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if send_event(&mut outbound, &event).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!("websocket client lagging, {} events skipped", skipped);
                }
                None => break,
            },
            message = inbound.next() => match message {
                Some(Ok(message)) => {
                    if message.is_close() {
                        break;
                    }
                    handle_message(&orchestrator, &message);
                }
                Some(Err(e)) => {
                    debug!("websocket receive failed: {}", e);
                    break;
                }
                None => break,
            },
        }
    }
    info!("websocket client disconnected");
}

fn handle_message(
    orchestrator: &TestOrchestrator,
    message: &Message,
) {
    let Ok(text) = message.to_str() else {
        return;
    };
    match serde_json::from_str::<InboundCommand>(text) {
        Ok(InboundCommand::Start(request)) => {
            let orchestrator = orchestrator.clone();
            // The outcome, including failures, reaches clients as events
            tokio::spawn(async move {
                if let Err(e) = orchestrator.start_test(request).await {
                    debug!("test start failed: {}", e);
                }
            });
        }
        Ok(InboundCommand::Stop) => {
            orchestrator.stop_test();
        }
        Err(e) => warn!("ignoring malformed websocket command: {}", e),
    }
}

async fn send_event(
    outbound: &mut SplitSink<WebSocket, Message>,
    event: &FailoverEvent,
) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("could not encode {} event: {}", event.name(), e);
            return Ok(());
        }
    };
    outbound.send(Message::text(text)).await.map_err(|e| {
        debug!("websocket send failed: {}", e);
    })
}
