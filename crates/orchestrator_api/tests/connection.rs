use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use orchestrator_api::{
    ConnectionEvent, ConnectionManager, ConnectionState, ReconnectPolicy,
};
use orchestrator_protocol::{InboundEvent, OutboundEvent};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

fn allow_local_integration() -> bool {
    std::env::var("ORCHESTRATOR_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy::new(
        max_attempts,
        Duration::from_millis(10),
        Duration::from_millis(40),
    )
}

/// Accepts one websocket, writes `frames`, then echoes the first client text
/// frame back through the returned handle.
async fn scripted_server(frames: Vec<&'static str>) -> (String, JoinHandle<Option<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("local TCP listener should bind");
    let addr = listener.local_addr().expect("listener address");
    let url = format!("ws://{addr}/ws/agents");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.ok()?;
        let mut socket = accept_async(stream).await.ok()?;
        for frame in frames {
            socket.send(Message::Text(frame.to_string())).await.ok()?;
        }
        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                if !text.contains("\"ping\"") {
                    return Some(text);
                }
            }
        }
        None
    });

    (url, handle)
}

async fn next_event(events: &mut UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event should arrive in time")
        .expect("event channel should stay open")
}

async fn next_inbound(events: &mut UnboundedReceiver<ConnectionEvent>) -> InboundEvent {
    loop {
        if let ConnectionEvent::Inbound(event) = next_event(events).await {
            return event;
        }
    }
}

async fn wait_for_state(
    events: &mut UnboundedReceiver<ConnectionEvent>,
    state: ConnectionState,
) -> orchestrator_api::ConnectionStatus {
    loop {
        if let ConnectionEvent::Status(status) = next_event(events).await {
            if status.state == state {
                return status;
            }
        }
    }
}

#[tokio::test]
async fn connection_forwards_valid_frames_and_drops_malformed_ones() {
    if !allow_local_integration() {
        return;
    }

    let (url, server) = scripted_server(vec![
        r#"{"type":"agent_start","agent":"Senior Dev"}"#,
        "this is not json",
        r#"{"type":"no_such_event"}"#,
        r#"{"type":"message","agent":"Senior Dev","content":"hello"}"#,
    ])
    .await;

    let (mut manager, mut events) = ConnectionManager::connect_to(url, fast_policy(5), None);
    wait_for_state(&mut events, ConnectionState::Connected).await;

    assert_eq!(
        next_inbound(&mut events).await,
        InboundEvent::AgentStart {
            agent: "Senior Dev".to_string()
        }
    );
    assert_eq!(
        next_inbound(&mut events).await,
        InboundEvent::Message {
            agent: "Senior Dev".to_string(),
            content: "hello".to_string(),
        }
    );

    assert!(manager.send(&OutboundEvent::Stop));
    let echoed = timeout(Duration::from_secs(5), server)
        .await
        .expect("server should finish")
        .expect("server task should not panic");
    assert_eq!(echoed.as_deref(), Some(r#"{"type":"stop"}"#));

    manager.disconnect();
    assert!(manager.status().terminal);
    timeout(Duration::from_secs(5), manager.closed())
        .await
        .expect("channel task should stop after disconnect");
}

#[tokio::test]
async fn connection_gives_up_after_bounded_attempts() {
    if !allow_local_integration() {
        return;
    }

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("local TCP listener should bind");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);

    let (manager, mut events) =
        ConnectionManager::connect_to(format!("ws://{addr}/ws/agents"), fast_policy(3), None);

    let mut reconnect_attempts = Vec::new();
    let final_status = loop {
        match next_event(&mut events).await {
            ConnectionEvent::Status(status) if status.terminal => break status,
            ConnectionEvent::Status(status) if status.state == ConnectionState::Disconnected => {
                reconnect_attempts.push(status.attempts)
            }
            _ => {}
        }
    };

    assert_eq!(reconnect_attempts, vec![1, 2, 3]);
    assert_eq!(final_status.state, ConnectionState::Disconnected);
    assert_eq!(final_status.attempts, 3);
    assert!(!manager.send(&OutboundEvent::Ping));
}

#[tokio::test]
async fn send_while_disconnected_is_dropped() {
    if !allow_local_integration() {
        return;
    }

    let (url, _server) = scripted_server(Vec::new()).await;
    let (mut manager, mut events) = ConnectionManager::connect_to(url, fast_policy(5), None);
    wait_for_state(&mut events, ConnectionState::Connected).await;

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(!manager.send(&OutboundEvent::Research {
        query: "anything".to_string()
    }));
}

#[tokio::test]
async fn disconnect_during_backoff_stops_without_waiting_out_the_delay() {
    if !allow_local_integration() {
        return;
    }

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("local TCP listener should bind");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);

    let slow = ReconnectPolicy::new(3, Duration::from_secs(30), Duration::from_secs(30));
    let (mut manager, mut events) =
        ConnectionManager::connect_to(format!("ws://{addr}/ws/agents"), slow, None);

    let waiting = wait_for_state(&mut events, ConnectionState::Disconnected).await;
    assert_eq!(waiting.attempts, 1);
    assert!(!waiting.terminal);

    manager.disconnect();
    timeout(Duration::from_secs(2), manager.closed())
        .await
        .expect("channel task should stop before the backoff delay elapses");

    let status = manager.status();
    assert!(status.terminal);
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.attempts, 3);
}
