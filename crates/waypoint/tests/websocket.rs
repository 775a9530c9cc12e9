//! End-to-end tests: real WebSocket clients against both tiers.
//!
//! A Lobby and a Game Server are bound to OS-assigned ports and share
//! in-memory stores, the way a single-process deployment would run them.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use waypoint::prelude::*;
use waypoint_protocol::ConnectionInstructions;
use waypoint_transport::CLOSE_POLICY_VIOLATION;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Helpers
// =========================================================================

/// Starts both tiers and returns the Lobby's address.
async fn start_cluster() -> String {
    let secret = ClaimTokenSecret::generate();
    let reconnections = InMemoryPendingReconnectionStore::new();
    let game_sessions = InMemoryGameSessionStore::new();

    let game_server = GameServer::builder(reconnections.clone(), game_sessions.clone(), secret.clone())
        .name("gs-e2e")
        .build();
    let game_server = WaypointServer::bind("127.0.0.1:0", game_server)
        .await
        .expect("game server should bind");
    let game_server_url = format!("ws://{}", game_server.local_addr().expect("local addr"));

    let lobby = Lobby::builder(InMemoryIdentityProvider::new(), reconnections, game_sessions, secret)
        .game_server(GameServerAddress::new("gs-e2e", game_server_url))
        .build();
    let lobby = WaypointServer::bind("127.0.0.1:0", lobby)
        .await
        .expect("lobby should bind");
    let lobby_addr = lobby.local_addr().expect("local addr").to_string();

    tokio::spawn(async move {
        let _ = game_server.run().await;
    });
    tokio::spawn(async move {
        let _ = lobby.run().await;
    });

    // Give the accept loops a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    lobby_addr
}

async fn connect(url: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("should connect");
    ws
}

async fn connect_with_claim(instructions: &ConnectionInstructions) -> ClientWs {
    connect(&format!(
        "{}/?session_claim_token={}",
        instructions.url, instructions.encrypted_session_claim_token
    ))
    .await
}

async fn send(ws: &mut ClientWs, message: ClientMessage) {
    let json = serde_json::to_string(&message).expect("encode");
    ws.send(Message::text(json)).await.expect("send");
}

/// Reads server messages until one matches `pick`.
async fn wait_for<T>(ws: &mut ClientWs, mut pick: impl FnMut(ServerMessage) -> Option<T>) -> T {
    let read = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let message: ServerMessage =
                        serde_json::from_str(text.as_str()).expect("decode server message");
                    if let Some(found) = pick(message) {
                        return found;
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended while waiting: {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), read)
        .await
        .expect("timed out waiting for server message")
}

async fn wait_for_instructions(ws: &mut ClientWs) -> ConnectionInstructions {
    wait_for(ws, |m| match m {
        ServerMessage::GameServerConnectionInstructions {
            connection_instructions,
        } => Some(connection_instructions),
        _ => None,
    })
    .await
}

async fn wait_for_game_started(ws: &mut ClientWs) -> u64 {
    wait_for(ws, |m| match m {
        ServerMessage::GameStarted { time_started } => Some(time_started),
        _ => None,
    })
    .await
}

/// Two guests meet in the Lobby and ready up. Returns their instructions.
async fn form_game(lobby_addr: &str) -> (ConnectionInstructions, ConnectionInstructions) {
    let url = format!("ws://{lobby_addr}");
    let mut host = connect(&url).await;
    let mut joiner = connect(&url).await;

    send(&mut host, ClientMessage::CreateGame { game_name: GameName::new("Harbor") }).await;
    wait_for(&mut host, |m| matches!(m, ServerMessage::GameFullUpdate { game: Some(_) }).then_some(())).await;
    send(&mut joiner, ClientMessage::JoinGame { game_name: GameName::new("Harbor") }).await;
    wait_for(&mut joiner, |m| matches!(m, ServerMessage::GameFullUpdate { game: Some(_) }).then_some(())).await;

    send(&mut host, ClientMessage::ToggleReadyToStartGame).await;
    send(&mut joiner, ClientMessage::ToggleReadyToStartGame).await;

    let host_instructions = wait_for_instructions(&mut host).await;
    let joiner_instructions = wait_for_instructions(&mut joiner).await;
    (host_instructions, joiner_instructions)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_lobby_to_game_server_full_flow() {
    let lobby_addr = start_cluster().await;
    let (host_instructions, joiner_instructions) = form_game(&lobby_addr).await;
    assert_eq!(host_instructions.url, joiner_instructions.url);

    let mut host = connect_with_claim(&host_instructions).await;
    let mut joiner = connect_with_claim(&joiner_instructions).await;

    let started_for_host = wait_for_game_started(&mut host).await;
    let started_for_joiner = wait_for_game_started(&mut joiner).await;
    assert_eq!(started_for_host, started_for_joiner);

    send(&mut joiner, ClientMessage::AttemptGameplayAction { action: "raise anchor".into() }).await;
    let action = wait_for(&mut host, |m| match m {
        ServerMessage::PlayerTookAction { action, .. } => Some(action),
        _ => None,
    })
    .await;
    assert_eq!(action, "raise anchor");
}

#[tokio::test]
async fn test_replayed_claim_token_closes_with_policy_violation() {
    let lobby_addr = start_cluster().await;
    let (host_instructions, _) = form_game(&lobby_addr).await;

    let mut first = connect_with_claim(&host_instructions).await;
    wait_for(&mut first, |m| matches!(m, ServerMessage::ClientUsername { .. }).then_some(())).await;

    let mut replay = connect_with_claim(&host_instructions).await;
    let frame = tokio::time::timeout(Duration::from_secs(2), replay.next())
        .await
        .expect("server should answer the replay");
    match frame {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), CLOSE_POLICY_VIOLATION);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_frame_answered_with_error_message() {
    let lobby_addr = start_cluster().await;
    let mut client = connect(&format!("ws://{lobby_addr}")).await;
    wait_for(&mut client, |m| matches!(m, ServerMessage::ClientUsername { .. }).then_some(())).await;

    client.send(Message::text("not json")).await.expect("send");
    let error = wait_for(&mut client, |m| match m {
        ServerMessage::ErrorMessage { message } => Some(message),
        _ => None,
    })
    .await;
    assert_eq!(error, "Invalid message");

    send(&mut client, ClientMessage::CreateGame { game_name: GameName::new("Afterwards") }).await;
    let snapshot = wait_for(&mut client, |m| match m {
        ServerMessage::GameFullUpdate { game } => game,
        _ => None,
    })
    .await;
    assert_eq!(snapshot.name.as_str(), "Afterwards");
}
