//! Server integration tests: the HTTP surface and a full WebSocket flow.

use castellan::game::pieces;
use castellan::room::{ConnectionRegistry, RoomManager};
use ct_server::api::{self, AppState};
use rand::SeedableRng;
use rand::rngs::StdRng;
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

/// A seed whose opening deal has no weak hand, so a started room lands in
/// DECLARATION with the host (seat 0, the starter) to act.
fn strong_seed() -> u64 {
    (0..20_000)
        .find(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            pieces::deal_hands(&mut rng)
                .iter()
                .all(|h| !pieces::is_weak_hand(h, pieces::DEFAULT_WEAK_HAND_THRESHOLD))
        })
        .expect("a strong opening deal exists")
}

fn test_room_config() -> castellan::room::RoomConfig {
    castellan::room::RoomConfig {
        rng_seed: Some(strong_seed()),
        bot_decision_delay_ms: 10,
        turn_results_auto_advance_ms: 50,
        ..Default::default()
    }
}

fn test_state() -> AppState {
    let rooms = Arc::new(RoomManager::new(test_room_config()));
    let connections = Arc::new(ConnectionRegistry::new());
    AppState::new(rooms, connections)
}

/// Spawn the router on an ephemeral port and return its address.
async fn spawn_server() -> SocketAddr {
    let app = api::create_router(test_state());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ============================================================================
// HTTP surface
// ============================================================================

#[tokio::test]
async fn health_check_reports_rooms_and_connections() {
    let app = api::create_router(test_state());
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["rooms"], json!(0));
    assert_eq!(health["connections"], json!(0));
}

#[tokio::test]
async fn ws_route_rejects_plain_http() {
    let app = api::create_router(test_state());
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/ws")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // No upgrade headers: not a WebSocket handshake.
    assert_ne!(response.status(), axum::http::StatusCode::OK);
}

// ============================================================================
// WebSocket flow over a live socket
// ============================================================================

struct WsClient {
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

impl WsClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (stream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("websocket handshake");
        Self { stream }
    }

    async fn send(&mut self, frame: Value) {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(
                tokio::time::Duration::from_secs(5),
                self.stream.next(),
            )
            .await
            .expect("frame within deadline")
            .expect("stream open")
            .expect("no transport error");
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn recv_event(&mut self, event: &str) -> Value {
        loop {
            let frame = self.recv().await;
            if frame["event"] == event {
                return frame;
            }
        }
    }

    async fn recv_until_phase(&mut self, phase: &str) -> Value {
        loop {
            let frame = self.recv().await;
            if frame["event"] == "phase_change" && frame["data"]["phase"] == phase {
                return frame;
            }
        }
    }
}

#[tokio::test]
async fn ping_pong_round_trip() {
    let addr = spawn_server().await;
    let mut client = WsClient::connect(addr).await;

    client.send(json!({"event": "ping"})).await;
    let pong = client.recv().await;
    assert_eq!(pong["event"], "pong");
}

#[tokio::test]
async fn create_room_list_and_join_flow() {
    let addr = spawn_server().await;

    let mut host = WsClient::connect(addr).await;
    host.send(json!({
        "event": "create_room",
        "data": {"player_name": "alice", "avatar_color": "teal"},
    }))
    .await;
    let created = host.recv_event("room_created").await;
    let room_id = created["data"]["room_id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["seat_position"], json!(0));

    // The lobby player object is the canonical wire shape.
    let players = &created["data"]["room"]["players"];
    assert_eq!(players.as_array().unwrap().len(), 4);
    assert_eq!(players[0]["player_id"], json!(format!("{room_id}_p0")));
    assert_eq!(players[0]["name"], "alice");
    assert_eq!(players[0]["seat_position"], json!(0));
    assert_eq!(players[0]["avatar_color"], "teal");
    assert!(players[1].is_null());

    // The directory lists the room.
    let mut visitor = WsClient::connect(addr).await;
    visitor.send(json!({"event": "get_rooms"})).await;
    let listing = visitor.recv_event("room_list_update").await;
    assert_eq!(listing["data"]["rooms"][0]["room_id"], json!(room_id.clone()));

    // Joining an unknown room answers room_not_found on this channel only.
    visitor
        .send(json!({
            "event": "join_room",
            "data": {"room_id": "nope", "player_name": "bob"},
        }))
        .await;
    let missing = visitor.recv_event("room_not_found").await;
    assert_eq!(missing["data"]["room_id"], "nope");

    // Joining the real room succeeds; 1-based slot_id is normalized.
    visitor
        .send(json!({
            "event": "join_room",
            "data": {"room_id": room_id, "player_name": "bob", "slot_id": 3},
        }))
        .await;
    let joined = visitor.recv_event("room_joined").await;
    assert_eq!(joined["data"]["seat_position"], json!(2));

    // The host sees the join as a broadcast.
    let update = host.recv_event("phase_change").await;
    assert_eq!(update["data"]["phase"], "waiting");
}

#[tokio::test]
async fn leave_room_goes_through_the_directory_not_the_game() {
    let addr = spawn_server().await;

    let mut host = WsClient::connect(addr).await;
    host.send(json!({
        "event": "create_room",
        "data": {"player_name": "alice"},
    }))
    .await;
    let created = host.recv_event("room_created").await;
    let room_id = created["data"]["room_id"].as_str().unwrap().to_string();

    let mut bob = WsClient::connect(addr).await;
    bob.send(json!({
        "event": "join_room",
        "data": {"room_id": room_id.clone(), "player_name": "bob"},
    }))
    .await;
    let joined = bob.recv_event("room_joined").await;
    let bob_seat = joined["data"]["seat_position"].as_u64().unwrap();

    // Bob leaves via the lobby verb: the seat is vacated, no game action.
    bob.send(json!({"event": "leave_room", "data": {}})).await;
    let left = bob.recv_event("room_update").await;
    assert_eq!(left["data"]["room_id"], json!(room_id.clone()));
    assert_eq!(left["data"]["left"], json!(true));

    // The host sees the departure and the slot opens up again.
    let update = host
        .recv_event("phase_change")
        .await;
    assert_eq!(update["data"]["phase"], "waiting");
    host.send(json!({"event": "get_rooms"})).await;
    let listing = host.recv_event("room_list_update").await;
    assert_eq!(listing["data"]["rooms"][0]["occupied_slots"], json!(1));
    assert!(listing["data"]["rooms"][0]["players"][bob_seat as usize].is_null());

    // Bob's channel no longer routes in-room actions.
    bob.send(json!({"event": "declare", "data": {"value": 3}}))
        .await;
    let err = bob.recv_event("error").await;
    assert_eq!(err["data"]["type"], "NOT_FOUND");

    // The last player leaving retires the room entirely.
    host.send(json!({"event": "leave_room", "data": {}})).await;
    host.recv_event("room_update").await;
    let mut visitor = WsClient::connect(addr).await;
    visitor.send(json!({"event": "get_rooms"})).await;
    let listing = visitor.recv_event("room_list_update").await;
    assert!(listing["data"]["rooms"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn a_round_with_three_bots_plays_over_the_wire() {
    let addr = spawn_server().await;

    let mut host = WsClient::connect(addr).await;
    host.send(json!({
        "event": "create_room",
        "data": {"player_name": "alice"},
    }))
    .await;
    host.recv_event("room_created").await;

    for _ in 0..3 {
        host.send(json!({"event": "add_bot", "data": {}})).await;
        host.recv_event("room_update").await;
    }

    host.send(json!({"event": "start_game", "data": {}, "request_id": "s1"}))
        .await;
    host.recv_event("game_started").await;

    // The deal is strong by seeding, so the room sits in DECLARATION with
    // the host to act. The snapshot carries the host's private hand; the
    // bots expose only hand sizes.
    host.send(json!({"event": "get_room_state", "data": {}})).await;
    let snapshot = host.recv_event("phase_change").await;
    assert_eq!(snapshot["data"]["phase"], "declaration");
    assert!(snapshot["version"].as_u64().unwrap() >= 1);
    assert!(snapshot["checksum"].is_string());
    let hand = snapshot["data"]["players"][0]["hand"].as_array().unwrap();
    assert_eq!(hand.len(), 8);
    assert_eq!(snapshot["data"]["players"][1]["hand_size"], json!(8));
    assert!(snapshot["data"]["players"][1].get("hand").is_none());

    // The host declares; the bots answer on their own and TURN opens.
    host.send(json!({"event": "declare", "data": {"value": 2}, "request_id": "d1"}))
        .await;
    host.recv_event("declare").await;
    host.recv_until_phase("turn").await;

    // The host leads one piece; the bots follow and the pile resolves.
    host.send(json!({"event": "play", "data": {"indices": [0]}, "request_id": "p1"}))
        .await;
    host.recv_event("play").await;
    let results = host.recv_until_phase("turn_results").await;
    assert!(results["data"]["phase_data"]["turn_winner"].is_u64());
    let captured: u64 = (0..4)
        .map(|i| results["data"]["players"][i]["captured"].as_u64().unwrap())
        .sum();
    assert_eq!(captured, 1);
}

#[tokio::test]
async fn malformed_and_unknown_frames_error_only_this_channel() {
    let addr = spawn_server().await;
    let mut client = WsClient::connect(addr).await;

    client
        .send(json!({"event": "warp_drive", "data": {}}))
        .await;
    let err = client.recv_event("error").await;
    assert_eq!(err["data"]["type"], "VALIDATION");

    // Raw garbage is also a validation error, not a closed socket.
    client
        .stream
        .send(Message::Text("not json".to_string().into()))
        .await
        .unwrap();
    let err = client.recv_event("error").await;
    assert_eq!(err["data"]["type"], "VALIDATION");

    // The channel is still usable afterwards.
    client.send(json!({"event": "ping"})).await;
    assert_eq!(client.recv().await["event"], "pong");
}

#[tokio::test]
async fn in_room_actions_require_a_seat() {
    let addr = spawn_server().await;
    let mut client = WsClient::connect(addr).await;

    client
        .send(json!({"event": "declare", "data": {"value": 3}}))
        .await;
    let err = client.recv_event("error").await;
    assert_eq!(err["data"]["type"], "NOT_FOUND");
}
