use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use grid_chase_server::autopilot::Autopilot;
use grid_chase_server::config::MatchConfig;
use grid_chase_server::constants::TICK_MS;
use grid_chase_server::engine::MatchSession;
use grid_chase_server::grid::GridDefinition;
use grid_chase_server::logging::{emit_log, iso_timestamp, now_ms, LogContext, LogLevel};
use grid_chase_server::maps;
use grid_chase_server::rng::Rng;
use grid_chase_server::server_protocol::{parse_client_message, ParsedClientMessage};
use grid_chase_server::types::ActorId;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tower_http::services::{ServeDir, ServeFile};

const CONTROLLER_TAKEN_CLOSE_CODE: u16 = 4001;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Local presentation bridge for a grid chase match")]
struct Cli {
    /// Built-in map name or path to a JSON grid definition. `MAP_PATH` wins.
    #[arg(long)]
    map: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u32>,
}

#[derive(Clone)]
struct ClientContext {
    id: String,
    tx: mpsc::Sender<OutboundMessage>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    controller: Option<ClientContext>,
    session: MatchSession,
    autopilots: [Option<Autopilot>; 2],
    seat_rng: Rng,
    summary_sent: bool,
    log: LogContext,
}

impl ServerState {
    fn new(session: MatchSession) -> Self {
        let seed = session.seed();
        let mut seat_rng = Rng::new(seed);
        let autopilots = [
            Some(Autopilot::new(ActorId::A, seat_rng.next_u32())),
            Some(Autopilot::new(ActorId::B, seat_rng.next_u32())),
        ];
        let log = LogContext::new(format!("server-{seed}")).with_seed(seed);
        Self {
            controller: None,
            session,
            autopilots,
            seat_rng,
            summary_sent: false,
            log,
        }
    }

    fn autopilot_flags(&self) -> [bool; 2] {
        [self.autopilots[0].is_some(), self.autopilots[1].is_some()]
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let session = match build_session(&cli) {
        Ok(session) => session,
        Err(message) => {
            eprintln!("[server] {message}");
            std::process::exit(2);
        }
    };
    let state = Arc::new(Mutex::new(ServerState::new(session)));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/maps", get(maps_handler))
        .route("/ws", get(ws_handler))
        .with_state(state.clone());

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found. set STATIC_DIR to serve a client.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("[server] failed to bind {bind_addr}: {error}");
            std::process::exit(2);
        }
    };

    {
        let guard = state.lock().await;
        emit_log(
            &guard.log,
            LogLevel::Info,
            "server_started",
            None,
            json!({
                "port": port,
                "map": guard.session.grid().definition().name,
            }),
        );
    }
    println!("[server] listening on :{port}");
    if let Err(error) = axum::serve(listener, app).await {
        eprintln!("[server] server runtime failed: {error}");
        std::process::exit(1);
    }
}

fn build_session(cli: &Cli) -> Result<MatchSession, String> {
    let config = match cli.config.as_deref() {
        Some(path) => MatchConfig::load(path).map_err(|error| error.to_string())?,
        None => MatchConfig::default(),
    };
    let definition = resolve_definition(cli).map_err(|error| error.to_string())?;
    let seed = cli.seed.unwrap_or_else(rand::random::<u32>);
    MatchSession::new(definition, config, ["Player A", "Player B"], seed)
        .map_err(|error| error.to_string())
}

fn resolve_definition(cli: &Cli) -> Result<GridDefinition, maps::MapError> {
    if let Ok(raw) = std::env::var("MAP_PATH") {
        return maps::load_file(&PathBuf::from(raw));
    }
    maps::resolve(cli.map.as_deref().unwrap_or(maps::DEFAULT_MAP))
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }
    let candidate = PathBuf::from("client");
    candidate.join("index.html").is_file().then_some(candidate)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn maps_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(json!({
        "maps": maps::names(),
        "active": guard.session.grid().definition().name,
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    let accepted = {
        let mut guard = state.lock().await;
        claim_controller(
            &mut guard,
            ClientContext {
                id: client_id.clone(),
                tx: tx.clone(),
            },
        )
    };
    if !accepted {
        let _ = tx
            .send(OutboundMessage::Close {
                code: CONTROLLER_TAKEN_CLOSE_CODE,
                reason: "controller already connected".to_string(),
            })
            .await;
        drop(tx);
        let _ = writer.await;
        return;
    }

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                let mut guard = state.lock().await;
                handle_client_message(&mut guard, &client_id, raw.as_str());
            }
            Message::Binary(raw) => {
                let mut guard = state.lock().await;
                match std::str::from_utf8(&raw) {
                    Ok(text) => handle_client_message(&mut guard, &client_id, text),
                    Err(_) => send_error(&mut guard, "invalid utf8 message"),
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        release_controller(&mut guard, &client_id);
    }
    drop(tx);
    let _ = writer.await;
}

/// Seats the client as the controller and sends `welcome` plus the current
/// state. Refused while another controller is connected.
fn claim_controller(state: &mut ServerState, client: ClientContext) -> bool {
    if state.controller.is_some() {
        emit_log(
            &state.log,
            LogLevel::Warn,
            "controller_rejected",
            Some(state.session.tick()),
            json!({ "clientId": client.id }),
        );
        return false;
    }
    emit_log(
        &state.log,
        LogLevel::Info,
        "controller_connected",
        Some(state.session.tick()),
        json!({ "clientId": client.id }),
    );
    state.controller = Some(client);

    let welcome = build_welcome(state);
    send_to_controller(state, &welcome, QueuePolicy::DisconnectOnFull);
    let snapshot = state.session.build_snapshot(false);
    send_to_controller(
        state,
        &json!({ "type": "state", "snapshot": snapshot }),
        QueuePolicy::DropOnFull,
    );
    true
}

fn release_controller(state: &mut ServerState, client_id: &str) {
    let is_controller = state
        .controller
        .as_ref()
        .is_some_and(|client| client.id == client_id);
    if !is_controller {
        return;
    }
    state.controller = None;
    emit_log(
        &state.log,
        LogLevel::Info,
        "controller_disconnected",
        Some(state.session.tick()),
        json!({ "clientId": client_id }),
    );
}

fn build_welcome(state: &ServerState) -> Value {
    let definition = state.session.grid().definition();
    let corners: Vec<[i32; 2]> = definition
        .corners()
        .iter()
        .map(|corner| [corner.x, corner.y])
        .collect();
    json!({
        "type": "welcome",
        "tickMs": TICK_MS,
        "seed": state.session.seed(),
        "map": {
            "name": definition.name,
            "width": definition.width(),
            "height": definition.height(),
            "cells": definition.to_matrix(),
            "corners": corners,
        },
        "config": state.session.config(),
        "autopilot": state.autopilot_flags(),
    })
}

fn handle_client_message(state: &mut ServerState, client_id: &str, raw: &str) {
    let is_controller = state
        .controller
        .as_ref()
        .is_some_and(|client| client.id == client_id);
    if !is_controller {
        return;
    }
    let Some(message) = parse_client_message(raw) else {
        send_error(state, "invalid message");
        return;
    };

    match message {
        ParsedClientMessage::Input { actor, dir } => {
            state.session.set_intent(actor, dir);
        }
        ParsedClientMessage::Start => {
            if !state.session.start() {
                send_error(state, "match already started");
            }
        }
        ParsedClientMessage::Restart => {
            state.session.restart();
            state.summary_sent = false;
        }
        ParsedClientMessage::Autopilot { actor, enabled } => {
            let seat = &mut state.autopilots[actor.index()];
            if !enabled {
                *seat = None;
            } else if seat.is_none() {
                *seat = Some(Autopilot::new(actor, state.seat_rng.next_u32()));
            }
        }
        ParsedClientMessage::Ping { t } => {
            send_to_controller(
                state,
                &json!({
                    "type": "pong",
                    "t": t,
                    "serverTime": now_ms(),
                }),
                QueuePolicy::DropOnFull,
            );
        }
    }
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        let mut last_tick = Instant::now();
        loop {
            interval.tick().await;
            let now = Instant::now();
            let elapsed_ms = now.duration_since(last_tick).as_millis() as u64;
            if elapsed_ms == 0 {
                continue;
            }
            last_tick += Duration::from_millis(elapsed_ms);
            let mut guard = state.lock().await;
            tick_session(&mut guard, elapsed_ms);
        }
    });
}

fn tick_session(state: &mut ServerState, elapsed_ms: u64) {
    for pilot in state.autopilots.iter_mut().flatten() {
        if let Some(dir) = pilot.decide(&state.session) {
            state.session.set_intent(pilot.actor(), dir);
        }
    }
    state.session.step(elapsed_ms);

    let snapshot = state.session.build_snapshot(true);
    send_to_controller(
        state,
        &json!({ "type": "state", "snapshot": snapshot }),
        QueuePolicy::DropOnFull,
    );

    if state.summary_sent {
        return;
    }
    let Some(summary) = state.session.build_summary() else {
        return;
    };
    state.summary_sent = true;
    emit_log(
        &state.log,
        LogLevel::Info,
        "match_finished",
        Some(state.session.tick()),
        json!({
            "winner": summary.winner,
            "rounds": summary.rounds.len(),
            "totalTicks": summary.total_ticks,
        }),
    );
    send_to_controller(
        state,
        &json!({
            "type": "match_complete",
            "summary": summary,
            "finishedAtIso": iso_timestamp(now_ms()),
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn send_to_controller(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let Some(client) = state.controller.as_ref() else {
        return;
    };
    let send_failed = client
        .tx
        .try_send(OutboundMessage::Text(message.to_string()))
        .is_err();
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        let client_id = client.id.clone();
        release_controller(state, &client_id);
    }
}

fn send_error(state: &mut ServerState, message: &str) {
    send_to_controller(
        state,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_chase_server::types::{Direction, Phase};

    fn make_state() -> ServerState {
        let definition = maps::builtin("open")
            .expect("open exists")
            .expect("open is valid");
        let config = MatchConfig {
            countdown_ms: 100,
            round_pause_ms: 100,
            ..MatchConfig::default()
        };
        let session =
            MatchSession::new(definition, config, ["A", "B"], 5).expect("valid config");
        ServerState::new(session)
    }

    fn connect(state: &mut ServerState, id: &str) -> (bool, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let accepted = claim_controller(
            state,
            ClientContext {
                id: id.to_string(),
                tx,
            },
        );
        (accepted, rx)
    }

    fn send(state: &mut ServerState, raw: &str) {
        handle_client_message(state, "client_1", raw);
    }

    fn drain_types(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(OutboundMessage::Text(payload)) = rx.try_recv() {
            let value: Value = serde_json::from_str(&payload).expect("outbound json");
            types.push(value["type"].as_str().unwrap_or_default().to_string());
        }
        types
    }

    #[test]
    fn first_client_gets_welcome_and_state() {
        let mut state = make_state();
        let (accepted, mut rx) = connect(&mut state, "client_1");
        assert!(accepted);
        assert_eq!(drain_types(&mut rx), vec!["welcome", "state"]);
    }

    #[test]
    fn second_controller_is_refused_until_release() {
        let mut state = make_state();
        let (first, _rx1) = connect(&mut state, "client_1");
        let (second, _rx2) = connect(&mut state, "client_2");
        assert!(first);
        assert!(!second);

        release_controller(&mut state, "client_2");
        assert!(state.controller.is_some());
        release_controller(&mut state, "client_1");
        let (third, _rx3) = connect(&mut state, "client_3");
        assert!(third);
    }

    #[test]
    fn welcome_describes_map_and_seats() {
        let state = make_state();
        let welcome = build_welcome(&state);
        assert_eq!(welcome["map"]["name"], "open");
        assert_eq!(welcome["map"]["width"], 9);
        assert_eq!(welcome["map"]["cells"].as_array().map(Vec::len), Some(7));
        assert_eq!(welcome["autopilot"], json!([true, true]));
        assert_eq!(welcome["config"]["countdownMs"], 100);
    }

    #[test]
    fn commands_drive_the_session() {
        let mut state = make_state();
        let (_, mut rx) = connect(&mut state, "client_1");
        drain_types(&mut rx);

        send(&mut state, r#"{"type":"autopilot","actor":"a","enabled":false}"#);
        assert_eq!(state.autopilot_flags(), [false, true]);

        send(&mut state, r#"{"type":"start"}"#);
        assert_eq!(state.session.phase(), Phase::Countdown);
        send(&mut state, r#"{"type":"input","actor":"a","dir":"up"}"#);
        assert_eq!(state.session.actor(ActorId::A).intent, Direction::Up);

        send(&mut state, r#"{"type":"start"}"#);
        send(&mut state, "garbage");
        assert_eq!(drain_types(&mut rx), vec!["error", "error"]);

        send(&mut state, r#"{"type":"restart"}"#);
        assert_eq!(state.session.phase(), Phase::Initial);
    }

    #[test]
    fn messages_from_non_controllers_are_ignored() {
        let mut state = make_state();
        let (_, _rx) = connect(&mut state, "client_1");
        handle_client_message(&mut state, "client_9", r#"{"type":"start"}"#);
        assert_eq!(state.session.phase(), Phase::Initial);
    }

    #[test]
    fn tick_streams_state_and_reports_completion_once() {
        // Two open cells beside a lone pickup: moving A right either eats the
        // pickup or runs into B, so round one always ends the match.
        let definition =
            GridDefinition::from_digit_rows("corridor", &["11111", "10021", "11111"])
                .expect("valid grid");
        let config = MatchConfig {
            countdown_ms: 100,
            round_pause_ms: 100,
            win_score: 1,
            ..MatchConfig::default()
        };
        let session =
            MatchSession::new(definition, config, ["A", "B"], 11).expect("valid config");
        let mut state = ServerState::new(session);
        let (_, mut rx) = connect(&mut state, "client_1");
        drain_types(&mut rx);
        send(&mut state, r#"{"type":"autopilot","actor":"a","enabled":false}"#);
        send(&mut state, r#"{"type":"autopilot","actor":"b","enabled":false}"#);
        send(&mut state, r#"{"type":"start"}"#);
        send(&mut state, r#"{"type":"input","actor":"a","dir":"right"}"#);

        let mut saw_complete = 0;
        for _ in 0..400 {
            tick_session(&mut state, TICK_MS);
            saw_complete += drain_types(&mut rx)
                .into_iter()
                .filter(|kind| kind == "match_complete")
                .count();
            if state.session.is_complete() {
                break;
            }
        }
        assert!(state.session.is_complete());
        assert_eq!(saw_complete, 1);

        tick_session(&mut state, TICK_MS);
        let repeats = drain_types(&mut rx)
            .into_iter()
            .filter(|kind| kind == "match_complete")
            .count();
        assert_eq!(repeats, 0);
    }
}
