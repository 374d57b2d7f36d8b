//! Integration tests for `TelegramSink` against a mock Bot API server.
//!
//! ```bash
//! cargo test -p herald-notifier --test integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use herald_common::types::{DeliveryResult, ReviewAttempt};
use herald_notifier::{FormatHint, NotificationSink, TelegramSink, format_notification};

const TOKEN: &str = "123456-secret-bot-token";

// ============================================================
// Helpers
// ============================================================

type Bodies = Arc<Mutex<Vec<Value>>>;

async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn send_path() -> String {
    format!("/bot{}/sendMessage", TOKEN)
}

fn sink_for(addr: SocketAddr, chat_id: &str) -> TelegramSink {
    TelegramSink::new(&format!("http://{}", addr), TOKEN, chat_id).unwrap()
}

/// Accepts plain text, rejects anything with a `parse_mode`, and bounces chat "blocked".
async fn bot_api(State(bodies): State<Bodies>, Json(body): Json<Value>) -> impl IntoResponse {
    bodies.lock().unwrap().push(body.clone());

    if body["chat_id"] == "blocked" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"})),
        );
    }
    if body.get("parse_mode").is_some() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: can't parse entities: unexpected end tag"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"ok": true, "result": {"message_id": 1}})),
    )
}

async fn mock_bot() -> (SocketAddr, Bodies) {
    let bodies: Bodies = Arc::default();
    let router = Router::new()
        .route(&send_path(), post(bot_api))
        .with_state(bodies.clone());
    (spawn_server(router).await, bodies)
}

// ============================================================
// Delivery
// ============================================================

#[tokio::test]
async fn test_delivers_formatted_review() {
    let (addr, bodies) = mock_bot().await;
    let sink = sink_for(addr, "42");

    let text = format_notification(&ReviewAttempt::new("OOP", true));
    let result = sink.send(&text).await;
    assert_eq!(result, DeliveryResult::Delivered);

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["chat_id"], "42");
    assert_eq!(bodies[0]["text"], text);
    assert!(bodies[0].get("parse_mode").is_none());
}

#[tokio::test]
async fn test_rejection_is_failed_without_token() {
    let (addr, _) = mock_bot().await;
    let sink = sink_for(addr, "blocked");

    match sink.send("hello").await {
        DeliveryResult::Failed { detail } => {
            assert!(detail.contains("403"), "detail: {}", detail);
            assert!(detail.contains("blocked"), "detail: {}", detail);
            assert!(!detail.contains("secret-bot-token"), "detail leaks token: {}", detail);
        }
        DeliveryResult::Delivered => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_markup_rejection_falls_back_to_plain_text() {
    let (addr, bodies) = mock_bot().await;
    let sink = sink_for(addr, "42").with_format(FormatHint::Html);

    assert_eq!(sink.send("<b>broken").await, DeliveryResult::Delivered);

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["parse_mode"], "HTML");
    assert!(bodies[1].get("parse_mode").is_none());
    assert_eq!(bodies[1]["text"], "<b>broken");
}

#[tokio::test]
async fn test_unreachable_api_is_failed_without_token() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = sink_for(addr, "42");
    match sink.send("hello").await {
        DeliveryResult::Failed { detail } => {
            assert!(!detail.contains("secret-bot-token"), "detail leaks token: {}", detail);
        }
        DeliveryResult::Delivered => panic!("expected failure"),
    }
}
