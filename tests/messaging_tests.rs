//! `/api/whatsapp`: session lifecycle, reports and the gateway webhook.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{free_addr, setup_may_runtime, FakeClient, Script, TestServer, FAKE_PHONE, FAKE_QR};
use computer_store::app::{self, AppState};
use computer_store::config::AppConfig;
use computer_store::messaging::{ConnectionStatus, MessagingClient};
use computer_store::server::ServerHandle;
use serde_json::json;

fn wait_for_status(server: &TestServer, expected: &str) {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let status = server.get("/api/whatsapp/status").json()["data"]["status"].clone();
        if status == expected {
            return;
        }
        assert!(Instant::now() < deadline, "status stuck at {status}");
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn initial_status() {
    let server = TestServer::start(Script::Pairing);
    let res = server.get("/api/whatsapp/status");
    assert_eq!(res.status, 200);
    let data = &res.json()["data"];
    assert_eq!(data["status"], "disconnected");
    assert_eq!(data["isReady"], false);
    assert_eq!(data["hasQRCode"], false);
    assert_eq!(data["autoStartEnabled"], true);
    assert!(data["phoneNumber"].is_null());
}

#[test]
fn pairing_flow_exposes_the_qr_code() {
    let server = TestServer::start(Script::Pairing);

    let none = server.get("/api/whatsapp/qr").json();
    assert_eq!(none["success"], false);
    assert_eq!(
        none["message"],
        "No QR code available. Please start the WhatsApp client first."
    );
    assert_eq!(none["data"]["status"], "disconnected");

    let started = server.post_json("/api/whatsapp/start", &json!({}));
    assert_eq!(started.status, 200);
    let body = started.json();
    assert_eq!(body["message"], "WhatsApp client started");
    assert_eq!(body["status"], "qr_ready");

    let qr = server.get("/api/whatsapp/qr").json();
    assert_eq!(qr["success"], true);
    assert_eq!(qr["data"]["qrCode"], FAKE_QR);
    assert_eq!(qr["data"]["instructions"].as_array().unwrap().len(), 5);

    let text = server.get("/api/whatsapp/qr/terminal");
    assert_eq!(text.status, 200);
    assert!(text.header("content-type").unwrap().starts_with("text/plain"));
    assert!(text.body.contains(FAKE_QR));
}

#[test]
fn webhook_drives_the_connection() {
    let server = TestServer::start(Script::Pairing);
    server.post_json("/api/whatsapp/start", &json!({}));
    assert_eq!(server.get("/api/whatsapp/health").status, 503);

    let res = server.post_json(
        "/api/whatsapp/webhook",
        &json!({
            "event": "CONNECTION_UPDATE",
            "instance": "computer-store-whatsapp",
            "data": {"state": "open", "wuid": format!("{FAKE_PHONE}@s.whatsapp.net")}
        }),
    );
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["handled"], 2);

    let status = server.get("/api/whatsapp/status").json();
    assert_eq!(status["data"]["status"], "connected");
    assert_eq!(status["data"]["isReady"], true);
    assert_eq!(status["data"]["hasQRCode"], false);
    assert_eq!(status["data"]["phoneNumber"], FAKE_PHONE);

    let health = server.get("/api/whatsapp/health");
    assert_eq!(health.status, 200);
    assert_eq!(health.json()["data"]["service"], "whatsapp");

    let terminal = server.get("/api/whatsapp/status/terminal");
    assert!(terminal.body.contains("Status: connected"), "{}", terminal.body);
    assert!(terminal.body.contains(FAKE_PHONE));
    assert!(terminal
        .body
        .contains("/api/whatsapp/send-message"));
}

#[test]
fn send_and_check_require_fields() {
    let server = TestServer::start(Script::Ready);
    server.post_json("/api/whatsapp/start", &json!({}));

    let res = server.post_json("/api/whatsapp/send-message", &json!({"to": "+94771234567"}));
    assert_eq!(res.status, 400);
    assert_eq!(res.json()["error"], "Phone number and message are required");

    let res = server.post_json("/api/whatsapp/check-number", &json!({}));
    assert_eq!(res.status, 400);
    assert_eq!(res.json()["error"], "Phone number is required");
}

#[test]
fn send_check_and_list_chats_when_ready() {
    let server = TestServer::start(Script::Ready);
    server.post_json("/api/whatsapp/start", &json!({}));

    let res = server.post_json(
        "/api/whatsapp/send-message",
        &json!({"to": "+94771234567", "message": "Your order has shipped"}),
    );
    assert_eq!(res.status, 200);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert!(body["messageId"].as_str().unwrap().contains("94771234567@c.us"));
    assert_eq!(
        server.client.sent(),
        vec![("94771234567@c.us".to_string(), "Your order has shipped".to_string())]
    );

    let check = server
        .post_json("/api/whatsapp/check-number", &json!({"number": "+14155550100"}))
        .json();
    assert_eq!(check["data"]["number"], "+14155550100");
    assert_eq!(check["data"]["isRegistered"], false);

    let chats = server.get("/api/whatsapp/chats").json();
    assert_eq!(chats["data"]["count"], 2);
    assert_eq!(chats["data"]["chats"][0]["unreadCount"], 2);
    assert_eq!(chats["data"]["chats"][1]["isGroup"], true);

    let text = server.get("/api/whatsapp/chats/terminal");
    assert_eq!(text.status, 200);
    assert!(text.body.contains("Total Chats: 2"), "{}", text.body);
}

#[test]
fn not_ready_errors() {
    let server = TestServer::start(Script::Pairing);
    let res = server.post_json(
        "/api/whatsapp/send-message",
        &json!({"to": "+94771234567", "message": "hi"}),
    );
    assert_eq!(res.status, 500);
    let body = res.json();
    assert_eq!(body["error"], "WhatsApp client is not ready");
    assert!(body["timestamp"].is_string());

    let text = server.get("/api/whatsapp/chats/terminal");
    assert_eq!(text.status, 500);
    assert_eq!(text.body, "❌ Error: WhatsApp client is not ready");
}

#[test]
fn stop_resets_the_session() {
    let server = TestServer::start(Script::Ready);
    let res = server.post_json("/api/whatsapp/stop", &json!({}));
    assert_eq!(
        res.json(),
        json!({"success": false, "message": "No client to stop"})
    );

    server.post_json("/api/whatsapp/start", &json!({}));
    let res = server.post_json("/api/whatsapp/stop", &json!({}));
    assert_eq!(
        res.json(),
        json!({"success": true, "message": "WhatsApp client stopped"})
    );
    assert_eq!(*server.client.destroyed.lock().unwrap(), 1);

    let data = server.get("/api/whatsapp/status").json()["data"].clone();
    assert_eq!(data["status"], "disconnected");
    assert_eq!(data["isReady"], false);
    assert!(data["phoneNumber"].is_null());
}

#[test]
fn auto_start_toggle_and_idempotence() {
    let server = TestServer::start(Script::Ready);

    let res = server.post_json("/api/whatsapp/auto-start/disable", &json!({}));
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["autoStartEnabled"], false);
    assert_eq!(
        server.get("/api/whatsapp/status").json()["data"]["autoStartEnabled"],
        false
    );

    let res = server.post_json("/api/whatsapp/auto-start/sometimes", &json!({}));
    assert_eq!(res.status, 400);
    assert_eq!(res.json()["error"], "Invalid action. Use \"enable\" or \"disable\"");

    server.post_json("/api/whatsapp/auto-start/enable", &json!({}));
    let first = server.post_json("/api/whatsapp/auto-start", &json!({})).json();
    assert_eq!(first["success"], true);
    assert_eq!(first["status"], "connected");
    let second = server.post_json("/api/whatsapp/auto-start", &json!({})).json();
    assert_eq!(
        second,
        json!({"success": true, "message": "Already connected", "status": "connected"})
    );
}

#[test]
fn broken_gateway_is_reported() {
    let server = TestServer::start(Script::Broken);
    let res = server.post_json("/api/whatsapp/start", &json!({}));
    assert_eq!(res.status, 500);
    let body = res.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(
        server.get("/api/whatsapp/status").json()["data"]["status"],
        "error"
    );

    let auto = server.post_json("/api/whatsapp/auto-start", &json!({}));
    assert_eq!(auto.status, 200);
    assert_eq!(auto.json()["success"], false);
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(20));
    }
}

fn close_connection(server: &TestServer) {
    let res = server.post_json(
        "/api/whatsapp/webhook",
        &json!({"event": "connection.update", "data": {"state": "close", "statusReason": 428}}),
    );
    assert_eq!(res.status, 200);
}

#[test]
fn disconnect_triggers_reconnect() {
    let server = TestServer::start_with(Script::Ready, |config| {
        config.messaging.reconnect_delay_secs = 0;
    });
    server.post_json("/api/whatsapp/start", &json!({}));
    wait_for_status(&server, "connected");
    assert_eq!(server.client.initialized(), 1);

    close_connection(&server);
    wait_until("a second initialize", || server.client.initialized() == 2);
    wait_for_status(&server, "connected");
}

#[test]
fn disconnect_without_auto_start_stays_down() {
    let server = TestServer::start_with(Script::Ready, |config| {
        config.messaging.reconnect_delay_secs = 0;
    });
    server.post_json("/api/whatsapp/start", &json!({}));
    wait_for_status(&server, "connected");
    server.post_json("/api/whatsapp/auto-start/disable", &json!({}));

    close_connection(&server);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(server.client.initialized(), 1);
    let data = server.get("/api/whatsapp/status").json()["data"].clone();
    assert_eq!(data["status"], "disconnected");
    assert_eq!(data["isReady"], false);
}

#[test]
fn manual_stop_does_not_reconnect() {
    let server = TestServer::start_with(Script::Ready, |config| {
        config.messaging.reconnect_delay_secs = 0;
    });
    server
        .client
        .disconnect_on_destroy
        .store(true, std::sync::atomic::Ordering::SeqCst);
    server.post_json("/api/whatsapp/start", &json!({}));
    wait_for_status(&server, "connected");

    let res = server.post_json("/api/whatsapp/stop", &json!({}));
    assert_eq!(res.json()["success"], true);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(*server.client.destroyed.lock().unwrap(), 1);
    assert_eq!(server.client.initialized(), 1);
    assert_eq!(server.get("/api/whatsapp/status").json()["data"]["status"], "disconnected");
}

fn boot(auto_start: bool) -> (AppState, Arc<FakeClient>, ServerHandle) {
    setup_may_runtime();
    let mut config = AppConfig::defaults();
    config.spec_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("doc/openapi.yaml");
    config.static_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("target/no-storefront");
    config.http.addr = free_addr().to_string();
    config.messaging.auto_start = auto_start;
    config.messaging.startup_delay_ms = 50;

    let client = FakeClient::new(Script::Ready);
    let state = AppState::new(config, Arc::clone(&client) as Arc<dyn MessagingClient>);
    let handle = app::start(&state).unwrap();
    handle.wait_ready().unwrap();
    (state, client, handle)
}

#[test]
fn startup_schedules_one_auto_start() {
    let (state, client, handle) = boot(true);
    wait_until("the startup auto-start", || {
        state.messaging.status().status == ConnectionStatus::Connected
    });
    thread::sleep(Duration::from_millis(100));
    assert_eq!(client.initialized(), 1);
    handle.stop();
}

#[test]
fn startup_auto_start_can_be_disabled() {
    let (state, client, handle) = boot(false);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(client.initialized(), 0);
    assert_eq!(state.messaging.status().status, ConnectionStatus::Disconnected);
    // Reconnects stay enabled; only the boot call is skipped.
    assert!(state.messaging.auto_start_enabled());
    handle.stop();
}

#[test]
fn logged_out_session_is_an_auth_failure() {
    let server = TestServer::start(Script::Pairing);
    server.post_json("/api/whatsapp/start", &json!({}));
    server.post_json(
        "/api/whatsapp/webhook",
        &json!({"event": "connection.update", "data": {"state": "close", "statusReason": 401}}),
    );
    let data = server.get("/api/whatsapp/status").json()["data"].clone();
    assert_eq!(data["status"], "auth_failed");
    assert_eq!(data["isReady"], false);
}
