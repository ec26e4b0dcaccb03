//! Shared fixtures: a scripted messaging client, a server on an ephemeral
//! port and a minimal HTTP/1.1 client over `TcpStream`.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use computer_store::app::{build_service, AppState};
use computer_store::config::AppConfig;
use computer_store::messaging::{
    Chat, ChatMessage, ClientEvent, EventSink, MessagingClient, SentMessage,
};
use computer_store::server::{HttpServer, ServerHandle};
use computer_store::spec::load_spec;
use computer_store::MessagingError;
use serde_json::Value;

static MAY_INIT: Once = Once::new();

/// Configure the coroutine stack once per test binary.
pub fn setup_may_runtime() {
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
    });
}

/// What the fake client does when initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Emits a QR code and waits for pairing
    Pairing,
    /// Authenticates and becomes ready immediately
    Ready,
    /// Fails to initialize
    Broken,
}

pub const FAKE_QR: &str = "2@fake-qr-payload";
pub const FAKE_PHONE: &str = "94770000000";

/// In-process stand-in for the gateway.
pub struct FakeClient {
    script: Script,
    sink: Mutex<Option<EventSink>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub destroyed: Mutex<usize>,
    pub initialized: Mutex<usize>,
    /// Report a disconnect from inside `destroy`, like a real session logout
    pub disconnect_on_destroy: AtomicBool,
}

impl FakeClient {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            sink: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            destroyed: Mutex::new(0),
            initialized: Mutex::new(0),
            disconnect_on_destroy: AtomicBool::new(false),
        })
    }

    /// Push an event as if the gateway had reported it.
    pub fn emit(&self, event: ClientEvent) {
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// How many times the service called `initialize`.
    pub fn initialized(&self) -> usize {
        *self.initialized.lock().unwrap()
    }
}

impl MessagingClient for FakeClient {
    fn initialize(&self, sink: EventSink) -> Result<(), MessagingError> {
        *self.initialized.lock().unwrap() += 1;
        *self.sink.lock().unwrap() = Some(Arc::clone(&sink));
        match self.script {
            Script::Pairing => sink(ClientEvent::Qr(FAKE_QR.to_string())),
            Script::Ready => {
                sink(ClientEvent::Authenticated);
                sink(ClientEvent::Ready {
                    phone: Some(FAKE_PHONE.to_string()),
                });
            }
            Script::Broken => {
                return Err(MessagingError::Transport("connection refused".into()))
            }
        }
        Ok(())
    }

    fn destroy(&self) -> Result<(), MessagingError> {
        *self.destroyed.lock().unwrap() += 1;
        if self.disconnect_on_destroy.load(Ordering::SeqCst) {
            self.emit(ClientEvent::Disconnected("LOGOUT".into()));
        }
        Ok(())
    }

    fn send_text(&self, chat_id: &str, text: &str) -> Result<SentMessage, MessagingError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id.to_string(), text.to_string()));
        Ok(SentMessage {
            id: format!("true_{chat_id}_MSG{}", sent.len()),
        })
    }

    fn is_registered(&self, chat_id: &str) -> Result<bool, MessagingError> {
        Ok(chat_id.starts_with("94"))
    }

    fn chats(&self) -> Result<Vec<Chat>, MessagingError> {
        Ok(vec![
            Chat {
                id: "94771111111@c.us".into(),
                name: Some("Store Owner".into()),
                is_group: false,
                unread_count: 2,
                last_message: Some(ChatMessage {
                    body: "New order received".into(),
                    timestamp: 1_700_000_000,
                }),
            },
            Chat {
                id: "120363000000@g.us".into(),
                name: None,
                is_group: true,
                unread_count: 0,
                last_message: None,
            },
        ])
    }
}

/// A running store with its own state. Stopped on drop.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: Arc<FakeClient>,
    handle: Option<ServerHandle>,
}

impl TestServer {
    pub fn start(script: Script) -> Self {
        Self::start_with(script, |_| {})
    }

    /// Start with a tweaked configuration. The storefront directory does not
    /// exist unless `tweak` points `static_dir` somewhere.
    pub fn start_with(script: Script, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        setup_may_runtime();
        let mut config = AppConfig::defaults();
        config.spec_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("doc/openapi.yaml");
        config.static_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("target/no-storefront");
        config.messaging.auto_start = false;
        tweak(&mut config);

        let client = FakeClient::new(script);
        let state = AppState::new(config, Arc::clone(&client) as Arc<dyn MessagingClient>);
        let spec = load_spec(&state.config.spec_path).unwrap();
        let service = build_service(&state, spec).unwrap();

        let addr = free_addr();
        let handle = HttpServer(service).start(addr).unwrap();
        handle.wait_ready().unwrap();
        Self {
            addr,
            state,
            client,
            handle: Some(handle),
        }
    }

    pub fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, &[], None)
    }

    pub fn post_json(&self, path: &str, body: &Value) -> TestResponse {
        self.request("POST", path, &[], Some(body.to_string()))
    }

    pub fn put_json(&self, path: &str, body: &Value) -> TestResponse {
        self.request("PUT", path, &[], Some(body.to_string()))
    }

    pub fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, &[], None)
    }

    pub fn request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<String>,
    ) -> TestResponse {
        send_request(self.addr, method, path, headers, body.as_deref())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

pub fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", self.body))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One request per connection; the body is read by `Content-Length`.
pub fn send_request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> TestResponse {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n");
    for (name, value) in headers {
        req.push_str(&format!("{name}: {value}\r\n"));
    }
    if let Some(body) = body {
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            req.push_str("Content-Type: application/json\r\n");
        }
        req.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    req.push_str("\r\n");
    if let Some(body) = body {
        req.push_str(body);
    }
    stream.write_all(req.as_bytes()).unwrap();

    let mut reader = BufReader::new(stream);
    let mut status_line = String::new();
    reader.read_line(&mut status_line).unwrap();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("bad status line: {status_line:?}"));

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    let length: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).unwrap();

    TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}
