use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::client::{chat_id_for, Chat, ClientEvent, EventSink, MessagingClient};
use crate::clock;
use crate::error::MessagingError;
use crate::logging::redacted;

/// Lifecycle of the messaging session, as reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Starting,
    QrReady,
    Authenticating,
    Connected,
    AuthFailed,
    /// Set while a manual stop tears the session down
    Stopped,
    Error,
}

impl ConnectionStatus {
    /// Wire name, e.g. `qr_ready`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Starting => "starting",
            ConnectionStatus::QrReady => "qr_ready",
            ConnectionStatus::Authenticating => "authenticating",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::AuthFailed => "auth_failed",
            ConnectionStatus::Stopped => "stopped",
            ConnectionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by `GET /api/whatsapp/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: ConnectionStatus,
    pub is_ready: bool,
    pub phone_number: Option<String>,
    #[serde(rename = "hasQRCode")]
    pub has_qr_code: bool,
    pub uptime_seconds: u64,
    pub last_activity: Option<String>,
    pub connection_start_time: Option<String>,
    pub auto_start_enabled: bool,
    pub timestamp: String,
}

/// Result of a successful `send_message`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub success: bool,
    pub message_id: String,
    pub timestamp: String,
}

struct State {
    /// Whether a client session exists (created by `start`, dropped by `stop`)
    session: bool,
    /// A client `initialize` call is in flight
    starting: bool,
    status: ConnectionStatus,
    is_ready: bool,
    qr_code: Option<String>,
    phone_number: Option<String>,
    connection_start: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    auto_start_enabled: bool,
}

/// The process-wide messaging adapter.
///
/// Always used behind an `Arc`: the event sink and the timers hold weak
/// references back to it.
pub struct MessagingService {
    client: Arc<dyn MessagingClient>,
    state: Mutex<State>,
    reconnect_delay: Duration,
    me: Weak<MessagingService>,
}

impl MessagingService {
    /// Wrap `client`. A disconnect that is not a manual stop schedules an
    /// auto-start after `reconnect_delay`.
    pub fn new(client: Arc<dyn MessagingClient>, reconnect_delay: Duration) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            client,
            state: Mutex::new(State {
                session: false,
                starting: false,
                status: ConnectionStatus::Disconnected,
                is_ready: false,
                qr_code: None,
                phone_number: None,
                connection_start: None,
                last_activity: None,
                auto_start_enabled: true,
            }),
            reconnect_delay,
            me: me.clone(),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn event_sink(&self) -> EventSink {
        let me = self.me.clone();
        Arc::new(move |event| {
            if let Some(service) = me.upgrade() {
                service.handle_event(event);
            }
        })
    }

    /// Fold a client event into the status fields.
    pub fn handle_event(&self, event: ClientEvent) {
        let now = Utc::now();
        let mut state = self.state();
        match event {
            ClientEvent::Qr(code) => {
                info!("QR code received, scan it from WhatsApp > Linked Devices");
                state.qr_code = Some(code);
                state.status = ConnectionStatus::QrReady;
                state.last_activity = Some(now);
            }
            ClientEvent::Authenticated => {
                info!("WhatsApp authentication successful");
                state.status = ConnectionStatus::Authenticating;
                state.last_activity = Some(now);
            }
            ClientEvent::Ready { phone } => {
                state.is_ready = true;
                state.status = ConnectionStatus::Connected;
                state.qr_code = None;
                state.last_activity = Some(now);
                match &phone {
                    Some(phone) => {
                        info!(phone = %redacted("phone", phone), "WhatsApp client is ready")
                    }
                    None => info!("WhatsApp client is ready, phone number unknown"),
                }
                state.phone_number = phone;
            }
            ClientEvent::AuthFailure(msg) => {
                error!(reason = %msg, "WhatsApp authentication failed");
                state.status = ConnectionStatus::AuthFailed;
                state.is_ready = false;
                state.last_activity = Some(now);
            }
            ClientEvent::Disconnected(reason) => {
                let manually_stopped = state.status == ConnectionStatus::Stopped;
                warn!(reason = %reason, "WhatsApp client disconnected");
                state.status = ConnectionStatus::Disconnected;
                state.is_ready = false;
                state.phone_number = None;
                state.last_activity = Some(now);
                if state.auto_start_enabled && !manually_stopped {
                    drop(state);
                    info!(
                        delay_secs = self.reconnect_delay.as_secs(),
                        "Scheduling WhatsApp reconnect"
                    );
                    self.schedule_auto_start(self.reconnect_delay);
                }
            }
            ClientEvent::Message { from } => {
                debug!(from = %redacted("phone", &from), "Message received");
                state.last_activity = Some(now);
            }
            ClientEvent::MessageCreate { from_me } => {
                if from_me {
                    state.last_activity = Some(now);
                }
            }
        }
    }

    /// Create the session if needed and initialize the client.
    ///
    /// # Errors
    ///
    /// Whatever the client reports; the status becomes `error`.
    pub fn start(&self) -> Result<Value, MessagingError> {
        Self::begin_start(&mut self.state());
        self.initialize()
    }

    fn begin_start(state: &mut State) {
        state.session = true;
        state.starting = true;
        state.connection_start = Some(Utc::now());
        state.status = ConnectionStatus::Starting;
    }

    /// Runs without the state lock: the client may report events
    /// synchronously through the sink.
    fn initialize(&self) -> Result<Value, MessagingError> {
        let result = self.client.initialize(self.event_sink());
        let mut state = self.state();
        state.starting = false;
        if let Err(e) = result {
            error!(error = %e, "Error starting WhatsApp client");
            state.status = ConnectionStatus::Error;
            return Err(e);
        }
        let status = state.status;
        drop(state);
        info!(status = %status, "WhatsApp client started");
        Ok(json!({
            "success": true,
            "message": "WhatsApp client started",
            "status": status,
            "timestamp": clock::now_iso(),
        }))
    }

    /// Destroy the session and reset every field.
    ///
    /// A `disconnected` event raised while the client is torn down does not
    /// schedule a reconnect.
    ///
    /// # Errors
    ///
    /// The client failed to destroy its session; the state is left as is.
    pub fn stop(&self) -> Result<Value, MessagingError> {
        {
            let mut state = self.state();
            if !state.session {
                return Ok(json!({"success": false, "message": "No client to stop"}));
            }
            state.status = ConnectionStatus::Stopped;
        }
        self.client.destroy().inspect_err(|e| {
            error!(error = %e, "Error stopping WhatsApp client");
        })?;
        let mut state = self.state();
        state.session = false;
        state.is_ready = false;
        state.status = ConnectionStatus::Disconnected;
        state.qr_code = None;
        state.phone_number = None;
        state.connection_start = None;
        state.last_activity = None;
        info!("WhatsApp client stopped");
        Ok(json!({"success": true, "message": "WhatsApp client stopped"}))
    }

    /// Start unless a ready session exists or a start is already in flight.
    /// Never fails: errors are folded into `{success: false, error}`.
    ///
    /// The startup timer, the reconnect timer and `POST /auto-start` may all
    /// race here; only one of them reaches the client.
    pub fn auto_start(&self) -> Value {
        info!("Auto-starting WhatsApp client");
        {
            let mut state = self.state();
            if state.session && state.is_ready {
                debug!("WhatsApp client already connected, skipping auto-start");
                return json!({
                    "success": true,
                    "message": "Already connected",
                    "status": "connected",
                });
            }
            if state.starting {
                debug!("WhatsApp client is already starting, skipping auto-start");
                return json!({
                    "success": true,
                    "message": "Start already in progress",
                    "status": state.status,
                });
            }
            Self::begin_start(&mut state);
        }
        match self.initialize() {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Auto-start failed");
                json!({"success": false, "error": e.to_string()})
            }
        }
    }

    /// Run [`auto_start`](Self::auto_start) once after `delay` on a
    /// background thread.
    pub fn schedule_auto_start(&self, delay: Duration) {
        let me = self.me.clone();
        let spawned = std::thread::Builder::new()
            .name("messaging-auto-start".to_string())
            .spawn(move || {
                std::thread::sleep(delay);
                if let Some(service) = me.upgrade() {
                    let result = service.auto_start();
                    debug!(result = %result, "Scheduled auto-start finished");
                }
            });
        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn auto-start timer");
        }
    }

    /// Enable or disable reconnecting after a disconnect.
    pub fn set_auto_start(&self, enabled: bool) {
        self.state().auto_start_enabled = enabled;
        info!(enabled, "WhatsApp auto-start toggled");
    }

    /// Whether a disconnect schedules a reconnect.
    pub fn auto_start_enabled(&self) -> bool {
        self.state().auto_start_enabled
    }

    /// A session exists and has reported `ready`.
    pub fn is_ready(&self) -> bool {
        let state = self.state();
        state.session && state.is_ready
    }

    /// The pairing code from the latest `qr` event, cleared once ready.
    pub fn qr_code(&self) -> Option<String> {
        self.state().qr_code.clone()
    }

    /// Snapshot of every status field.
    pub fn status(&self) -> StatusReport {
        let state = self.state();
        let uptime_seconds = state
            .connection_start
            .map(|start| (Utc::now() - start).num_seconds().max(0) as u64)
            .unwrap_or(0);
        StatusReport {
            status: state.status,
            is_ready: state.is_ready,
            phone_number: state.phone_number.clone(),
            has_qr_code: state.qr_code.is_some(),
            uptime_seconds,
            last_activity: state.last_activity.map(clock::iso),
            connection_start_time: state.connection_start.map(clock::iso),
            auto_start_enabled: state.auto_start_enabled,
            timestamp: clock::now_iso(),
        }
    }

    /// When the session last saw traffic, for the text report.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.state().last_activity
    }

    fn ensure_ready(&self) -> Result<(), MessagingError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(MessagingError::NotReady)
        }
    }

    fn touch(&self) {
        self.state().last_activity = Some(Utc::now());
    }

    /// Send `text` to `to`, a phone number with or without a leading `+`.
    ///
    /// # Errors
    ///
    /// [`MessagingError::NotReady`] without a ready session, otherwise the
    /// client's error.
    pub fn send_message(&self, to: &str, text: &str) -> Result<SendReceipt, MessagingError> {
        self.ensure_ready()?;
        let sent = self
            .client
            .send_text(&chat_id_for(to), text)
            .inspect_err(|e| {
                error!(to = %redacted("to", to), error = %e, "Error sending message");
            })?;
        self.touch();
        info!(to = %redacted("to", to), message_id = %sent.id, "Message sent");
        Ok(SendReceipt {
            success: true,
            message_id: sent.id,
            timestamp: clock::now_iso(),
        })
    }

    /// Whether `number` has a WhatsApp account.
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message).
    pub fn is_registered(&self, number: &str) -> Result<bool, MessagingError> {
        self.ensure_ready()?;
        let registered = self
            .client
            .is_registered(&chat_id_for(number))
            .inspect_err(|e| error!(error = %e, "Error checking if number is registered"))?;
        self.touch();
        Ok(registered)
    }

    /// Chats known to the linked account.
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message).
    pub fn chats(&self) -> Result<Vec<Chat>, MessagingError> {
        self.ensure_ready()?;
        let chats = self
            .client
            .chats()
            .inspect_err(|e| error!(error = %e, "Error getting chats"))?;
        self.touch();
        Ok(chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::SentMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Emits a QR code on initialize; counts destroys.
    #[derive(Default)]
    struct ScriptedClient {
        sink: Mutex<Option<EventSink>>,
        destroys: AtomicUsize,
        fail_init: bool,
    }

    impl ScriptedClient {
        fn emit(&self, event: ClientEvent) {
            let sink = self.sink.lock().unwrap().clone();
            if let Some(sink) = sink {
                sink(event);
            }
        }
    }

    impl MessagingClient for ScriptedClient {
        fn initialize(&self, sink: EventSink) -> Result<(), MessagingError> {
            if self.fail_init {
                return Err(MessagingError::Transport("connection refused".into()));
            }
            *self.sink.lock().unwrap() = Some(Arc::clone(&sink));
            sink(ClientEvent::Qr("2@abc".into()));
            Ok(())
        }
        fn destroy(&self) -> Result<(), MessagingError> {
            self.destroys.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn send_text(&self, chat_id: &str, _text: &str) -> Result<SentMessage, MessagingError> {
            Ok(SentMessage {
                id: format!("true_{chat_id}_ABC"),
            })
        }
        fn is_registered(&self, chat_id: &str) -> Result<bool, MessagingError> {
            Ok(chat_id.starts_with("94"))
        }
        fn chats(&self) -> Result<Vec<Chat>, MessagingError> {
            Ok(vec![])
        }
    }

    fn service(client: Arc<ScriptedClient>) -> Arc<MessagingService> {
        MessagingService::new(client, Duration::from_secs(3600))
    }

    #[test]
    fn start_reports_qr_state() {
        let client = Arc::new(ScriptedClient::default());
        let svc = service(Arc::clone(&client));
        let result = svc.start().unwrap();
        assert_eq!(result["status"], "qr_ready");
        assert_eq!(svc.qr_code().as_deref(), Some("2@abc"));
        let report = svc.status();
        assert!(report.has_qr_code);
        assert!(!report.is_ready);
        assert!(report.connection_start_time.is_some());
    }

    #[test]
    fn ready_then_send() {
        let client = Arc::new(ScriptedClient::default());
        let svc = service(Arc::clone(&client));
        assert_eq!(svc.send_message("+1", "hi"), Err(MessagingError::NotReady));

        svc.start().unwrap();
        client.emit(ClientEvent::Ready {
            phone: Some("94771461925".into()),
        });
        let report = svc.status();
        assert_eq!(report.status, ConnectionStatus::Connected);
        assert!(!report.has_qr_code);
        assert_eq!(report.phone_number.as_deref(), Some("94771461925"));

        let receipt = svc.send_message("+94771461925", "hi").unwrap();
        assert_eq!(receipt.message_id, "true_94771461925@c.us_ABC");
        assert!(svc.is_registered("+94 77").unwrap());

        let again = svc.auto_start();
        assert_eq!(again["message"], "Already connected");
    }

    #[test]
    fn stop_resets_everything() {
        let client = Arc::new(ScriptedClient::default());
        let svc = service(Arc::clone(&client));
        assert_eq!(svc.stop().unwrap()["message"], "No client to stop");

        svc.start().unwrap();
        let stopped = svc.stop().unwrap();
        assert_eq!(stopped["success"], true);
        assert_eq!(client.destroys.load(Ordering::SeqCst), 1);
        let report = svc.status();
        assert_eq!(report.status, ConnectionStatus::Disconnected);
        assert_eq!(report.uptime_seconds, 0);
        assert!(report.last_activity.is_none());
        assert_eq!(svc.stop().unwrap()["success"], false);
    }

    #[test]
    fn failed_start_sets_error() {
        let client = Arc::new(ScriptedClient {
            fail_init: true,
            ..ScriptedClient::default()
        });
        let svc = service(client);
        assert!(svc.start().is_err());
        assert_eq!(svc.status().status, ConnectionStatus::Error);

        let folded = svc.auto_start();
        assert_eq!(folded["success"], false);
        assert!(folded["error"].as_str().unwrap().contains("connection refused"));
    }

    #[test]
    fn disconnect_and_auth_failure() {
        let client = Arc::new(ScriptedClient::default());
        let svc = service(Arc::clone(&client));
        svc.set_auto_start(false);
        svc.start().unwrap();
        client.emit(ClientEvent::Ready { phone: None });
        client.emit(ClientEvent::Disconnected("NAVIGATION".into()));
        let report = svc.status();
        assert_eq!(report.status, ConnectionStatus::Disconnected);
        assert!(!report.is_ready);
        assert!(report.phone_number.is_none());

        client.emit(ClientEvent::AuthFailure("bad session".into()));
        assert_eq!(svc.status().status, ConnectionStatus::AuthFailed);
    }

    /// Blocks in `initialize` until the test releases it.
    struct GatedClient {
        entered: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
        inits: AtomicUsize,
    }

    impl MessagingClient for GatedClient {
        fn initialize(&self, _sink: EventSink) -> Result<(), MessagingError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(())
        }
        fn destroy(&self) -> Result<(), MessagingError> {
            Ok(())
        }
        fn send_text(&self, _chat_id: &str, _text: &str) -> Result<SentMessage, MessagingError> {
            Err(MessagingError::NotReady)
        }
        fn is_registered(&self, _chat_id: &str) -> Result<bool, MessagingError> {
            Ok(false)
        }
        fn chats(&self) -> Result<Vec<Chat>, MessagingError> {
            Ok(vec![])
        }
    }

    #[test]
    fn concurrent_auto_start_initializes_once() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let client = Arc::new(GatedClient {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
            inits: AtomicUsize::new(0),
        });
        let svc = MessagingService::new(
            Arc::clone(&client) as Arc<dyn MessagingClient>,
            Duration::from_secs(3600),
        );

        let first = {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || svc.auto_start())
        };
        entered_rx.recv().unwrap();

        let second = svc.auto_start();
        assert_eq!(second["success"], true);
        assert_eq!(second["message"], "Start already in progress");
        assert_eq!(second["status"], "starting");

        release_tx.send(()).unwrap();
        let first = first.join().unwrap();
        assert_eq!(first["message"], "WhatsApp client started");
        assert_eq!(client.inits.load(Ordering::SeqCst), 1);
        assert!(!svc.state().starting);
    }

    #[test]
    fn status_serializes_like_the_api() {
        let svc = service(Arc::new(ScriptedClient::default()));
        let value = serde_json::to_value(svc.status()).unwrap();
        assert_eq!(value["status"], "disconnected");
        assert_eq!(value["hasQRCode"], false);
        assert_eq!(value["autoStartEnabled"], true);
        assert_eq!(value["uptimeSeconds"], 0);
        assert!(value["phoneNumber"].is_null());
    }
}
