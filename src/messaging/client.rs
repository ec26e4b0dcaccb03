use std::sync::Arc;

use serde::Serialize;

use crate::error::MessagingError;

/// Lifecycle and traffic notifications from the messaging session.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A pairing code to render as a QR code
    Qr(String),
    Authenticated,
    /// Session usable; carries the linked phone number when known
    Ready { phone: Option<String> },
    AuthFailure(String),
    Disconnected(String),
    /// Incoming message
    Message { from: String },
    /// Any message created on the session, including our own sends
    MessageCreate { from_me: bool },
}

/// Callback receiving [`ClientEvent`]s.
pub type EventSink = Arc<dyn Fn(ClientEvent) + Send + Sync>;

/// Gateway receipt for a sent message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentMessage {
    pub id: String,
}

/// Last message of a chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub body: String,
    /// Seconds since the epoch
    pub timestamp: i64,
}

/// A chat as listed by `GET /api/whatsapp/chats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub unread_count: u64,
    pub last_message: Option<ChatMessage>,
}

/// An external messaging session.
///
/// Calls block until the session answers. Implementations may invoke the
/// sink from any thread, including synchronously from `initialize`.
pub trait MessagingClient: Send + Sync {
    fn initialize(&self, sink: EventSink) -> Result<(), MessagingError>;
    fn destroy(&self) -> Result<(), MessagingError>;
    fn send_text(&self, chat_id: &str, text: &str) -> Result<SentMessage, MessagingError>;
    fn is_registered(&self, chat_id: &str) -> Result<bool, MessagingError>;
    fn chats(&self) -> Result<Vec<Chat>, MessagingError>;
}

/// `+94771461925` → `94771461925@c.us`; only `+` signs are dropped.
pub fn chat_id_for(number: &str) -> String {
    format!("{}@c.us", number.replace('+', ""))
}
