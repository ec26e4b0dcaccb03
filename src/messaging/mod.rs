//! # Messaging
//!
//! Order notifications are relayed through an external WhatsApp session.
//!
//! - [`MessagingClient`] is the contract of that session: initialize, destroy,
//!   send a text, look up a number, list chats. Lifecycle changes are pushed
//!   back as [`ClientEvent`]s through the [`EventSink`] handed to
//!   `initialize`.
//! - [`MessagingService`] owns the one shared session, folds events into its
//!   status fields and schedules the auto-start and reconnect timers.
//! - [`EvolutionClient`] talks to an Evolution API style HTTP gateway; its
//!   events arrive on `POST /api/whatsapp/webhook` and go through
//!   [`webhook::parse_event`].
//! - [`render`] builds the plain-text reports of the `*/terminal` routes.

mod client;
mod evolution;
pub mod render;
mod service;
pub mod webhook;

pub use client::{
    chat_id_for, Chat, ChatMessage, ClientEvent, EventSink, MessagingClient, SentMessage,
};
pub use evolution::EvolutionClient;
pub use service::{ConnectionStatus, MessagingService, SendReceipt, StatusReport};
