use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::client::{Chat, ChatMessage, ClientEvent, EventSink, MessagingClient, SentMessage};
use super::webhook::{phone_from_jid, WEBHOOK_EVENTS};
use crate::config::MessagingConfig;
use crate::error::MessagingError;
use crate::logging::redacted;

/// [`MessagingClient`] backed by an Evolution API style HTTP gateway.
///
/// `initialize` creates the gateway instance (an existing one is reused),
/// registers the webhook and asks for a connection; a pairing code in the
/// answer is emitted as [`ClientEvent::Qr`]. Everything after that arrives
/// through the webhook.
pub struct EvolutionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    instance: String,
    webhook_url: Option<String>,
}

impl EvolutionClient {
    /// # Errors
    ///
    /// The HTTP client could not be built (TLS backend initialisation).
    pub fn new(config: &MessagingConfig) -> Result<Self, MessagingError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            instance: config.instance_name.clone(),
            webhook_url: config.webhook_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, path, self.instance)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder) -> Result<Value, MessagingError> {
        let res = self.authed(req).send()?;
        let status = res.status();
        let body = res.text()?;
        if !status.is_success() {
            return Err(MessagingError::Gateway {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| MessagingError::InvalidResponse(e.to_string()))
    }

    fn create_instance(&self) -> Result<(), MessagingError> {
        let mut payload = json!({
            "instanceName": self.instance,
            "qrcode": true,
            "integration": "WHATSAPP-BAILEYS",
        });
        if let Some(url) = &self.webhook_url {
            payload["webhook"] = json!({
                "url": url,
                "byEvents": false,
                "base64": false,
                "events": WEBHOOK_EVENTS,
            });
        }
        let req = self
            .http
            .post(format!("{}/instance/create", self.base_url))
            .json(&payload);
        match self.send(req) {
            Ok(_) => {
                info!(instance = %self.instance, "Gateway instance created");
                Ok(())
            }
            Err(MessagingError::Gateway { status: 403 | 409, .. }) => {
                debug!(instance = %self.instance, "Gateway instance already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Pairing code from a `connect` or `create` answer.
pub(crate) fn qr_from(answer: &Value) -> Option<String> {
    answer
        .get("code")
        .or_else(|| answer.pointer("/qrcode/code"))
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

fn is_open(answer: &Value) -> bool {
    answer
        .pointer("/instance/state")
        .and_then(Value::as_str)
        .is_some_and(|state| state == "open")
}

pub(crate) fn message_id_from(answer: &Value) -> Result<SentMessage, MessagingError> {
    answer
        .pointer("/key/id")
        .and_then(Value::as_str)
        .map(|id| SentMessage { id: id.to_string() })
        .ok_or_else(|| MessagingError::InvalidResponse("missing key.id".to_string()))
}

pub(crate) fn registered_from(answer: &Value) -> Result<bool, MessagingError> {
    let entries = answer
        .as_array()
        .ok_or_else(|| MessagingError::InvalidResponse("expected an array".to_string()))?;
    Ok(entries
        .first()
        .and_then(|entry| entry.get("exists"))
        .and_then(Value::as_bool)
        .unwrap_or(false))
}

pub(crate) fn chats_from(answer: &Value) -> Result<Vec<Chat>, MessagingError> {
    let entries = answer
        .as_array()
        .ok_or_else(|| MessagingError::InvalidResponse("expected an array".to_string()))?;
    Ok(entries
        .iter()
        .filter_map(|entry| {
            let id = entry
                .get("remoteJid")
                .or_else(|| entry.get("id"))
                .and_then(Value::as_str)?
                .to_string();
            let name = entry
                .get("name")
                .or_else(|| entry.get("pushName"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let last_message = entry.get("lastMessage").and_then(|msg| {
                let body = msg
                    .pointer("/message/conversation")
                    .or_else(|| msg.pointer("/message/extendedTextMessage/text"))
                    .or_else(|| msg.get("body"))
                    .and_then(Value::as_str)?;
                Some(ChatMessage {
                    body: body.to_string(),
                    timestamp: msg
                        .get("messageTimestamp")
                        .or_else(|| msg.get("timestamp"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                })
            });
            Some(Chat {
                is_group: id.ends_with("@g.us"),
                id,
                name,
                unread_count: entry
                    .get("unreadCount")
                    .or_else(|| entry.get("unreadMessages"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                last_message,
            })
        })
        .collect())
}

impl MessagingClient for EvolutionClient {
    fn initialize(&self, sink: EventSink) -> Result<(), MessagingError> {
        self.create_instance()?;
        let answer = self.send(self.http.get(self.url("instance/connect")))?;
        if is_open(&answer) {
            let phone = answer
                .pointer("/instance/wuid")
                .and_then(Value::as_str)
                .map(phone_from_jid);
            sink(ClientEvent::Authenticated);
            sink(ClientEvent::Ready { phone });
        } else if let Some(code) = qr_from(&answer) {
            sink(ClientEvent::Qr(code));
        } else {
            debug!(instance = %self.instance, "Connect answered without a pairing code");
        }
        Ok(())
    }

    fn destroy(&self) -> Result<(), MessagingError> {
        match self.send(self.http.delete(self.url("instance/logout"))) {
            Ok(_) => Ok(()),
            // Never paired, nothing to log out
            Err(MessagingError::Gateway { status: 400 | 404, body }) => {
                warn!(instance = %self.instance, body = %body, "Gateway logout skipped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn send_text(&self, chat_id: &str, text: &str) -> Result<SentMessage, MessagingError> {
        let number = chat_id.trim_end_matches("@c.us");
        debug!(number = %redacted("number", number), "Sending text through gateway");
        let answer = self.send(
            self.http
                .post(self.url("message/sendText"))
                .json(&json!({ "number": number, "text": text })),
        )?;
        message_id_from(&answer)
    }

    fn is_registered(&self, chat_id: &str) -> Result<bool, MessagingError> {
        let number = chat_id.trim_end_matches("@c.us");
        let answer = self.send(
            self.http
                .post(self.url("chat/whatsappNumbers"))
                .json(&json!({ "numbers": [number] })),
        )?;
        registered_from(&answer)
    }

    fn chats(&self) -> Result<Vec<Chat>, MessagingError> {
        let answer = self.send(self.http.post(self.url("chat/findChats")).json(&json!({})))?;
        chats_from(&answer)
    }
}
