//! Gateway webhook payloads.
//!
//! The gateway posts `{"event": "...", "instance": "...", "data": {...}}`.
//! Event names come dotted (`connection.update`) or upper snake case
//! (`CONNECTION_UPDATE`) depending on the gateway version; both are
//! accepted.

use serde_json::Value;

use super::client::ClientEvent;

/// Events subscribed to when the instance is created.
pub const WEBHOOK_EVENTS: [&str; 5] = [
    "QRCODE_UPDATED",
    "CONNECTION_UPDATE",
    "MESSAGES_UPSERT",
    "SEND_MESSAGE",
    "LOGOUT_INSTANCE",
];

/// `94771461925:12@s.whatsapp.net` → `94771461925`
pub fn phone_from_jid(jid: &str) -> String {
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user).to_string()
}

fn normalise(name: &str) -> String {
    name.trim().to_lowercase().replace('_', ".")
}

/// Translate one webhook payload into client events; unknown events yield
/// nothing.
pub fn parse_event(payload: &Value) -> Vec<ClientEvent> {
    let Some(event) = payload.get("event").and_then(Value::as_str) else {
        return vec![];
    };
    let data = payload.get("data").unwrap_or(&Value::Null);
    let text = |pointer: &str| data.pointer(pointer).and_then(Value::as_str);

    match normalise(event).as_str() {
        "qrcode.updated" => text("/qrcode/code")
            .or_else(|| text("/code"))
            .map(|code| vec![ClientEvent::Qr(code.to_string())])
            .unwrap_or_default(),
        "connection.update" => match text("/state") {
            Some("open") => vec![
                ClientEvent::Authenticated,
                ClientEvent::Ready {
                    phone: text("/wuid").map(phone_from_jid),
                },
            ],
            Some("close") => {
                let reason = data
                    .get("statusReason")
                    .map(|r| match r {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "connection closed".to_string());
                if reason == "401" {
                    vec![ClientEvent::AuthFailure("session logged out".to_string())]
                } else {
                    vec![ClientEvent::Disconnected(reason)]
                }
            }
            _ => vec![],
        },
        "messages.upsert" => {
            let from_me = data
                .pointer("/key/fromMe")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if from_me {
                vec![ClientEvent::MessageCreate { from_me: true }]
            } else {
                vec![
                    ClientEvent::Message {
                        from: text("/key/remoteJid").unwrap_or_default().to_string(),
                    },
                    ClientEvent::MessageCreate { from_me: false },
                ]
            }
        }
        "send.message" => vec![ClientEvent::MessageCreate { from_me: true }],
        "logout.instance" => vec![ClientEvent::Disconnected("logout".to_string())],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn jid_to_phone() {
        assert_eq!(phone_from_jid("94771461925@s.whatsapp.net"), "94771461925");
        assert_eq!(phone_from_jid("94771461925:7@s.whatsapp.net"), "94771461925");
        assert_eq!(phone_from_jid("plain"), "plain");
    }

    #[test]
    fn qr_and_connection_events() {
        let qr = json!({"event": "QRCODE_UPDATED", "data": {"qrcode": {"code": "2@xyz"}}});
        assert_eq!(parse_event(&qr), vec![ClientEvent::Qr("2@xyz".into())]);

        let open = json!({
            "event": "connection.update",
            "data": {"state": "open", "wuid": "94771461925@s.whatsapp.net"}
        });
        assert_eq!(
            parse_event(&open),
            vec![
                ClientEvent::Authenticated,
                ClientEvent::Ready {
                    phone: Some("94771461925".into())
                }
            ]
        );

        let closed = json!({
            "event": "connection.update",
            "data": {"state": "close", "statusReason": 428}
        });
        assert_eq!(parse_event(&closed), vec![ClientEvent::Disconnected("428".into())]);

        let logged_out = json!({
            "event": "connection.update",
            "data": {"state": "close", "statusReason": 401}
        });
        assert!(matches!(parse_event(&logged_out)[0], ClientEvent::AuthFailure(_)));

        let connecting = json!({"event": "connection.update", "data": {"state": "connecting"}});
        assert!(parse_event(&connecting).is_empty());
    }

    #[test]
    fn message_events() {
        let incoming = json!({
            "event": "messages.upsert",
            "data": {"key": {"remoteJid": "1@s.whatsapp.net", "fromMe": false}}
        });
        assert_eq!(
            parse_event(&incoming)[0],
            ClientEvent::Message {
                from: "1@s.whatsapp.net".into()
            }
        );
        let own = json!({"event": "SEND_MESSAGE", "data": {}});
        assert_eq!(parse_event(&own), vec![ClientEvent::MessageCreate { from_me: true }]);
        assert!(parse_event(&json!({"event": "presence.update"})).is_empty());
        assert!(parse_event(&json!({"data": {}})).is_empty());
    }
}
