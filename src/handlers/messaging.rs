//! `/api/whatsapp`: operator controls for the messaging session.
//!
//! JSON routes answer failures with `500 {success: false, error, timestamp}`;
//! the `*/terminal` routes answer `500 ❌ Error: <msg>` as plain text.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{str_field, JsonBody, NoInput};
use crate::clock;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::error::ApiError;
use crate::messaging::render::{self, QR_INSTRUCTIONS};
use crate::messaging::{webhook, MessagingService};
use crate::typed::{Handler, Json, Text, TypedHandlerRequest};

type Reply = Result<Json<Value>, ApiError>;
type TextReply = Result<Text, ApiError>;

macro_rules! messaging_handler {
    ($name:ident, $request:ty, $response:ty, |$svc:ident, $req:ident| $body:expr) => {
        pub struct $name {
            pub service: Arc<MessagingService>,
        }

        impl Handler for $name {
            type Request = $request;
            type Response = $response;

            fn handle(&self, $req: TypedHandlerRequest<$request>) -> $response {
                let $svc = &self.service;
                $body
            }
        }
    };
}

messaging_handler!(Start, NoInput, Reply, |svc, _req| {
    Ok(Json::ok(svc.start()?))
});

messaging_handler!(Stop, NoInput, Reply, |svc, _req| {
    Ok(Json::ok(svc.stop()?))
});

messaging_handler!(AutoStart, NoInput, Reply, |svc, _req| {
    Ok(Json::ok(svc.auto_start()))
});

/// `enable` or `disable` from the path.
#[derive(Debug, Clone)]
pub struct AutoStartAction(pub String);

impl TryFrom<HandlerRequest> for AutoStartAction {
    type Error = ApiError;

    fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
        Ok(AutoStartAction(
            req.get_path_param("action").unwrap_or_default().to_string(),
        ))
    }
}

messaging_handler!(SetAutoStart, AutoStartAction, Reply, |svc, req| {
    let action = req.data.0.as_str();
    let enabled = match action {
        "enable" => true,
        "disable" => false,
        _ => {
            return Err(ApiError::bad_request(
                "Invalid action. Use \"enable\" or \"disable\"",
            )
            .timestamped())
        }
    };
    svc.set_auto_start(enabled);
    Ok(Json::ok(json!({
        "success": true,
        "message": format!("Auto-start {action}d"),
        "autoStartEnabled": enabled,
        "timestamp": clock::now_iso(),
    })))
});

messaging_handler!(Status, NoInput, Reply, |svc, _req| {
    Ok(Json::ok(json!({"success": true, "data": svc.status()})))
});

/// `api_base` is the public URL of these routes, used for the links in the report.
pub struct StatusTerminal {
    pub service: Arc<MessagingService>,
    pub api_base: String,
}

impl Handler for StatusTerminal {
    type Request = NoInput;
    type Response = TextReply;

    fn handle(&self, _req: TypedHandlerRequest<NoInput>) -> TextReply {
        let report = self.service.status();
        let text = render::status_report(&report, self.service.last_activity(), &self.api_base);
        Ok(Text(200, text))
    }
}

messaging_handler!(Qr, NoInput, Reply, |svc, _req| {
    match svc.qr_code() {
        Some(qr) => Ok(Json::ok(json!({
            "success": true,
            "data": {
                "qrCode": qr,
                "status": "qr_ready",
                "instructions": QR_INSTRUCTIONS,
                "timestamp": clock::now_iso(),
            }
        }))),
        None => Ok(Json::ok(json!({
            "success": false,
            "message": "No QR code available. Please start the WhatsApp client first.",
            "data": {
                "status": svc.status().status,
                "timestamp": clock::now_iso(),
            }
        }))),
    }
});

/// `GET /api/whatsapp/qr/terminal`
pub struct QrTerminal {
    pub service: Arc<MessagingService>,
    pub api_base: String,
}

impl Handler for QrTerminal {
    type Request = NoInput;
    type Response = TextReply;

    fn handle(&self, _req: TypedHandlerRequest<NoInput>) -> TextReply {
        let qr = self.service.qr_code();
        Ok(Text(200, render::qr_report(qr.as_deref(), &self.api_base)))
    }
}

messaging_handler!(SendMessage, JsonBody, Reply, |svc, req| {
    let body = &req.data.0;
    let (Some(to), Some(message)) = (str_field(body, "to"), str_field(body, "message")) else {
        return Err(ApiError::bad_request("Phone number and message are required").timestamped());
    };
    let receipt = svc.send_message(to, message)?;
    Ok(Json::ok(json!(receipt)))
});

messaging_handler!(CheckNumber, JsonBody, Reply, |svc, req| {
    let Some(number) = str_field(&req.data.0, "number") else {
        return Err(ApiError::bad_request("Phone number is required").timestamped());
    };
    let registered = svc.is_registered(number)?;
    Ok(Json::ok(json!({
        "success": true,
        "data": {
            "number": number,
            "isRegistered": registered,
            "timestamp": clock::now_iso(),
        }
    })))
});

messaging_handler!(Chats, NoInput, Reply, |svc, _req| {
    let chats = svc.chats()?;
    Ok(Json::ok(json!({
        "success": true,
        "data": {
            "count": chats.len(),
            "chats": chats,
            "timestamp": clock::now_iso(),
        }
    })))
});

messaging_handler!(ChatsTerminal, NoInput, TextReply, |svc, _req| {
    let chats = svc.chats().map_err(|e| ApiError::from(e).text())?;
    Ok(Text(200, render::chats_report(&chats)))
});

messaging_handler!(Health, NoInput, HandlerResponse, |svc, _req| {
    let report = svc.status();
    let status = if report.is_ready { 200 } else { 503 };
    HandlerResponse::json(
        status,
        json!({
            "success": report.is_ready,
            "data": {
                "service": "whatsapp",
                "status": report.status,
                "isReady": report.is_ready,
                "uptime": report.uptime_seconds,
                "lastActivity": report.last_activity,
                "autoStartEnabled": report.auto_start_enabled,
                "timestamp": clock::now_iso(),
            }
        }),
    )
});

messaging_handler!(Webhook, JsonBody, Reply, |svc, req| {
    let events = webhook::parse_event(&req.data.0);
    let handled = events.len();
    for event in events {
        svc.handle_event(event);
    }
    tracing::debug!(request_id = %req.request_id, handled, "Gateway webhook processed");
    Ok(Json::ok(json!({"success": true, "handled": handled})))
});
