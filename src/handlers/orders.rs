//! `/api/orders`

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::clock;
use crate::dispatcher::HandlerRequest;
use crate::error::ApiError;
use crate::ids::OrderId;
use crate::messaging::MessagingService;
use crate::orders::{format_order_message, OrderRequest};
use crate::typed::{Handler, Json, TypedHandlerRequest};

impl TryFrom<HandlerRequest> for OrderRequest {
    type Error = ApiError;

    fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
        let body = req
            .body
            .ok_or_else(|| ApiError::bad_request("Order data is required").timestamped())?;
        serde_json::from_value(body).map_err(|e| {
            ApiError::bad_request("Request validation failed").with_details(json!([e.to_string()]))
        })
    }
}

/// Relays each order to `notify_number`.
pub struct SubmitOrder {
    pub messaging: Arc<MessagingService>,
    pub notify_number: String,
}

impl Handler for SubmitOrder {
    type Request = OrderRequest;
    type Response = Result<Json<Value>, ApiError>;

    fn handle(&self, req: TypedHandlerRequest<OrderRequest>) -> Self::Response {
        let order_id = OrderId::generate();
        let message = format_order_message(&req.data, Utc::now(), &order_id);
        let receipt = self
            .messaging
            .send_message(&self.notify_number, &message)
            .map_err(|e| {
                tracing::error!(
                    request_id = %req.request_id,
                    order_id = %order_id,
                    error = %e,
                    "Error submitting order"
                );
                ApiError::from(e)
            })?;
        tracing::info!(request_id = %req.request_id, order_id = %order_id, "Order relayed");
        Ok(Json::ok(json!({
            "success": true,
            "message": "Order submitted successfully! WhatsApp message sent.",
            "whatsappResult": receipt,
            "timestamp": clock::now_iso(),
        })))
    }
}
