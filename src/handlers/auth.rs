//! `/api/auth`

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use super::JsonBody;
use crate::dispatcher::HandlerRequest;
use crate::error::ApiError;
use crate::logging::redacted;
use crate::security::MOCK_TOKEN_PREFIX;
use crate::store::UserDirectory;
use crate::typed::{Handler, Json, TypedHandlerRequest};

type Reply = Result<Json<Value>, ApiError>;

/// The caller of a bearer-protected route, taken from the token claims.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: u64,
    pub body: Value,
}

impl TryFrom<HandlerRequest> for Caller {
    type Error = ApiError;

    fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
        let user_id = req
            .claims
            .as_ref()
            .and_then(|claims| claims.get("id"))
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::unauthorized("Access token required"))?;
        let JsonBody(body) = JsonBody::try_from(req)?;
        Ok(Caller { user_id, body })
    }
}

/// `POST /api/auth/register`
pub struct Register {
    pub users: Arc<UserDirectory>,
}

impl Handler for Register {
    type Request = JsonBody;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<JsonBody>) -> Reply {
        let user = self.users.register(&req.data.0)?;
        tracing::info!(
            request_id = %req.request_id,
            user_id = user.id,
            email = %redacted("email", &user.email),
            "User registered"
        );
        Ok(Json::created(json!({
            "success": true,
            "message": "User registered successfully",
            "data": user,
        })))
    }
}

/// `POST /api/auth/login`; answers with a mock token.
pub struct Login {
    pub users: Arc<UserDirectory>,
}

impl Handler for Login {
    type Request = JsonBody;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<JsonBody>) -> Reply {
        let user = self.users.login(&req.data.0).inspect_err(|e| {
            tracing::info!(request_id = %req.request_id, reason = %e, "Login rejected");
        })?;
        let token = format!("{MOCK_TOKEN_PREFIX}{}", Utc::now().timestamp_millis());
        Ok(Json::ok(json!({
            "success": true,
            "message": "Login successful",
            "data": user,
            "token": token,
        })))
    }
}

/// `GET /api/auth/profile`
pub struct GetProfile {
    pub users: Arc<UserDirectory>,
}

impl Handler for GetProfile {
    type Request = Caller;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<Caller>) -> Reply {
        let user = self.users.get(req.data.user_id)?;
        Ok(Json::ok(json!({"success": true, "data": user})))
    }
}

/// `PUT /api/auth/profile`; empty fields are ignored.
pub struct UpdateProfile {
    pub users: Arc<UserDirectory>,
}

impl Handler for UpdateProfile {
    type Request = Caller;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<Caller>) -> Reply {
        let user = self.users.update_profile(req.data.user_id, &req.data.body)?;
        Ok(Json::ok(json!({
            "success": true,
            "message": "Profile updated successfully",
            "data": user,
        })))
    }
}
