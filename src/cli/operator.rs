//! Blocking HTTP client behind `computer-store messaging`.

use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Messaging routes of a locally running server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3060/api/whatsapp";

/// A server reply: JSON when the body parses as JSON, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    Text(String),
}

impl Reply {
    fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => Reply::Json(value),
            Err(_) => Reply::Text(body),
        }
    }

    /// The JSON body, or `null` for text replies.
    pub fn json(&self) -> &Value {
        match self {
            Reply::Json(value) => value,
            Reply::Text(_) => &Value::Null,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Reply::Json(value) => value.to_string(),
            Reply::Text(text) => text.clone(),
        }
    }

    /// `error`, then `message`, then a generic fallback.
    fn failure_message(&self) -> String {
        let body = self.json();
        body["error"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("Request failed")
            .to_string()
    }
}

/// Blocking client for the `/api/whatsapp` routes.
pub struct OperatorClient {
    base: Url,
    http: Client,
}

impl OperatorClient {
    /// # Errors
    ///
    /// An unparsable base URL or a client that cannot be built.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid base URL {base_url}"))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { base, http })
    }

    /// `/api/health` on the same origin as the base URL.
    pub fn health_url(&self) -> Url {
        let mut url = self.base.clone();
        url.set_path("/api/health");
        url.set_query(None);
        url
    }

    /// `path` below the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// # Errors
    ///
    /// The server is unreachable or not healthy.
    pub fn check_server(&self) -> anyhow::Result<()> {
        let res = self
            .http
            .get(self.health_url())
            .send()
            .context("health check failed")?;
        anyhow::ensure!(res.status().is_success(), "health check returned {}", res.status());
        Ok(())
    }

    /// # Errors
    ///
    /// See [`OperatorClient::request`].
    pub fn get(&self, path: &str) -> anyhow::Result<Reply> {
        self.request(Method::GET, path, None)
    }

    /// # Errors
    ///
    /// See [`OperatorClient::request`].
    pub fn post(&self, path: &str, body: Option<Value>) -> anyhow::Result<Reply> {
        self.request(Method::POST, path, body)
    }

    /// Send a request below the base URL.
    ///
    /// # Errors
    ///
    /// No response from the server, or a non-success status carrying the
    /// server's `error`/`message`.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> anyhow::Result<Reply> {
        let url = self.endpoint(path);
        debug!(method = %method, url = %url, "Operator request");
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req
            .send()
            .map_err(|_| anyhow::anyhow!("No response received. Is the server running?"))?;
        let status = res.status();
        let reply = Reply::from_body(res.text().context("failed to read response body")?);
        if !status.is_success() {
            anyhow::bail!(reply.failure_message());
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn health_url_keeps_the_origin() {
        let client = OperatorClient::new("http://store.local:8080/api/whatsapp/").unwrap();
        assert_eq!(client.health_url().as_str(), "http://store.local:8080/api/health");
        assert_eq!(
            client.endpoint("/status"),
            "http://store.local:8080/api/whatsapp/status"
        );
    }

    #[test]
    fn replies_fall_back_to_text() {
        let reply = Reply::from_body("📱 WhatsApp Status".to_string());
        assert_eq!(reply.json(), &Value::Null);
        assert_eq!(reply.text(), "📱 WhatsApp Status");
    }

    #[test]
    fn failure_prefers_error_over_message() {
        let both = Reply::Json(json!({"error": "boom", "message": "ignored"}));
        assert_eq!(both.failure_message(), "boom");
        let message = Reply::Json(json!({"success": false, "message": "No client to stop"}));
        assert_eq!(message.failure_message(), "No client to stop");
        assert_eq!(Reply::Text("oops".into()).failure_message(), "Request failed");
    }

    #[test]
    fn rejects_an_invalid_base_url() {
        assert!(OperatorClient::new("not a url").is_err());
    }
}
