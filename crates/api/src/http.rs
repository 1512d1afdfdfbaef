//! reqwest-backed [`Transport`].

use std::time::Instant;

use metrics::{counter, histogram};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{ApiError, ApiResult, ClientConfig, Method, Transport};

pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        if config.server_url.is_empty() {
            return Err(ApiError::Config("server url is empty".into()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig { &self.config }

    async fn handle_response(response: reqwest::Response) -> ApiResult<Value> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }
        Err(status_error(status, text))
    }
}

/// Map a non-2xx answer to an error, preferring the platform's own message.
fn status_error(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound(text);
    }
    // Platform errors usually come as {"error": {"message": ...}} or {"message": ...}
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(|s| s.to_string()))
        })
        .unwrap_or(text);
    ApiError::Status { status: status.as_u16(), message }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, method: Method, endpoint: &str, body: Option<String>) -> ApiResult<Value> {
        let t0 = Instant::now();
        let url = self.config.endpoint_url(endpoint);
        debug!(method = %method, url = %url, body_bytes = body.as_ref().map(|b| b.len()).unwrap_or(0), "http: request");
        let mut req = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        req = req.header(header::ACCEPT, "application/json");
        if let Some(token) = self.config.access_token.as_deref() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.header(header::CONTENT_TYPE, "application/json").body(body);
        }
        counter!("api_requests_total", 1, "endpoint" => endpoint.to_string());
        let res = match req.send().await {
            Ok(response) => Self::handle_response(response).await,
            Err(e) => Err(ApiError::Http(e)),
        };
        histogram!("api_request_ms", t0.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(_) => info!(method = %method, endpoint = %endpoint, took_ms = %t0.elapsed().as_millis(), "http: ok"),
            Err(e) => {
                counter!("api_request_errors_total", 1, "endpoint" => endpoint.to_string());
                warn!(method = %method, endpoint = %endpoint, error = %e, "http: failed");
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_server_url() {
        let cfg = ClientConfig { server_url: String::new(), ..Default::default() };
        assert!(matches!(HttpTransport::new(cfg), Err(ApiError::Config(_))));
    }

    #[test]
    fn keeps_config() {
        let cfg = ClientConfig { access_token: Some("t".into()), ..Default::default() };
        let t = HttpTransport::new(cfg.clone()).unwrap();
        assert_eq!(t.config(), &cfg);
    }

    #[test]
    fn not_found_keeps_body() {
        let err = status_error(StatusCode::NOT_FOUND, "no such cluster".into());
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "no such cluster"));
    }

    #[test]
    fn status_message_prefers_platform_text() {
        let nested = status_error(StatusCode::BAD_REQUEST, r#"{"error":{"message":"bad region"}}"#.into());
        assert_eq!(nested.to_string(), "status 400: bad region");

        let flat = status_error(StatusCode::FORBIDDEN, r#"{"message":"forbidden"}"#.into());
        assert_eq!(flat.to_string(), "status 403: forbidden");

        let plain = status_error(StatusCode::UNAUTHORIZED, r#"{"error":"token expired"}"#.into());
        assert_eq!(plain.to_string(), "status 401: token expired");
    }

    #[test]
    fn status_message_falls_back_to_raw_body() {
        let err = status_error(StatusCode::BAD_GATEWAY, "<html>upstream</html>".into());
        assert!(matches!(err, ApiError::Status { status: 502, ref message } if message == "<html>upstream</html>"));

        let odd = status_error(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":1}"#.into());
        assert_eq!(odd.to_string(), r#"status 500: {"detail":1}"#);
    }
}
