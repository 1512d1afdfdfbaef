//! Daiteap platform API façade.
//!
//! Defines the two seams the rest of the client depends on: [`Transport`] (one HTTP
//! round-trip to the platform) and [`ResourceResolver`] (zone / instance / OS catalog
//! lookups). [`PlatformClient`] implements the resolver and the pass-through calls on
//! top of any transport; [`HttpTransport`] is the real wire, [`MockTransport`] backs tests.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use daiteap_core::{ProviderName, SupportedKubernetesConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use urlencoding::encode;

mod http;

pub use http::HttpTransport;

pub const DEFAULT_SERVER_URL: &str = "https://app.daiteap.com/server";

/// Cluster `type` codes the platform uses for Kubernetes environments.
pub const KUBERNETES_CLUSTER_TYPES: [i64; 5] = [1, 3, 5, 7, 8];

/// API errors surfaced to commands. Carry enough text to print directly.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Connection settings for the platform API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    pub access_token: Option<String>,
    pub username: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { server_url: DEFAULT_SERVER_URL.to_string(), access_token: None, username: String::new(), timeout: Duration::from_secs(30) }
    }
}

impl ClientConfig {
    /// Read `DAITEAP_TIMEOUT_SECS`, falling back to 30s.
    pub fn timeout_from_env() -> Duration {
        let secs = std::env::var("DAITEAP_TIMEOUT_SECS").ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(30);
        Duration::from_secs(secs)
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.server_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }
}

/// One request/response exchange with the platform. `body` is raw JSON text so
/// pre-built payloads can be forwarded without re-encoding.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, method: Method, endpoint: &str, body: Option<String>) -> ApiResult<Value>;
}

/// Catalog lookups scoped to one provider credential.
#[async_trait::async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn list_zones(&self, provider: ProviderName, credential_id: &str, region: &str) -> ApiResult<Vec<String>>;

    /// Instance types keyed by size label (S/M/L/XL).
    async fn list_instance_types(
        &self,
        provider: ProviderName,
        credential_id: &str,
        region: &str,
        zone: &str,
    ) -> ApiResult<BTreeMap<String, String>>;

    async fn list_operating_systems(
        &self,
        provider: ProviderName,
        credential_id: &str,
        region: &str,
        cluster_type: u32,
        username: &str,
    ) -> ApiResult<Vec<String>>;

    async fn list_supported_kubernetes_config(&self) -> ApiResult<SupportedKubernetesConfig>;
}

// ----------------- Platform client -----------------

/// Typed calls against the platform over any [`Transport`].
#[derive(Clone)]
pub struct PlatformClient {
    transport: Arc<dyn Transport>,
}

impl PlatformClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self { Self { transport } }

    async fn get(&self, endpoint: &str) -> ApiResult<Value> {
        self.transport.submit(Method::Get, endpoint, None).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> ApiResult<Value> {
        self.transport.submit(Method::Post, endpoint, Some(body.to_string())).await
    }

    pub async fn list_projects(&self) -> ApiResult<Value> { self.get("/projects").await }

    pub async fn list_buckets(&self) -> ApiResult<Value> { self.get("/buckets").await }

    /// Resolve a project name to its id via the project listing.
    pub async fn project_id_by_name(&self, name: &str) -> ApiResult<String> {
        let t0 = Instant::now();
        let projects = self.list_projects().await?;
        let id = data_rows(&projects)
            .iter()
            .find(|p| p.get("name").and_then(|v| v.as_str()) == Some(name))
            .and_then(|p| p.get("id"))
            .map(scalar_to_string)
            .ok_or_else(|| ApiError::NotFound(format!("project {:?}", name)))?;
        info!(project = %name, id = %id, took_ms = %t0.elapsed().as_millis(), "api: project resolved");
        Ok(id)
    }

    pub async fn is_kubernetes(&self, cluster_id: &str) -> ApiResult<bool> {
        if cluster_id.is_empty() {
            return Err(ApiError::Validation("cluster id is empty".into()));
        }
        let cluster = self.get(&format!("/clusters/{}", cluster_id)).await?;
        let ty = cluster.get("type").and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())));
        debug!(cluster = %cluster_id, ty = ?ty, "api: cluster type");
        Ok(ty.map(|t| KUBERNETES_CLUSTER_TYPES.contains(&t)).unwrap_or(false))
    }

    pub async fn rename_cluster(&self, cluster_id: &str, name: &str) -> ApiResult<Value> {
        self.post("/renameCluster", &json!({ "clusterID": cluster_id, "clusterName": name })).await
    }

    pub async fn restart_cluster(&self, cluster_id: &str) -> ApiResult<Value> {
        self.post("/restartCluster", &json!({ "clusterID": cluster_id })).await
    }
}

#[async_trait::async_trait]
impl ResourceResolver for PlatformClient {
    async fn list_zones(&self, provider: ProviderName, credential_id: &str, region: &str) -> ApiResult<Vec<String>> {
        let body = json!({ "provider": provider.as_str(), "accountId": credential_id, "region": region });
        let resp = self.post("/getValidZones", &body).await?;
        string_list(&resp, "zones")
    }

    async fn list_instance_types(
        &self,
        provider: ProviderName,
        credential_id: &str,
        region: &str,
        zone: &str,
    ) -> ApiResult<BTreeMap<String, String>> {
        let body = json!({ "provider": provider.as_str(), "accountId": credential_id, "region": region, "zone": zone });
        let resp = self.post("/getValidInstances", &body).await?;
        let map = resp
            .get("instances")
            .and_then(|v| v.as_object())
            .ok_or_else(|| unexpected_shape(&resp, "instances", "an object"))?;
        Ok(map.iter().filter_map(|(size, ty)| ty.as_str().map(|ty| (size.clone(), ty.to_string()))).collect())
    }

    async fn list_operating_systems(
        &self,
        provider: ProviderName,
        credential_id: &str,
        region: &str,
        cluster_type: u32,
        username: &str,
    ) -> ApiResult<Vec<String>> {
        let endpoint = format!(
            "/getValidOperatingSystems/{}/{}/{}/{}/{}",
            encode(username),
            provider,
            encode(credential_id),
            encode(region),
            cluster_type
        );
        let resp = self.get(&endpoint).await?;
        string_list(&resp, "operatingSystems")
    }

    async fn list_supported_kubernetes_config(&self) -> ApiResult<SupportedKubernetesConfig> {
        let resp = self.get("/getsupportedkubernetesconfigurations").await?;
        Ok(serde_json::from_value(resp)?)
    }
}

/// Rows under the `data` key of a listing response.
pub fn data_rows(v: &Value) -> &[Value] {
    v.get("data").and_then(|d| d.as_array()).map(|a| a.as_slice()).unwrap_or(&[])
}

/// Render a JSON scalar without quotes; null becomes empty.
pub fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A catalog answer without its key is an error, even on a 2xx status.
fn string_list(v: &Value, key: &str) -> ApiResult<Vec<String>> {
    let arr = v.get(key).and_then(|z| z.as_array()).ok_or_else(|| unexpected_shape(v, key, "an array"))?;
    Ok(arr.iter().filter_map(|s| s.as_str().map(|s| s.to_string())).collect())
}

fn unexpected_shape(v: &Value, key: &str, want: &str) -> ApiError {
    let detail = v.get("error").or_else(|| v.get("message")).and_then(|m| m.as_str());
    match detail {
        Some(msg) => ApiError::Validation(format!("expected {} under {:?}: {}", want, key, msg)),
        None => ApiError::Validation(format!("expected {} under {:?}", want, key)),
    }
}

// ----------------- Mock implementation -----------------

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
}

/// In-memory transport for tests. Answers by exact endpoint and records every call.
#[derive(Default)]
pub struct MockTransport {
    pub responses: HashMap<String, Value>,
    /// Endpoints that answer with a status error.
    pub failures: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self { Self::default() }

    pub fn respond(mut self, endpoint: &str, body: Value) -> Self {
        self.responses.insert(endpoint.to_string(), body);
        self
    }

    pub fn fail(mut self, endpoint: &str, status: u16, message: &str) -> Self {
        self.failures.insert(endpoint.to_string(), (status, message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|c| c.endpoint == endpoint).count()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn submit(&self, method: Method, endpoint: &str, body: Option<String>) -> ApiResult<Value> {
        let parsed = match body.as_deref() {
            Some(b) => Some(serde_json::from_str(b)?),
            None => None,
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall { method, endpoint: endpoint.to_string(), body: parsed });
        }
        if let Some((status, message)) = self.failures.get(endpoint) {
            return Err(ApiError::Status { status: *status, message: message.clone() });
        }
        self.responses
            .get(endpoint)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", method, endpoint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(mock: MockTransport) -> (Arc<MockTransport>, PlatformClient) {
        let mock = Arc::new(mock);
        (mock.clone(), PlatformClient::new(mock))
    }

    #[test]
    fn endpoint_url_joins_single_slash() {
        let cfg = ClientConfig { server_url: "https://x.example/server/".into(), ..Default::default() };
        assert_eq!(cfg.endpoint_url("/projects"), "https://x.example/server/projects");
        assert_eq!(cfg.endpoint_url("buckets"), "https://x.example/server/buckets");
    }

    #[tokio::test]
    async fn project_lookup_matches_exact_name() {
        let (_m, c) = client(MockTransport::new().respond(
            "/projects",
            json!({ "data": [ { "id": "p-1", "name": "alpha" }, { "id": 42, "name": "beta" } ] }),
        ));
        assert_eq!(c.project_id_by_name("beta").await.unwrap(), "42");
        assert!(matches!(c.project_id_by_name("gamma").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn is_kubernetes_checks_cluster_type() {
        let (_m, c) = client(
            MockTransport::new()
                .respond("/clusters/k", json!({ "type": 7 }))
                .respond("/clusters/vm", json!({ "type": 2 })),
        );
        assert!(c.is_kubernetes("k").await.unwrap());
        assert!(!c.is_kubernetes("vm").await.unwrap());
        assert!(matches!(c.is_kubernetes("").await, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn resolver_decodes_catalog_responses() {
        let (mock, c) = client(
            MockTransport::new()
                .respond("/getValidZones", json!({ "zones": ["eu-a", "eu-b"] }))
                .respond("/getValidInstances", json!({ "instances": { "S": "small", "M": "medium", "bogus": 3 } }))
                .respond("/getValidOperatingSystems/me/aws/12/eu/7", json!({ "operatingSystems": ["ubuntu"] }))
                .respond(
                    "/getsupportedkubernetesconfigurations",
                    json!({ "supportedKubernetesVersions": ["v1.27"], "supportedKubernetesNetworkPlugins": ["calico"] }),
                ),
        );
        assert_eq!(c.list_zones(ProviderName::Aws, "12", "eu").await.unwrap(), vec!["eu-a", "eu-b"]);
        let types = c.list_instance_types(ProviderName::Aws, "12", "eu", "eu-a").await.unwrap();
        assert_eq!(types.get("M").map(String::as_str), Some("medium"));
        assert!(!types.contains_key("bogus"));
        assert_eq!(c.list_operating_systems(ProviderName::Aws, "12", "eu", 7, "me").await.unwrap(), vec!["ubuntu"]);
        let k8s = c.list_supported_kubernetes_config().await.unwrap();
        assert_eq!(k8s.versions, vec!["v1.27"]);

        let calls = mock.calls();
        let zones_call = &calls[0];
        assert_eq!(zones_call.method, Method::Post);
        assert_eq!(zones_call.body, Some(json!({ "provider": "aws", "accountId": "12", "region": "eu" })));
    }

    #[tokio::test]
    async fn catalog_error_body_is_not_an_empty_list() {
        let (_m, c) = client(
            MockTransport::new()
                .respond("/getValidZones", json!({ "error": "credential invalid" }))
                .respond("/getValidInstances", json!({ "instances": ["small"] }))
                .respond("/getValidOperatingSystems/me/aws/12/eu/7", json!({})),
        );
        let err = c.list_zones(ProviderName::Aws, "12", "eu").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m.contains("credential invalid")));
        assert!(matches!(
            c.list_instance_types(ProviderName::Aws, "12", "eu", "eu-a").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            c.list_operating_systems(ProviderName::Aws, "12", "eu", 7, "me").await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn empty_catalog_is_still_ok() {
        let (_m, c) = client(MockTransport::new().respond("/getValidZones", json!({ "zones": [] })));
        assert!(c.list_zones(ProviderName::Google, "1", "eu").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn os_path_segments_are_escaped() {
        let (mock, c) = client(
            MockTransport::new()
                .respond("/getValidOperatingSystems/a%2Fb/azure/7%2F8/west%20eu/7", json!({ "operatingSystems": ["x"] })),
        );
        let os = c.list_operating_systems(ProviderName::Azure, "7/8", "west eu", 7, "a/b").await.unwrap();
        assert_eq!(os, vec!["x"]);
        assert_eq!(mock.calls_to("/getValidOperatingSystems/a%2Fb/azure/7%2F8/west%20eu/7"), 1);
    }

    #[tokio::test]
    async fn rename_posts_cluster_fields() {
        let (mock, c) = client(MockTransport::new().respond("/renameCluster", json!({ "submitted": true })));
        c.rename_cluster("abc", "new").await.unwrap();
        let calls = mock.calls();
        assert_eq!(calls[0].body, Some(json!({ "clusterID": "abc", "clusterName": "new" })));
    }

    #[tokio::test]
    async fn mock_failure_surfaces_status() {
        let (_m, c) = client(MockTransport::new().fail("/buckets", 403, "forbidden"));
        let err = c.list_buckets().await.unwrap_err();
        assert_eq!(err.to_string(), "status 403: forbidden");
    }
}
