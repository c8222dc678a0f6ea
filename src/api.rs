use crate::addon::{Addon, GithubInfo, Manifest, SavedAddon};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;

const CONNECT_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 8;
const USER_AGENT: &str = "streamsmith";

/// Failure taxonomy for the management API. Timeouts are their own
/// variant so the UI can render them distinctly from generic network
/// failures; upstream errors carry the service's message verbatim.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Upstream(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub auth_key: String,
    pub email: String,
}

#[derive(Debug)]
pub struct LoginData {
    pub auth_key: String,
    pub addons: Vec<Addon>,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub ok: bool,
    pub details: Option<String>,
}

/// Blocking client for the management API. Cheap to clone; the agent
/// carries its connection pool behind an Arc, so worker threads get
/// their own handle.
#[derive(Clone)]
pub struct Client {
    agent: ureq::Agent,
    base_url: String,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn login(&self, email: &str, password: &str) -> ApiResult<LoginData> {
        let value = self.post(
            "/api/login",
            json!({ "email": email, "password": password }),
        )?;
        parse_login(value)
    }

    pub fn login_with_key(&self, auth_key: &str, email: &str) -> ApiResult<LoginData> {
        let value = self.post(
            "/api/login",
            json!({ "authKey": auth_key, "email": email }),
        )?;
        parse_login(value)
    }

    pub fn monitor_login(&self, admin_key: &str, target_email: &str) -> ApiResult<LoginData> {
        let value = self.post(
            "/api/admin/monitor",
            json!({ "adminKey": admin_key, "targetEmail": target_email }),
        )?;
        parse_login(value)
    }

    pub fn get_addons(&self, credentials: &Credentials) -> ApiResult<Vec<Addon>> {
        let value = self.post(
            "/api/get-addons",
            json!({ "authKey": credentials.auth_key, "email": credentials.email }),
        )?;
        parse_addons(&value)
    }

    pub fn set_addons(&self, credentials: &Credentials, addons: &[SavedAddon]) -> ApiResult<()> {
        let payload = serde_json::to_value(addons)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        self.post(
            "/api/set-addons",
            json!({
                "authKey": credentials.auth_key,
                "email": credentials.email,
                "addons": payload,
            }),
        )?;
        Ok(())
    }

    pub fn fetch_manifest(&self, manifest_url: &str) -> ApiResult<Manifest> {
        let value = self.post("/api/fetch-manifest", json!({ "manifestUrl": manifest_url }))?;
        serde_json::from_value(value)
            .map_err(|err| ApiError::InvalidResponse(format!("manifest: {err}")))
    }

    pub fn check_health(&self, addon_url: &str) -> ApiResult<HealthReport> {
        let value = self.post("/api/check-health", json!({ "addonUrl": addon_url }))?;
        let ok = value
            .get("status")
            .and_then(Value::as_str)
            .map(|status| status == "ok")
            .unwrap_or(false);
        let details = value
            .get("details")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(HealthReport { ok, details })
    }

    pub fn github_info(&self, repo_url: &str) -> ApiResult<GithubInfo> {
        let value = self.post("/api/github-info", json!({ "repoUrl": repo_url }))?;
        let info = value
            .get("info")
            .cloned()
            .ok_or_else(|| ApiError::InvalidResponse("missing info payload".to_string()))?;
        serde_json::from_value(info)
            .map_err(|err| ApiError::InvalidResponse(format!("github info: {err}")))
    }

    pub fn logout(&self, credentials: &Credentials) -> ApiResult<()> {
        self.post(
            "/api/logout",
            json!({ "authKey": credentials.auth_key, "email": credentials.email }),
        )?;
        Ok(())
    }

    /// Round-trip probe straight against the addon itself (not the
    /// management API). Returns elapsed milliseconds.
    pub fn probe(&self, url: &str) -> ApiResult<u128> {
        let started = Instant::now();
        let result = self
            .agent
            .get(url)
            .set("User-Agent", USER_AGENT)
            .call();
        match result {
            Ok(_) | Err(ureq::Error::Status(..)) => Ok(started.elapsed().as_millis()),
            Err(ureq::Error::Transport(transport)) => Err(map_transport(&transport.to_string())),
        }
    }

    fn post(&self, path: &str, body: Value) -> ApiResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .agent
            .post(&url)
            .set("User-Agent", USER_AGENT)
            .send_json(body);

        match response {
            Ok(response) => {
                let value: Value = response
                    .into_json()
                    .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
                if let Some(message) = error_message(&value) {
                    return Err(ApiError::Upstream(message));
                }
                Ok(value)
            }
            Err(ureq::Error::Status(code, response)) => {
                if code == 504 {
                    return Err(ApiError::Timeout);
                }
                let body: Value = response.into_json().unwrap_or(Value::Null);
                let message = error_message(&body)
                    .unwrap_or_else(|| format!("server returned status {code}"));
                Err(ApiError::Upstream(message))
            }
            Err(ureq::Error::Transport(transport)) => Err(map_transport(&transport.to_string())),
        }
    }
}

fn map_transport(message: &str) -> ApiError {
    let lowered = message.to_lowercase();
    if lowered.contains("timed out") || lowered.contains("timeout") {
        ApiError::Timeout
    } else {
        ApiError::Transport(message.to_string())
    }
}

/// The service reports business failures either as `{"error": "..."}`
/// or `{"error": {"message": "..."}}`, sometimes with a 200 status.
fn error_message(value: &Value) -> Option<String> {
    match value.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(Value::Object(map)) => Some(
            map.get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string(),
        ),
        Some(Value::Null) | None => value
            .get("success")
            .and_then(Value::as_bool)
            .and_then(|success| {
                if success {
                    None
                } else {
                    Some(
                        value
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("request failed")
                            .to_string(),
                    )
                }
            }),
        Some(other) => Some(other.to_string()),
    }
}

fn parse_login(value: Value) -> ApiResult<LoginData> {
    let auth_key = value
        .get("authKey")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::InvalidResponse("login response missing authKey".to_string()))?
        .to_string();
    let addons = parse_addons(&value)?;
    Ok(LoginData { auth_key, addons })
}

fn parse_addons(value: &Value) -> ApiResult<Vec<Addon>> {
    let entries = value
        .get("addons")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::InvalidResponse("response missing addons array".to_string()))?;
    entries
        .iter()
        .map(|entry| {
            Addon::from_value(entry.clone())
                .map_err(|err| ApiError::InvalidResponse(format!("addon entry: {err}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_shapes() {
        assert_eq!(
            error_message(&json!({ "error": "bad credentials" })).as_deref(),
            Some("bad credentials")
        );
        assert_eq!(
            error_message(&json!({ "error": { "message": "invalid manifest" } })).as_deref(),
            Some("invalid manifest")
        );
        assert_eq!(error_message(&json!({ "success": true })), None);
        assert_eq!(
            error_message(&json!({ "success": false, "message": "nope" })).as_deref(),
            Some("nope")
        );
        assert_eq!(error_message(&json!({ "addons": [] })), None);
    }

    #[test]
    fn timeout_transport_is_distinct() {
        assert!(matches!(
            map_transport("Network Error: connection timed out"),
            ApiError::Timeout
        ));
        assert!(matches!(
            map_transport("dns error"),
            ApiError::Transport(_)
        ));
    }

    #[test]
    fn login_payload_parses() {
        let data = parse_login(json!({
            "authKey": "key-1",
            "addons": [
                { "transportUrl": "https://a.example/manifest.json",
                  "manifest": { "id": "a", "version": "1.0.0", "name": "A" } }
            ]
        }))
        .expect("login parses");
        assert_eq!(data.auth_key, "key-1");
        assert_eq!(data.addons.len(), 1);
        assert_eq!(data.addons[0].manifest.name, "A");
    }
}
