//! Remote function dispatch.
//!
//! Each reminder operation is a single request/response call to a named
//! function on the hosted platform. There is no queuing, retry, idempotency
//! key, or deduplication: repeated triggers issue repeated sends. The only
//! state kept per operation is a loading flag and the last error message.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::FunctionsConfig;
use crate::traits::Principal;

pub const BIRTHDAY_FUNCTION: &str = "send-birthday-reminders";
pub const DATE_IDEAS_FUNCTION: &str = "send-date-ideas";
pub const NUDGE_FUNCTION: &str = "send-nudge";
pub const CRON_SETUP_FUNCTION: &str = "setup-cron-job";

/// Classified remote-function error: tells the caller *why* the invocation
/// failed without forcing it to parse HTTP minutiae.
#[derive(Debug)]
pub struct FunctionError {
    pub kind: FunctionErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionErrorKind {
    /// 401/403, bad API key or missing authorization.
    Auth,
    /// 404, function not deployed under that name.
    NotFound,
    /// Request timed out.
    Timeout,
    /// Connection refused, DNS failure, reset, etc.
    Network,
    /// 500/502/503/504, platform-side failure.
    ServerError,
    /// Anything else.
    Unknown,
}

impl FunctionError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => FunctionErrorKind::Auth,
            404 => FunctionErrorKind::NotFound,
            408 => FunctionErrorKind::Timeout,
            500 | 502 | 503 | 504 => FunctionErrorKind::ServerError,
            _ => FunctionErrorKind::Unknown,
        };
        Self {
            kind,
            status: Some(status),
            message: extract_message(body),
        }
    }

    pub fn network(e: &reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FunctionErrorKind::Timeout
        } else {
            FunctionErrorKind::Network
        };
        Self {
            kind,
            status: None,
            message: e.to_string(),
        }
    }

    fn invalid_payload(function: &str, e: &serde_json::Error) -> Self {
        Self {
            kind: FunctionErrorKind::Unknown,
            status: None,
            message: format!("invalid JSON from {}: {}", function, e),
        }
    }
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for FunctionError {}

/// Functions report structured errors as `{"message": "..."}`. Fall back to
/// the (truncated) raw body when the shape is anything else.
fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    truncate_body(body)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 400;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

/// Run mode for the birthday-reminder function: one variant per supported
/// mode instead of a bag of optional flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BirthdayRun {
    /// Fired by the platform's cron schedule.
    Scheduled,
    /// Manually triggered from the dashboard. `force` ignores each user's
    /// reminder-time window.
    Manual { force: bool },
    /// Sends only to `email` (or the function's default test recipient).
    Test { email: Option<String> },
    /// Dry run: reports what would be sent without sending.
    Debug,
}

impl BirthdayRun {
    /// Wire body understood by the deployed function.
    fn to_body(&self) -> Value {
        match self {
            Self::Scheduled => json!({}),
            Self::Manual { force } => json!({ "manual": true, "force": force }),
            Self::Test { email: Some(email) } => {
                json!({ "manual": true, "test": true, "testEmail": email })
            }
            Self::Test { email: None } => json!({ "manual": true, "test": true }),
            Self::Debug => json!({ "manual": true, "debug": true }),
        }
    }
}

/// Counts reported by `send-birthday-reminders`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BirthdayOutcome {
    #[serde(default)]
    pub sent: u32,
    #[serde(default)]
    pub errored: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// What `setup-cron-job` returns: the cron RPC result plus the raw text
/// responses of the two reminder functions it smoke-tests.
#[derive(Debug, Clone, Deserialize)]
pub struct CronSetupReport {
    #[serde(default)]
    pub cron_result: Value,
    #[serde(default)]
    pub birthday_function_response: String,
    #[serde(default)]
    pub date_ideas_function_response: String,
}

/// Loading/error pair exposed to the UI for one dispatch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStatus {
    pub loading: bool,
    pub last_error: Option<String>,
}

pub struct FunctionClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FunctionClient {
    pub fn new(config: &FunctionsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn invoke(&self, name: &str, body: Value) -> Result<Value, FunctionError> {
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        info!(function = name, "Invoking remote function");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(function = name, "HTTP request failed: {}", e);
                FunctionError::network(&e)
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| FunctionError::network(&e))?;

        if !status.is_success() {
            error!(function = name, status = %status, "Remote function error: {}", truncate_body(&text));
            return Err(FunctionError::from_status(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| FunctionError::invalid_payload(name, &e))
    }
}

/// Wraps the function client with the per-operation loading/error state the
/// dashboard renders. One status slot per operation; no cross-operation
/// coordination.
pub struct Dispatcher {
    client: FunctionClient,
    birthday: RwLock<DispatchStatus>,
    date_ideas: RwLock<DispatchStatus>,
    nudge: RwLock<DispatchStatus>,
}

impl Dispatcher {
    pub fn new(client: FunctionClient) -> Self {
        Self {
            client,
            birthday: RwLock::new(DispatchStatus::default()),
            date_ideas: RwLock::new(DispatchStatus::default()),
            nudge: RwLock::new(DispatchStatus::default()),
        }
    }

    pub async fn birthday_status(&self) -> DispatchStatus {
        self.birthday.read().await.clone()
    }

    pub async fn date_ideas_status(&self) -> DispatchStatus {
        self.date_ideas.read().await.clone()
    }

    pub async fn nudge_status(&self) -> DispatchStatus {
        self.nudge.read().await.clone()
    }

    pub async fn send_birthday_reminders(&self, run: BirthdayRun) -> anyhow::Result<BirthdayOutcome> {
        Self::begin(&self.birthday).await;
        match self.client.invoke(BIRTHDAY_FUNCTION, run.to_body()).await {
            Ok(value) => {
                Self::finish(&self.birthday, None).await;
                Ok(serde_json::from_value(value).unwrap_or_default())
            }
            Err(e) => {
                Self::finish(&self.birthday, Some(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    pub async fn send_date_ideas(&self) -> anyhow::Result<Value> {
        Self::begin(&self.date_ideas).await;
        match self
            .client
            .invoke(DATE_IDEAS_FUNCTION, json!({ "manual_trigger": true }))
            .await
        {
            Ok(value) => {
                Self::finish(&self.date_ideas, None).await;
                Ok(value)
            }
            Err(e) => {
                Self::finish(&self.date_ideas, Some(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    /// Requires an authenticated principal; without one the call
    /// short-circuits into a local error and no request is made.
    pub async fn send_nudge(
        &self,
        principal: Option<&Principal>,
        partner_name: Option<&str>,
        city: Option<&str>,
    ) -> anyhow::Result<Value> {
        let Some(principal) = principal else {
            let message = "You must be signed in to send a nudge".to_string();
            Self::finish(&self.nudge, Some(message.clone())).await;
            anyhow::bail!(message);
        };

        Self::begin(&self.nudge).await;
        let mut body = json!({
            "userId": principal.id,
            "userEmail": principal.email,
            "userName": principal.display_name,
        });
        if let Some(partner) = partner_name {
            body["partnerName"] = json!(partner);
        }
        if let Some(city) = city {
            body["city"] = json!(city);
        }

        match self.client.invoke(NUDGE_FUNCTION, body).await {
            Ok(value) => {
                Self::finish(&self.nudge, None).await;
                Ok(value)
            }
            Err(e) => {
                Self::finish(&self.nudge, Some(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    pub async fn setup_cron_job(&self) -> anyhow::Result<CronSetupReport> {
        let value = self.client.invoke(CRON_SETUP_FUNCTION, json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn begin(status: &RwLock<DispatchStatus>) {
        let mut status = status.write().await;
        status.loading = true;
        status.last_error = None;
    }

    async fn finish(status: &RwLock<DispatchStatus>, error: Option<String>) {
        let mut status = status.write().await;
        status.loading = false;
        status.last_error = error;
    }
}
