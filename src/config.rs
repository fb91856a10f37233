use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub state: StateConfig,
    pub functions: FunctionsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub owner: Option<OwnerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "kindred.db".to_string()
}

/// Remote function platform: base URL of the hosted backend plus the API key
/// sent as a bearer token on every invocation.
#[derive(Debug, Deserialize, Clone)]
pub struct FunctionsConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// OAuth authorize endpoint of the hosted auth provider. Empty means
    /// sign-in is not configured.
    #[serde(default)]
    pub authorize_url: String,
    #[serde(default = "default_auth_provider")]
    pub provider: String,
    /// Where the provider redirects after sign-in (the app origin).
    #[serde(default = "default_redirect_origin")]
    pub redirect_origin: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authorize_url: String::new(),
            provider: default_auth_provider(),
            redirect_origin: default_redirect_origin(),
        }
    }
}

fn default_auth_provider() -> String {
    "google".to_string()
}

fn default_redirect_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Acting principal for CLI operations. Store and nudge commands refuse to
/// run without it.
#[derive(Debug, Deserialize, Clone)]
pub struct OwnerConfig {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub partner_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
