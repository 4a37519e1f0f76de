use serde::{Deserialize, Serialize};

use crate::credentials::CredentialGroup;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CLIENT_API_KEY: &str = "123";
pub const DEFAULT_MIN_RESPONSE_LENGTH: usize = 400;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CHAT_PATH: &str = "/openai/chat/completions";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_COLLECTION_WINDOW_SECS: u64 = 15;
pub const DEFAULT_STREAM_CHUNK_COUNT: usize = 50;
pub const DEFAULT_STREAM_CHUNK_DELAY_MS: u64 = 10;
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.5-flash";

/// How the arbitrator turns a set of candidates into one winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First candidate to arrive wins; siblings are cancelled immediately.
    #[default]
    FirstAcceptable,
    /// After the first candidate, keep collecting for a fixed window and pick the longest.
    BestOfWindow,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::FirstAcceptable => "first_acceptable",
            SelectionPolicy::BestOfWindow => "best_of_window",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first_acceptable" | "first" => Some(SelectionPolicy::FirstAcceptable),
            "best_of_window" | "best" | "longest" => Some(SelectionPolicy::BestOfWindow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token clients must present.
    pub api_key: String,
    /// Minimum content length (characters) for a completion to become a candidate.
    pub min_response_length: usize,
    /// Per-attempt upstream timeout.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: DEFAULT_CLIENT_API_KEY.to_string(),
            min_response_length: DEFAULT_MIN_RESPONSE_LENGTH,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub chat_path: String,
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrationConfig {
    pub selection_policy: SelectionPolicy,
    /// Extra wait after the first candidate; only read in best-of-window mode.
    pub collection_window_secs: u64,
    pub stream_chunk_count: usize,
    pub stream_chunk_delay_ms: u64,
    pub fallback_model: String,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            selection_policy: SelectionPolicy::default(),
            collection_window_secs: DEFAULT_COLLECTION_WINDOW_SECS,
            stream_chunk_count: DEFAULT_STREAM_CHUNK_COUNT,
            stream_chunk_delay_ms: DEFAULT_STREAM_CHUNK_DELAY_MS,
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialGroupConfig {
    pub name: String,
    #[serde(default)]
    pub credentials: Vec<String>,
}

/// One immutable view of the configuration file. Readers hold it behind an `Arc`
/// for the lifetime of a request; reloads build a new snapshot instead of mutating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub arbitration: ArbitrationConfig,
    pub credential_groups: Vec<CredentialGroupConfig>,
}

impl ConfigSnapshot {
    /// Parse only. Callers that layer overrides on top normalize and validate afterwards.
    pub fn parse_json(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|err| format!("invalid config json: {err}"))
    }

    /// Parse, normalize and validate a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let mut snapshot = Self::parse_json(raw)?;
        snapshot.normalize();
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Config written on first start: two groups of placeholder credentials,
    /// which the eligibility filter rejects until real ones are filled in.
    pub fn with_placeholder_groups() -> Self {
        let placeholders = |group: usize| {
            (1..=4)
                .map(|idx| format!("YOUR_API_KEY_{group}_{idx}"))
                .collect::<Vec<_>>()
        };
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            arbitration: ArbitrationConfig::default(),
            credential_groups: vec![
                CredentialGroupConfig {
                    name: "group1".to_string(),
                    credentials: placeholders(1),
                },
                CredentialGroupConfig {
                    name: "group2".to_string(),
                    credentials: placeholders(2),
                },
            ],
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|err| err.to_string())
    }

    pub fn normalize(&mut self) {
        self.server.host = self.server.host.trim().to_string();
        self.server.api_key = self.server.api_key.trim().to_string();
        self.upstream.base_url = normalize_base_url(&self.upstream.base_url);
        let path = self.upstream.chat_path.trim();
        self.upstream.chat_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self.arbitration.fallback_model = self.arbitration.fallback_model.trim().to_string();
        for group in &mut self.credential_groups {
            group.name = group.name.trim().to_string();
            for credential in &mut group.credentials {
                *credential = credential.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.is_empty() {
            return Err("server.host must not be empty".to_string());
        }
        if self.server.api_key.is_empty() {
            return Err("server.api_key must not be empty".to_string());
        }
        if self.server.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs must be greater than zero".to_string());
        }
        let parsed = url::Url::parse(&self.upstream.base_url)
            .map_err(|err| format!("upstream.base_url is not a valid url: {err}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(format!(
                "upstream.base_url must use http or https, got {}",
                parsed.scheme()
            ));
        }
        if self.arbitration.stream_chunk_count == 0 {
            return Err("arbitration.stream_chunk_count must be greater than zero".to_string());
        }
        if self.credential_groups.is_empty() {
            return Err("at least one credential group is required".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for group in &self.credential_groups {
            if group.name.is_empty() {
                return Err("credential group name must not be empty".to_string());
            }
            if !seen.insert(group.name.as_str()) {
                return Err(format!("duplicate credential group name: {}", group.name));
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn upstream_chat_url(&self) -> String {
        format!("{}{}", self.upstream.base_url, self.upstream.chat_path)
    }

    pub fn group_count(&self) -> usize {
        self.credential_groups.len()
    }

    /// Group at `index` exactly as configured (no eligibility filtering).
    pub fn group(&self, index: usize) -> Option<CredentialGroup> {
        self.credential_groups
            .get(index)
            .map(|group| CredentialGroup::new(group.name.clone(), group.credentials.clone()))
    }
}

pub fn normalize_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}
