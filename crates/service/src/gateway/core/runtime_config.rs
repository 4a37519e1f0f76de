use llmfanout_core::config::{ConfigSnapshot, SelectionPolicy};
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

const ENV_HOST: &str = "LLMFANOUT_HOST";
const ENV_PORT: &str = "LLMFANOUT_PORT";
const ENV_API_KEY: &str = "LLMFANOUT_API_KEY";
const ENV_MIN_RESPONSE_LENGTH: &str = "LLMFANOUT_MIN_RESPONSE_LENGTH";
const ENV_REQUEST_TIMEOUT_SECS: &str = "LLMFANOUT_REQUEST_TIMEOUT_SECS";
const ENV_BASE_URL: &str = "LLMFANOUT_BASE_URL";
const ENV_SELECTION_POLICY: &str = "LLMFANOUT_SELECTION_POLICY";
const ENV_COLLECTION_WINDOW_SECS: &str = "LLMFANOUT_COLLECTION_WINDOW_SECS";

/// Holds the current config snapshot. Requests clone the `Arc` once and keep
/// using it even if a reload swaps in a newer one meanwhile.
pub(crate) struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl ConfigStore {
    /// Loads the file at `path`, writing a placeholder config first if it is missing.
    pub(crate) fn load_or_init(path: PathBuf) -> Result<Self, String> {
        if !path.exists() {
            write_default_config(&path)?;
            log::warn!(
                "event=config_created path={} note=fill in credential_groups before use",
                path.display()
            );
        }
        let snapshot = read_snapshot(&path)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_snapshot(snapshot: ConfigSnapshot) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&crate::lock_utils::read_recover(&self.current, "config_snapshot"))
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-reads the file; an invalid file leaves the current snapshot in place.
    pub(crate) fn reload(&self) -> Result<Arc<ConfigSnapshot>, String> {
        let Some(path) = self.path.as_deref() else {
            return Err("config store has no backing file".to_string());
        };
        let next = Arc::new(read_snapshot(path)?);
        let mut current = crate::lock_utils::write_recover(&self.current, "config_snapshot");
        *current = Arc::clone(&next);
        log::info!(
            "event=config_reloaded path={} groups={}",
            path.display(),
            next.group_count()
        );
        Ok(next)
    }
}

fn read_snapshot(path: &Path) -> Result<ConfigSnapshot, String> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("read config {} failed: {err}", path.display()))?;
    // 中文注释：先叠加环境变量再统一校验，使 env 能补齐文件中留空的字段。
    let mut snapshot = ConfigSnapshot::parse_json(&text)?;
    apply_env_overrides(&mut snapshot);
    snapshot.normalize();
    snapshot.validate()?;
    Ok(snapshot)
}

fn write_default_config(path: &Path) -> Result<(), String> {
    let text = ConfigSnapshot::with_placeholder_groups().to_pretty_json()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("create config dir {} failed: {err}", parent.display()))?;
    }
    fs::write(path, text).map_err(|err| format!("write config {} failed: {err}", path.display()))
}

pub(crate) fn apply_env_overrides(snapshot: &mut ConfigSnapshot) {
    if let Some(host) = env_non_empty(ENV_HOST) {
        snapshot.server.host = host;
    }
    snapshot.server.port = env_parse_or(ENV_PORT, snapshot.server.port);
    if let Some(api_key) = env_non_empty(ENV_API_KEY) {
        snapshot.server.api_key = api_key;
    }
    snapshot.server.min_response_length =
        env_parse_or(ENV_MIN_RESPONSE_LENGTH, snapshot.server.min_response_length);
    snapshot.server.request_timeout_secs =
        env_parse_or(ENV_REQUEST_TIMEOUT_SECS, snapshot.server.request_timeout_secs);
    if let Some(base_url) = env_non_empty(ENV_BASE_URL) {
        snapshot.upstream.base_url = base_url;
    }
    if let Some(raw) = env_non_empty(ENV_SELECTION_POLICY) {
        match SelectionPolicy::parse(&raw) {
            Some(policy) => snapshot.arbitration.selection_policy = policy,
            None => log::warn!("event=config_env_ignored key={ENV_SELECTION_POLICY} value={raw}"),
        }
    }
    snapshot.arbitration.collection_window_secs = env_parse_or(
        ENV_COLLECTION_WINDOW_SECS,
        snapshot.arbitration.collection_window_secs,
    );
}

/// One pooled client for all upstream attempts. No total timeout here: each
/// attempt is bounded by its own timeout in the caller.
pub(crate) fn build_upstream_client(snapshot: &ConfigSnapshot) -> Result<Client, String> {
    Client::builder()
        // 中文注释：连接阶段单独设超时，避免网络异常时尝试长期挂起占住并发槽位。
        .connect_timeout(Duration::from_secs(snapshot.upstream.connect_timeout_secs.max(1)))
        .pool_max_idle_per_host(32)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .build()
        .map_err(|err| format!("build upstream client failed: {err}"))
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_non_empty(name)
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
