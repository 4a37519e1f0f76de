use std::fs;
use std::path::{Path, PathBuf};

const ENV_CANDIDATES: [&str; 3] = ["llmfanout.env", "LlmFanout.env", ".env"];
const DEFAULT_CONFIG_FILENAME: &str = "llmfanout.json";

pub const ENV_CONFIG_PATH: &str = "LLMFANOUT_CONFIG_PATH";
pub const ENV_SERVICE_ADDR: &str = "LLMFANOUT_SERVICE_ADDR";

pub(crate) fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn strip_inline_comment(value: &str) -> &str {
    // 中文注释：只有 ` #` 才视为行尾注释，与常见 dotenv 行为保持一致。
    let Some(pos) = value.find(" #") else {
        return value;
    };
    value[..pos].trim_end()
}

fn parse_dotenv_kv(line: &str) -> Option<(String, String)> {
    let mut line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return None;
    }
    if let Some(rest) = line.strip_prefix("export ") {
        line = rest.trim();
    }
    let (key, raw_value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let mut value = raw_value.trim();
    if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
        || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
    {
        value = &value[1..value.len() - 1];
    } else {
        value = strip_inline_comment(value);
    }
    Some((key.to_string(), value.to_string()))
}

fn find_env_file_in_dir(dir: &Path) -> Option<PathBuf> {
    ENV_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Applies `KEY=value` lines from an env file next to the executable.
/// Variables already present in the process environment win.
pub(crate) fn load_env_from_exe_dir() {
    let dir = exe_dir();
    let Some(path) = find_env_file_in_dir(&dir) else {
        return;
    };
    let Ok(text) = fs::read_to_string(&path) else {
        return;
    };

    let mut applied = 0usize;
    for line in text.lines() {
        let Some((key, value)) = parse_dotenv_kv(line) else {
            continue;
        };
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(key, value);
        applied += 1;
    }

    if applied > 0 {
        log::info!("Loaded {} env vars from {}", applied, path.display());
    }
}

fn resolve_path_with_base(raw: &str, base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        return path;
    }
    base_dir.join(path)
}

pub(crate) fn config_file_path() -> PathBuf {
    match std::env::var(ENV_CONFIG_PATH) {
        Ok(raw) if !raw.trim().is_empty() => resolve_path_with_base(&raw, &exe_dir()),
        _ => exe_dir().join(DEFAULT_CONFIG_FILENAME),
    }
}

pub(crate) fn service_addr_override() -> Option<String> {
    std::env::var(ENV_SERVICE_ADDR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
