//! Configuration Vault – reads/writes `~/.recollect/config.toml`.

use recollect_memory::MemoryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// Supported AI provider choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Ollama,
    OpenAI,
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProvider::Ollama => write!(f, "ollama"),
            AiProvider::OpenAI => write!(f, "openai"),
        }
    }
}

impl AiProvider {
    /// Parse a user-typed provider name; anything unknown means Ollama.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "openai" => AiProvider::OpenAI,
            _ => AiProvider::Ollama,
        }
    }
}

/// Persisted user configuration stored in `~/.recollect/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chosen AI provider.
    #[serde(default)]
    pub ai_provider: AiProvider,

    /// Chat model used for summaries and fact extraction.
    #[serde(default = "default_model")]
    pub active_model: String,

    /// Model used to embed memories and queries.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Base URL of the Ollama instance.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Base URL of the OpenAI-compatible cloud endpoint.
    #[serde(default = "default_openai_url")]
    pub openai_url: String,

    /// OpenAI API key. Wiped from memory when the config is dropped.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub openai_api_key: String,

    /// Per-request timeout for model calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// User whose memories the REPL starts with.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Memory engine thresholds.
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("ai_provider", &self.ai_provider)
            .field("active_model", &self.active_model)
            .field("embedding_model", &self.embedding_model)
            .field("ollama_url", &self.ollama_url)
            .field("openai_url", &self.openai_url)
            .field(
                "openai_api_key",
                if self.openai_api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_id", &self.user_id)
            .field("memory", &self.memory)
            .finish()
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.openai_api_key.zeroize();
    }
}

fn default_model() -> String {
    "llama3".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_user_id() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai_provider: AiProvider::default(),
            active_model: default_model(),
            embedding_model: default_embedding_model(),
            ollama_url: default_ollama_url(),
            openai_url: default_openai_url(),
            openai_api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            user_id: default_user_id(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Config {
    /// Base URL of the active provider.
    pub fn base_url(&self) -> &str {
        match self.ai_provider {
            AiProvider::Ollama => &self.ollama_url,
            AiProvider::OpenAI => &self.openai_url,
        }
    }

    /// API key to send, if the active provider needs one.
    pub fn api_key(&self) -> Option<String> {
        match self.ai_provider {
            AiProvider::OpenAI if !self.openai_api_key.is_empty() => {
                Some(self.openai_api_key.clone())
            }
            _ => None,
        }
    }

    /// Memory settings with the database placed under `~/.recollect/` when
    /// no path was configured.
    pub fn memory_config(&self) -> MemoryConfig {
        let mut memory = self.memory.clone();
        if memory.db_path.is_none() {
            memory.db_path = Some(default_db_path().to_string_lossy().into_owned());
        }
        memory
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

/// Return the path to `~/.recollect/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Return the path to `~/.recollect/memory.db`.
pub fn default_db_path() -> PathBuf {
    data_dir_for_home(&home_dir()).join("memory.db")
}

pub(crate) fn data_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".recollect")
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    data_dir_for_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config, falling back to defaults (with environment overrides)
/// when the file is missing or unreadable.
pub fn load_or_default() -> Config {
    match load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) | Err(_) => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `RECOLLECT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RECOLLECT_OLLAMA_URL` | `ollama_url` |
/// | `RECOLLECT_MODEL` | `active_model` |
/// | `RECOLLECT_EMBED_MODEL` | `embedding_model` |
/// | `RECOLLECT_DB_PATH` | `memory.db_path` |
/// | `RECOLLECT_USER` | `user_id` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RECOLLECT_OLLAMA_URL") {
        cfg.ollama_url = v;
    }
    if let Ok(v) = std::env::var("RECOLLECT_MODEL") {
        cfg.active_model = v;
    }
    if let Ok(v) = std::env::var("RECOLLECT_EMBED_MODEL") {
        cfg.embedding_model = v;
    }
    if let Ok(v) = std::env::var("RECOLLECT_DB_PATH")
        && !v.trim().is_empty()
    {
        cfg.memory.db_path = Some(v);
    }
    if let Ok(v) = std::env::var("RECOLLECT_USER")
        && !v.trim().is_empty()
    {
        cfg.user_id = v.trim().to_string();
    }
}

/// Save the config to disk, creating `~/.recollect/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only file (rw-------) on Unix; it may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_api_key() {
        let mut cfg = Config::default();
        cfg.openai_api_key = "sk-super-secret".to_string();
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("sk-super-secret"));
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn config_debug_shows_not_set_for_empty_key() {
        let debug_str = format!("{:?}", Config::default());
        assert!(debug_str.contains("<not set>"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_keeps_memory_table() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.ai_provider = AiProvider::OpenAI;
        cfg.memory.short_term_max_count = 4;
        cfg.memory.hp_decay_rate = 0.2;
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.ai_provider, AiProvider::OpenAI);
        assert_eq!(loaded.memory.short_term_max_count, 4);
        assert!((loaded.memory.hp_decay_rate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "active_model = \"qwen2\"\n[memory]\nshort_term_max_count = 3\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.active_model, "qwen2");
        assert_eq!(loaded.embedding_model, "nomic-embed-text");
        assert_eq!(loaded.memory.short_term_max_count, 3);
        assert_eq!(loaded.memory.states_token_threshold, 80_000);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "memory = 12").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn config_path_points_to_recollect_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.recollect/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn provider_selects_url_and_key() {
        let mut cfg = Config::default();
        cfg.openai_api_key = "sk-test".to_string();
        assert_eq!(cfg.base_url(), "http://localhost:11434");
        assert!(cfg.api_key().is_none());

        cfg.ai_provider = AiProvider::OpenAI;
        assert_eq!(cfg.base_url(), "https://api.openai.com");
        assert_eq!(cfg.api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn provider_parse_defaults_to_ollama() {
        assert_eq!(AiProvider::parse("OpenAI"), AiProvider::OpenAI);
        assert_eq!(AiProvider::parse("anthropic"), AiProvider::Ollama);
    }

    #[test]
    fn memory_config_keeps_explicit_db_path() {
        let mut cfg = Config::default();
        cfg.memory.db_path = Some("/tmp/custom.db".to_string());
        assert_eq!(cfg.memory_config().db_path.as_deref(), Some("/tmp/custom.db"));
    }

    #[test]
    fn apply_env_overrides_changes_ollama_url() {
        // SAFETY: each override test uses its own variable.
        unsafe { std::env::set_var("RECOLLECT_OLLAMA_URL", "http://gpu-box:11434") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.ollama_url, "http://gpu-box:11434");
        unsafe { std::env::remove_var("RECOLLECT_OLLAMA_URL") };
    }

    #[test]
    fn apply_env_overrides_changes_embedding_model() {
        // SAFETY: each override test uses its own variable.
        unsafe { std::env::set_var("RECOLLECT_EMBED_MODEL", "mxbai-embed-large") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.embedding_model, "mxbai-embed-large");
        unsafe { std::env::remove_var("RECOLLECT_EMBED_MODEL") };
    }

    #[test]
    fn apply_env_overrides_changes_db_path() {
        // SAFETY: each override test uses its own variable.
        unsafe { std::env::set_var("RECOLLECT_DB_PATH", "/var/lib/recollect.db") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.memory.db_path.as_deref(), Some("/var/lib/recollect.db"));
        unsafe { std::env::remove_var("RECOLLECT_DB_PATH") };
    }

    #[test]
    fn apply_env_overrides_ignores_blank_user() {
        // SAFETY: each override test uses its own variable.
        unsafe { std::env::set_var("RECOLLECT_USER", "   ") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.user_id, "default");
        unsafe { std::env::remove_var("RECOLLECT_USER") };
    }
}
