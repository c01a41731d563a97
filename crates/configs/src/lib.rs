use anyhow::Result;
use serde::Deserialize;
use anyhow::{anyhow, Context};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection parameters for the key-value store backing the mirror.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db_index: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            db_index: 0,
            max_retries: default_max_retries(),
            connect_timeout_secs: default_connect_timeout(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 6379 }
fn default_max_retries() -> u32 { 3 }
fn default_connect_timeout() -> u64 { 5 }
fn default_backoff_base() -> u64 { 50 }
fn default_backoff_max() -> u64 { 1000 }

/// Load from `CONFIG_PATH` (default `config.toml`); a missing file means defaults.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if std::fs::metadata(&path).is_err() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let cfg: AppConfig = toml::from_str(&content).with_context(|| format!("parsing {path}"))?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.store.apply_env(|name| std::env::var(name).ok())?;
        self.store.validate()
    }
}

impl StoreConfig {
    /// Override fields from `DB_HOST`, `DB_PORT`, `DB_PASS`, `DB_INDEX` and `DB_MAX_RETRIES`.
    ///
    /// The lookup is injected so tests never touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DB_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.port = port.trim().parse().map_err(|_| anyhow!("DB_PORT is not a valid port: {port}"))?;
        }
        if let Some(pass) = lookup("DB_PASS") {
            self.password = if pass.is_empty() { None } else { Some(pass) };
        }
        if let Some(index) = lookup("DB_INDEX") {
            self.db_index = index.trim().parse().map_err(|_| anyhow!("DB_INDEX is not a number: {index}"))?;
        }
        if let Some(retries) = lookup("DB_MAX_RETRIES") {
            self.max_retries = retries
                .trim()
                .parse()
                .map_err(|_| anyhow!("DB_MAX_RETRIES is not a number: {retries}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("store.host must not be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("store.port must be in 1..=65535"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(anyhow!("store.connect_timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_local_redis() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.address(), "127.0.0.1:6379");
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.db_index, 0);
        assert!(cfg.password.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_sections_are_optional() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("mirror_cfg_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[store]\nport = 6380\npassword = \"s3cret\"\n")?;
        let cfg = load_from_file(path.to_str().unwrap())?;
        assert_eq!(cfg.store.port, 6380);
        assert_eq!(cfg.store.password.as_deref(), Some("s3cret"));
        assert_eq!(cfg.store.host, "127.0.0.1");
        assert!(!cfg.logging.json);
        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    #[test]
    fn env_overrides_file_values() -> anyhow::Result<()> {
        let mut cfg = StoreConfig::default();
        cfg.apply_env(env(&[
            ("DB_HOST", "redis.internal"),
            ("DB_PORT", "7000"),
            ("DB_PASS", "pw"),
            ("DB_INDEX", "2"),
            ("DB_MAX_RETRIES", "5"),
        ]))?;
        assert_eq!(cfg.address(), "redis.internal:7000");
        assert_eq!(cfg.password.as_deref(), Some("pw"));
        assert_eq!(cfg.db_index, 2);
        assert_eq!(cfg.max_retries, 5);
        Ok(())
    }

    #[test]
    fn empty_password_clears_credential() -> anyhow::Result<()> {
        let mut cfg = StoreConfig { password: Some("old".into()), ..StoreConfig::default() };
        cfg.apply_env(env(&[("DB_PASS", "")]))?;
        assert!(cfg.password.is_none());
        Ok(())
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut cfg = StoreConfig::default();
        assert!(cfg.apply_env(env(&[("DB_PORT", "redis")])).is_err());
        cfg.port = 0;
        assert!(cfg.validate().is_err());
    }
}
