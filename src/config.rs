// src/config.rs
use crate::orchestration::DEFAULT_SEARCH_K;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// Process-level settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub agent_service_url: String,
    pub openai_base_url: String,
    pub vision_model: String,
    pub poster_search_k: usize,
    pub config_file: PathBuf,
    pub master_key_file: PathBuf,
    pub log_dir: PathBuf,
    pub log_max_files: usize,
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
    pub redis_url: Option<String>,
    pub session_ttl_secs: usize,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            agent_service_url: "http://127.0.0.1:8000".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            poster_search_k: DEFAULT_SEARCH_K,
            config_file: PathBuf::from("config.encrypted"),
            master_key_file: PathBuf::from(".master_key"),
            log_dir: PathBuf::from("logs"),
            log_max_files: 10,
            template_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            redis_url: None,
            session_ttl_secs: 86_400,
            max_upload_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        Ok(Self {
            host: string("HOST", defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            agent_service_url: string("AGENT_SERVICE_URL", defaults.agent_service_url)
                .trim_end_matches('/')
                .to_string(),
            openai_base_url: string("OPENAI_BASE_URL", defaults.openai_base_url)
                .trim_end_matches('/')
                .to_string(),
            vision_model: string("VISION_MODEL", defaults.vision_model),
            poster_search_k: parse_or(&lookup, "POSTER_SEARCH_K", defaults.poster_search_k)?,
            config_file: path("CONFIG_FILE", defaults.config_file),
            master_key_file: path("MASTER_KEY_FILE", defaults.master_key_file),
            log_dir: path("LOG_DIR", defaults.log_dir),
            log_max_files: parse_or(&lookup, "LOG_MAX_FILES", defaults.log_max_files)?,
            template_dir: path("TEMPLATE_DIR", defaults.template_dir),
            static_dir: path("STATIC_DIR", defaults.static_dir),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            session_ttl_secs: parse_or(&lookup, "SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            request_timeout_secs: parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8765);
        assert_eq!(config.poster_search_k, 5);
        assert_eq!(config.bind_addr(), "0.0.0.0:8765");
        assert!(config.redis_url.is_none());
        assert_eq!(config.config_file, PathBuf::from("config.encrypted"));
    }

    #[test]
    fn overrides_are_parsed_and_urls_trimmed() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("AGENT_SERVICE_URL", "http://agent:8000/"),
            ("REDIS_URL", "redis://cache:6379"),
            ("LOG_MAX_FILES", "3"),
            ("POSTER_SEARCH_K", "8"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.agent_service_url, "http://agent:8000");
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.log_max_files, 3);
        assert_eq!(config.poster_search_k, 8);
    }

    #[test]
    fn blank_redis_url_means_in_memory_sessions() {
        let config = ServerConfig::from_lookup(lookup(&[("REDIS_URL", "  ")])).unwrap();
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
