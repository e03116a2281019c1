use std::env;
use std::path::PathBuf;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ChatError;

/// Initialize the tracing subscriber with env-based filtering.
///
/// Reads `RUST_LOG` (or `LOG_LEVEL`) to set the filter, falling back to the
/// given default.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(true).init();
}

/// Service configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the upstream LLM/RAG service. Required; a missing value
    /// is a configuration error, not a runtime network failure.
    pub llm_url: String,
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// `user:token` pairs accepted by the bearer-token verifier.
    pub auth_tokens: Vec<(String, String)>,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` if present, then reads required vars.
    pub fn from_env() -> Result<Self, ChatError> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source. `from_env` passes the process
    /// environment; tests pass a fixed map.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let required = |key: &str| {
            get(key).ok_or_else(|| ChatError::Config(format!("{key} is required but not set")))
        };
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            llm_url: required("LLM_URL")?,
            host: or_default("HOST", "0.0.0.0"),
            port: or_default("PORT", "8080")
                .parse()
                .map_err(|e| ChatError::Config(format!("invalid PORT: {e}")))?,
            database_path: PathBuf::from(or_default("DATABASE_PATH", "kms-chat.db")),
            auth_tokens: parse_auth_tokens(&or_default("AUTH_TOKENS", ""))?,
            log_level: or_default("LOG_LEVEL", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_auth_tokens(raw: &str) -> Result<Vec<(String, String)>, ChatError> {
    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            pair.split_once(':')
                .map(|(user, token)| (user.trim().to_owned(), token.trim().to_owned()))
                .filter(|(user, token)| !user.is_empty() && !token.is_empty())
                .ok_or_else(|| {
                    ChatError::Config(format!("invalid AUTH_TOKENS entry: {}", pair.trim()))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn config_requires_llm_url() {
        let err = AppConfig::from_lookup(vars(&[])).unwrap_err();
        assert!(err.to_string().contains("LLM_URL"));
    }

    #[test]
    fn config_applies_defaults() {
        let cfg = AppConfig::from_lookup(vars(&[("LLM_URL", "http://localhost:5000")]))
            .expect("should parse config");
        assert_eq!(cfg.llm_url, "http://localhost:5000");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(cfg.auth_tokens.is_empty());
    }

    #[test]
    fn config_rejects_bad_port() {
        let err = AppConfig::from_lookup(vars(&[
            ("LLM_URL", "http://localhost:5000"),
            ("PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn parse_auth_tokens_splits_pairs() {
        let tokens = parse_auth_tokens("alice:tok1, bob:tok2").unwrap();
        assert_eq!(
            tokens,
            vec![
                ("alice".to_string(), "tok1".to_string()),
                ("bob".to_string(), "tok2".to_string()),
            ]
        );
    }

    #[test]
    fn parse_auth_tokens_rejects_malformed_entry() {
        assert!(parse_auth_tokens("no-colon-here").is_err());
    }

    #[test]
    fn bind_addr_formats_correctly() {
        let cfg = AppConfig {
            llm_url: String::new(),
            host: "127.0.0.1".to_owned(),
            port: 3000,
            database_path: PathBuf::from("x.db"),
            auth_tokens: vec![],
            log_level: "debug".to_owned(),
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
    }
}
