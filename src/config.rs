//! Startup configuration.
//!
//! Loaded once from a TOML file into an immutable `Config` and injected into
//! the hasher, the token signers, and the server at construction time. The
//! signing secrets may also be supplied through environment variables, which
//! take priority over the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("inkpost.db"),
        }
    }
}

/// Signing secrets, one per cookie purpose.
///
/// The session cookie and the visit counter are signed with distinct keys so
/// a token minted for one purpose never verifies for the other.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecretsConfig {
    /// Keys the login-session cookie signer.
    pub session: String,
    /// Keys the visit-counter cookie signer.
    pub visits: String,
}

impl Config {
    /// Load configuration from `path`, apply environment overrides, and
    /// validate that both secrets are present.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        if let Some(secret) = env_secret("INKPOST_SESSION_SECRET") {
            config.secrets.session = secret;
        }
        if let Some(secret) = env_secret("INKPOST_VISITS_SECRET") {
            config.secrets.visits = secret;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.secrets.session.trim().is_empty() {
            bail!("No session secret configured — set [secrets] session or INKPOST_SESSION_SECRET");
        }
        if self.secrets.visits.trim().is_empty() {
            bail!("No visits secret configured — set [secrets] visits or INKPOST_VISITS_SECRET");
        }
        if self.secrets.session == self.secrets.visits {
            tracing::warn!(
                "session and visits secrets are identical — cookies are not purpose-scoped"
            );
        }
        Ok(())
    }
}

fn env_secret(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [database]
            path = "/var/lib/inkpost/blog.db"

            [secrets]
            session = "session-secret"
            visits = "visits-secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path, PathBuf::from("/var/lib/inkpost/blog.db"));
        assert_eq!(config.secrets.session, "session-secret");
        assert_eq!(config.secrets.visits, "visits-secret");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("[secrets]\nsession = \"a\"\nvisits = \"b\"").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, PathBuf::from("inkpost.db"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<Config, _> = toml::from_str("[server]\nhsot = \"oops\"");
        assert!(result.is_err());
    }

    #[test]
    fn empty_session_secret_fails_validation() {
        let config: Config = toml::from_str("[secrets]\nvisits = \"b\"").unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("session secret"));
    }

    #[test]
    fn empty_visits_secret_fails_validation() {
        let config: Config = toml::from_str("[secrets]\nsession = \"a\"").unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("visits secret"));
    }

    #[test]
    fn identical_secrets_still_validate() {
        let config: Config =
            toml::from_str("[secrets]\nsession = \"same\"\nvisits = \"same\"").unwrap();
        assert!(config.validate().is_ok());
    }
}
