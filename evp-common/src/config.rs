//! Configuration loading
//!
//! Values are resolved with the priority order: command-line argument,
//! environment variable, TOML config file, compiled default. The binary's
//! clap definition covers the first two tiers for port/database; this
//! module loads the file tier and builds the token verifier.

use serde::Deserialize;
use std::path::Path;

use crate::auth::AuthVerifier;
use crate::error::{Error, Result};

/// Token verification mode selection
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// No verification; every request runs as a local super admin.
    /// Development and tests only.
    Disabled,
    /// HS256 with a shared secret (local development)
    Hs256,
    /// RS256 against the identity provider's public key
    #[default]
    Rs256,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Shared secret for HS256 mode
    pub hs256_secret: Option<String>,
    /// Path to the issuer's RSA public key PEM for RS256 mode
    pub rs256_public_key_path: Option<String>,
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// sqlx database URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Base URL of the external form-filling client, used to render the
    /// links embedded in invitation emails
    #[serde(default = "default_form_base_url")]
    pub form_base_url: String,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_port() -> u16 {
    5730
}

fn default_database_url() -> String {
    "sqlite://evp.db?mode=rwc".to_string()
}

fn default_form_base_url() -> String {
    "https://forms.example.com".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: default_port(),
            database_url: default_database_url(),
            form_base_url: default_form_base_url(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment
    /// variable overrides. A missing file yields the compiled defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("failed to parse {}: {e}", p.display())))?
            }
            _ => Config::default(),
        };

        if let Ok(port) = std::env::var("EVP_PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid EVP_PORT: {port}")))?;
        }
        if let Ok(url) = std::env::var("EVP_DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(url) = std::env::var("EVP_FORM_BASE_URL") {
            config.form_base_url = url;
        }
        if let Ok(mode) = std::env::var("EVP_AUTH_MODE") {
            config.auth.mode = match mode.as_str() {
                "disabled" => AuthMode::Disabled,
                "hs256" => AuthMode::Hs256,
                "rs256" => AuthMode::Rs256,
                other => return Err(Error::Config(format!("invalid EVP_AUTH_MODE: {other}"))),
            };
        }
        if let Ok(secret) = std::env::var("EVP_AUTH_HS256_SECRET") {
            config.auth.hs256_secret = Some(secret);
        }
        if let Ok(path) = std::env::var("EVP_AUTH_PUBLIC_KEY") {
            config.auth.rs256_public_key_path = Some(path);
        }

        Ok(config)
    }

    /// Build the token verifier for the configured auth mode
    pub fn build_verifier(&self) -> Result<AuthVerifier> {
        match self.auth.mode {
            AuthMode::Disabled => Ok(AuthVerifier::disabled()),
            AuthMode::Hs256 => {
                let secret = self.auth.hs256_secret.as_deref().ok_or_else(|| {
                    Error::Config("auth.hs256_secret required for hs256 mode".to_string())
                })?;
                Ok(AuthVerifier::hs256(secret))
            }
            AuthMode::Rs256 => {
                let path = self.auth.rs256_public_key_path.as_deref().ok_or_else(|| {
                    Error::Config("auth.rs256_public_key_path required for rs256 mode".to_string())
                })?;
                let pem = std::fs::read(path)?;
                AuthVerifier::rs256_pem(&pem)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_file() {
        let config = Config::default();
        assert_eq!(config.port, 5730);
        assert_eq!(config.auth.mode, AuthMode::Rs256);
    }

    #[test]
    fn parses_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port = 8080
database_url = "sqlite://test.db"

[auth]
mode = "hs256"
hs256_secret = "dev"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite://test.db");
        assert_eq!(config.auth.mode, AuthMode::Hs256);
        assert!(config.build_verifier().is_ok());
    }

    #[test]
    fn rs256_mode_requires_key_path() {
        let config = Config::default();
        assert!(config.build_verifier().is_err());
    }
}
