use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{env, fs, path::Path, path::PathBuf};
use tracing::warn;

use crate::db::DatabaseConfig;

pub const DEFAULT_GATEWAY_HEADER: &str = "X-RPM-Gateway";
pub const DEFAULT_TOKEN_PREFIX: &str = "Bearer ";
pub const DEFAULT_ISSUER: &str = "rpm-user-service";
pub const DEFAULT_ACCESS_TTL_SECONDS: u64 = 24 * 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Shared-secret material the gateway uses to prove a request passed through it.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayCredential {
    #[serde(default = "default_gateway_header")]
    pub header_name: String,
    pub salt: String,
    pub secret: String,
}

impl std::fmt::Debug for GatewayCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredential")
            .field("header_name", &self.header_name)
            .field("salt", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Signing secrets and lifetimes for issued tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_seconds: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_seconds: u64,
    /// Prefix of the `Authorization` header value, including the trailing space.
    #[serde(default = "default_token_prefix")]
    pub header_prefix: String,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("issuer", &self.issuer)
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("header_prefix", &self.header_prefix)
            .finish()
    }
}

impl TokenConfig {
    /// Config with the default issuer, prefix and lifetimes.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            issuer: default_issuer(),
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            header_prefix: default_token_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub gateway: GatewayCredential,
    pub tokens: TokenConfig,
}

fn default_gateway_header() -> String {
    DEFAULT_GATEWAY_HEADER.to_string()
}

fn default_token_prefix() -> String {
    DEFAULT_TOKEN_PREFIX.to_string()
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

fn default_access_ttl() -> u64 {
    DEFAULT_ACCESS_TTL_SECONDS
}

fn default_refresh_ttl() -> u64 {
    DEFAULT_REFRESH_TTL_SECONDS
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Locate the configuration file, if one exists.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("RPM_USER_SERVICE_CONFIG") {
        return Some(PathBuf::from(p));
    }

    let candidate = PathBuf::from("user-service.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Replace `${NAME}` with the value of the environment variable `NAME`.
/// Unset variables are left in place.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            match env::var(&name) {
                Ok(val) => out.push_str(&val),
                Err(_) => {
                    out.push_str("${");
                    out.push_str(&name);
                    out.push('}');
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_env_vars(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(expand_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| (key, expand_value(val)))
                .collect(),
        ),
        other => other,
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ServiceConfig {
    /// Parse a JSON configuration document, expanding `${VAR}` in every string.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let config = serde_json::from_value(expand_value(value))?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Build the configuration from `RPM_*` environment variables alone.
    pub fn from_env() -> Self {
        Self {
            bind: env_or("RPM_BIND", &default_bind()),
            database: DatabaseConfig::default(),
            gateway: GatewayCredential {
                header_name: env_or("RPM_GATEWAY_HEADER", DEFAULT_GATEWAY_HEADER),
                salt: env_or("RPM_GATEWAY_SALT", ""),
                secret: env_or("RPM_GATEWAY_SECRET", ""),
            },
            tokens: TokenConfig {
                issuer: env_or("RPM_TOKEN_ISSUER", DEFAULT_ISSUER),
                access_secret: env_or("RPM_ACCESS_SECRET", ""),
                refresh_secret: env_or("RPM_REFRESH_SECRET", ""),
                access_ttl_seconds: env_u64("RPM_ACCESS_TTL_SECONDS", DEFAULT_ACCESS_TTL_SECONDS),
                refresh_ttl_seconds: env_u64(
                    "RPM_REFRESH_TTL_SECONDS",
                    DEFAULT_REFRESH_TTL_SECONDS,
                ),
                header_prefix: env_or("RPM_TOKEN_PREFIX", DEFAULT_TOKEN_PREFIX),
            },
        }
    }

    /// Load from an explicit path, the resolved config file, or the environment.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let config = match explicit.map(Path::to_path_buf).or_else(resolve_config_path) {
            Some(path) => Self::load_file(&path)?,
            None => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Refuse to start with missing secrets or zero lifetimes.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gateway.header_name.trim().is_empty() {
            bail!("gateway header name must not be empty");
        }
        if self.gateway.salt.is_empty() || self.gateway.secret.is_empty() {
            bail!("gateway salt and secret must both be set");
        }
        if self.tokens.access_secret.is_empty() || self.tokens.refresh_secret.is_empty() {
            bail!("access and refresh token secrets must both be set");
        }
        if self.tokens.issuer.is_empty() {
            bail!("token issuer must not be empty");
        }
        if self.tokens.access_ttl_seconds == 0 || self.tokens.refresh_ttl_seconds == 0 {
            bail!("token lifetimes must be greater than zero");
        }

        if self.tokens.access_secret == self.tokens.refresh_secret {
            warn!("access and refresh tokens share a signing secret");
        }
        if self.tokens.access_ttl_seconds > self.tokens.refresh_ttl_seconds {
            warn!(
                "access token lifetime ({}s) exceeds refresh token lifetime ({}s)",
                self.tokens.access_ttl_seconds, self.tokens.refresh_ttl_seconds
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_json() -> String {
        r#"{
            "bind": "127.0.0.1:9000",
            "gateway": { "salt": "pepper", "secret": "${RPM_TEST_GATEWAY_SECRET}" },
            "tokens": {
                "access_secret": "access-secret",
                "refresh_secret": "refresh-secret",
                "access_ttl_seconds": 900
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_expand_env_vars_keeps_unknown_names() {
        assert_eq!(
            expand_env_vars("x-${RPM_TEST_SURELY_UNSET_VARIABLE}-y"),
            "x-${RPM_TEST_SURELY_UNSET_VARIABLE}-y"
        );
        assert_eq!(expand_env_vars("plain"), "plain");
    }

    #[test]
    fn test_config_file_applies_defaults_and_expansion() {
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("RPM_TEST_GATEWAY_SECRET", "from-env") };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let config = ServiceConfig::load_file(file.path()).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.gateway.header_name, DEFAULT_GATEWAY_HEADER);
        assert_eq!(config.gateway.secret, "from-env");
        assert_eq!(config.tokens.issuer, DEFAULT_ISSUER);
        assert_eq!(config.tokens.header_prefix, "Bearer ");
        assert_eq!(config.tokens.access_ttl_seconds, 900);
        assert_eq!(config.tokens.refresh_ttl_seconds, DEFAULT_REFRESH_TTL_SECONDS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_secrets() {
        let mut config = ServiceConfig::from_json_str(&sample_json()).unwrap();
        config.gateway.secret = "set".to_string();
        assert!(config.validate().is_ok());

        config.tokens.refresh_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = ServiceConfig::from_json_str(&sample_json()).unwrap();
        config.gateway.secret = "set".to_string();
        config.tokens.access_ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = TokenConfig::new("very-secret-a", "very-secret-b");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
    }
}
