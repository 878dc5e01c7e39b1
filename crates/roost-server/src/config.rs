use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use roost_api::config::{AuthConfig, default_access_ttl, default_refresh_ttl};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Read settings from the environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("ROOST_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ROOST_JWT_SECRET is unset or still a placeholder");
        }
        let webhook_api_key = get("ROOST_POLKA_KEY").unwrap_or_default();
        if webhook_api_key.is_empty() {
            bail!("ROOST_POLKA_KEY is unset");
        }

        let host = get("ROOST_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("ROOST_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("ROOST_PORT must be a port number")?;
        let db_path: PathBuf = get("ROOST_DB_PATH")
            .unwrap_or_else(|| "database.json".into())
            .into();

        let mut auth = AuthConfig::new(jwt_secret, webhook_api_key);
        auth.access_token_ttl = ttl(&get, "ROOST_ACCESS_TTL_SECS", default_access_ttl())?;
        auth.refresh_token_ttl = ttl(&get, "ROOST_REFRESH_TTL_SECS", default_refresh_ttl())?;

        Ok(Self {
            host,
            port,
            db_path,
            auth,
        })
    }
}

fn ttl(get: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match get(key) {
        None => Ok(default),
        Some(raw) => {
            let secs: i64 = raw
                .parse()
                .with_context(|| format!("{key} must be a number of seconds"))?;
            if secs <= 0 {
                bail!("{key} must be positive");
            }
            Ok(Duration::seconds(secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("ROOST_JWT_SECRET", "s"), ("ROOST_POLKA_KEY", "k")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.db_path, PathBuf::from("database.json"));
        assert_eq!(cfg.auth.access_token_ttl, Duration::hours(1));
        assert_eq!(cfg.auth.refresh_token_ttl, Duration::days(60));
    }

    #[test]
    fn test_rejects_placeholder_secret() {
        assert!(config(&[("ROOST_POLKA_KEY", "k")]).is_err());
        assert!(
            config(&[("ROOST_JWT_SECRET", "dev-secret-change-me"), ("ROOST_POLKA_KEY", "k")])
                .is_err()
        );
        assert!(config(&[("ROOST_JWT_SECRET", "s")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("ROOST_JWT_SECRET", "s"),
            ("ROOST_POLKA_KEY", "k"),
            ("ROOST_PORT", "3000"),
            ("ROOST_ACCESS_TTL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.auth.access_token_ttl, Duration::seconds(60));

        let zero_ttl = config(&[
            ("ROOST_JWT_SECRET", "s"),
            ("ROOST_POLKA_KEY", "k"),
            ("ROOST_ACCESS_TTL_SECS", "0"),
        ]);
        assert!(zero_ttl.is_err());
    }
}
