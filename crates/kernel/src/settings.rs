use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKCOURIER_ENV";
const CONFIG_DIR_ENV: &str = "BOOKCOURIER_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKCOURIER";
/// Hosting platforms hand the listen port over in `PORT`.
const PORT_ENV: &str = "PORT";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// and `BOOKCOURIER__*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::current_dir()
                    .map(|cwd| cwd.join("config"))
                    .unwrap_or_else(|_| PathBuf::from("config"))
            });

        Self::load_from(&config_dir, &environment, std::env::var(PORT_ENV).ok())
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(
        config_dir: &std::path::Path,
        environment: &str,
        port_override: Option<String>,
    ) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let port_override = port_override
            .map(|port| {
                port.parse::<u16>()
                    .with_context(|| format!("invalid {} value '{}'", PORT_ENV, port))
            })
            .transpose()?;

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("server.port", port_override.map(i64::from))
            .with_context(|| "failed to apply port override")?;

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `mongodb://`, `mongodb+srv://` or `memory://`
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_name() -> String {
        "bookcourier".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            name: Self::default_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` wins when set
    #[serde(default = "TelemetrySettings::default_log_filter")]
    pub log_filter: String,
}

impl TelemetrySettings {
    fn default_log_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_filter: Self::default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Identity provider settings.
///
/// Either `project_id` or `service_key` (base64-encoded service-account JSON)
/// must be set for token verification to work.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub service_key: Option<String>,
    #[serde(default = "AuthSettings::default_jwks_url")]
    pub jwks_url: String,
    #[serde(default = "AuthSettings::default_key_ttl_secs")]
    pub key_ttl_secs: u64,
}

impl AuthSettings {
    fn default_jwks_url() -> String {
        "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
            .to_string()
    }

    fn default_key_ttl_secs() -> u64 {
        3600
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            service_key: None,
            jwks_url: Self::default_jwks_url(),
            key_ttl_secs: Self::default_key_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_database_is_local_mongodb() {
        let settings = Settings::default();
        assert_eq!(settings.database.uri, "mongodb://127.0.0.1:27017");
        assert_eq!(settings.database.name, "bookcourier");
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = Settings::load_from(Path::new("/nonexistent"), "qa", None).unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }

    #[test]
    fn port_override_wins() {
        let settings =
            Settings::load_from(Path::new("/nonexistent"), "staging", Some("8123".into())).unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.server.port, 8123);
    }

    #[test]
    fn invalid_port_override_fails() {
        assert!(
            Settings::load_from(Path::new("/nonexistent"), "local", Some("http".into())).is_err()
        );
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let settings = Settings::load_from(Path::new("/nonexistent"), "local", None).unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.auth.key_ttl_secs, 3600);
        assert_eq!(settings.telemetry.log_format, LogFormat::Pretty);
    }
}
