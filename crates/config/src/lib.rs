use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "cybermitra.toml",
    "config/cybermitra.toml",
    "crates/config/cybermitra.toml",
    "../cybermitra.toml",
    "../config/cybermitra.toml",
    "../crates/config/cybermitra.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://cybermitra.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Authentication and OTP issuance parameters.
///
/// ```
/// use cybermitra_config::AuthConfig;
///
/// let auth = AuthConfig::default();
/// assert_eq!(auth.otp_resend_cooldown_seconds, 60);
/// assert_eq!(auth.otp_max_attempts, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default = "AuthConfig::default_otp_ttl")]
    pub otp_ttl_seconds: u64,
    #[serde(default = "AuthConfig::default_otp_resend_cooldown")]
    pub otp_resend_cooldown_seconds: u64,
    #[serde(default = "AuthConfig::default_otp_max_attempts")]
    pub otp_max_attempts: u32,
    #[serde(default = "AuthConfig::default_registration_ttl")]
    pub registration_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
            otp_ttl_seconds: Self::default_otp_ttl(),
            otp_resend_cooldown_seconds: Self::default_otp_resend_cooldown(),
            otp_max_attempts: Self::default_otp_max_attempts(),
            registration_ttl_seconds: Self::default_registration_ttl(),
        }
    }
}

impl AuthConfig {
    const fn default_session_ttl() -> u64 {
        86_400
    }

    const fn default_otp_ttl() -> u64 {
        300
    }

    const fn default_otp_resend_cooldown() -> u64 {
        60
    }

    const fn default_otp_max_attempts() -> u32 {
        5
    }

    const fn default_registration_ttl() -> u64 {
        900
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Language the assistant answers in when the request does not say.
    #[serde(default = "AssistantConfig::default_language")]
    pub default_language: String,
    /// Idle timeout applied between stream reads by SDK consumers.
    #[serde(default = "AssistantConfig::default_stream_idle_timeout")]
    pub stream_idle_timeout_seconds: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_language: Self::default_language(),
            stream_idle_timeout_seconds: Self::default_stream_idle_timeout(),
        }
    }
}

impl AssistantConfig {
    fn default_language() -> String {
        "en".to_string()
    }

    const fn default_stream_idle_timeout() -> u64 {
        120
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Directory evidence files are stored under.
    pub storage_root: String,
    /// Upload cap per file, in bytes.
    pub max_file_bytes: u64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            storage_root: "evidence".to_string(),
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Load the application configuration by combining defaults, files, and
/// environment overrides.
///
/// ```
/// use cybermitra_config::load;
///
/// std::env::remove_var("CYBERMITRA_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// assert_eq!(config.auth.otp_ttl_seconds, 300);
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let mut builder = config::Config::builder();

    let environment_overrides = config::Environment::with_prefix("CYBERMITRA").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CYBERMITRA_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CYBERMITRA_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded backend configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_without_a_config_file() {
        std::env::remove_var("CYBERMITRA_CONFIG");

        let config = load().expect("defaults should load");
        assert_eq!(config.http.port, 7080);
        assert_eq!(config.auth.otp_resend_cooldown_seconds, 60);
        assert_eq!(config.evidence.max_file_bytes, 10 * 1024 * 1024);
    }

    #[test]
    #[serial]
    fn environment_overrides_take_precedence() {
        std::env::remove_var("CYBERMITRA_CONFIG");
        std::env::set_var("CYBERMITRA__HTTP__PORT", "9099");
        std::env::set_var("CYBERMITRA__AUTH__OTP_TTL_SECONDS", "120");

        let config = load().expect("overridden configuration should load");
        assert_eq!(config.http.port, 9099);
        assert_eq!(config.auth.otp_ttl_seconds, 120);

        std::env::remove_var("CYBERMITRA__HTTP__PORT");
        std::env::remove_var("CYBERMITRA__AUTH__OTP_TTL_SECONDS");
    }

    #[test]
    #[serial]
    fn config_file_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cybermitra.toml");
        std::fs::write(
            &path,
            "[http]\naddress = \"0.0.0.0\"\nport = 8800\n\n[assistant]\ndefault_language = \"hi\"\n",
        )
        .unwrap();

        std::env::set_var("CYBERMITRA_CONFIG", &path);
        let config = load().expect("file-backed configuration should load");
        std::env::remove_var("CYBERMITRA_CONFIG");

        assert_eq!(config.http.address, "0.0.0.0");
        assert_eq!(config.http.port, 8800);
        assert_eq!(config.assistant.default_language, "hi");
    }
}
