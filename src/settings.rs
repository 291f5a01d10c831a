use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::token::SYMMETRIC_KEY_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultgateSettings {
    pub application: ApplicationSettings,
    pub redis: RedisSettings,
    pub token: TokenSettings,
    pub logging: LoggingSettings,
    #[serde(default)]
    pub subjects: Vec<SubjectSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    /// Raw symmetric key material; must be exactly the cipher's key size.
    /// Left empty, a random key is generated at startup (sessions then do
    /// not survive a restart).
    pub symmetric_key: String,
    /// Access token validity in seconds
    pub access_duration_seconds: i64,
    /// Refresh token validity in seconds
    pub refresh_duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

/// A subject served by the settings-backed directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectSettings {
    pub id: String,
    pub username: String,
    /// bcrypt hash of the subject's password
    pub password_hash: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            symmetric_key: String::new(), // Will be generated if empty
            access_duration_seconds: 15 * 60,
            refresh_duration_seconds: 24 * 60 * 60,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl VaultgateSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - TOML parsing fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Initialize the logger from the configured level
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub fn init_logging(&self) {
        env_logger::Builder::new()
            .parse_filters(&self.logging.level)
            .try_init()
            .ok();
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `VAULTGATE_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        // 1. Start with default settings
        let mut settings = Self::default();

        // 2. Try to load from Settings.toml in current directory (lower priority)
        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            let toml_content = fs::read_to_string(&default_config_path)?;
            settings = basic_toml::from_str(&toml_content)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        // 3. If VAULTGATE_SECRETS_DIR is set and contains Settings.toml, override
        // with those settings (higher priority)
        if let Ok(secrets_dir) = std::env::var("VAULTGATE_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                let secrets_toml_content = fs::read_to_string(&secrets_path)?;
                let secrets_settings: Self = basic_toml::from_str(&secrets_toml_content)?;

                println!("✓ Overriding settings from {}", secrets_path.display());

                settings = secrets_settings;
            } else {
                println!(
                    "ℹ VAULTGATE_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_redis_env_overrides(&mut settings.redis);
        Self::apply_token_env_overrides(&mut settings.token);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    /// Apply environment overrides for application settings
    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    /// Apply environment overrides for the cache connection
    fn apply_redis_env_overrides(redis_settings: &mut RedisSettings) {
        if let Ok(url) = std::env::var("REDIS_URL") {
            redis_settings.url = url;
        }
    }

    /// Apply environment overrides for token settings
    pub fn apply_token_env_overrides(token_settings: &mut TokenSettings) {
        Self::apply_numeric_env_override(
            "ACCESS_DURATION_SECONDS",
            &mut token_settings.access_duration_seconds,
        );
        Self::apply_numeric_env_override(
            "REFRESH_DURATION_SECONDS",
            &mut token_settings.refresh_duration_seconds,
        );

        // Handle the symmetric key with special logic
        Self::handle_symmetric_key_override(token_settings);
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut i64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<i64>() {
                *target = value;
            }
        }
    }

    /// Helper function to handle symmetric key environment override and generation
    fn handle_symmetric_key_override(token_settings: &mut TokenSettings) {
        let env_key_set = std::env::var("TOKEN_SYMMETRIC_KEY").is_ok_and(|key| {
            if key.is_empty() {
                false
            } else {
                token_settings.symmetric_key = key;
                true
            }
        });

        // Generate a random key if no environment variable was set and the
        // current value is empty
        if !env_key_set && token_settings.symmetric_key.is_empty() {
            token_settings.symmetric_key = Self::generate_random_symmetric_key();
            Self::warn_about_generated_key();
        }
    }

    /// Generate random symmetric key material of exactly the cipher's key size
    fn generate_random_symmetric_key() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SYMMETRIC_KEY_SIZE)
            .map(char::from)
            .collect()
    }

    /// Display warnings about using a generated symmetric key
    fn warn_about_generated_key() {
        eprintln!("⚠️  WARNING: Using auto-generated token symmetric key");
        eprintln!("🔒 For production use, set the TOKEN_SYMMETRIC_KEY environment variable");
        eprintln!("   or configure symmetric_key in Settings.toml");
        eprintln!("💡 Every issued session becomes unverifiable on restart with a generated key");
    }

    /// Apply environment overrides for logging settings
    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .collect()
    }

    /// Configured access token validity
    #[must_use]
    pub fn access_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token.access_duration_seconds)
    }

    /// Configured refresh token validity
    #[must_use]
    pub fn refresh_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token.refresh_duration_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let settings = VaultgateSettings::default();

        assert_eq!(settings.application.port, 8080);
        assert_eq!(settings.redis.url, "redis://127.0.0.1:6379");
        assert_eq!(settings.token.access_duration_seconds, 900);
        assert_eq!(settings.token.refresh_duration_seconds, 86_400);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.subjects.is_empty());
    }

    #[test]
    fn test_bind_address_and_cors_parsing() {
        let mut settings = VaultgateSettings::default();
        settings.application.host = "127.0.0.1".to_string();
        settings.application.port = 9090;
        settings.application.cors_origins = "https://a.example, https://b.example".to_string();

        assert_eq!(settings.get_bind_address(), "127.0.0.1:9090");
        assert_eq!(
            settings.get_cors_origins(),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_durations_from_seconds() {
        let mut settings = VaultgateSettings::default();
        settings.token.access_duration_seconds = 60;
        settings.token.refresh_duration_seconds = 3600;

        assert_eq!(settings.access_duration(), chrono::Duration::minutes(1));
        assert_eq!(settings.refresh_duration(), chrono::Duration::hours(1));
    }

    #[test]
    #[serial]
    fn test_symmetric_key_env_override() {
        std::env::set_var("TOKEN_SYMMETRIC_KEY", "0123456789abcdef0123456789abcdef");

        let mut token_settings = TokenSettings::default();
        VaultgateSettings::apply_token_env_overrides(&mut token_settings);

        assert_eq!(
            token_settings.symmetric_key,
            "0123456789abcdef0123456789abcdef"
        );

        std::env::remove_var("TOKEN_SYMMETRIC_KEY");
    }

    #[test]
    #[serial]
    fn test_generated_key_has_cipher_key_size() {
        std::env::remove_var("TOKEN_SYMMETRIC_KEY");

        let mut token_settings = TokenSettings::default();
        VaultgateSettings::apply_token_env_overrides(&mut token_settings);

        assert_eq!(token_settings.symmetric_key.len(), SYMMETRIC_KEY_SIZE);
    }

    #[test]
    #[serial]
    fn test_duration_env_override() {
        std::env::set_var("ACCESS_DURATION_SECONDS", "120");

        let mut token_settings = TokenSettings::default();
        VaultgateSettings::apply_token_env_overrides(&mut token_settings);
        assert_eq!(token_settings.access_duration_seconds, 120);

        std::env::remove_var("ACCESS_DURATION_SECONDS");
    }

    #[test]
    #[serial]
    fn test_secrets_dir_overrides_base_settings() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
[application]
host = "10.0.0.1"
port = 9999
cors_origins = "https://app.example"

[redis]
url = "redis://cache.internal:6379"

[token]
symmetric_key = "0123456789abcdef0123456789abcdef"
access_duration_seconds = 300
refresh_duration_seconds = 7200

[logging]
level = "debug"
"#;
        fs::write(dir.path().join("Settings.toml"), toml).unwrap();
        std::env::set_var("VAULTGATE_SECRETS_DIR", dir.path());

        let settings = VaultgateSettings::load().unwrap();
        assert_eq!(settings.application.host, "10.0.0.1");
        assert_eq!(settings.application.port, 9999);
        assert_eq!(settings.redis.url, "redis://cache.internal:6379");
        assert_eq!(settings.token.access_duration_seconds, 300);
        assert_eq!(settings.logging.level, "debug");

        std::env::remove_var("VAULTGATE_SECRETS_DIR");
    }

    #[test]
    #[serial]
    fn test_subjects_parse_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
[application]
host = "0.0.0.0"
port = 8080
cors_origins = ""

[redis]
url = "redis://127.0.0.1:6379"

[token]
symmetric_key = "0123456789abcdef0123456789abcdef"
access_duration_seconds = 900
refresh_duration_seconds = 86400

[logging]
level = "info"

[[subjects]]
id = "6f1c5cce-0d14-4be2-ae68-79426bdc8af4"
username = "alice"
password_hash = "$2b$04$notarealhashnotarealhashno"
is_admin = true
"#;
        fs::write(dir.path().join("Settings.toml"), toml).unwrap();
        std::env::set_var("VAULTGATE_SECRETS_DIR", dir.path());

        let settings = VaultgateSettings::load().unwrap();
        assert_eq!(settings.subjects.len(), 1);
        assert_eq!(settings.subjects[0].username, "alice");
        assert!(settings.subjects[0].is_admin);

        std::env::remove_var("VAULTGATE_SECRETS_DIR");
    }
}
