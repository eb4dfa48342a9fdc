use coursewright_core::gemini::DEFAULT_API_BASE;
use coursewright_core::wizard::{DEFAULT_GENERATION_TIMEOUT, DEFAULT_MAX_TOPIC_CHARS, WizardSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_WIZARD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for course generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    /// Canned content, no API key needed.
    Sample,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub generation_timeout: Duration,
    pub max_topic_chars: usize,
    /// How long an unused wizard is kept before the sweep drops it.
    pub wizard_ttl: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str =
            std::env::var("CONTENT_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "sample" => Provider::Sample,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CONTENT_PROVIDER".to_string(),
                    format!("'{}' is not one of 'gemini', 'sample'", other),
                ));
            }
        };

        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        let gemini_api_base =
            std::env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let generation_timeout = match std::env::var("GENERATION_TIMEOUT_SECS") {
            Ok(value) => Duration::from_secs(parse_positive("GENERATION_TIMEOUT_SECS", &value)?),
            Err(_) => DEFAULT_GENERATION_TIMEOUT,
        };

        let max_topic_chars = match std::env::var("MAX_TOPIC_CHARS") {
            Ok(value) => parse_positive("MAX_TOPIC_CHARS", &value)? as usize,
            Err(_) => DEFAULT_MAX_TOPIC_CHARS,
        };

        let wizard_ttl = match std::env::var("WIZARD_TTL_SECS") {
            Ok(value) => Duration::from_secs(parse_positive("WIZARD_TTL_SECS", &value)?),
            Err(_) => DEFAULT_WIZARD_TTL,
        };

        if provider == Provider::Gemini && gemini_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            provider,
            gemini_api_key,
            gemini_api_base,
            chat_model,
            log_level,
            prompts_path,
            generation_timeout,
            max_topic_chars,
            wizard_ttl,
        })
    }

    pub fn wizard_settings(&self) -> WizardSettings {
        WizardSettings {
            max_topic_chars: self.max_topic_chars,
            generation_timeout: self.generation_timeout,
        }
    }
}

fn parse_positive(var: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' is not a positive integer", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("CONTENT_PROVIDER");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("GEMINI_API_BASE");
            env::remove_var("CHAT_MODEL");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
            env::remove_var("GENERATION_TIMEOUT_SECS");
            env::remove_var("MAX_TOPIC_CHARS");
            env::remove_var("WIZARD_TTL_SECS");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal_gemini() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.gemini_api_key, Some("test-gemini-key".to_string()));
        assert_eq!(config.gemini_api_base, DEFAULT_API_BASE);
        assert_eq!(config.chat_model, "gemini-2.5-flash");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
        assert_eq!(config.generation_timeout, Duration::from_secs(120));
        assert_eq!(config.max_topic_chars, 200);
        assert_eq!(config.wizard_ttl, Duration::from_secs(86400));
    }

    #[test]
    #[serial]
    fn test_config_sample_provider_needs_no_key() {
        clear_env_vars();
        unsafe {
            env::set_var("CONTENT_PROVIDER", "Sample");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::Sample);
        assert_eq!(config.gemini_api_key, None);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("CONTENT_PROVIDER", "gemini");
            env::set_var("GEMINI_API_KEY", "custom-gemini-key");
            env::set_var("GEMINI_API_BASE", "http://localhost:9000/v1beta");
            env::set_var("CHAT_MODEL", "gemini-2.5-pro");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
            env::set_var("GENERATION_TIMEOUT_SECS", "30");
            env::set_var("MAX_TOPIC_CHARS", "80");
            env::set_var("WIZARD_TTL_SECS", "3600");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.gemini_api_base, "http://localhost:9000/v1beta");
        assert_eq!(config.chat_model, "gemini-2.5-pro");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
        assert_eq!(config.wizard_ttl, Duration::from_secs(3600));

        let settings = config.wizard_settings();
        assert_eq!(settings.generation_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_topic_chars, 80);
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("CONTENT_PROVIDER", "openai");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, msg) => {
                assert_eq!(var, "CONTENT_PROVIDER");
                assert!(msg.contains("openai"));
            }
            _ => panic!("Expected InvalidValue for CONTENT_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_numbers() {
        for (var, value) in [
            ("GENERATION_TIMEOUT_SECS", "0"),
            ("GENERATION_TIMEOUT_SECS", "soon"),
            ("MAX_TOPIC_CHARS", "-5"),
            ("WIZARD_TTL_SECS", "a day"),
        ] {
            clear_env_vars();
            unsafe {
                env::set_var("CONTENT_PROVIDER", "sample");
                env::set_var(var, value);
            }

            let err = Config::from_env().unwrap_err();
            match err {
                ConfigError::InvalidValue(name, _) => assert_eq!(name, var),
                _ => panic!("Expected InvalidValue for {}", var),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();
        unsafe {
            env::set_var("CONTENT_PROVIDER", "gemini");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("GEMINI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }
}
