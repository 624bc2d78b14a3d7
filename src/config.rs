use std::{env, net::SocketAddr, num::NonZeroUsize, time::Duration};

use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    llm_base_url: String,
    llm_model: String,
    llm_request_timeout: Duration,
    llm_max_concurrency: NonZeroUsize,
    translator_base_url: String,
    translator_timeout: Duration,
    translator_max_concurrency: NonZeroUsize,
    source_language: String,
    model_language: String,
    translation_chunk_max_chars: NonZeroUsize,
    option_generation_timeout: Duration,
    option_max_count: NonZeroUsize,
    guide_generation_timeout: Duration,
    poll_backend_base_url: String,
    poll_backend_service_token: Option<String>,
    poll_backend_connect_timeout: Duration,
    poll_backend_total_timeout: Duration,
    http_max_retries: usize,
    http_backoff_base_ms: u64,
    http_backoff_cap_ms: u64,
    guide_sweep_enabled: bool,
    guide_sweep_utc_offset_hours: i32,
    guide_sweep_hour: u32,
    guide_sweep_minute: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数からワーカーの設定値を読み込み、検証する。
    ///
    /// 必須の環境変数が揃っていない場合や、数値／アドレスのパースに失敗した場合はエラーを返す。
    ///
    /// # Errors
    /// `LLM_BASE_URL` / `POLL_BACKEND_BASE_URL` が未設定、もしくは各種値のパースに失敗した場合は
    /// [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("GUIDE_WORKER_HTTP_BIND", "0.0.0.0:9010")?;

        // Language model settings
        let llm_base_url = env_var("LLM_BASE_URL")?;
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string());
        let llm_request_timeout = parse_duration_secs("LLM_REQUEST_TIMEOUT_SECS", 120)?;
        let llm_max_concurrency = parse_non_zero_usize("LLM_MAX_CONCURRENCY", 4)?;

        // Translation settings
        let translator_base_url = env::var("TRANSLATOR_BASE_URL")
            .unwrap_or_else(|_| "https://api.mymemory.translated.net/".to_string());
        let translator_timeout = parse_duration_ms("TRANSLATOR_TIMEOUT_MS", 10000)?;
        let translator_max_concurrency = parse_non_zero_usize("TRANSLATOR_MAX_CONCURRENCY", 1)?;
        let source_language = parse_language_tag("SOURCE_LANGUAGE", "ko")?;
        let model_language = parse_language_tag("MODEL_LANGUAGE", "en")?;
        let translation_chunk_max_chars =
            parse_non_zero_usize("TRANSLATION_CHUNK_MAX_CHARS", 450)?;

        // Generation settings
        let option_generation_timeout = parse_duration_secs("OPTION_GENERATION_TIMEOUT_SECS", 30)?;
        let option_max_count = parse_non_zero_usize("OPTION_MAX_COUNT", 10)?;
        let guide_generation_timeout = parse_duration_secs("GUIDE_GENERATION_TIMEOUT_SECS", 180)?;

        // Poll backend (persistence collaborator)
        let poll_backend_base_url = env_var("POLL_BACKEND_BASE_URL")?;
        let poll_backend_service_token = env::var("POLL_BACKEND_SERVICE_TOKEN").ok();
        let poll_backend_connect_timeout =
            parse_duration_ms("POLL_BACKEND_CONNECT_TIMEOUT_MS", 3000)?;
        let poll_backend_total_timeout =
            parse_duration_ms("POLL_BACKEND_TOTAL_TIMEOUT_MS", 30000)?;

        // Retry settings (exponential backoff + jitter)
        let http_max_retries = parse_usize("HTTP_MAX_RETRIES", 3)?;
        let http_backoff_base_ms = parse_u64("HTTP_BACKOFF_BASE_MS", 250)?;
        let http_backoff_cap_ms = parse_u64("HTTP_BACKOFF_CAP_MS", 10000)?;

        // Daily sweep settings
        let guide_sweep_enabled = parse_bool("GUIDE_SWEEP_ENABLED", true)?;
        let guide_sweep_utc_offset_hours =
            parse_i32_in_range("GUIDE_SWEEP_UTC_OFFSET_HOURS", 9, -12, 14)?;
        let guide_sweep_hour = parse_u32_in_range("GUIDE_SWEEP_HOUR", 0, 23)?;
        let guide_sweep_minute = parse_u32_in_range("GUIDE_SWEEP_MINUTE", 0, 59)?;

        Ok(Self {
            http_bind,
            llm_base_url,
            llm_model,
            llm_request_timeout,
            llm_max_concurrency,
            translator_base_url,
            translator_timeout,
            translator_max_concurrency,
            source_language,
            model_language,
            translation_chunk_max_chars,
            option_generation_timeout,
            option_max_count,
            guide_generation_timeout,
            poll_backend_base_url,
            poll_backend_service_token,
            poll_backend_connect_timeout,
            poll_backend_total_timeout,
            http_max_retries,
            http_backoff_base_ms,
            http_backoff_cap_ms,
            guide_sweep_enabled,
            guide_sweep_utc_offset_hours,
            guide_sweep_hour,
            guide_sweep_minute,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn llm_base_url(&self) -> &str {
        &self.llm_base_url
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }

    #[must_use]
    pub fn llm_request_timeout(&self) -> Duration {
        self.llm_request_timeout
    }

    #[must_use]
    pub fn llm_max_concurrency(&self) -> NonZeroUsize {
        self.llm_max_concurrency
    }

    #[must_use]
    pub fn translator_base_url(&self) -> &str {
        &self.translator_base_url
    }

    #[must_use]
    pub fn translator_timeout(&self) -> Duration {
        self.translator_timeout
    }

    #[must_use]
    pub fn translator_max_concurrency(&self) -> NonZeroUsize {
        self.translator_max_concurrency
    }

    #[must_use]
    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    #[must_use]
    pub fn model_language(&self) -> &str {
        &self.model_language
    }

    #[must_use]
    pub fn translation_chunk_max_chars(&self) -> NonZeroUsize {
        self.translation_chunk_max_chars
    }

    #[must_use]
    pub fn option_generation_timeout(&self) -> Duration {
        self.option_generation_timeout
    }

    #[must_use]
    pub fn option_max_count(&self) -> NonZeroUsize {
        self.option_max_count
    }

    #[must_use]
    pub fn guide_generation_timeout(&self) -> Duration {
        self.guide_generation_timeout
    }

    #[must_use]
    pub fn poll_backend_base_url(&self) -> &str {
        &self.poll_backend_base_url
    }

    #[must_use]
    pub fn poll_backend_service_token(&self) -> Option<&str> {
        self.poll_backend_service_token.as_deref()
    }

    #[must_use]
    pub fn poll_backend_connect_timeout(&self) -> Duration {
        self.poll_backend_connect_timeout
    }

    #[must_use]
    pub fn poll_backend_total_timeout(&self) -> Duration {
        self.poll_backend_total_timeout
    }

    #[must_use]
    pub fn http_max_retries(&self) -> usize {
        self.http_max_retries
    }

    #[must_use]
    pub fn http_backoff_base_ms(&self) -> u64 {
        self.http_backoff_base_ms
    }

    #[must_use]
    pub fn http_backoff_cap_ms(&self) -> u64 {
        self.http_backoff_cap_ms
    }

    #[must_use]
    pub fn guide_sweep_enabled(&self) -> bool {
        self.guide_sweep_enabled
    }

    #[must_use]
    pub fn guide_sweep_utc_offset_hours(&self) -> i32 {
        self.guide_sweep_utc_offset_hours
    }

    #[must_use]
    pub fn guide_sweep_hour(&self) -> u32 {
        self.guide_sweep_hour
    }

    #[must_use]
    pub fn guide_sweep_minute(&self) -> u32 {
        self.guide_sweep_minute
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_language_tag(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let tag = raw.trim().to_lowercase();
    if tag.is_empty() {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("language tag must not be empty"),
        });
    }
    Ok(tag)
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_ms)?;
    Ok(Duration::from_millis(value))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u32_in_range(name: &'static str, default: u32, max: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if parsed > max {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be between 0 and {max}"),
        });
    }
    Ok(parsed)
}

fn parse_i32_in_range(
    name: &'static str,
    default: i32,
    min: i32,
    max: i32,
) -> Result<i32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<i32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if !(min..=max).contains(&parsed) {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be between {min} and {max}"),
        });
    }
    Ok(parsed)
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests hold ENV_MUTEX and assign valid UTF-8 values.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn remove_env(name: &str) {
        // SAFETY: tests hold ENV_MUTEX and clean up deterministic keys.
        unsafe {
            env::remove_var(name);
        }
    }

    const KEYS: &[&str] = &[
        "GUIDE_WORKER_HTTP_BIND",
        "LLM_BASE_URL",
        "LLM_MODEL",
        "LLM_REQUEST_TIMEOUT_SECS",
        "LLM_MAX_CONCURRENCY",
        "TRANSLATOR_BASE_URL",
        "TRANSLATOR_TIMEOUT_MS",
        "TRANSLATOR_MAX_CONCURRENCY",
        "SOURCE_LANGUAGE",
        "MODEL_LANGUAGE",
        "TRANSLATION_CHUNK_MAX_CHARS",
        "OPTION_GENERATION_TIMEOUT_SECS",
        "OPTION_MAX_COUNT",
        "GUIDE_GENERATION_TIMEOUT_SECS",
        "POLL_BACKEND_BASE_URL",
        "POLL_BACKEND_SERVICE_TOKEN",
        "POLL_BACKEND_CONNECT_TIMEOUT_MS",
        "POLL_BACKEND_TOTAL_TIMEOUT_MS",
        "HTTP_MAX_RETRIES",
        "HTTP_BACKOFF_BASE_MS",
        "HTTP_BACKOFF_CAP_MS",
        "GUIDE_SWEEP_ENABLED",
        "GUIDE_SWEEP_UTC_OFFSET_HOURS",
        "GUIDE_SWEEP_HOUR",
        "GUIDE_SWEEP_MINUTE",
    ];

    pub(crate) fn reset_env() {
        for key in KEYS {
            remove_env(key);
        }
    }

    /// 必須項目だけを設定した状態で設定を読み込む（他モジュールのテスト用）。
    pub(crate) fn config_with_required(llm_base_url: &str, poll_backend_base_url: &str) -> Config {
        config_with(&[
            ("LLM_BASE_URL", llm_base_url),
            ("POLL_BACKEND_BASE_URL", poll_backend_base_url),
        ])
    }

    /// 指定した環境変数のみを設定した状態で設定を読み込む。
    pub(crate) fn config_with(vars: &[(&str, &str)]) -> Config {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        reset_env();
        for (name, value) in vars {
            set_env(name, value);
        }
        let config = Config::from_env().expect("config should load");
        reset_env();
        config
    }

    #[test]
    fn from_env_uses_defaults_when_optional_missing() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        reset_env();
        set_env("LLM_BASE_URL", "http://localhost:11434/");
        set_env("POLL_BACKEND_BASE_URL", "http://localhost:8080/");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.http_bind(), "0.0.0.0:9010".parse().unwrap());
        assert_eq!(config.llm_base_url(), "http://localhost:11434/");
        assert_eq!(config.llm_model(), "qwen3:8b");
        assert_eq!(config.llm_request_timeout(), Duration::from_secs(120));
        assert_eq!(config.llm_max_concurrency().get(), 4);
        assert_eq!(
            config.translator_base_url(),
            "https://api.mymemory.translated.net/"
        );
        assert_eq!(config.translator_timeout(), Duration::from_millis(10000));
        assert_eq!(config.translator_max_concurrency().get(), 1);
        assert_eq!(config.source_language(), "ko");
        assert_eq!(config.model_language(), "en");
        assert_eq!(config.translation_chunk_max_chars().get(), 450);
        assert_eq!(config.option_generation_timeout(), Duration::from_secs(30));
        assert_eq!(config.option_max_count().get(), 10);
        assert_eq!(config.guide_generation_timeout(), Duration::from_secs(180));
        assert_eq!(config.poll_backend_base_url(), "http://localhost:8080/");
        assert_eq!(config.poll_backend_service_token(), None);
        assert_eq!(
            config.poll_backend_connect_timeout(),
            Duration::from_millis(3000)
        );
        assert_eq!(
            config.poll_backend_total_timeout(),
            Duration::from_millis(30000)
        );
        assert_eq!(config.http_max_retries(), 3);
        assert_eq!(config.http_backoff_base_ms(), 250);
        assert_eq!(config.http_backoff_cap_ms(), 10000);
        assert!(config.guide_sweep_enabled());
        assert_eq!(config.guide_sweep_utc_offset_hours(), 9);
        assert_eq!(config.guide_sweep_hour(), 0);
        assert_eq!(config.guide_sweep_minute(), 0);

        reset_env();
    }

    #[test]
    fn from_env_overrides_values() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        reset_env();
        set_env("LLM_BASE_URL", "http://llm:11434/");
        set_env("POLL_BACKEND_BASE_URL", "http://backend:8080/");
        set_env("GUIDE_WORKER_HTTP_BIND", "127.0.0.1:7000");
        set_env("LLM_MODEL", "llama3.1:8b");
        set_env("LLM_MAX_CONCURRENCY", "2");
        set_env("SOURCE_LANGUAGE", " JA ");
        set_env("OPTION_GENERATION_TIMEOUT_SECS", "5");
        set_env("POLL_BACKEND_SERVICE_TOKEN", "secret");
        set_env("GUIDE_SWEEP_ENABLED", "off");
        set_env("GUIDE_SWEEP_UTC_OFFSET_HOURS", "-5");
        set_env("GUIDE_SWEEP_HOUR", "23");
        set_env("GUIDE_SWEEP_MINUTE", "30");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.http_bind(), "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.llm_model(), "llama3.1:8b");
        assert_eq!(config.llm_max_concurrency().get(), 2);
        assert_eq!(config.source_language(), "ja");
        assert_eq!(config.option_generation_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_backend_service_token(), Some("secret"));
        assert!(!config.guide_sweep_enabled());
        assert_eq!(config.guide_sweep_utc_offset_hours(), -5);
        assert_eq!(config.guide_sweep_hour(), 23);
        assert_eq!(config.guide_sweep_minute(), 30);

        reset_env();
    }

    #[test]
    fn from_env_errors_when_llm_missing() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        reset_env();
        set_env("POLL_BACKEND_BASE_URL", "http://backend:8080/");

        let error = Config::from_env().expect_err("missing LLM url should fail");
        assert!(matches!(error, ConfigError::Missing("LLM_BASE_URL")));

        reset_env();
    }

    #[test]
    fn from_env_errors_when_poll_backend_missing() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        reset_env();
        set_env("LLM_BASE_URL", "http://llm:11434/");

        let error = Config::from_env().expect_err("missing backend url should fail");
        assert!(matches!(error, ConfigError::Missing("POLL_BACKEND_BASE_URL")));

        reset_env();
    }

    #[test]
    fn from_env_rejects_zero_concurrency_and_out_of_range_hour() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        reset_env();
        set_env("LLM_BASE_URL", "http://llm:11434/");
        set_env("POLL_BACKEND_BASE_URL", "http://backend:8080/");
        set_env("LLM_MAX_CONCURRENCY", "0");

        let error = Config::from_env().expect_err("zero concurrency should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "LLM_MAX_CONCURRENCY",
                ..
            }
        ));

        remove_env("LLM_MAX_CONCURRENCY");
        set_env("GUIDE_SWEEP_HOUR", "24");
        let error = Config::from_env().expect_err("hour 24 should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "GUIDE_SWEEP_HOUR",
                ..
            }
        ));

        reset_env();
    }
}
