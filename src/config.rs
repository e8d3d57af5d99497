//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default intake webhook (the n8n flow that receives leads).
pub const DEFAULT_WEBHOOK_URL: &str = "https://heliosailabs369.app.n8n.cloud/webhook/chatbot-groq";

/// Phone number shown when delivery fails or the visitor opts out.
pub const DEFAULT_FALLBACK_PHONE: &str = "+52 771 762 2360";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Intake endpoint that receives the lead payload.
    pub webhook_url: String,
    /// Per-attempt delivery timeout.
    pub delivery_timeout: Duration,
    /// Extra attempts after the first failed one.
    pub delivery_retries: u32,
    /// Pause between delivery attempts.
    pub retry_backoff: Duration,
    /// Pause before a node's prompt is revealed.
    pub read_pause: Duration,
    /// Pause between a button click and entering the next node.
    pub choice_delay: Duration,
    /// Prefix applied to bare 10-digit phone numbers.
    pub country_code: String,
    /// Alternate contact channel shown in fallback copy.
    pub fallback_phone: String,
    /// Copy recipient forwarded to the intake endpoint.
    pub email_copy_to: Option<String>,
    /// Accepted payment methods forwarded to the intake endpoint.
    pub forms_of_payment: Vec<String>,
    /// Port for the HTTP chat API (disabled when `None`).
    pub http_port: Option<u16>,
    /// Where the terminal session id is persisted (in-memory when `None`).
    pub session_store_path: Option<PathBuf>,
    /// HTTP conversations untouched for this long are dropped.
    pub session_idle_ttl: Duration,
    /// Ended HTTP conversations are dropped after this much inactivity.
    pub ended_session_ttl: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            webhook_url: DEFAULT_WEBHOOK_URL.to_string(),
            delivery_timeout: Duration::from_secs(10),
            delivery_retries: 1,
            retry_backoff: Duration::from_millis(1200),
            read_pause: Duration::from_millis(600),
            choice_delay: Duration::from_millis(200),
            country_code: "+52".to_string(),
            fallback_phone: DEFAULT_FALLBACK_PHONE.to_string(),
            email_copy_to: None,
            forms_of_payment: vec![
                "transferencia".to_string(),
                "tarjeta".to_string(),
                "efectivo".to_string(),
            ],
            http_port: None,
            session_store_path: None,
            session_idle_ttl: Duration::from_secs(30 * 60),
            ended_session_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl BotConfig {
    /// Defaults with every cosmetic delay set to zero.
    pub fn instant() -> Self {
        Self {
            read_pause: Duration::ZERO,
            choice_delay: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Total delivery attempts (first try plus retries).
    pub fn delivery_attempts(&self) -> u32 {
        self.delivery_retries + 1
    }

    /// Build configuration from `HELIOS_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let webhook_url =
            std::env::var("HELIOS_WEBHOOK_URL").unwrap_or_else(|_| defaults.webhook_url.clone());
        if !(webhook_url.starts_with("http://") || webhook_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "HELIOS_WEBHOOK_URL".into(),
                message: format!("'{webhook_url}' is not an http(s) URL"),
            });
        }

        let delivery_timeout = env_millis("HELIOS_DELIVERY_TIMEOUT_MS")?
            .unwrap_or(defaults.delivery_timeout);
        if delivery_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "HELIOS_DELIVERY_TIMEOUT_MS".into(),
                message: "timeout must be greater than zero".into(),
            });
        }

        let delivery_retries =
            env_parse::<u32>("HELIOS_DELIVERY_RETRIES")?.unwrap_or(defaults.delivery_retries);
        let retry_backoff =
            env_millis("HELIOS_RETRY_BACKOFF_MS")?.unwrap_or(defaults.retry_backoff);
        let read_pause = env_millis("HELIOS_READ_PAUSE_MS")?.unwrap_or(defaults.read_pause);
        let choice_delay = env_millis("HELIOS_CHOICE_DELAY_MS")?.unwrap_or(defaults.choice_delay);

        let country_code =
            std::env::var("HELIOS_COUNTRY_CODE").unwrap_or_else(|_| defaults.country_code.clone());
        if !country_code.starts_with('+') || !country_code[1..].chars().all(|c| c.is_ascii_digit())
        {
            return Err(ConfigError::InvalidValue {
                key: "HELIOS_COUNTRY_CODE".into(),
                message: format!("'{country_code}' must look like +52"),
            });
        }

        let fallback_phone = std::env::var("HELIOS_FALLBACK_PHONE")
            .unwrap_or_else(|_| defaults.fallback_phone.clone());

        let email_copy_to = std::env::var("HELIOS_EMAIL_COPY_TO")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let forms_of_payment = match std::env::var("HELIOS_FORMS_OF_PAYMENT") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.forms_of_payment.clone(),
        };

        let http_port = env_parse::<u16>("HELIOS_HTTP_PORT")?;
        let session_store_path = std::env::var("HELIOS_SESSION_STORE").ok().map(PathBuf::from);
        let session_idle_ttl =
            env_secs("HELIOS_SESSION_IDLE_SECS")?.unwrap_or(defaults.session_idle_ttl);
        let ended_session_ttl =
            env_secs("HELIOS_ENDED_SESSION_SECS")?.unwrap_or(defaults.ended_session_ttl);

        Ok(Self {
            webhook_url,
            delivery_timeout,
            delivery_retries,
            retry_backoff,
            read_pause,
            choice_delay,
            country_code,
            fallback_phone,
            email_copy_to,
            forms_of_payment,
            http_port,
            session_store_path,
            session_idle_ttl,
            ended_session_ttl,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}

fn env_secs(key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_secs))
}
