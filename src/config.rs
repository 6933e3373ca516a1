use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, warn};

use crate::normalize::PrimaryEnvelope;

const DEFAULT_PRIMARY_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_GEOCODER_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_USER_AGENT: &str = concat!("location-suggest/", env!("CARGO_PKG_VERSION"));
const DEFAULT_DEBOUNCE_MS: u64 = 200;
const DEFAULT_MIN_CHARS: usize = 2;
const DEFAULT_PRIMARY_LIMIT: usize = 20;
const DEFAULT_GEOCODER_LIMIT: usize = 15;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub primary_base_url: String,
    pub primary_envelope: PrimaryEnvelope,
    pub primary_api_token: Option<SecretString>,
    pub geocoder_base_url: String,
    pub locale: String,
    pub country_codes: String,
    pub country_name: String,
    pub debounce_ms: u64,
    pub min_chars: usize,
    pub primary_limit: usize,
    pub geocoder_limit: usize,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicEngineConfig {
    pub primary_base_url: String,
    pub primary_envelope: &'static str,
    pub geocoder_base_url: String,
    pub locale: String,
    pub country_codes: String,
    pub debounce_ms: u64,
    pub min_chars: usize,
    pub primary_limit: usize,
    pub geocoder_limit: usize,
    pub request_timeout_ms: u64,
    pub has_primary_api_token: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_base_url: DEFAULT_PRIMARY_BASE_URL.to_string(),
            primary_envelope: PrimaryEnvelope::Array,
            primary_api_token: None,
            geocoder_base_url: DEFAULT_GEOCODER_BASE_URL.to_string(),
            locale: "pl".to_string(),
            country_codes: "pl".to_string(),
            country_name: "Polska".to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            min_chars: DEFAULT_MIN_CHARS,
            primary_limit: DEFAULT_PRIMARY_LIMIT,
            geocoder_limit: DEFAULT_GEOCODER_LIMIT,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let defaults = Self::default();
        Self {
            primary_base_url: parse_string("SUGGEST_PRIMARY_BASE_URL", defaults.primary_base_url),
            primary_envelope: parse_envelope("SUGGEST_PRIMARY_ENVELOPE", defaults.primary_envelope),
            primary_api_token: env::var("SUGGEST_PRIMARY_API_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            geocoder_base_url: parse_string(
                "SUGGEST_GEOCODER_BASE_URL",
                defaults.geocoder_base_url,
            ),
            locale: parse_string("SUGGEST_LOCALE", defaults.locale),
            country_codes: parse_string("SUGGEST_COUNTRY_CODES", defaults.country_codes),
            country_name: parse_string("SUGGEST_COUNTRY_NAME", defaults.country_name),
            debounce_ms: parse_u64("SUGGEST_DEBOUNCE_MS", defaults.debounce_ms),
            min_chars: parse_usize("SUGGEST_MIN_CHARS", defaults.min_chars).max(1),
            primary_limit: parse_usize("SUGGEST_PRIMARY_LIMIT", defaults.primary_limit).max(1),
            geocoder_limit: parse_usize("SUGGEST_GEOCODER_LIMIT", defaults.geocoder_limit).max(1),
            request_timeout_ms: parse_u64(
                "SUGGEST_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )
            .max(1),
            user_agent: parse_string("SUGGEST_USER_AGENT", defaults.user_agent),
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn public_profile(&self) -> PublicEngineConfig {
        PublicEngineConfig {
            primary_base_url: self.primary_base_url.clone(),
            primary_envelope: self.primary_envelope.as_str(),
            geocoder_base_url: self.geocoder_base_url.clone(),
            locale: self.locale.clone(),
            country_codes: self.country_codes.clone(),
            debounce_ms: self.debounce_ms,
            min_chars: self.min_chars,
            primary_limit: self.primary_limit,
            geocoder_limit: self.geocoder_limit,
            request_timeout_ms: self.request_timeout_ms,
            has_primary_api_token: self.primary_api_token.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_string(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_envelope(key: &str, default: PrimaryEnvelope) -> PrimaryEnvelope {
    match env::var(key) {
        Ok(value) => PrimaryEnvelope::parse(&value).unwrap_or_else(|| {
            warn!(value = %value, "unknown primary envelope; keeping default");
            default
        }),
        Err(_) => default,
    }
}
