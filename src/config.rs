// Client configuration: credentials, provider environment and per-path policies

use crate::error::{ConfigError, SearchError};
use std::time::Duration;

pub const TEST_BASE_URL: &str = "https://test.api.amadeus.com";
pub const PRODUCTION_BASE_URL: &str = "https://api.amadeus.com";

pub const TOKEN_PATH: &str = "/v1/security/oauth2/token";
pub const FLIGHT_OFFERS_PATH: &str = "/v2/shopping/flight-offers";
pub const HOTEL_LIST_PATH: &str = "/v1/reference-data/locations/hotels/by-city";
pub const HOTEL_OFFERS_PATH: &str = "/v3/shopping/hotel-offers";

pub const DEFAULT_HOTEL_TIMEOUT_SECS: u64 = 20;

/// API key/secret pair for the client-credentials grant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub api_key: String,
    pub api_secret: String,
}

impl Credential {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl Environment {
    pub fn from_test_flag(use_test_env: bool) -> Self {
        if use_test_env {
            Environment::Test
        } else {
            Environment::Production
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Test => TEST_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidValue {
                name: "AMADEUS_ENV",
                value: other.to_string(),
            }),
        }
    }
}

/// Filters sent with every hotel-offers request.
///
/// The defaults are the relaxed values used against the test environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferFilters {
    pub include_closed: bool,
    pub best_rate_only: bool,
}

impl Default for OfferFilters {
    fn default() -> Self {
        Self {
            include_closed: true,
            best_rate_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPolicy {
    /// Fetch a new token for every search.
    #[default]
    FreshPerCall,
    /// Reuse a token until shortly before it expires.
    Cached,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: Option<Credential>,
    /// Environment used by the flight path; hotel queries pick their own.
    pub environment: Environment,
    /// Replaces the environment base URL for every request (proxies, tests).
    pub base_url_override: Option<String>,
    pub flight_timeout: Option<Duration>,
    pub hotel_timeout: Duration,
    pub offer_filters: OfferFilters,
    pub token_policy: TokenPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            credential: None,
            environment: Environment::Test,
            base_url_override: None,
            flight_timeout: None,
            hotel_timeout: Duration::from_secs(DEFAULT_HOTEL_TIMEOUT_SECS),
            offer_filters: OfferFilters::default(),
            token_policy: TokenPolicy::FreshPerCall,
        }
    }
}

impl ClientConfig {
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Reads the configuration from the process environment.
    ///
    /// Missing credentials are not an error here; they are reported by the
    /// first search that needs a token.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ClientConfig::default();

        let api_key = lookup("AMADEUS_API_KEY").unwrap_or_default();
        let api_secret = lookup("AMADEUS_API_SECRET").unwrap_or_default();
        if !api_key.is_empty() || !api_secret.is_empty() {
            config.credential = Some(Credential::new(api_key, api_secret));
        }

        if let Some(env) = lookup("AMADEUS_ENV") {
            config.environment = env.parse()?;
        }
        config.base_url_override = lookup("AMADEUS_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        if let Some(secs) = lookup("AMADEUS_HOTEL_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "AMADEUS_HOTEL_TIMEOUT_SECS",
                    value: secs.clone(),
                })?;
            config.hotel_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("AMADEUS_INCLUDE_CLOSED") {
            config.offer_filters.include_closed = parse_flag("AMADEUS_INCLUDE_CLOSED", &value)?;
        }
        if let Some(value) = lookup("AMADEUS_BEST_RATE_ONLY") {
            config.offer_filters.best_rate_only = parse_flag("AMADEUS_BEST_RATE_ONLY", &value)?;
        }
        if let Some(value) = lookup("AMADEUS_TOKEN_CACHE") {
            if parse_flag("AMADEUS_TOKEN_CACHE", &value)? {
                config.token_policy = TokenPolicy::Cached;
            }
        }

        Ok(config)
    }

    /// Base URL for a request against the given environment.
    pub fn base_url(&self, environment: Environment) -> String {
        match &self.base_url_override {
            Some(url) => url.clone(),
            None => environment.base_url().to_string(),
        }
    }

    /// The credential, or a configuration failure if it is absent or blank.
    pub fn require_credential(&self) -> Result<&Credential, SearchError> {
        match &self.credential {
            Some(credential) if credential.is_complete() => Ok(credential),
            _ => Err(SearchError::missing_credential()),
        }
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}
