// Step-tagged errors shared by the flight and hotel search chains

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

/// Stage of a search chain that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    /// Credential check and token acquisition.
    Auth,
    /// Hotel IDs by city (hotel chain, step 1).
    HotelList,
    /// Live offers for the candidate hotels (hotel chain, step 2).
    HotelOffers,
    /// Flight offers search (flight chain, step 1).
    FlightOffers,
}

impl SearchStep {
    /// Ordinal position after authentication, `None` for the auth step itself.
    pub fn ordinal(&self) -> Option<u8> {
        match self {
            SearchStep::Auth => None,
            SearchStep::HotelList | SearchStep::FlightOffers => Some(1),
            SearchStep::HotelOffers => Some(2),
        }
    }
}

// Callers match on `"auth"`, `1` or `2`.
impl Serialize for SearchStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.ordinal() {
            Some(n) => serializer.serialize_u8(n),
            None => serializer.serialize_str("auth"),
        }
    }
}

impl std::fmt::Display for SearchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ordinal() {
            Some(n) => write!(f, "{}", n),
            None => f.write_str("auth"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    MissingToken,
    Transport,
    Provider { status: u16 },
    Decode,
    NoCandidates,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Authentication => "authentication",
            ErrorKind::MissingToken => "missing_token",
            ErrorKind::Transport => "transport",
            ErrorKind::Provider { .. } => "provider",
            ErrorKind::Decode => "decode",
            ErrorKind::NoCandidates => "no_candidates",
        }
    }
}

/// Terminal failure of a search chain.
///
/// Every failure carries the stage it came from. `details` holds the provider
/// response body or the transport error text when one is available.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (step {step})")]
pub struct SearchError {
    pub kind: ErrorKind,
    pub step: SearchStep,
    pub message: String,
    pub details: Option<String>,
}

impl SearchError {
    pub fn new(kind: ErrorKind, step: SearchStep, message: impl Into<String>) -> Self {
        Self {
            kind,
            step,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, SearchStep::Auth, message)
    }

    pub fn missing_credential() -> Self {
        Self::configuration("Amadeus API key or secret is not set in environment variables")
    }

    pub fn is_configuration(&self) -> bool {
        self.kind == ErrorKind::Configuration
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::Provider { status } => Some(status),
            _ => None,
        }
    }
}

impl Serialize for SearchError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut len = 3;
        if self.details.is_some() {
            len += 1;
        }
        if self.status().is_some() {
            len += 1;
        }
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("error", &self.message)?;
        if let Some(details) = &self.details {
            map.serialize_entry("details", details)?;
        }
        map.serialize_entry("step", &self.step)?;
        map.serialize_entry("kind", self.kind.as_str())?;
        if let Some(status) = self.status() {
            map.serialize_entry("status", &status)?;
        }
        map.end()
    }
}

/// Outcome of one search: the provider payload untouched, or a tagged failure.
pub type SearchResult = Result<serde_json::Value, SearchError>;

/// Errors raised while building the client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}
