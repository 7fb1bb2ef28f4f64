// Tool surface: JSON descriptors, argument decoding and result rendering

use crate::config::ClientConfig;
use crate::error::SearchResult;
use crate::flights::{FlightQuery, FlightSearchClient};
use crate::hotels::{HotelQuery, HotelSearchClient};
use crate::token::TokenProvider;
use crate::transport::{HttpTransport, ReqwestTransport};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const SEARCH_FLIGHTS: &str = "search_flights";
pub const SEARCH_HOTELS: &str = "search_hotels";

/// Errors raised before a search starts. Search failures are not tool errors.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

pub struct TravelTools {
    flights: FlightSearchClient,
    hotels: HotelSearchClient,
}

impl TravelTools {
    pub fn new(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let config = Arc::new(config);
        let tokens = Arc::new(TokenProvider::new(transport.clone(), config.token_policy));
        Self {
            flights: FlightSearchClient::new(transport.clone(), tokens.clone(), config.clone()),
            hotels: HotelSearchClient::new(transport, tokens, config),
        }
    }

    /// Tools backed by a real HTTP client.
    pub fn with_reqwest(config: ClientConfig) -> Self {
        Self::new(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn flights(&self) -> &FlightSearchClient {
        &self.flights
    }

    pub fn hotels(&self) -> &HotelSearchClient {
        &self.hotels
    }

    pub async fn search_flights(&self, query: &FlightQuery) -> SearchResult {
        self.flights.search(query).await
    }

    pub async fn search_hotels(&self, query: &HotelQuery) -> SearchResult {
        self.hotels.search(query).await
    }

    /// Dispatches a tool call by name with JSON arguments.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        debug!(tool = name, "dispatching tool call");
        match name {
            SEARCH_FLIGHTS => {
                let query: FlightQuery = decode_args(name, args)?;
                Ok(render(self.search_flights(&query).await))
            }
            SEARCH_HOTELS => {
                let query: HotelQuery = decode_args(name, args)?;
                Ok(render(self.search_hotels(&query).await))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn decode_args<T: serde::de::DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// JSON the caller consumes for one search outcome.
pub fn render(result: SearchResult) -> Value {
    match result {
        Ok(payload) => payload,
        Err(error) => serde_json::to_value(&error)
            .unwrap_or_else(|e| json!({"error": error.message, "details": e.to_string()})),
    }
}

/// Tool descriptors in `{name, description, input_schema}` form.
pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": SEARCH_FLIGHTS,
            "description": "Search flight offers. Dates are YYYY-MM-DD.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "origin_location_code": {"type": "string", "description": "IATA code of the origin airport, e.g. LHR"},
                    "destination_location_code": {"type": "string", "description": "IATA code of the destination, e.g. TYO"},
                    "departure_date": {"type": "string"},
                    "adults": {"type": "integer", "minimum": 1},
                    "non_stop": {"type": "boolean", "default": false},
                    "return_date": {"type": "string"},
                    "children": {"type": "integer", "minimum": 0, "default": 0},
                    "infants": {"type": "integer", "minimum": 0, "default": 0},
                    "travel_class": {
                        "type": "string",
                        "description": "ECONOMY, PREMIUM_ECONOMY, BUSINESS or FIRST, any case. Other values are ignored."
                    },
                    "max_results": {"type": "integer", "minimum": 1, "default": 3}
                },
                "required": ["origin_location_code", "destination_location_code", "departure_date", "adults"]
            }
        }),
        json!({
            "name": SEARCH_HOTELS,
            "description": "Search live hotel offers in a city. Resolves hotels by IATA city code, then prices them. Dates are YYYY-MM-DD.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "city_code": {"type": "string", "description": "IATA city code, e.g. PAR"},
                    "check_in_date": {"type": "string"},
                    "check_out_date": {"type": "string"},
                    "adults": {"type": "integer", "minimum": 1},
                    "use_test_env": {"type": "boolean", "default": true},
                    "radius_km": {"type": "integer", "default": 1000},
                    "max_hotels": {"type": "integer", "default": 5},
                    "currency": {"type": "string", "default": "EUR"},
                    "price_range": {"type": "string", "default": "1-10000"},
                    "room_quantity": {"type": "integer", "default": 1},
                    "view": {"type": "string", "description": "e.g. FULL; empty to omit"}
                },
                "required": ["city_code", "check_in_date", "check_out_date", "adults"]
            }
        }),
    ]
}
