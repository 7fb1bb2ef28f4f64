// Flight offers search: token, then one GET against the flight-offers endpoint

use crate::config::{ClientConfig, FLIGHT_OFFERS_PATH};
use crate::error::{ErrorKind, SearchError, SearchResult, SearchStep};
use crate::token::TokenProvider;
use crate::transport::{HttpRequest, HttpTransport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl TravelClass {
    /// Case-insensitive match against the provider's accepted values.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ECONOMY" => Some(TravelClass::Economy),
            "PREMIUM_ECONOMY" => Some(TravelClass::PremiumEconomy),
            "BUSINESS" => Some(TravelClass::Business),
            "FIRST" => Some(TravelClass::First),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelClass::Economy => "ECONOMY",
            TravelClass::PremiumEconomy => "PREMIUM_ECONOMY",
            TravelClass::Business => "BUSINESS",
            TravelClass::First => "FIRST",
        }
    }
}

fn default_max_results() -> u32 {
    3
}

/// Trip parameters for a flight search. Dates are `YYYY-MM-DD` strings,
/// passed through as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin_location_code: String,
    pub destination_location_code: String,
    pub departure_date: String,
    pub adults: u32,
    #[serde(default)]
    pub non_stop: bool,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(default)]
    pub travel_class: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl FlightQuery {
    pub fn new(
        origin_location_code: impl Into<String>,
        destination_location_code: impl Into<String>,
        departure_date: impl Into<String>,
        adults: u32,
    ) -> Self {
        Self {
            origin_location_code: origin_location_code.into(),
            destination_location_code: destination_location_code.into(),
            departure_date: departure_date.into(),
            adults,
            non_stop: false,
            return_date: None,
            children: 0,
            infants: 0,
            travel_class: None,
            max_results: default_max_results(),
        }
    }

    /// Query parameters in the provider's naming. Optional fields are left
    /// out unless set; an unrecognized travel class is dropped.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("originLocationCode".to_string(), self.origin_location_code.clone()),
            ("destinationLocationCode".to_string(), self.destination_location_code.clone()),
            ("departureDate".to_string(), self.departure_date.clone()),
            ("adults".to_string(), self.adults.to_string()),
            ("nonStop".to_string(), self.non_stop.to_string()),
            ("max".to_string(), self.max_results.to_string()),
        ];

        if let Some(return_date) = self.return_date.as_deref().filter(|d| !d.is_empty()) {
            params.push(("returnDate".to_string(), return_date.to_string()));
        }
        if self.children > 0 {
            params.push(("children".to_string(), self.children.to_string()));
        }
        if self.infants > 0 {
            params.push(("infants".to_string(), self.infants.to_string()));
        }
        if let Some(class) = self.travel_class.as_deref().and_then(TravelClass::parse) {
            params.push(("travelClass".to_string(), class.as_str().to_string()));
        }

        params
    }
}

pub struct FlightSearchClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenProvider>,
    config: Arc<ClientConfig>,
}

impl FlightSearchClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenProvider>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            transport,
            tokens,
            config,
        }
    }

    #[instrument(
        skip(self, query),
        fields(
            origin = %query.origin_location_code,
            destination = %query.destination_location_code,
            departure = %query.departure_date,
        )
    )]
    pub async fn search(&self, query: &FlightQuery) -> SearchResult {
        let result = self.run(query).await;
        if let Err(e) = &result {
            warn!(step = %e.step, kind = e.kind.as_str(), "flight search failed: {}", e.message);
        }
        result
    }

    async fn run(&self, query: &FlightQuery) -> SearchResult {
        let base_url = self.config.base_url(self.config.environment);
        let timeout = self.config.flight_timeout;

        let token = self
            .tokens
            .access_token(&base_url, self.config.credential.as_ref(), timeout)
            .await?;

        let mut request = HttpRequest::get(format!("{}{}", base_url, FLIGHT_OFFERS_PATH))
            .bearer(&token.value)
            .timeout(timeout);
        request.query = query.to_params();

        let response = self.transport.send(request).await.map_err(|e| {
            SearchError::new(
                ErrorKind::Transport,
                SearchStep::FlightOffers,
                "Error fetching flight offers",
            )
            .with_details(e.to_string())
        })?;

        if !response.is_success() {
            return Err(SearchError::new(
                ErrorKind::Provider {
                    status: response.status,
                },
                SearchStep::FlightOffers,
                "Error from Amadeus flight offers API",
            )
            .with_details(response.error_detail()));
        }

        let payload: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
            SearchError::new(
                ErrorKind::Decode,
                SearchStep::FlightOffers,
                format!("Could not parse flight offers: {}", e),
            )
            .with_details(response.body.clone())
        })?;

        let offers = payload
            .get("data")
            .and_then(|d| d.as_array())
            .map(|d| d.len())
            .unwrap_or(0);
        info!(offers, "flight search completed");

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credential, TokenPolicy};
    use crate::transport::mock_transport::MockTransport;
    use crate::transport::TransportError;
    use serde_json::json;
    use test_case::test_case;

    const OFFERS: &str = r#"{"meta":{"count":1},"data":[{"id":"1","price":{"total":"412.10"}}]}"#;

    fn client(mock: Arc<MockTransport>, config: ClientConfig) -> FlightSearchClient {
        let tokens = Arc::new(TokenProvider::new(mock.clone(), config.token_policy));
        FlightSearchClient::new(mock, tokens, Arc::new(config))
    }

    fn configured() -> ClientConfig {
        ClientConfig::default().with_credential(Credential::new("key", "secret"))
    }

    fn lhr_tyo() -> FlightQuery {
        FlightQuery::new("LHR", "TYO", "2025-12-01", 1)
    }

    #[test_case(Some("economy"), Some("ECONOMY") ; "lowercase is normalized")]
    #[test_case(Some("Premium_Economy"), Some("PREMIUM_ECONOMY") ; "mixed case premium")]
    #[test_case(Some("BUSINESS"), Some("BUSINESS") ; "already upper case")]
    #[test_case(Some("first"), Some("FIRST") ; "first class")]
    #[test_case(Some("FOO"), None ; "unknown class is dropped")]
    #[test_case(None, None ; "absent class")]
    fn test_travel_class_param(input: Option<&str>, expected: Option<&str>) {
        let mut query = lhr_tyo();
        query.travel_class = input.map(str::to_string);

        let params = query.to_params();
        let sent = params
            .iter()
            .find(|(k, _)| k == "travelClass")
            .map(|(_, v)| v.as_str());
        assert_eq!(sent, expected);
    }

    #[test]
    fn test_zero_children_and_infants_are_omitted() {
        let params = lhr_tyo().to_params();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "originLocationCode",
                "destinationLocationCode",
                "departureDate",
                "adults",
                "nonStop",
                "max"
            ]
        );
    }

    #[test]
    fn test_optional_fields_included_when_set() {
        let mut query = lhr_tyo();
        query.non_stop = true;
        query.return_date = Some("2025-12-10".to_string());
        query.children = 2;
        query.infants = 1;
        query.max_results = 5;

        let params = query.to_params();
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("nonStop").as_deref(), Some("true"));
        assert_eq!(get("returnDate").as_deref(), Some("2025-12-10"));
        assert_eq!(get("children").as_deref(), Some("2"));
        assert_eq!(get("infants").as_deref(), Some("1"));
        assert_eq!(get("max").as_deref(), Some("5"));
    }

    #[test]
    fn test_query_defaults_from_json() {
        let query: FlightQuery = serde_json::from_value(json!({
            "origin_location_code": "MAD",
            "destination_location_code": "BCN",
            "departure_date": "2025-12-01",
            "adults": 1
        }))
        .unwrap();

        assert_eq!(query, FlightQuery::new("MAD", "BCN", "2025-12-01", 1));
    }

    #[tokio::test]
    async fn test_search_returns_payload_verbatim() {
        let mock = Arc::new(
            MockTransport::new()
                .with_token("tok")
                .respond("flight-offers", 200, OFFERS),
        );
        let flights = client(mock.clone(), configured());

        let result = flights.search(&lhr_tyo()).await.unwrap();
        assert_eq!(result, serde_json::from_str::<serde_json::Value>(OFFERS).unwrap());

        let request = mock.last_request_to("flight-offers").unwrap();
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer tok".to_string())));
        assert_eq!(request.query_value("nonStop"), Some("false"));
        assert_eq!(request.timeout, None);
    }

    #[tokio::test]
    async fn test_rendered_payload_keeps_key_order_and_number_text() {
        let body = r#"{"meta":{"count":1},"data":[{"id":"1","price":{"total":412.10,"base":12345678901234567890123}}]}"#;
        let mock = Arc::new(
            MockTransport::new()
                .with_token("tok")
                .respond("flight-offers", 200, body),
        );
        let flights = client(mock, configured());

        let rendered = crate::tools::render(flights.search(&lhr_tyo()).await);
        assert_eq!(serde_json::to_string(&rendered).unwrap(), body);
    }

    #[tokio::test]
    async fn test_missing_credentials_make_no_calls() {
        let mock = Arc::new(MockTransport::new().with_token("tok"));
        let flights = client(mock.clone(), ClientConfig::default());

        let err = flights.search(&lhr_tyo()).await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_before_search() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("oauth2/token", 500, "token service down")
                .respond("flight-offers", 200, OFFERS),
        );
        let flights = client(mock.clone(), configured());

        let err = flights.search(&lhr_tyo()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.step, SearchStep::Auth);
        assert_eq!(mock.calls_to("flight-offers"), 0);
    }

    #[tokio::test]
    async fn test_provider_error_prefers_body() {
        let mock = Arc::new(MockTransport::new().with_token("tok").respond(
            "flight-offers",
            400,
            r#"{"errors":[{"code":477,"title":"INVALID FORMAT"}]}"#,
        ));
        let flights = client(mock, configured());

        let err = flights.search(&lhr_tyo()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Provider { status: 400 });
        assert_eq!(err.step, SearchStep::FlightOffers);
        assert!(err.details.unwrap().contains("INVALID FORMAT"));
    }

    #[tokio::test]
    async fn test_transport_error_detail() {
        let mock = Arc::new(
            MockTransport::new()
                .with_token("tok")
                .fail("flight-offers", TransportError::Network("connection reset".into())),
        );
        let flights = client(mock, configured());

        let err = flights.search(&lhr_tyo()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
        assert_eq!(err.details.as_deref(), Some("Network error: connection reset"));
    }

    #[tokio::test]
    async fn test_non_json_success_is_decode_error() {
        let mock = Arc::new(
            MockTransport::new()
                .with_token("tok")
                .respond("flight-offers", 200, "<html>maintenance</html>"),
        );
        let flights = client(mock, configured());

        let err = flights.search(&lhr_tyo()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
        assert_eq!(err.details.as_deref(), Some("<html>maintenance</html>"));
    }

    #[tokio::test]
    async fn test_cached_tokens_shared_across_searches() {
        let mut config = configured();
        config.token_policy = TokenPolicy::Cached;
        let mock = Arc::new(
            MockTransport::new()
                .with_token("tok")
                .respond("flight-offers", 200, OFFERS),
        );
        let flights = client(mock.clone(), config);

        flights.search(&lhr_tyo()).await.unwrap();
        flights.search(&lhr_tyo()).await.unwrap();
        assert_eq!(mock.calls_to("oauth2/token"), 1);
        assert_eq!(mock.calls_to("flight-offers"), 2);
    }
}
