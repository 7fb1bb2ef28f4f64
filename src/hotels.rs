// Two-step hotel search: hotel IDs by city, then live offers for those IDs

use crate::config::{ClientConfig, Environment, HOTEL_LIST_PATH, HOTEL_OFFERS_PATH};
use crate::error::{ErrorKind, SearchError, SearchResult, SearchStep};
use crate::token::TokenProvider;
use crate::transport::{HttpRequest, HttpTransport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

fn default_true() -> bool {
    true
}

fn default_radius_km() -> u32 {
    1000
}

fn default_max_hotels() -> usize {
    5
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_price_range() -> String {
    "1-10000".to_string()
}

fn default_room_quantity() -> u32 {
    1
}

/// Stay parameters for a hotel search. Empty `currency`, `price_range` or
/// `view` means the filter is not sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelQuery {
    pub city_code: String,
    pub check_in_date: String,
    pub check_out_date: String,
    pub adults: u32,
    #[serde(default = "default_true")]
    pub use_test_env: bool,
    #[serde(default = "default_radius_km")]
    pub radius_km: u32,
    #[serde(default = "default_max_hotels")]
    pub max_hotels: usize,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_price_range")]
    pub price_range: String,
    #[serde(default = "default_room_quantity")]
    pub room_quantity: u32,
    #[serde(default)]
    pub view: String,
}

impl HotelQuery {
    pub fn new(
        city_code: impl Into<String>,
        check_in_date: impl Into<String>,
        check_out_date: impl Into<String>,
        adults: u32,
    ) -> Self {
        Self {
            city_code: city_code.into(),
            check_in_date: check_in_date.into(),
            check_out_date: check_out_date.into(),
            adults,
            use_test_env: true,
            radius_km: default_radius_km(),
            max_hotels: default_max_hotels(),
            currency: default_currency(),
            price_range: default_price_range(),
            room_quantity: default_room_quantity(),
            view: String::new(),
        }
    }

    pub fn environment(&self) -> Environment {
        Environment::from_test_flag(self.use_test_env)
    }
}

#[derive(Debug, Deserialize)]
struct HotelListResponse {
    #[serde(default)]
    data: Vec<HotelListEntry>,
}

#[derive(Debug, Deserialize)]
struct HotelListEntry {
    #[serde(rename = "hotelId")]
    hotel_id: Option<String>,
}

/// Hotel IDs in provider order, skipping entries without an ID, capped at `max`.
fn candidate_ids(body: &str, max: usize) -> Result<Vec<String>, serde_json::Error> {
    let list: HotelListResponse = serde_json::from_str(body)?;
    Ok(list
        .data
        .into_iter()
        .filter_map(|entry| entry.hotel_id.filter(|id| !id.is_empty()))
        .take(max)
        .collect())
}

pub struct HotelSearchClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenProvider>,
    config: Arc<ClientConfig>,
}

impl HotelSearchClient {
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
            city = %query.city_code,
            check_in = %query.check_in_date,
            check_out = %query.check_out_date,
        )
    )]
    pub async fn search(&self, query: &HotelQuery) -> SearchResult {
        let result = self.run(query).await;
        if let Err(e) = &result {
            warn!(step = %e.step, kind = e.kind.as_str(), "hotel search failed: {}", e.message);
        }
        result
    }

    async fn run(&self, query: &HotelQuery) -> SearchResult {
        let base_url = self.config.base_url(query.environment());
        let timeout = Some(self.config.hotel_timeout);

        let token = self
            .tokens
            .access_token(&base_url, self.config.credential.as_ref(), timeout)
            .await?;

        let hotel_ids = self
            .list_hotels(&base_url, &token.value, query, timeout)
            .await?;
        if hotel_ids.is_empty() {
            return Err(SearchError::new(
                ErrorKind::NoCandidates,
                SearchStep::HotelList,
                format!(
                    "No hotels found in {}. Check city code or increase radius.",
                    query.city_code
                ),
            ));
        }
        debug!(candidates = hotel_ids.len(), "resolved hotel candidates");

        let offers = self
            .fetch_offers(&base_url, &token.value, query, &hotel_ids, timeout)
            .await?;
        info!(hotels = hotel_ids.len(), "hotel search completed");
        Ok(offers)
    }

    async fn list_hotels(
        &self,
        base_url: &str,
        token: &str,
        query: &HotelQuery,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, SearchError> {
        let request = HttpRequest::get(format!("{}{}", base_url, HOTEL_LIST_PATH))
            .bearer(token)
            .query("cityCode", &query.city_code)
            .query("radius", query.radius_km)
            .query("radiusUnit", "KM")
            .timeout(timeout);

        let response = self.transport.send(request).await.map_err(|e| {
            SearchError::new(ErrorKind::Transport, SearchStep::HotelList, "Hotel List API error")
                .with_details(e.to_string())
        })?;

        if !response.is_success() {
            return Err(SearchError::new(
                ErrorKind::Provider {
                    status: response.status,
                },
                SearchStep::HotelList,
                "Hotel List API error",
            )
            .with_details(response.error_detail()));
        }

        candidate_ids(&response.body, query.max_hotels).map_err(|e| {
            SearchError::new(
                ErrorKind::Decode,
                SearchStep::HotelList,
                format!("Could not parse hotel IDs: {}", e),
            )
        })
    }

    async fn fetch_offers(
        &self,
        base_url: &str,
        token: &str,
        query: &HotelQuery,
        hotel_ids: &[String],
        timeout: Option<Duration>,
    ) -> SearchResult {
        let filters = self.config.offer_filters;
        let mut request = HttpRequest::get(format!("{}{}", base_url, HOTEL_OFFERS_PATH))
            .bearer(token)
            .query("hotelIds", hotel_ids.join(","))
            .query("checkInDate", &query.check_in_date)
            .query("checkOutDate", &query.check_out_date)
            .query("adults", query.adults)
            .query("roomQuantity", query.room_quantity)
            .query("includeClosed", filters.include_closed)
            .query("bestRateOnly", filters.best_rate_only)
            .timeout(timeout);

        for (name, value) in [
            ("currency", &query.currency),
            ("priceRange", &query.price_range),
            ("view", &query.view),
        ] {
            if !value.is_empty() {
                request = request.query(name, value);
            }
        }

        let response = self.transport.send(request).await.map_err(|e| {
            SearchError::new(
                ErrorKind::Transport,
                SearchStep::HotelOffers,
                "Hotel Offers API error",
            )
            .with_details(e.to_string())
        })?;

        if !response.is_success() {
            return Err(SearchError::new(
                ErrorKind::Provider {
                    status: response.status,
                },
                SearchStep::HotelOffers,
                "Hotel Offers API error",
            )
            .with_details(response.error_detail()));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            SearchError::new(
                ErrorKind::Decode,
                SearchStep::HotelOffers,
                format!("Could not parse hotel offers: {}", e),
            )
            .with_details(response.body.clone())
        })
    }
}
