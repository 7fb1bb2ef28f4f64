// Amadeus flight and hotel search, exposed as callable tools for an agent runtime

pub mod config;
pub mod error;
pub mod flights;
pub mod hotels;
pub mod token;
pub mod tools;
pub mod transport;

// Re-export key types for convenience
pub use config::{ClientConfig, Credential, Environment, OfferFilters, TokenPolicy};
pub use error::{ConfigError, ErrorKind, SearchError, SearchResult, SearchStep};
pub use flights::{FlightQuery, FlightSearchClient, TravelClass};
pub use hotels::{HotelQuery, HotelSearchClient};
pub use token::{AccessToken, TokenProvider};
pub use tools::{definitions, render, ToolError, TravelTools};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
