// Command-line entry point for the travel search tools

use amadeus_travel_tools::{render, ClientConfig, FlightQuery, HotelQuery, TravelTools};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "amadeus-tools",
    version,
    about = "Flight and hotel search against the Amadeus APIs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search flight offers
    Flights(FlightArgs),
    /// Search hotel offers in a city
    Hotels(HotelArgs),
    /// Run flight and hotel searches concurrently; `--adults` applies to both
    Trip {
        #[command(flatten)]
        flight: FlightArgs,
        #[command(flatten)]
        stay: StayArgs,
    },
    /// Print tool definitions
    Tools,
    /// Call a tool by name with JSON arguments
    Call { name: String, args: String },
}

#[derive(Args, Debug)]
struct FlightArgs {
    #[arg(long)]
    origin: String,
    #[arg(long)]
    destination: String,
    #[arg(long)]
    departure_date: String,
    #[arg(long, default_value_t = 1)]
    adults: u32,
    #[arg(long)]
    non_stop: bool,
    #[arg(long)]
    return_date: Option<String>,
    #[arg(long, default_value_t = 0)]
    children: u32,
    #[arg(long, default_value_t = 0)]
    infants: u32,
    #[arg(long)]
    travel_class: Option<String>,
    #[arg(long, default_value_t = 3)]
    max_results: u32,
}

impl From<FlightArgs> for FlightQuery {
    fn from(args: FlightArgs) -> Self {
        let mut query = FlightQuery::new(
            args.origin,
            args.destination,
            args.departure_date,
            args.adults,
        );
        query.non_stop = args.non_stop;
        query.return_date = args.return_date;
        query.children = args.children;
        query.infants = args.infants;
        query.travel_class = args.travel_class;
        query.max_results = args.max_results;
        query
    }
}

#[derive(Args, Debug)]
struct HotelArgs {
    #[command(flatten)]
    stay: StayArgs,
    #[arg(long, default_value_t = 1)]
    adults: u32,
}

/// Hotel options without the guest count, which `trip` takes from the flight args
#[derive(Args, Debug)]
struct StayArgs {
    #[arg(long)]
    city_code: String,
    #[arg(long)]
    check_in: String,
    #[arg(long)]
    check_out: String,
    /// Query the production environment instead of test
    #[arg(long)]
    production: bool,
    #[arg(long, default_value_t = 1000)]
    radius_km: u32,
    #[arg(long, default_value_t = 5)]
    max_hotels: usize,
    #[arg(long, default_value = "EUR")]
    currency: String,
    #[arg(long, default_value = "1-10000")]
    price_range: String,
    #[arg(long, default_value_t = 1)]
    room_quantity: u32,
    #[arg(long, default_value = "")]
    view: String,
}

impl StayArgs {
    fn into_query(self, adults: u32) -> HotelQuery {
        let mut query = HotelQuery::new(self.city_code, self.check_in, self.check_out, adults);
        query.use_test_env = !self.production;
        query.radius_km = self.radius_km;
        query.max_hotels = self.max_hotels;
        query.currency = self.currency;
        query.price_range = self.price_range;
        query.room_quantity = self.room_quantity;
        query.view = self.view;
        query
    }
}

impl From<HotelArgs> for HotelQuery {
    fn from(args: HotelArgs) -> Self {
        args.stay.into_query(args.adults)
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("invalid configuration")?;
    info!(
        environment = ?config.environment,
        token_policy = ?config.token_policy,
        "configuration loaded"
    );

    let tools = TravelTools::with_reqwest(config);

    let failed = match cli.command {
        Command::Flights(args) => {
            let result = tools.search_flights(&args.into()).await;
            let failed = result.is_err();
            print_json(&render(result))?;
            failed
        }
        Command::Hotels(args) => {
            let result = tools.search_hotels(&args.into()).await;
            let failed = result.is_err();
            print_json(&render(result))?;
            failed
        }
        Command::Trip { flight, stay } => {
            let hotel = stay.into_query(flight.adults);
            let flight: FlightQuery = flight.into();
            let (flights, hotels) =
                futures::join!(tools.search_flights(&flight), tools.search_hotels(&hotel));
            let failed = flights.is_err() || hotels.is_err();
            print_json(&json!({
                "flights": render(flights),
                "hotels": render(hotels),
            }))?;
            failed
        }
        Command::Tools => {
            print_json(&Value::Array(amadeus_travel_tools::definitions()))?;
            false
        }
        Command::Call { name, args } => {
            let args: Value = serde_json::from_str(&args).context("arguments must be JSON")?;
            let value = tools.call(&name, args).await?;
            let failed = value.get("error").is_some() && value.get("step").is_some();
            print_json(&value)?;
            failed
        }
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
