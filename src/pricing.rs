//! Price sources: the external pricing service and offline stand-ins.
//!
//! A [`PriceSource`] never blocks the tick loop. Requests are fire-and-forget;
//! the simulation polls for finished quotes once per tick and applies the
//! newest one. Failures keep the previous prices.

use std::error::Error;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

/// Supply and demand indicators sent to the pricing service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketIndicators {
    pub wheat_demand: f64,
    pub wheat_supply: f64,
    pub tools_demand: f64,
    pub tools_supply: f64,
}

/// Current prices, both strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub wheat_price: f64,
    pub tools_price: f64,
}

impl PriceQuote {
    pub fn new(wheat_price: f64, tools_price: f64) -> Self {
        Self {
            wheat_price,
            tools_price,
        }
    }

    pub fn validate(self) -> Result<Self, PricingError> {
        let valid = |p: f64| p.is_finite() && p > 0.0;
        if valid(self.wheat_price) && valid(self.tools_price) {
            Ok(self)
        } else {
            Err(PricingError::Malformed(format!(
                "prices must be positive, got wheat={} tools={}",
                self.wheat_price, self.tools_price
            )))
        }
    }
}

#[derive(Debug)]
pub enum PricingError {
    Transport(String),
    Status(u16),
    Malformed(String),
    /// The background worker stopped; no further quotes will arrive.
    Disconnected,
}

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingError::Transport(msg) => write!(f, "pricing request failed: {}", msg),
            PricingError::Status(code) => write!(f, "pricing service returned status {}", code),
            PricingError::Malformed(msg) => write!(f, "malformed pricing response: {}", msg),
            PricingError::Disconnected => write!(f, "pricing worker disconnected"),
        }
    }
}

impl Error for PricingError {}

pub trait PriceSource {
    /// Asks for a fresh quote. Must return immediately.
    fn request(&mut self, indicators: MarketIndicators);

    /// Returns the next finished result, if any.
    fn poll(&mut self) -> Option<Result<PriceQuote, PricingError>>;
}

/// Always answers with the same prices.
#[derive(Debug, Clone)]
pub struct StaticPriceSource {
    quote: PriceQuote,
    pending: bool,
}

impl StaticPriceSource {
    pub fn new(quote: PriceQuote) -> Self {
        Self {
            quote,
            pending: false,
        }
    }
}

impl PriceSource for StaticPriceSource {
    fn request(&mut self, _indicators: MarketIndicators) {
        self.pending = true;
    }

    fn poll(&mut self) -> Option<Result<PriceQuote, PricingError>> {
        if std::mem::take(&mut self.pending) {
            Some(Ok(self.quote))
        } else {
            None
        }
    }
}

pub const BASE_PRICE: f64 = 10.0;
const NEUTRAL_INDICATOR: f64 = 50.0;

/// Price of one good from its indicators, as the pricing service computes it.
///
/// Demand and supply are normalized around 50. With no supply the price
/// doubles. The result is kept within `[0.2, 5]` times the base price.
pub fn formula_price(demand: f64, supply: f64, base_price: f64) -> f64 {
    let demand_factor = demand / NEUTRAL_INDICATOR;
    let supply_factor = supply / NEUTRAL_INDICATOR;
    let price = if supply_factor > 0.0 {
        base_price * (demand_factor / supply_factor)
    } else {
        base_price * 2.0
    };
    price.clamp(base_price * 0.2, base_price * 5.0)
}

/// Computes quotes in-process with [`formula_price`].
#[derive(Debug, Clone)]
pub struct FormulaPriceSource {
    base_price: f64,
    last: Option<MarketIndicators>,
}

impl FormulaPriceSource {
    pub fn new(base_price: f64) -> Self {
        Self {
            base_price,
            last: None,
        }
    }
}

impl Default for FormulaPriceSource {
    fn default() -> Self {
        Self::new(BASE_PRICE)
    }
}

impl PriceSource for FormulaPriceSource {
    fn request(&mut self, indicators: MarketIndicators) {
        self.last = Some(indicators);
    }

    fn poll(&mut self) -> Option<Result<PriceQuote, PricingError>> {
        let indicators = self.last.take()?;
        Some(
            PriceQuote::new(
                formula_price(
                    indicators.wheat_demand,
                    indicators.wheat_supply,
                    self.base_price,
                ),
                formula_price(
                    indicators.tools_demand,
                    indicators.tools_supply,
                    self.base_price,
                ),
            )
            .validate(),
        )
    }
}

pub const DEFAULT_PRICING_URL: &str = "http://127.0.0.1:8001";

/// Client for the external pricing service.
///
/// A worker thread owns the blocking HTTP client. Requests queued while one
/// is in flight are collapsed to the newest.
pub struct HttpPriceSource {
    requests: Option<Sender<MarketIndicators>>,
    results: Receiver<Result<PriceQuote, PricingError>>,
    worker: Option<thread::JoinHandle<()>>,
    disconnected: bool,
}

impl HttpPriceSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PricingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PricingError::Transport(e.to_string()))?;
        let endpoint = format!("{}/update_market", base_url.trim_end_matches('/'));

        let (request_tx, request_rx) = mpsc::channel::<MarketIndicators>();
        let (result_tx, result_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("pricing-client".to_string())
            .spawn(move || {
                while let Ok(mut indicators) = request_rx.recv() {
                    while let Ok(newer) = request_rx.try_recv() {
                        indicators = newer;
                    }
                    let result = fetch_quote(&client, &endpoint, &indicators);
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| PricingError::Transport(e.to_string()))?;

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
            disconnected: false,
        })
    }
}

fn fetch_quote(
    client: &Client,
    endpoint: &str,
    indicators: &MarketIndicators,
) -> Result<PriceQuote, PricingError> {
    let response = client
        .post(endpoint)
        .json(indicators)
        .send()
        .map_err(|e| PricingError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(PricingError::Status(response.status().as_u16()));
    }

    let quote: PriceQuote = response
        .json()
        .map_err(|e| PricingError::Malformed(e.to_string()))?;
    quote.validate()
}

impl PriceSource for HttpPriceSource {
    fn request(&mut self, indicators: MarketIndicators) {
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(indicators).is_ok());
        if !sent {
            self.requests = None;
        }
    }

    fn poll(&mut self) -> Option<Result<PriceQuote, PricingError>> {
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if std::mem::replace(&mut self.disconnected, true) {
                    None
                } else {
                    Some(Err(PricingError::Disconnected))
                }
            }
        }
    }
}

impl Drop for HttpPriceSource {
    fn drop(&mut self) {
        // Closing the request channel lets the worker fall out of its loop.
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators(wheat_demand: f64, tools_demand: f64) -> MarketIndicators {
        MarketIndicators {
            wheat_demand,
            wheat_supply: 50.0,
            tools_demand,
            tools_supply: 50.0,
        }
    }

    #[test]
    fn test_formula_price_matches_service() {
        assert_eq!(formula_price(50.0, 50.0, 10.0), 10.0);
        assert_eq!(formula_price(100.0, 50.0, 10.0), 20.0);
        assert_eq!(formula_price(30.0, 0.0, 10.0), 20.0);
        // Clamped to [2, 50].
        assert_eq!(formula_price(0.0, 50.0, 10.0), 2.0);
        assert_eq!(formula_price(100.0, 1.0, 10.0), 50.0);
    }

    #[test]
    fn test_formula_source_answers_latest_request_once() {
        let mut source = FormulaPriceSource::default();
        assert!(source.poll().is_none());

        source.request(indicators(10.0, 10.0));
        source.request(indicators(75.0, 25.0));
        let quote = source.poll().unwrap().unwrap();
        assert_eq!(quote, PriceQuote::new(15.0, 5.0));
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_static_source() {
        let mut source = StaticPriceSource::new(PriceQuote::new(2.0, 1.0));
        assert!(source.poll().is_none());
        source.request(indicators(0.0, 0.0));
        assert_eq!(source.poll().unwrap().unwrap(), PriceQuote::new(2.0, 1.0));
    }

    #[test]
    fn test_quote_validation_rejects_bad_prices() {
        assert!(PriceQuote::new(1.0, 0.0).validate().is_err());
        assert!(PriceQuote::new(f64::NAN, 1.0).validate().is_err());
        assert!(PriceQuote::new(-1.0, 1.0).validate().is_err());
        assert!(PriceQuote::new(0.5, 3.0).validate().is_ok());
    }

    #[test]
    fn test_quote_parses_service_payload() {
        let quote: PriceQuote =
            serde_json::from_str(r#"{"wheat_price": 12.5, "tools_price": 8.0}"#).unwrap();
        assert_eq!(quote, PriceQuote::new(12.5, 8.0));

        let missing = serde_json::from_str::<PriceQuote>(r#"{"wheat_price": 12.5}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_http_source_reports_unreachable_service() {
        // Port 9 (discard) on localhost is not expected to run the service.
        let mut source =
            HttpPriceSource::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        source.request(indicators(50.0, 50.0));

        let mut result = None;
        for _ in 0..100 {
            if let Some(r) = source.poll() {
                result = Some(r);
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(matches!(result, Some(Err(_))));
    }
}
