// Pokémon TCG API Client
//
// Concept: Structured card search against the Pokémon TCG API v2 (/cards)
// Rate limiting: token bucket (governor), awaited before each request
//
// Query syntax: name:"Pikachu" set.name:"Base" number:58
// API Documentation: https://docs.pokemontcg.io/

use super::{CardQuery, CardSearchClient};
use crate::error::SearchError;
use crate::types::{CandidateCard, MarketPrices};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

/// Public API root
pub const DEFAULT_BASE_URL: &str = "https://api.pokemontcg.io/v2";

/// Printings checked for prices, most common first
const PRICE_VARIANTS: &[&str] = &[
    "normal",
    "holofoil",
    "reverseHolofoil",
    "1stEditionNormal",
    "1stEditionHolofoil",
];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Vec<ApiCard>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCard {
    id: String,
    name: String,
    number: Option<String>,
    hp: Option<String>,
    rarity: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    set: Option<ApiSet>,
    images: Option<ApiImages>,
    tcgplayer: Option<ApiTcgPlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSet {
    name: String,
    printed_total: Option<u32>,
    total: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiImages {
    small: Option<String>,
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTcgPlayer {
    #[serde(default)]
    prices: HashMap<String, ApiPrice>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ApiPrice {
    low: Option<f64>,
    mid: Option<f64>,
    high: Option<f64>,
    market: Option<f64>,
}

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Pokémon TCG API client
pub struct PokemonTcgClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    page_size: u32,
    rate_limiter: DirectLimiter,
}

impl PokemonTcgClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `api_key` - optional; raises the API's rate limits when present
    /// * `base_url` - defaults to the public API
    /// * `requests_per_second` - local rate limit (0 is treated as 1)
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        user_agent: &str,
        page_size: u32,
        requests_per_second: u32,
    ) -> cardscan_common::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| cardscan_common::Error::Config(format!("HTTP client: {}", e)))?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            page_size: page_size.max(1),
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }
}

fn quoted(value: &str) -> String {
    value.replace(['"', '\\'], "")
}

/// Lucene-style query string for the `q` parameter
pub fn build_query(query: &CardQuery) -> String {
    let mut parts = Vec::new();
    let name = quoted(&query.name);
    if query.wildcard {
        parts.push(format!("name:\"{}*\"", name));
    } else {
        parts.push(format!("name:\"{}\"", name));
    }
    if let Some(set) = &query.set_name {
        parts.push(format!("set.name:\"{}\"", quoted(set)));
    }
    if let Some(number) = &query.number {
        parts.push(format!("number:{}", quoted(number)));
    }
    if let Some(hp) = &query.hp {
        parts.push(format!("hp:{}", quoted(hp)));
    }
    parts.join(" ")
}

fn select_prices(prices: &HashMap<String, ApiPrice>) -> Option<MarketPrices> {
    let chosen = PRICE_VARIANTS
        .iter()
        .find_map(|variant| prices.get(*variant))
        .or_else(|| {
            let mut keys: Vec<&String> = prices.keys().collect();
            keys.sort();
            keys.first().and_then(|k| prices.get(*k))
        })?;
    Some(MarketPrices {
        low: chosen.low,
        mid: chosen.mid,
        high: chosen.high,
        market: chosen.market,
    })
}

fn into_candidate(card: ApiCard) -> CandidateCard {
    let (set_name, set_total) = match card.set {
        Some(set) => (Some(set.name), set.printed_total.or(set.total)),
        None => (None, None),
    };
    CandidateCard {
        id: card.id,
        name: card.name,
        set_name,
        set_total,
        number: card.number,
        hp: card.hp,
        rarity: card.rarity,
        types: card.types,
        image_url: card.images.and_then(|i| i.large.or(i.small)),
        prices: card.tcgplayer.and_then(|t| select_prices(&t.prices)),
    }
}

fn transport_error(err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout
    } else {
        SearchError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl CardSearchClient for PokemonTcgClient {
    async fn search(&self, query: &CardQuery) -> Result<Vec<CandidateCard>, SearchError> {
        self.rate_limiter.until_ready().await;

        let q = build_query(query);
        tracing::debug!(q = %q, "Querying Pokémon TCG API");

        let mut request = self
            .client
            .get(format!("{}/cards", self.base_url))
            .query(&[("q", q.as_str()), ("pageSize", &self.page_size.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::Unavailable("card database rate limit reached".into()));
        }
        if !status.is_success() {
            return Err(SearchError::Unavailable(format!(
                "card database returned HTTP {}",
                status
            )));
        }

        let body: ApiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Unavailable(format!("malformed card database response: {}", e))
            }
        })?;

        let cards: Vec<CandidateCard> = body.data.into_iter().map(into_candidate).collect();
        tracing::debug!(query = %query, results = cards.len(), "Card search completed");
        Ok(cards)
    }
}
