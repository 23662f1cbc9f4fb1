//! HTTP market data client
//!
//! Thin JSON client over a quote/financials/news REST service. Field
//! coverage varies by listing, so everything optional stays optional on the
//! wire and in the domain types.

use std::time::Duration;

use advisor_core::{AdvisorError, Financials, MarketData, NewsItem, Quote, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub struct HttpMarketData {
    client: Client,
    base_url: String,
}

impl HttpMarketData {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|err| AdvisorError::MarketData(format!("client build failed: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| AdvisorError::MarketData(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::MarketData(format!(
                "{path} returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|err| AdvisorError::MarketData(format!("bad body from {path}: {err}")))
    }
}

#[derive(Deserialize)]
struct QuoteWire {
    price: f64,
    #[serde(default)]
    change_percent: f64,
    #[serde(default)]
    day_high: f64,
    #[serde(default)]
    day_low: f64,
    #[serde(default)]
    volume: u64,
    #[serde(default)]
    week_52_high: Option<f64>,
    #[serde(default)]
    week_52_low: Option<f64>,
    #[serde(default)]
    as_of: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct FinancialsWire {
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    pe_ratio: Option<f64>,
    #[serde(default)]
    pb_ratio: Option<f64>,
    #[serde(default)]
    eps: Option<f64>,
    #[serde(default)]
    roe: Option<f64>,
    #[serde(default)]
    debt_to_equity: Option<f64>,
    #[serde(default)]
    dividend_yield: Option<f64>,
    #[serde(default)]
    sector: Option<String>,
}

#[derive(Deserialize)]
struct NewsWire {
    headline: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl MarketData for HttpMarketData {
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote> {
        let wire: QuoteWire = self.get_json(&format!("quotes/{ticker}")).await?;
        Ok(Quote {
            ticker: ticker.to_string(),
            price: wire.price,
            change_percent: wire.change_percent,
            day_high: wire.day_high,
            day_low: wire.day_low,
            volume: wire.volume,
            week_52_high: wire.week_52_high,
            week_52_low: wire.week_52_low,
            as_of: wire.as_of.unwrap_or_else(Utc::now),
        })
    }

    async fn fetch_financials(&self, ticker: &str) -> Result<Financials> {
        let wire: FinancialsWire = self.get_json(&format!("financials/{ticker}")).await?;
        Ok(Financials {
            ticker: ticker.to_string(),
            market_cap: wire.market_cap,
            pe_ratio: wire.pe_ratio,
            pb_ratio: wire.pb_ratio,
            eps: wire.eps,
            roe: wire.roe,
            debt_to_equity: wire.debt_to_equity,
            dividend_yield: wire.dividend_yield,
            sector: wire.sector,
        })
    }

    async fn fetch_news(&self, ticker: &str) -> Result<Vec<NewsItem>> {
        let wire: Vec<NewsWire> = self.get_json(&format!("news/{ticker}")).await?;
        Ok(wire
            .into_iter()
            .map(|item| NewsItem {
                headline: item.headline,
                source: item.source,
                published_at: item.published_at,
            })
            .collect())
    }
}
