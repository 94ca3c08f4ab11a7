//! Reads spot prices out of web pages with the patterns declared per source.

use crate::core::cache::Memo;
use crate::core::config::{RegexConfig, SourceConfig};
use crate::core::decimal_json::parse_decimal;
use crate::core::price::{PriceSource, Quote};
use crate::providers::util::{RetryPolicy, with_retry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = concat!("bullion/", env!("CARGO_PKG_VERSION"));

/// Scrapes price pages over HTTP. Each distinct URL is downloaded once per
/// refresh, so a source serving every metal from one page costs one request.
/// A failed download is remembered too, until the next refresh.
pub struct HttpPriceSource {
    client: reqwest::Client,
    pages: Memo<String, std::result::Result<String, String>>,
    retry: RetryPolicy,
}

impl HttpPriceSource {
    pub fn new() -> Result<Self> {
        Self::with_retry_policy(RetryPolicy::default())
    }

    pub fn with_retry_policy(retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            pages: Memo::new(),
            retry,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.pages
            .get_or_insert_with(url.to_string(), || async {
                self.download(url).await.map_err(|e| format!("{e:#}"))
            })
            .await
            .map_err(|e| anyhow!(e))
    }

    async fn download(&self, url: &str) -> Result<String> {
        debug!("Requesting price page from {}", url);
        let response = with_retry(|| async { self.client.get(url).send().await }, self.retry)
            .await
            .with_context(|| format!("Request failed for {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error: {} for {}", status, url));
        }
        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {url}"))
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    #[instrument(name = "SourceQuote", skip(self, source), fields(metal = %metal))]
    async fn fetch_quote(&self, name: &str, source: &SourceConfig, metal: &str) -> Result<Quote> {
        let symbol = source.symbol_for(metal);
        let url = source.url.replace("{symbol}", symbol);
        let page = self.fetch_page(&url).await?;
        let quote = extract_quote(&page, &source.regex, symbol)?;
        debug!(?quote, "Extracted quote");
        Ok(quote)
    }

    async fn reset(&self) {
        self.pages.clear().await;
    }
}

/// Finds a spot price in `page`, falling back to a bid/ask pair.
pub fn extract_quote(page: &str, patterns: &RegexConfig, symbol: &str) -> Result<Quote> {
    if let Some(spot) = &patterns.spot {
        if let Some(price) = capture_price(page, spot, symbol)? {
            return Ok(Quote::Spot(price));
        }
    }

    if let (Some(bid), Some(ask)) = (&patterns.bid, &patterns.ask) {
        let bid = capture_price(page, bid, symbol)?;
        let ask = capture_price(page, ask, symbol)?;
        if let (Some(bid), Some(ask)) = (bid, ask) {
            return Ok(Quote::BidAsk { bid, ask });
        }
    }

    Err(anyhow!("No spot or bid/ask price found for {}", symbol))
}

fn capture_price(page: &str, pattern: &str, symbol: &str) -> Result<Option<Decimal>> {
    let pattern = pattern.replace("{symbol}", &regex::escape(symbol));
    let re = Regex::new(&pattern).with_context(|| format!("Invalid price pattern: {pattern}"))?;

    let Some(found) = re.captures(page).and_then(|caps| caps.get(1)) else {
        return Ok(None);
    };
    let text = found.as_str().replace(',', "");
    parse_decimal(text.trim())
        .map(Some)
        .ok_or_else(|| anyhow!("Captured text is not a price: {}", found.as_str()))
}
