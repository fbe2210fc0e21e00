use crate::api::{FixtureProvider, UnknownLeague};
use crate::config::OddsApiConfig;
use crate::models::{MatchOdds, MatchRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

const DRAW_OUTCOME: &str = "Draw";

/// A fixture from the events endpoint of The Odds API
#[derive(Debug, Clone, Deserialize)]
struct OddsApiEvent {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
}

/// Odds for a single event
#[derive(Debug, Deserialize)]
struct OddsApiEventOdds {
    #[serde(default)]
    bookmakers: Vec<OddsApiBookmaker>,
}

/// Bookmaker data from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    title: String,
    markets: Vec<OddsApiMarket>,
}

/// Market data (e.g., h2h) from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    key: String,
    outcomes: Vec<OddsApiOutcome>,
}

/// Body The Odds API sends with non-2xx responses
#[derive(Debug, Deserialize)]
struct OddsApiErrorBody {
    message: String,
}

/// Outcome data for a team or the draw
#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    name: String,
    price: f64,
}

/// Client for The Odds API, returning fixtures with decimal odds
#[derive(Clone)]
pub struct OddsApiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OddsApiClient {
    pub fn new(config: &OddsApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client for The Odds API")?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Fetch the fixtures of `league` that kick off on `date` (UTC)
    async fn fetch_events(&self, league: &str, date: NaiveDate) -> Result<Vec<OddsApiEvent>> {
        let url = format!("{}/sports/{}/events", self.base_url, league);
        let (from, to) = day_window(date);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("commenceTimeFrom", from.as_str()),
                ("commenceTimeTo", to.as_str()),
            ])
            .send()
            .await
            // The key is a query parameter, keep it out of the error text
            .map_err(|e| e.without_url())
            .context("Failed to fetch events from The Odds API")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UnknownLeague(league.to_string()).into());
        }
        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error {}", error_message(response).await);
        }

        let mut events: Vec<OddsApiEvent> = response
            .json()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to parse Odds API events response")?;

        events.sort_by_key(|event| event.commence_time);
        Ok(events)
    }

    /// Fetch the head-to-head decimal odds of one event
    async fn fetch_event_odds(&self, league: &str, event_id: &str) -> Result<OddsApiEventOdds> {
        let url = format!("{}/sports/{}/events/{}/odds", self.base_url, league, event_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", "eu"),
                ("markets", "h2h"), // h2h = 1X2 for soccer
                ("oddsFormat", "decimal"),
            ])
            .send()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("Failed to fetch odds for event {}", event_id))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Odds API returned error for event {}: {}",
                event_id,
                error_message(response).await
            );
        }

        response
            .json()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("Failed to parse odds for event {}", event_id))
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<()> {
        let url = format!("{}/sports", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string()
        };

        info!(
            remaining = %header("x-requests-remaining"),
            used = %header("x-requests-used"),
            "Odds API usage"
        );

        Ok(())
    }
}

#[async_trait]
impl FixtureProvider for OddsApiClient {
    async fn fetch_fixtures(&self, league: &str, date: NaiveDate) -> Result<Vec<MatchRecord>> {
        let events = self.fetch_events(league, date).await?;
        debug!(league, %date, count = events.len(), "Fetched fixtures");

        // One odds request per fixture, run concurrently and stored by index
        let mut tasks = JoinSet::new();
        for (index, event) in events.iter().enumerate() {
            let client = self.clone();
            let league = league.to_string();
            let event_id = event.id.clone();
            tasks.spawn(async move {
                let result = client.fetch_event_odds(&league, &event_id).await;
                (index, result)
            });
        }

        let mut odds: Vec<Option<MatchOdds>> = vec![None; events.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.context("Odds request task failed")?;
            let event = &events[index];
            odds[index] = decimal_odds(&result?.bookmakers, &event.home_team, &event.away_team);
        }

        Ok(events
            .into_iter()
            .zip(odds)
            .map(|(event, odds)| MatchRecord {
                home_team: Some(event.home_team),
                away_team: Some(event.away_team),
                date: Some(
                    event
                        .commence_time
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                odds,
            })
            .collect())
    }
}

/// Status plus the provider's `message`, or the raw body when it has none
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<OddsApiErrorBody>(&body)
        .map(|error| error.message)
        .unwrap_or(body);

    if message.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, message.trim())
    }
}

/// `commenceTimeFrom`/`commenceTimeTo` covering one UTC day
fn day_window(date: NaiveDate) -> (String, String) {
    (
        format!("{}T00:00:00Z", date.format("%Y-%m-%d")),
        format!("{}T23:59:59Z", date.format("%Y-%m-%d")),
    )
}

/// Home/draw/away prices from the first bookmaker that quotes all three
fn decimal_odds(
    bookmakers: &[OddsApiBookmaker],
    home_team: &str,
    away_team: &str,
) -> Option<MatchOdds> {
    bookmakers.iter().find_map(|bookmaker| {
        let market = bookmaker.markets.iter().find(|m| m.key == "h2h")?;
        let price = |name: &str| {
            market
                .outcomes
                .iter()
                .find(|outcome| outcome.name == name)
                .map(|outcome| outcome.price)
        };

        let odds = MatchOdds::new(price(home_team)?, price(DRAW_OUTCOME)?, price(away_team)?);
        debug!(bookmaker = %bookmaker.title, home_team, away_team, "Using odds");
        Some(odds)
    })
}
