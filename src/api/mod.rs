pub mod gemini_api;
pub mod odds_api;

use crate::models::MatchRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// A generative-text service that turns one prompt into one completion
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` once and return the generated text untouched
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// The provider does not know the requested league. Returned through
/// `anyhow::Error` so callers can tell it apart with `downcast_ref`.
#[derive(Debug, Error)]
#[error("\"league\" '{0}' is not a league known to the odds provider")]
pub struct UnknownLeague(pub String);

/// A source of fixtures with their odds
#[async_trait]
pub trait FixtureProvider: Send + Sync {
    /// Fixtures of `league` starting on `date` (UTC), in kickoff order.
    /// An empty list means the provider has nothing for that filter.
    /// Fails with [`UnknownLeague`] when `league` does not exist.
    async fn fetch_fixtures(&self, league: &str, date: NaiveDate) -> Result<Vec<MatchRecord>>;
}
