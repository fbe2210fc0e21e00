use serde::{Deserialize, Serialize};

/// Decimal odds for the three outcomes of a match.
///
/// Every field is optional on the way in so that a missing value can be
/// reported by the validator (or rendered as `N/A` in permissive mode)
/// instead of failing JSON decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOdds {
    pub home: Option<f64>,
    pub draw: Option<f64>,
    pub away: Option<f64>,
}

impl MatchOdds {
    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self {
            home: Some(home),
            draw: Some(draw),
            away: Some(away),
        }
    }
}

/// One fixture submitted for analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    /// ISO-8601 date or date-time, kept as the caller wrote it
    pub date: Option<String>,
    pub odds: Option<MatchOdds>,
}

impl MatchRecord {
    pub fn new(home_team: &str, away_team: &str, date: &str, odds: MatchOdds) -> Self {
        Self {
            home_team: Some(home_team.to_string()),
            away_team: Some(away_team.to_string()),
            date: Some(date.to_string()),
            odds: Some(odds),
        }
    }
}

/// Body of `POST /analisis`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub matches: Option<Vec<MatchRecord>>,
}

impl AnalysisRequest {
    pub fn new(matches: Vec<MatchRecord>) -> Self {
        Self {
            matches: Some(matches),
        }
    }
}

/// Formatted matches echoed back together with the model's recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub partidos_analizados: Vec<String>,
    pub recomendacion: String,
}

/// Free-text question sent by the chat frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub ai_response: String,
}

/// Query string of the provider-fetched fixture analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureQuery {
    /// Odds API sport key, e.g. `soccer_mexico_ligamx`
    pub league: String,
    /// Day to analyze, `YYYY-MM-DD` (UTC)
    pub date: String,
}
