use crate::models::{MatchOdds, MatchRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minimum number of characters in a team name
pub const MIN_TEAM_NAME_LEN: usize = 2;

/// How malformed records are treated
///
/// `Strict` rejects the whole batch on the first bad record. `Permissive` only
/// requires a non-empty batch and leaves bad records to the prompt formatter,
/// which renders them as placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    #[default]
    Strict,
    Permissive,
}

impl FromStr for ValidationPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationPolicy::Strict),
            "permissive" => Ok(ValidationPolicy::Permissive),
            other => anyhow::bail!(
                "Unknown validation policy '{}' (expected 'strict' or 'permissive')",
                other
            ),
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Strict => write!(f, "strict"),
            ValidationPolicy::Permissive => write!(f, "permissive"),
        }
    }
}

/// A batch was rejected; the message names the violated constraint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn required(path: &str) -> Self {
        ValidationError(format!("\"{}\" is required", path))
    }
}

/// Check a batch of matches under the given policy.
///
/// Both policies reject a missing or empty batch. Only the strict policy
/// looks inside each record. Returns the batch on success so callers can
/// continue with a plain slice.
pub fn validate_matches(
    matches: Option<&[MatchRecord]>,
    policy: ValidationPolicy,
) -> Result<&[MatchRecord], ValidationError> {
    let matches = matches.ok_or_else(|| ValidationError::required("matches"))?;

    if matches.is_empty() {
        return Err(ValidationError(
            "\"matches\" must contain at least 1 items".to_string(),
        ));
    }

    if policy == ValidationPolicy::Strict {
        for (index, record) in matches.iter().enumerate() {
            validate_match(index, record)?;
        }
    }

    Ok(matches)
}

/// Check every field of one record
pub fn validate_match(index: usize, record: &MatchRecord) -> Result<(), ValidationError> {
    let path = format!("matches[{}]", index);

    validate_team_name(&format!("{}.homeTeam", path), record.home_team.as_deref())?;
    validate_team_name(&format!("{}.awayTeam", path), record.away_team.as_deref())?;

    let date_path = format!("{}.date", path);
    match record.date.as_deref() {
        None => return Err(ValidationError::required(&date_path)),
        Some(date) if !is_iso_date(date) => {
            return Err(ValidationError(format!(
                "\"{}\" must be in ISO 8601 date format",
                date_path
            )))
        }
        Some(_) => {}
    }

    let odds_path = format!("{}.odds", path);
    match &record.odds {
        None => Err(ValidationError::required(&odds_path)),
        Some(odds) => validate_odds(&odds_path, odds),
    }
}

fn validate_team_name(path: &str, name: Option<&str>) -> Result<(), ValidationError> {
    let name = name.ok_or_else(|| ValidationError::required(path))?;

    if name.is_empty() {
        return Err(ValidationError(format!(
            "\"{}\" is not allowed to be empty",
            path
        )));
    }

    if name.chars().count() < MIN_TEAM_NAME_LEN {
        return Err(ValidationError(format!(
            "\"{}\" length must be at least {} characters long",
            path, MIN_TEAM_NAME_LEN
        )));
    }

    Ok(())
}

fn validate_odds(path: &str, odds: &MatchOdds) -> Result<(), ValidationError> {
    for (outcome, price) in [("home", odds.home), ("draw", odds.draw), ("away", odds.away)] {
        let field = format!("{}.{}", path, outcome);
        match price {
            None => return Err(ValidationError::required(&field)),
            Some(price) if price.is_nan() || price <= 0.0 => {
                return Err(ValidationError(format!(
                    "\"{}\" must be a positive number",
                    field
                )))
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Local date-time layouts, with `T` or a space between date and time
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// The same layouts followed by a `+hh:mm` or `+hhmm` offset
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
];

/// Whether `value` is an ISO-8601 calendar date or date-time
///
/// Accepts `YYYY-MM-DD` and basic `YYYYMMDD` dates, date-times with minute or
/// (fractional) second precision, and an optional `Z` or numeric offset.
pub fn is_iso_date(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || is_basic_date(value)
    {
        return true;
    }

    if NAIVE_DATETIME_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
    {
        return true;
    }

    // `%z` does not take `Z`, so spell UTC as a numeric offset
    let value = match value.strip_suffix(['Z', 'z']) {
        Some(local) => format!("{}+00:00", local),
        None => value.to_string(),
    };
    OFFSET_DATETIME_FORMATS
        .iter()
        .any(|format| DateTime::parse_from_str(&value, format).is_ok())
}

/// `YYYYMMDD`
fn is_basic_date(value: &str) -> bool {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let field = |range: std::ops::Range<usize>| value[range].parse::<u32>().ok();
    match (field(0..4), field(4..6), field(6..8)) {
        (Some(year), Some(month), Some(day)) => {
            NaiveDate::from_ymd_opt(year as i32, month, day).is_some()
        }
        _ => false,
    }
}
