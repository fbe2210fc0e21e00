use crate::utils::prompt::PromptTemplate;
use crate::utils::validator::ValidationPolicy;
use anyhow::{Context, Result};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
pub const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ODDS_API_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;

/// Settings for the completion service
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Upper bound on one generateContent call
    pub timeout: Duration,
}

/// Settings for The Odds API
#[derive(Debug, Clone)]
pub struct OddsApiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Upper bound on each events or odds request
    pub timeout: Duration,
}

/// Everything the service reads from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    /// `None` disables provider-fetched fixture analysis
    pub odds_api: Option<OddsApiConfig>,
    pub policy: ValidationPolicy,
    pub prompt: PromptTemplate,
    pub host: String,
    pub port: u16,
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = non_empty(&lookup, "GEMINI_API_KEY")
            .context("GEMINI_API_KEY not set in .env file")?;
        let timeout = parse_timeout(
            &lookup,
            "COMPLETION_TIMEOUT_SECS",
            DEFAULT_COMPLETION_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_key,
            model: non_empty(&lookup, "GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: non_empty(&lookup, "GEMINI_BASE_URL")
                .unwrap_or_else(|| GEMINI_API_BASE_URL.to_string()),
            timeout,
        })
    }
}

impl OddsApiConfig {
    /// `None` when `ODDS_API_KEY` is not set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let Some(api_key) = non_empty(&lookup, "ODDS_API_KEY") else {
            return Ok(None);
        };

        Ok(Some(Self {
            api_key,
            base_url: non_empty(&lookup, "ODDS_API_BASE_URL")
                .unwrap_or_else(|| ODDS_API_BASE_URL.to_string()),
            timeout: parse_timeout(
                &lookup,
                "ODDS_API_TIMEOUT_SECS",
                DEFAULT_ODDS_API_TIMEOUT_SECS,
            )?,
        }))
    }
}

impl Config {
    /// Load `.env` and read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gemini = GeminiConfig::from_lookup(&lookup)?;
        let odds_api = OddsApiConfig::from_lookup(&lookup)?;
        let policy = parse_or(&lookup, "VALIDATION_POLICY", ValidationPolicy::default())?;

        let defaults = PromptTemplate::default();
        let prompt = PromptTemplate {
            header: non_empty(&lookup, "PROMPT_HEADER").unwrap_or(defaults.header),
            footer: non_empty(&lookup, "PROMPT_FOOTER").unwrap_or(defaults.footer),
        };

        Ok(Self {
            gemini,
            odds_api,
            policy,
            prompt,
            host: non_empty(&lookup, "HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
        })
    }

    /// Degraded-but-runnable settings worth logging at startup
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.odds_api.is_none() {
            warnings.push("ODDS_API_KEY not set; fixture analysis is disabled".to_string());
        }

        if self.policy == ValidationPolicy::Permissive {
            warnings.push(
                "Permissive validation: incomplete matches are sent to the model with placeholders"
                    .to_string(),
            );
        }

        warnings
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match non_empty(lookup, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", raw, key, e)),
    }
}

/// A whole number of seconds, never zero
fn parse_timeout(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default_secs: u64,
) -> Result<Duration> {
    let secs = parse_or(lookup, key, default_secs)?;
    if secs == 0 {
        anyhow::bail!("{} must be greater than zero", key);
    }

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "secret")])).unwrap();

        assert_eq!(config.gemini.api_key, "secret");
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini.timeout, Duration::from_secs(30));
        assert!(config.odds_api.is_none());
        assert_eq!(config.policy, ValidationPolicy::Strict);
        assert_eq!(config.prompt, PromptTemplate::default());
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.warnings().len(), 1);
    }

    #[test]
    fn test_missing_gemini_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("COMPLETION_TIMEOUT_SECS", "5"),
            ("ODDS_API_KEY", "odds"),
            ("VALIDATION_POLICY", "permissive"),
            ("PROMPT_FOOTER", "Be brief."),
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.gemini.timeout, Duration::from_secs(5));
        let odds_api = config.odds_api.as_ref().unwrap();
        assert_eq!(odds_api.base_url, ODDS_API_BASE_URL);
        assert_eq!(odds_api.timeout, Duration::from_secs(10));
        assert_eq!(config.policy, ValidationPolicy::Permissive);
        assert_eq!(config.prompt.footer, "Be brief.");
        assert_eq!(config.prompt.header, PromptTemplate::default().header);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.warnings().len(), 1);
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("VALIDATION_POLICY", "lenient"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("VALIDATION_POLICY"));

        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("COMPLETION_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_odds_api_timeout() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("ODDS_API_KEY", "odds"),
            ("ODDS_API_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.odds_api.unwrap().timeout, Duration::from_secs(3));

        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("ODDS_API_KEY", "odds"),
            ("ODDS_API_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ODDS_API_TIMEOUT_SECS"));
    }
}
