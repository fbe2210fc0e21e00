use crate::api::gemini_api::GeminiClient;
use crate::api::odds_api::OddsApiClient;
use crate::api::{CompletionClient, FixtureProvider, UnknownLeague};
use crate::config::Config;
use crate::error::{AnalysisError, AnalysisResultOr};
use crate::models::{AnalysisRequest, AnalysisResult, MatchRecord};
use crate::utils::prompt::{format_matches, FormattedBatch, PromptTemplate};
use crate::utils::validator::{validate_match, validate_matches, ValidationPolicy};
use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs the analysis pipeline: validate, format, ask the model, respond.
///
/// Built once at startup and shared by every request. Holds no per-request
/// state, so concurrent calls never interfere.
pub struct MatchAnalyzer {
    completion: Arc<dyn CompletionClient>,
    fixtures: Option<Arc<dyn FixtureProvider>>,
    policy: ValidationPolicy,
    template: PromptTemplate,
}

impl MatchAnalyzer {
    pub fn new(completion: Arc<dyn CompletionClient>, policy: ValidationPolicy) -> Self {
        Self {
            completion,
            fixtures: None,
            policy,
            template: PromptTemplate::default(),
        }
    }

    /// Build the Gemini client and, when configured, the odds provider
    pub fn from_config(config: &Config) -> Result<Self> {
        let completion = Arc::new(GeminiClient::new(&config.gemini)?);
        let mut analyzer =
            Self::new(completion, config.policy).with_prompt_template(config.prompt.clone());

        if let Some(odds_config) = &config.odds_api {
            analyzer = analyzer.with_fixture_provider(Arc::new(OddsApiClient::new(odds_config)?));
        }

        Ok(analyzer)
    }

    pub fn with_fixture_provider(mut self, fixtures: Arc<dyn FixtureProvider>) -> Self {
        self.fixtures = Some(fixtures);
        self
    }

    pub fn with_prompt_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn has_fixture_provider(&self) -> bool {
        self.fixtures.is_some()
    }

    /// Validate and format a request without calling the model
    pub fn prepare(&self, request: &AnalysisRequest) -> AnalysisResultOr<FormattedBatch> {
        let matches = validate_matches(request.matches.as_deref(), self.policy).map_err(|e| {
            warn!(
                policy = %self.policy,
                matches = request.matches.as_ref().map(Vec::len),
                "Rejected match batch: {}",
                e
            );
            AnalysisError::BadRequest(e.to_string())
        })?;

        Ok(format_matches(matches, &self.template))
    }

    /// Analyze the matches supplied by the caller
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResultOr<AnalysisResult> {
        let batch = self.prepare(request)?;
        info!(matches = batch.lines.len(), policy = %self.policy, "Analyzing matches");

        self.recommend(batch).await
    }

    /// Analyze the fixtures the odds provider lists for `league` on `date`
    pub async fn analyze_fixtures(
        &self,
        league: &str,
        date: &str,
    ) -> AnalysisResultOr<AnalysisResult> {
        let provider = self.fixtures.as_ref().ok_or_else(|| {
            warn!(league, date, "Fixture analysis requested without an odds provider");
            AnalysisError::ServiceUnavailable(
                "no hay proveedor de cuotas configurado".to_string(),
            )
        })?;

        let league = parse_league(league)?;
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
            AnalysisError::BadRequest(format!(
                "\"date\" must be a date in YYYY-MM-DD format, got '{}'",
                date
            ))
        })?;

        let fixtures = provider.fetch_fixtures(league, date).await.map_err(|e| {
            if let Some(unknown) = e.downcast_ref::<UnknownLeague>() {
                warn!(league, %date, "{}", unknown);
                return AnalysisError::BadRequest(unknown.to_string());
            }
            error!(league, %date, "Odds provider request failed: {:#}", e);
            AnalysisError::upstream("Error al obtener los partidos del proveedor de cuotas", e)
        })?;

        if fixtures.is_empty() {
            info!(league, %date, "Odds provider returned no fixtures");
            return Err(AnalysisError::NoData(format!("{} el {}", league, date)));
        }

        let fixtures = self.usable_fixtures(fixtures);
        if fixtures.is_empty() {
            return Err(AnalysisError::NoData(format!(
                "ningún partido de {} el {} tiene cuotas completas",
                league, date
            )));
        }

        info!(league, %date, matches = fixtures.len(), "Analyzing provider fixtures");
        self.recommend(format_matches(&fixtures, &self.template)).await
    }

    /// Forward a free-text question to the model
    pub async fn chat(&self, prompt: &str) -> AnalysisResultOr<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AnalysisError::BadRequest(
                "\"prompt\" is not allowed to be empty".to_string(),
            ));
        }

        debug!(chars = prompt.chars().count(), "Forwarding chat prompt");
        self.completion.complete(prompt).await.map_err(|e| {
            error!("Chat completion failed: {:#}", e);
            AnalysisError::upstream("Error al comunicarse con la IA", e)
        })
    }

    async fn recommend(&self, batch: FormattedBatch) -> AnalysisResultOr<AnalysisResult> {
        debug!(prompt_chars = batch.prompt.chars().count(), "Sending prompt");

        let recomendacion = self.completion.complete(&batch.prompt).await.map_err(|e| {
            error!(matches = batch.lines.len(), "Completion failed: {:#}", e);
            AnalysisError::upstream("Error al generar la recomendación", e)
        })?;

        Ok(AnalysisResult {
            partidos_analizados: batch.lines,
            recomendacion,
        })
    }

    /// Under the strict policy, drop provider fixtures that would not pass
    /// validation (usually a missing draw price). Permissive keeps them all.
    fn usable_fixtures(&self, fixtures: Vec<MatchRecord>) -> Vec<MatchRecord> {
        if self.policy == ValidationPolicy::Permissive {
            return fixtures;
        }

        fixtures
            .into_iter()
            .enumerate()
            .filter_map(|(index, fixture)| match validate_match(index, &fixture) {
                Ok(()) => Some(fixture),
                Err(e) => {
                    warn!("Skipping provider fixture: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Odds API sport keys look like `soccer_mexico_ligamx`
fn parse_league(league: &str) -> AnalysisResultOr<&str> {
    let league = league.trim();
    let valid = !league.is_empty()
        && league
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(league)
    } else {
        Err(AnalysisError::BadRequest(format!(
            "\"league\" must be a sport key such as 'soccer_mexico_ligamx', got '{}'",
            league
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchOdds;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed answer and remembers the prompts it saw
    struct FakeCompletion {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeCompletion {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(anyhow::anyhow!("connection reset by peer")
                    .context("Failed to send request to the Gemini API")),
            }
        }
    }

    struct FakeFixtures {
        fixtures: Vec<MatchRecord>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FixtureProvider for FakeFixtures {
        async fn fetch_fixtures(
            &self,
            _league: &str,
            _date: NaiveDate,
        ) -> Result<Vec<MatchRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.fixtures.clone())
        }
    }

    /// Knows no league at all
    struct NoLeagues;

    #[async_trait]
    impl FixtureProvider for NoLeagues {
        async fn fetch_fixtures(&self, league: &str, _date: NaiveDate) -> Result<Vec<MatchRecord>> {
            Err(UnknownLeague(league.to_string()).into())
        }
    }

    fn america_cruz_azul() -> MatchRecord {
        MatchRecord::new("América", "Cruz Azul", "2025-07-11", MatchOdds::new(2.0, 3.2, 3.5))
    }

    fn tigres_monterrey() -> MatchRecord {
        MatchRecord::new("Tigres", "Monterrey", "2025-07-12", MatchOdds::new(2.4, 3.1, 2.9))
    }

    #[tokio::test]
    async fn test_analyze_returns_lines_in_order() {
        let completion = FakeCompletion::replying("Apuesta al local.");
        let analyzer = MatchAnalyzer::new(completion.clone(), ValidationPolicy::Strict);
        let request = AnalysisRequest::new(vec![america_cruz_azul(), tigres_monterrey()]);

        let result = analyzer.analyze(&request).await.unwrap();

        assert_eq!(
            result.partidos_analizados,
            vec![
                "América vs Cruz Azul (Fecha: 2025-07-11, Cuotas: 2/3.2/3.5)",
                "Tigres vs Monterrey (Fecha: 2025-07-12, Cuotas: 2.4/3.1/2.9)",
            ]
        );
        assert_eq!(result.recomendacion, "Apuesta al local.");

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&result.partidos_analizados.join("\n")));
    }

    #[tokio::test]
    async fn test_strict_rejects_batch_before_calling_model() {
        let completion = FakeCompletion::replying("unused");
        let analyzer = MatchAnalyzer::new(completion.clone(), ValidationPolicy::Strict);

        let mut bad = tigres_monterrey();
        bad.odds = Some(MatchOdds::new(-1.0, 3.1, 2.9));
        let request = AnalysisRequest::new(vec![america_cruz_azul(), bad]);

        let err = analyzer.analyze(&request).await.unwrap_err();
        assert!(
            matches!(err, AnalysisError::BadRequest(ref m) if m.contains("matches[1].odds.home"))
        );
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_and_missing_batches_are_bad_requests() {
        for policy in [ValidationPolicy::Strict, ValidationPolicy::Permissive] {
            let completion = FakeCompletion::replying("unused");
            let analyzer = MatchAnalyzer::new(completion.clone(), policy);

            let empty = analyzer.analyze(&AnalysisRequest::new(vec![])).await;
            assert!(matches!(empty, Err(AnalysisError::BadRequest(_))));

            let missing = analyzer.analyze(&AnalysisRequest::default()).await;
            assert!(matches!(missing, Err(AnalysisError::BadRequest(_))));

            assert_eq!(completion.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_completion_failure_is_upstream_error() {
        let analyzer = MatchAnalyzer::new(FakeCompletion::failing(), ValidationPolicy::Strict);
        let request = AnalysisRequest::new(vec![america_cruz_azul()]);

        let err = analyzer.analyze(&request).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Upstream { .. }));
        assert!(err.details().unwrap().contains("connection reset by peer"));
    }

    #[tokio::test]
    async fn test_formatting_is_deterministic() {
        let analyzer = MatchAnalyzer::new(
            FakeCompletion::replying("Empate."),
            ValidationPolicy::Strict,
        );
        let request = AnalysisRequest::new(vec![america_cruz_azul(), tigres_monterrey()]);

        let first = analyzer.analyze(&request).await.unwrap();
        let second = analyzer.analyze(&request).await.unwrap();
        assert_eq!(first.partidos_analizados, second.partidos_analizados);
    }

    #[tokio::test]
    async fn test_permissive_marks_invalid_record_in_place() {
        let analyzer = MatchAnalyzer::new(
            FakeCompletion::replying("Análisis."),
            ValidationPolicy::Permissive,
        );
        let mut no_home = america_cruz_azul();
        no_home.home_team = None;
        let request = AnalysisRequest::new(vec![tigres_monterrey(), no_home, america_cruz_azul()]);

        let result = analyzer.analyze(&request).await.unwrap();

        assert_eq!(result.partidos_analizados.len(), 3);
        assert_eq!(
            result.partidos_analizados[1],
            crate::utils::prompt::INVALID_MATCH_LINE
        );
        assert!(result.partidos_analizados[0].starts_with("Tigres vs Monterrey"));
        assert!(result.partidos_analizados[2].starts_with("América vs Cruz Azul"));
    }

    #[test]
    fn test_prepare_uses_custom_template() {
        let analyzer = MatchAnalyzer::new(FakeCompletion::replying(""), ValidationPolicy::Strict)
            .with_prompt_template(PromptTemplate {
                header: "Header".to_string(),
                footer: "Footer".to_string(),
            });

        let batch = analyzer
            .prepare(&AnalysisRequest::new(vec![america_cruz_azul()]))
            .unwrap();
        assert!(batch.prompt.starts_with("Header\n\nPartidos:\n"));
        assert!(batch.prompt.ends_with("\n\nFooter"));
    }

    #[tokio::test]
    async fn test_chat() {
        let completion = FakeCompletion::replying("¡Hola!");
        let analyzer = MatchAnalyzer::new(completion.clone(), ValidationPolicy::Strict);

        assert_eq!(analyzer.chat("  ¿Quién gana hoy?  ").await.unwrap(), "¡Hola!");
        assert_eq!(completion.prompts.lock().unwrap()[0], "¿Quién gana hoy?");

        let err = analyzer.chat("   ").await.unwrap_err();
        assert!(matches!(err, AnalysisError::BadRequest(_)));
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_fixtures_without_provider_is_unavailable() {
        let analyzer = MatchAnalyzer::new(FakeCompletion::replying(""), ValidationPolicy::Strict);
        let err = analyzer
            .analyze_fixtures("soccer_epl", "2025-07-11")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fixtures_validate_filter_before_fetching() {
        let provider = Arc::new(FakeFixtures {
            fixtures: vec![america_cruz_azul()],
            calls: AtomicUsize::new(0),
        });
        let analyzer = MatchAnalyzer::new(FakeCompletion::replying(""), ValidationPolicy::Strict)
            .with_fixture_provider(provider.clone());

        let err = analyzer
            .analyze_fixtures("Liga MX", "2025-07-11")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::BadRequest(_)));

        let err = analyzer
            .analyze_fixtures("soccer_mexico_ligamx", "11/07/2025")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::BadRequest(_)));

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fixtures_unknown_league_is_bad_request() {
        let completion = FakeCompletion::replying("unused");
        let analyzer = MatchAnalyzer::new(completion.clone(), ValidationPolicy::Strict)
            .with_fixture_provider(Arc::new(NoLeagues));

        let err = analyzer
            .analyze_fixtures("soccer_atlantis", "2025-07-11")
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::BadRequest(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("soccer_atlantis"));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_fixtures_with_no_results_is_no_data() {
        let provider = Arc::new(FakeFixtures {
            fixtures: vec![],
            calls: AtomicUsize::new(0),
        });
        let completion = FakeCompletion::replying("unused");
        let analyzer = MatchAnalyzer::new(completion.clone(), ValidationPolicy::Strict)
            .with_fixture_provider(provider);

        let err = analyzer
            .analyze_fixtures("soccer_mexico_ligamx", "2025-07-11")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoData(_)));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_fixtures_policy_controls_incomplete_odds() {
        let mut no_draw = tigres_monterrey();
        no_draw.odds = None;
        let fixtures = vec![no_draw, america_cruz_azul()];

        let strict = MatchAnalyzer::new(FakeCompletion::replying("ok"), ValidationPolicy::Strict)
            .with_fixture_provider(Arc::new(FakeFixtures {
                fixtures: fixtures.clone(),
                calls: AtomicUsize::new(0),
            }));
        let result = strict
            .analyze_fixtures("soccer_mexico_ligamx", "2025-07-11")
            .await
            .unwrap();
        assert_eq!(
            result.partidos_analizados,
            vec!["América vs Cruz Azul (Fecha: 2025-07-11, Cuotas: 2/3.2/3.5)"]
        );

        let permissive =
            MatchAnalyzer::new(FakeCompletion::replying("ok"), ValidationPolicy::Permissive)
                .with_fixture_provider(Arc::new(FakeFixtures {
                    fixtures,
                    calls: AtomicUsize::new(0),
                }));
        let result = permissive
            .analyze_fixtures("soccer_mexico_ligamx", "2025-07-11")
            .await
            .unwrap();
        assert_eq!(
            result.partidos_analizados[0],
            "Tigres vs Monterrey (Fecha: 2025-07-12, Cuotas: N/A/N/A/N/A)"
        );
        assert_eq!(result.partidos_analizados.len(), 2);
    }
}
