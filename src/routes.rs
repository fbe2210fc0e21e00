use crate::analysis::MatchAnalyzer;
use crate::error::AnalysisError;
use crate::models::{AnalysisRequest, AnalysisResult, ChatRequest, ChatResponse, FixtureQuery};
use askama::Template;
use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, QueryRejection},
        Form, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::warn;

/// The analyzer is built once at startup and shared by every handler
pub type SharedAnalyzer = Arc<MatchAnalyzer>;

#[derive(Template, Default)]
#[template(path = "chat.html")]
struct ChatTemplate {
    prompt: String,
    ai_response: String,
    error: String,
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// Build the application router
pub fn router(analyzer: SharedAnalyzer) -> Router {
    Router::new()
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(chat_page).post(chat))
        .route("/chat", post(chat_form))
        .route("/generate-ai-response", post(chat))
        .route("/analisis", post(analisis))
        .route("/analisis/fixtures", get(analisis_fixtures))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(analyzer)
}

/// Body or query string that could not be decoded
fn rejected(details: String) -> AnalysisError {
    warn!("Rejected request: {}", details);
    AnalysisError::BadRequest(details)
}

async fn analisis(
    State(analyzer): State<SharedAnalyzer>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AnalysisError> {
    let Json(request) = payload.map_err(|e| rejected(e.body_text()))?;
    let result = analyzer.analyze(&request).await?;

    Ok(Json(result))
}

async fn analisis_fixtures(
    State(analyzer): State<SharedAnalyzer>,
    query: Result<Query<FixtureQuery>, QueryRejection>,
) -> Result<Json<AnalysisResult>, AnalysisError> {
    let Query(query) = query.map_err(|e| rejected(e.body_text()))?;
    let result = analyzer.analyze_fixtures(&query.league, &query.date).await?;

    Ok(Json(result))
}

/// JSON endpoint used by the chat frontend
async fn chat(
    State(analyzer): State<SharedAnalyzer>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AnalysisError> {
    let Json(request) = payload.map_err(|e| rejected(e.body_text()))?;
    let ai_response = analyzer.chat(&request.prompt).await?;

    Ok(Json(ChatResponse { ai_response }))
}

async fn chat_page() -> impl IntoResponse {
    HtmlTemplate(ChatTemplate::default())
}

/// Plain HTML form fallback for the chat page
async fn chat_form(
    State(analyzer): State<SharedAnalyzer>,
    form: Result<Form<ChatRequest>, FormRejection>,
) -> Response {
    let prompt = match form {
        Ok(Form(request)) => request.prompt,
        Err(e) => {
            let template = ChatTemplate {
                error: rejected(e.body_text()).to_string(),
                ..ChatTemplate::default()
            };
            return (StatusCode::BAD_REQUEST, HtmlTemplate(template)).into_response();
        }
    };

    match analyzer.chat(&prompt).await {
        Ok(ai_response) => HtmlTemplate(ChatTemplate {
            ai_response,
            ..ChatTemplate::default()
        })
        .into_response(),
        Err(e) => {
            let status = e.status();
            let template = ChatTemplate {
                prompt,
                error: e.to_string(),
                ..ChatTemplate::default()
            };
            (status, HtmlTemplate(template)).into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}
