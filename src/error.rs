use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The caller sent a missing, empty or malformed batch
    #[error("Datos inválidos: {0}")]
    BadRequest(String),

    /// The completion service or the odds provider failed
    #[error("{context}")]
    Upstream {
        context: String,
        cause: anyhow::Error,
    },

    /// The odds provider has no fixtures for the requested filter
    #[error("No se encontraron partidos: {0}")]
    NoData(String),

    #[error("Servicio no disponible: {0}")]
    ServiceUnavailable(String),
}

pub type AnalysisResultOr<T> = Result<T, AnalysisError>;

impl AnalysisError {
    pub fn upstream(context: impl Into<String>, cause: anyhow::Error) -> Self {
        AnalysisError::Upstream {
            context: context.into(),
            cause,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AnalysisError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AnalysisError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AnalysisError::NoData(_) => StatusCode::NOT_FOUND,
            AnalysisError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Full cause chain of an upstream failure, for diagnostics only
    pub fn details(&self) -> Option<String> {
        match self {
            AnalysisError::Upstream { cause, .. } => Some(format!("{:#}", cause)),
            _ => None,
        }
    }
}

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };

        (self.status(), Json(body)).into_response()
    }
}
