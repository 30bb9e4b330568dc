//! JSON endpoint in front of [`MoveRanker`].

use std::{future::Future, io, sync::Arc};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Deserializer, Serialize, de};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    error::RankError,
    oracle::OracleFactory,
    ranker::MoveRanker,
    types::render_report,
};

pub struct AppState<F: OracleFactory> {
    pub ranker: MoveRanker<F>,
    /// Deepest search a client may request.
    pub max_depth: u32,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub fen: String,
    #[serde(deserialize_with = "number_or_string")]
    pub depth: u32,
    #[serde(deserialize_with = "number_or_string")]
    pub moves: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Browser forms post numbers as strings; accept both.
fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + std::str::FromStr,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => T::try_from(n).map_err(|_| de::Error::custom("number out of range")),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a positive integer, got {s:?}"))),
    }
}

pub fn router<F: OracleFactory>(state: Arc<AppState<F>>) -> Router {
    Router::new()
        .route("/analyze_fen", post(analyze_fen::<F>))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn analyze_fen<F: OracleFactory>(
    State(state): State<Arc<AppState<F>>>,
    request: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) =
        request.map_err(|rejection| RankError::InvalidRequest(rejection.body_text()))?;
    if request.depth == 0 || request.depth > state.max_depth {
        return Err(RankError::InvalidRequest(format!(
            "depth must be between 1 and {}",
            state.max_depth
        ))
        .into());
    }
    if request.moves == 0 {
        return Err(RankError::InvalidRequest("moves must be at least 1".to_string()).into());
    }

    let ranked = state
        .ranker
        .rank(&request.fen, request.depth, request.moves)
        .await?;
    Ok(Json(AnalyzeResponse {
        result: render_report(&ranked),
    }))
}

/// Resolves once `signal` fires. If the signal handler could not be
/// installed this never resolves, so the server keeps running.
pub async fn wait_for_shutdown(signal: impl Future<Output = io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("shutting down"),
        Err(err) => {
            error!(error = %err, "could not listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Adapts [`RankError`] to an HTTP response.
pub struct ApiError(RankError);

impl From<RankError> for ApiError {
    fn from(err: RankError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            e if e.is_oracle_error() => StatusCode::SERVICE_UNAVAILABLE,
            RankError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "ranking failed");
        } else {
            warn!(error = %self.0, "rejected request");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
