//! HTTP handlers for conversation endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::dto::ErrorResponse;
use crate::adapters::http::middleware::RequireAuth;
use crate::application::{GetHistoryHandler, GetHistoryQuery, HistoryOutcome};
use crate::domain::foundation::Timestamp;

use super::dto::{HistoryParams, HistoryResponse};

#[derive(Clone)]
pub struct ConversationHandlers {
    history_handler: Arc<GetHistoryHandler>,
}

impl ConversationHandlers {
    pub fn new(history_handler: Arc<GetHistoryHandler>) -> Self {
        Self { history_handler }
    }
}

/// GET /api/conversations/:partner_id/messages - One page of history
pub async fn get_history(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
    Path(partner_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let before = match params.before.as_deref().map(Timestamp::parse_rfc3339).transpose() {
        Ok(before) => before,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("'before' must be an RFC 3339 timestamp")),
            )
                .into_response()
        }
    };

    let query = GetHistoryQuery {
        user_id: user.id,
        partner_id,
        before,
        before_seq: params.before_seq,
        limit: params.limit,
    };

    match handlers.history_handler.handle(query).await {
        Ok(HistoryOutcome::Page(view)) => {
            (StatusCode::OK, Json(HistoryResponse::from(view))).into_response()
        }
        Ok(HistoryOutcome::Rejected(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(reason.to_string())),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Failed to load history");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::internal())).into_response()
        }
    }
}
