use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
};

use crate::{AppState, error::AppError};

use super::model::FetchUserDataQuery;

#[axum::debug_handler]
pub async fn fetch_user_data(
    State(state): State<AppState>,
    Query(query): Query<FetchUserDataQuery>,
) -> Result<impl IntoResponse, AppError> {
    let username = query.username.unwrap_or_default();
    let data = state.orchestrator.fetch_user_data(&username).await?;
    Ok(Json(data))
}
