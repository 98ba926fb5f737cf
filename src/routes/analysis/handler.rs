use axum::{
    extract::{Json, State, rejection::JsonRejection},
    response::IntoResponse,
};

use crate::{AppState, error::AppError, models::AnalyzeRequest};

#[axum::debug_handler]
pub async fn analyze_predictions(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| {
        tracing::warn!("Error parsing request body: {}", e);
        AppError::Validation("Invalid request body".to_string())
    })?;

    let (Some(user), Some(tweets)) = (req.user_data, req.tweets) else {
        return Err(AppError::Validation(
            "User data and tweets are required".to_string(),
        ));
    };

    tracing::debug!(
        "Analyzing @{} with {} tweets",
        user.username,
        tweets.len()
    );
    let analysis = state.orchestrator.analyze_predictions(&user, &tweets).await?;
    Ok(Json(analysis))
}
