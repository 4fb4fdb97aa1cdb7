// src/handlers/student.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{error::AppError, repository::SharedStore, scoring, utils::jwt::Claims};

/// Scores of the current user for every section, grouped by course.
pub async fn my_scores(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    Ok(Json(scoring::all_scores(store.as_ref(), user_id).await?))
}
