// src/handlers/course.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, models::course::CourseDetail, repository::SharedStore};

/// Lists all courses.
pub async fn list_courses(State(store): State<SharedStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_courses().await?))
}

/// Retrieves one course with its sections, ordered by section number.
pub async fn get_course(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = store
        .get_course(id)
        .await?
        .ok_or(AppError::NotFound(format!("Course {} not found", id)))?;

    let sections = store.sections_for_course(id).await?;

    Ok(Json(CourseDetail { course, sections }))
}
