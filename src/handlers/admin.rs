// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::CreateCourseRequest,
        question::{AnswerInput, CreateQuestionRequest, PublicAnswer},
        section::CreateSectionRequest,
    },
    repository::SharedStore,
    utils::html::clean_html,
};

/// Lists all users, newest first.
/// Admin only.
pub async fn list_users(State(store): State<SharedStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_users().await?))
}

/// Creates a course.
/// Admin only.
pub async fn create_course(
    State(store): State<SharedStore>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = store
        .create_course(&clean_html(&payload.title), &clean_html(&payload.description))
        .await?;

    tracing::info!("Created course {} ({})", course.title, course.id);

    Ok((StatusCode::CREATED, Json(course)))
}

/// Adds a section to a course.
/// Admin only.
pub async fn create_section(
    State(store): State<SharedStore>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateSectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let section = store
        .create_section(course_id, payload.number, &clean_html(&payload.title))
        .await?;

    Ok((StatusCode::CREATED, Json(section)))
}

/// Adds a question with its candidate answers to a section.
/// Admin only. The response includes the `correct` flags.
pub async fn create_question(
    State(store): State<SharedStore>,
    Path(section_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let answers: Vec<AnswerInput> = payload
        .answers
        .iter()
        .map(|a| AnswerInput { text: clean_html(&a.text), correct: a.correct })
        .collect();

    let detail = store
        .create_question(section_id, &clean_html(&payload.text), &answers)
        .await?;

    let correct: Vec<i64> = detail
        .answers
        .iter()
        .filter(|a| a.correct)
        .map(|a| a.id)
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": detail.question.id,
            "section_id": detail.question.section_id,
            "text": detail.question.text,
            "answers": detail
                .answers
                .into_iter()
                .map(|a| PublicAnswer { id: a.id, text: a.text })
                .collect::<Vec<_>>(),
            "correct_answer_ids": correct,
        })),
    ))
}
