// src/handlers/section.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        question::PublicQuestion,
        section::{Section, SectionSummary},
        user_answer::{ScoreResponse, SubmitTestRequest},
    },
    repository::SharedStore,
    scoring,
    utils::jwt::Claims,
};

async fn find_section(store: &SharedStore, id: i64) -> Result<Section, AppError> {
    store
        .get_section(id)
        .await?
        .ok_or(AppError::NotFound(format!("Section {} not found", id)))
}

/// Lists all sections, rendered with their course title.
pub async fn list_sections(State(store): State<SharedStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_sections().await?))
}

pub async fn get_section(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let section = find_section(&store, id).await?;
    let course = store
        .get_course(section.course_id)
        .await?
        .ok_or(AppError::NotFound(format!("Course {} not found", section.course_id)))?;

    Ok(Json(SectionSummary {
        id: section.id,
        course: course.title,
        number: section.number,
        title: section.title,
    }))
}

/// Lists the questions of a section with their candidate answers.
/// Which answer is correct is not revealed.
pub async fn list_questions(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    find_section(&store, id).await?;

    let questions: Vec<PublicQuestion> = store
        .questions_for_section(id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(questions))
}

/// Stores the current user's answers for a section, replacing any
/// previous submission.
pub async fn submit_test(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let stored = scoring::submit_answers(store.as_ref(), user_id, id, &req.answers).await?;

    Ok(Json(serde_json::json!({
        "section_id": id,
        "answers_saved": stored,
    })))
}

/// Returns the current user's score for a section.
pub async fn get_result(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let score = scoring::section_score(store.as_ref(), user_id, id).await?;

    Ok(Json(ScoreResponse { section_id: id, score }))
}
