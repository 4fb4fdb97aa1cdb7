// src/models/user_answer.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{course::Course, section::Section};

/// Represents the 'user_answers' table in the database.
/// At most one row exists per (user, question).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub answer_id: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for submitting a test for one section.
#[derive(Debug, Deserialize)]
pub struct SubmitTestRequest {
    /// User's selections.
    /// Key: Question ID (i64)
    /// Value: chosen Answer ID (i64)
    pub answers: HashMap<i64, i64>,
}

/// Score of the current user for one section, as a percentage.
#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub section_id: i64,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct SectionScore {
    pub section: Section,
    pub score: f64,
}

/// All section scores of one course, sections ordered by number.
#[derive(Debug, Serialize)]
pub struct CourseScores {
    pub course: Course,
    pub sections: Vec<SectionScore>,
}
