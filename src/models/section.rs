// src/models/section.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'sections' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub course_id: i64,

    /// Position of the section inside its course. Unique per course.
    pub number: i32,

    pub title: String,
}

/// Public listing shape: the course is rendered by its title.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SectionSummary {
    pub id: i64,
    pub course: String,
    pub number: i32,
    pub title: String,
}

/// DTO for creating a section inside a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSectionRequest {
    #[validate(range(min = 1, max = 10000))]
    pub number: i32,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}
