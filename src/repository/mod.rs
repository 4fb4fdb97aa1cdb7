// src/repository/mod.rs

//! Data-access seam between the HTTP handlers / scoring engine and storage.
//!
//! Handlers never touch a connection pool directly. They receive a
//! [`SharedStore`] from the application state and go through the methods
//! below. Writes that must be atomic go through a [`SubmissionTx`] obtained
//! from [`QuizStore::begin`]: `commit` consumes the handle, dropping it
//! without committing rolls everything back.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        course::Course,
        question::{Answer, AnswerInput, Question, QuestionDetail},
        section::{Section, SectionSummary},
        user::User,
        user_answer::UserAnswer,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type SharedStore = Arc<dyn QuizStore>;

#[async_trait]
pub trait QuizStore: Send + Sync {
    // Users

    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str, role: &str)
    -> Result<User, AppError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    /// Newest accounts first.
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    // Courses and sections

    async fn create_course(&self, title: &str, description: &str) -> Result<Course, AppError>;
    /// Ordered by id.
    async fn list_courses(&self) -> Result<Vec<Course>, AppError>;
    async fn get_course(&self, id: i64) -> Result<Option<Course>, AppError>;

    /// Fails with `NotFound` for an unknown course and `Conflict` when the
    /// number is already used inside that course.
    async fn create_section(&self, course_id: i64, number: i32, title: &str)
    -> Result<Section, AppError>;
    async fn list_sections(&self) -> Result<Vec<SectionSummary>, AppError>;
    /// Ordered by section number.
    async fn sections_for_course(&self, course_id: i64) -> Result<Vec<Section>, AppError>;
    async fn get_section(&self, id: i64) -> Result<Option<Section>, AppError>;

    // Questions

    /// Inserts the question and its answers atomically.
    /// Fails with `NotFound` for an unknown section.
    async fn create_question(
        &self,
        section_id: i64,
        text: &str,
        answers: &[AnswerInput],
    ) -> Result<QuestionDetail, AppError>;
    /// Questions ordered by id, each with its answers ordered by id.
    async fn questions_for_section(&self, section_id: i64) -> Result<Vec<QuestionDetail>, AppError>;

    // Scoring reads

    async fn count_questions(&self, section_id: i64) -> Result<i64, AppError>;
    /// Number of the user's recorded answers in the section that are correct.
    async fn count_correct_answers(&self, user_id: i64, section_id: i64) -> Result<i64, AppError>;
    /// The user's recorded answers in the section, ordered by question id.
    async fn user_answers(&self, user_id: i64, section_id: i64) -> Result<Vec<UserAnswer>, AppError>;

    /// Opens a scoped transaction for replacing a user's answers.
    async fn begin(&self) -> Result<Box<dyn SubmissionTx>, AppError>;
}

/// Operations available inside a submission transaction.
#[async_trait]
pub trait SubmissionTx: Send {
    /// Locks the user for the rest of the transaction so that concurrent
    /// submissions by the same user serialise. Returns `false` if the user
    /// does not exist.
    async fn lock_user(&mut self, user_id: i64) -> Result<bool, AppError>;
    async fn section_exists(&mut self, section_id: i64) -> Result<bool, AppError>;
    async fn question(&mut self, question_id: i64) -> Result<Option<Question>, AppError>;
    async fn answer(&mut self, answer_id: i64) -> Result<Option<Answer>, AppError>;
    /// Removes every answer of the user to questions of the section.
    /// Returns the number of rows removed.
    async fn delete_section_answers(&mut self, user_id: i64, section_id: i64)
    -> Result<u64, AppError>;
    async fn insert_answer(&mut self, user_id: i64, question_id: i64, answer_id: i64)
    -> Result<(), AppError>;
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
