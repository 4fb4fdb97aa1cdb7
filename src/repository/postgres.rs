// src/repository/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    error::AppError,
    models::{
        course::Course,
        question::{Answer, AnswerInput, Question, QuestionDetail},
        section::{Section, SectionSummary},
        user::User,
        user_answer::UserAnswer,
    },
    repository::{QuizStore, SubmissionTx},
};

/// `QuizStore` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn internal(context: &str, e: sqlx::Error) -> AppError {
    tracing::error!("{}: {:?}", context, e);
    AppError::InternalServerError(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

#[async_trait]
impl QuizStore for PgStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                internal("Failed to create user", e)
            }
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| internal("Failed to look up user", e))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| internal("Failed to fetch user", e))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, role, created_at
            FROM users
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("Failed to list users", e))
    }

    async fn create_course(&self, title: &str, description: &str) -> Result<Course, AppError> {
        sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (title, description)
            VALUES ($1, $2)
            RETURNING id, title, description, created_at
            "#,
        )
        .bind(title)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| internal("Failed to create course", e))
    }

    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        sqlx::query_as::<_, Course>(
            "SELECT id, title, description, created_at FROM courses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("Failed to list courses", e))
    }

    async fn get_course(&self, id: i64) -> Result<Option<Course>, AppError> {
        sqlx::query_as::<_, Course>(
            "SELECT id, title, description, created_at FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| internal("Failed to fetch course", e))
    }

    async fn create_section(
        &self,
        course_id: i64,
        number: i32,
        title: &str,
    ) -> Result<Section, AppError> {
        sqlx::query_as::<_, Section>(
            r#"
            INSERT INTO sections (course_id, number, title)
            VALUES ($1, $2, $3)
            RETURNING id, course_id, number, title
            "#,
        )
        .bind(course_id)
        .bind(number)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound(format!("Course {} not found", course_id))
            } else if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Section number {} already exists in course {}",
                    number, course_id
                ))
            } else {
                internal("Failed to create section", e)
            }
        })
    }

    async fn list_sections(&self) -> Result<Vec<SectionSummary>, AppError> {
        sqlx::query_as::<_, SectionSummary>(
            r#"
            SELECT s.id, c.title AS course, s.number, s.title
            FROM sections s
            JOIN courses c ON c.id = s.course_id
            ORDER BY c.id, s.number
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("Failed to list sections", e))
    }

    async fn sections_for_course(&self, course_id: i64) -> Result<Vec<Section>, AppError> {
        sqlx::query_as::<_, Section>(
            r#"
            SELECT id, course_id, number, title
            FROM sections
            WHERE course_id = $1
            ORDER BY number
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("Failed to list course sections", e))
    }

    async fn get_section(&self, id: i64) -> Result<Option<Section>, AppError> {
        sqlx::query_as::<_, Section>(
            "SELECT id, course_id, number, title FROM sections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| internal("Failed to fetch section", e))
    }

    async fn create_question(
        &self,
        section_id: i64,
        text: &str,
        answers: &[AnswerInput],
    ) -> Result<QuestionDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (section_id, text)
            VALUES ($1, $2)
            RETURNING id, section_id, text
            "#,
        )
        .bind(section_id)
        .bind(text)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound(format!("Section {} not found", section_id))
            } else {
                internal("Failed to create question", e)
            }
        })?;

        let mut created = Vec::with_capacity(answers.len());
        for input in answers {
            let answer = sqlx::query_as::<_, Answer>(
                r#"
                INSERT INTO answers (question_id, text, correct)
                VALUES ($1, $2, $3)
                RETURNING id, question_id, text, correct
                "#,
            )
            .bind(question.id)
            .bind(&input.text)
            .bind(input.correct)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| internal("Failed to create answer", e))?;
            created.push(answer);
        }

        tx.commit().await?;

        Ok(QuestionDetail { question, answers: created })
    }

    async fn questions_for_section(&self, section_id: i64) -> Result<Vec<QuestionDetail>, AppError> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT id, section_id, text FROM questions WHERE section_id = $1 ORDER BY id",
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("Failed to fetch questions", e))?;

        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT a.id, a.question_id, a.text, a.correct
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE q.section_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("Failed to fetch answers", e))?;

        let mut by_question: HashMap<i64, Vec<Answer>> = HashMap::new();
        for answer in answers {
            by_question.entry(answer.question_id).or_default().push(answer);
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let answers = by_question.remove(&question.id).unwrap_or_default();
                QuestionDetail { question, answers }
            })
            .collect())
    }

    async fn count_questions(&self, section_id: i64) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE section_id = $1")
            .bind(section_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| internal("Failed to count questions", e))
    }

    async fn count_correct_answers(&self, user_id: i64, section_id: i64) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM user_answers ua
            JOIN questions q ON q.id = ua.question_id
            JOIN answers a ON a.id = ua.answer_id
            WHERE ua.user_id = $1 AND q.section_id = $2 AND a.correct
            "#,
        )
        .bind(user_id)
        .bind(section_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| internal("Failed to count correct answers", e))
    }

    async fn user_answers(&self, user_id: i64, section_id: i64) -> Result<Vec<UserAnswer>, AppError> {
        sqlx::query_as::<_, UserAnswer>(
            r#"
            SELECT ua.id, ua.user_id, ua.question_id, ua.answer_id, ua.created_at
            FROM user_answers ua
            JOIN questions q ON q.id = ua.question_id
            WHERE ua.user_id = $1 AND q.section_id = $2
            ORDER BY ua.question_id
            "#,
        )
        .bind(user_id)
        .bind(section_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("Failed to fetch user answers", e))
    }

    async fn begin(&self) -> Result<Box<dyn SubmissionTx>, AppError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| internal("Failed to open transaction", e))?;
        Ok(Box::new(PgSubmission { tx }))
    }
}

/// Submission transaction on a pooled connection.
/// sqlx rolls the transaction back when it is dropped uncommitted.
struct PgSubmission {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SubmissionTx for PgSubmission {
    async fn lock_user(&mut self, user_id: i64) -> Result<bool, AppError> {
        let row = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| internal("Failed to lock user", e))?;
        Ok(row.is_some())
    }

    async fn section_exists(&mut self, section_id: i64) -> Result<bool, AppError> {
        let row = sqlx::query_scalar::<_, i64>("SELECT id FROM sections WHERE id = $1")
            .bind(section_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| internal("Failed to fetch section", e))?;
        Ok(row.is_some())
    }

    async fn question(&mut self, question_id: i64) -> Result<Option<Question>, AppError> {
        sqlx::query_as::<_, Question>("SELECT id, section_id, text FROM questions WHERE id = $1")
            .bind(question_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| internal("Failed to fetch question", e))
    }

    async fn answer(&mut self, answer_id: i64) -> Result<Option<Answer>, AppError> {
        sqlx::query_as::<_, Answer>(
            "SELECT id, question_id, text, correct FROM answers WHERE id = $1",
        )
        .bind(answer_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| internal("Failed to fetch answer", e))
    }

    async fn delete_section_answers(
        &mut self,
        user_id: i64,
        section_id: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_answers
            WHERE user_id = $1
              AND question_id IN (SELECT id FROM questions WHERE section_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(section_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| internal("Failed to delete user answers", e))?;
        Ok(result.rows_affected())
    }

    async fn insert_answer(
        &mut self,
        user_id: i64,
        question_id: i64,
        answer_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_answers (user_id, question_id, answer_id) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(question_id)
        .bind(answer_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| internal("Failed to insert user answer", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx
            .commit()
            .await
            .map_err(|e| internal("Failed to commit submission", e))
    }
}
