// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The section this question belongs to.
    pub section_id: i64,

    /// The text content of the question.
    pub text: String,
}

/// Represents the 'answers' table in the database.
/// Every answer is a candidate for exactly one question.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub correct: bool,
}

/// A question with all of its candidate answers.
#[derive(Debug, Clone)]
pub struct QuestionDetail {
    pub question: Question,
    pub answers: Vec<Answer>,
}

/// DTO for sending a question to the client (hides which answer is correct).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub answers: Vec<PublicAnswer>,
}

#[derive(Debug, Serialize)]
pub struct PublicAnswer {
    pub id: i64,
    pub text: String,
}

impl From<QuestionDetail> for PublicQuestion {
    fn from(detail: QuestionDetail) -> Self {
        PublicQuestion {
            id: detail.question.id,
            text: detail.question.text,
            answers: detail
                .answers
                .into_iter()
                .map(|a| PublicAnswer { id: a.id, text: a.text })
                .collect(),
        }
    }
}

/// A candidate answer supplied when creating a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerInput {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

/// DTO for creating a new question together with its answers.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[validate(custom(function = validate_answers))]
    pub answers: Vec<AnswerInput>,
}

fn validate_answers(answers: &[AnswerInput]) -> Result<(), validator::ValidationError> {
    if answers.is_empty() {
        return Err(validator::ValidationError::new("answers_cannot_be_empty"));
    }
    if answers.len() > 20 {
        return Err(validator::ValidationError::new("too_many_answers"));
    }
    for answer in answers {
        if answer.text.is_empty() || answer.text.len() > 500 {
            return Err(validator::ValidationError::new("invalid_answer_length"));
        }
    }
    if !answers.iter().any(|a| a.correct) {
        return Err(validator::ValidationError::new("no_correct_answer"));
    }
    Ok(())
}
