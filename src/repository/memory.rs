// src/repository/memory.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

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

/// In-process `QuizStore`.
///
/// All tables live behind a single async mutex. A submission transaction
/// holds the lock until it is committed or dropped, so transactions are
/// fully serialised; a dropped transaction restores the answer rows it
/// started from. Ids are never reused, even after a rollback.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    users: Vec<User>,
    courses: Vec<Course>,
    sections: Vec<Section>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
    user_answers: Vec<UserAnswer>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn question_section(&self, question_id: i64) -> Option<i64> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.section_id)
    }

    fn answers_in_section(&self, user_id: i64, section_id: i64) -> impl Iterator<Item = &UserAnswer> {
        self.user_answers.iter().filter(move |ua| {
            ua.user_id == user_id && self.question_section(ua.question_id) == Some(section_id)
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
            created_at: Some(Utc::now()),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().rev().cloned().collect())
    }

    async fn create_course(&self, title: &str, description: &str) -> Result<Course, AppError> {
        let mut state = self.state.lock().await;
        let course = Course {
            id: state.next_id(),
            title: title.to_string(),
            description: description.to_string(),
            created_at: Some(Utc::now()),
        };
        state.courses.push(course.clone());
        Ok(course)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let state = self.state.lock().await;
        Ok(state.courses.clone())
    }

    async fn get_course(&self, id: i64) -> Result<Option<Course>, AppError> {
        let state = self.state.lock().await;
        Ok(state.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn create_section(
        &self,
        course_id: i64,
        number: i32,
        title: &str,
    ) -> Result<Section, AppError> {
        let mut state = self.state.lock().await;
        if !state.courses.iter().any(|c| c.id == course_id) {
            return Err(AppError::NotFound(format!("Course {} not found", course_id)));
        }
        if state
            .sections
            .iter()
            .any(|s| s.course_id == course_id && s.number == number)
        {
            return Err(AppError::Conflict(format!(
                "Section number {} already exists in course {}",
                number, course_id
            )));
        }
        let section = Section {
            id: state.next_id(),
            course_id,
            number,
            title: title.to_string(),
        };
        state.sections.push(section.clone());
        Ok(section)
    }

    async fn list_sections(&self) -> Result<Vec<SectionSummary>, AppError> {
        let state = self.state.lock().await;
        let mut summaries = Vec::with_capacity(state.sections.len());
        for course in &state.courses {
            let mut sections: Vec<&Section> = state
                .sections
                .iter()
                .filter(|s| s.course_id == course.id)
                .collect();
            sections.sort_by_key(|s| s.number);
            summaries.extend(sections.into_iter().map(|s| SectionSummary {
                id: s.id,
                course: course.title.clone(),
                number: s.number,
                title: s.title.clone(),
            }));
        }
        Ok(summaries)
    }

    async fn sections_for_course(&self, course_id: i64) -> Result<Vec<Section>, AppError> {
        let state = self.state.lock().await;
        let mut sections: Vec<Section> = state
            .sections
            .iter()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect();
        sections.sort_by_key(|s| s.number);
        Ok(sections)
    }

    async fn get_section(&self, id: i64) -> Result<Option<Section>, AppError> {
        let state = self.state.lock().await;
        Ok(state.sections.iter().find(|s| s.id == id).cloned())
    }

    async fn create_question(
        &self,
        section_id: i64,
        text: &str,
        answers: &[AnswerInput],
    ) -> Result<QuestionDetail, AppError> {
        let mut state = self.state.lock().await;
        if !state.sections.iter().any(|s| s.id == section_id) {
            return Err(AppError::NotFound(format!("Section {} not found", section_id)));
        }
        let question = Question {
            id: state.next_id(),
            section_id,
            text: text.to_string(),
        };
        let mut created = Vec::with_capacity(answers.len());
        for input in answers {
            let answer = Answer {
                id: state.next_id(),
                question_id: question.id,
                text: input.text.clone(),
                correct: input.correct,
            };
            created.push(answer);
        }
        state.questions.push(question.clone());
        state.answers.extend(created.iter().cloned());
        Ok(QuestionDetail { question, answers: created })
    }

    async fn questions_for_section(&self, section_id: i64) -> Result<Vec<QuestionDetail>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .questions
            .iter()
            .filter(|q| q.section_id == section_id)
            .map(|q| QuestionDetail {
                question: q.clone(),
                answers: state
                    .answers
                    .iter()
                    .filter(|a| a.question_id == q.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn count_questions(&self, section_id: i64) -> Result<i64, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .questions
            .iter()
            .filter(|q| q.section_id == section_id)
            .count() as i64)
    }

    async fn count_correct_answers(&self, user_id: i64, section_id: i64) -> Result<i64, AppError> {
        let state = self.state.lock().await;
        let correct = state
            .answers_in_section(user_id, section_id)
            .filter(|ua| {
                state
                    .answers
                    .iter()
                    .any(|a| a.id == ua.answer_id && a.correct)
            })
            .count();
        Ok(correct as i64)
    }

    async fn user_answers(&self, user_id: i64, section_id: i64) -> Result<Vec<UserAnswer>, AppError> {
        let state = self.state.lock().await;
        let mut rows: Vec<UserAnswer> = state.answers_in_section(user_id, section_id).cloned().collect();
        rows.sort_by_key(|ua| ua.question_id);
        Ok(rows)
    }

    async fn begin(&self) -> Result<Box<dyn SubmissionTx>, AppError> {
        let state = self.state.clone().lock_owned().await;
        let snapshot = state.user_answers.clone();
        Ok(Box::new(MemorySubmission {
            state,
            snapshot: Some(snapshot),
        }))
    }
}

struct MemorySubmission {
    state: OwnedMutexGuard<MemoryState>,
    /// Answer rows as they were when the transaction began.
    /// `None` once committed.
    snapshot: Option<Vec<UserAnswer>>,
}

impl Drop for MemorySubmission {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            tracing::debug!("Rolling back in-memory submission");
            self.state.user_answers = snapshot;
        }
    }
}

#[async_trait]
impl SubmissionTx for MemorySubmission {
    async fn lock_user(&mut self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.state.users.iter().any(|u| u.id == user_id))
    }

    async fn section_exists(&mut self, section_id: i64) -> Result<bool, AppError> {
        Ok(self.state.sections.iter().any(|s| s.id == section_id))
    }

    async fn question(&mut self, question_id: i64) -> Result<Option<Question>, AppError> {
        Ok(self
            .state
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned())
    }

    async fn answer(&mut self, answer_id: i64) -> Result<Option<Answer>, AppError> {
        Ok(self.state.answers.iter().find(|a| a.id == answer_id).cloned())
    }

    async fn delete_section_answers(
        &mut self,
        user_id: i64,
        section_id: i64,
    ) -> Result<u64, AppError> {
        let state = &mut *self.state;
        let section_questions: Vec<i64> = state
            .questions
            .iter()
            .filter(|q| q.section_id == section_id)
            .map(|q| q.id)
            .collect();
        let before = state.user_answers.len();
        state.user_answers.retain(|ua| {
            !(ua.user_id == user_id && section_questions.contains(&ua.question_id))
        });
        Ok((before - state.user_answers.len()) as u64)
    }

    async fn insert_answer(
        &mut self,
        user_id: i64,
        question_id: i64,
        answer_id: i64,
    ) -> Result<(), AppError> {
        let state = &mut *self.state;
        if state
            .user_answers
            .iter()
            .any(|ua| ua.user_id == user_id && ua.question_id == question_id)
        {
            return Err(AppError::Conflict(format!(
                "Question {} already answered by user {}",
                question_id, user_id
            )));
        }
        let id = state.next_id();
        state.user_answers.push(UserAnswer {
            id,
            user_id,
            question_id,
            answer_id,
            created_at: Some(Utc::now()),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut this = self;
        this.snapshot = None;
        Ok(())
    }
}
