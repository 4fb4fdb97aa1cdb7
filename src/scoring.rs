// src/scoring.rs

//! Test submission and scoring.
//!
//! A submission wholly replaces the user's answers for one section. It runs
//! in a single store transaction: existing rows are deleted, then each
//! (question, answer) pair is validated and inserted. Any failure drops the
//! transaction, so either the whole new answer set is stored or the previous
//! one stays untouched.

use std::collections::HashMap;

use crate::{
    error::AppError,
    models::user_answer::{CourseScores, SectionScore},
    repository::QuizStore,
};

/// Returns `correct / total` as a percentage.
/// A section without questions scores 0.
pub fn percentage(correct: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (correct as f64 / total as f64) * 100.0
}

/// Replaces the user's answers for `section_id` with `answers`
/// (question id -> chosen answer id).
///
/// Returns the number of answers stored.
pub async fn submit_answers(
    store: &dyn QuizStore,
    user_id: i64,
    section_id: i64,
    answers: &HashMap<i64, i64>,
) -> Result<usize, AppError> {
    let mut tx = store.begin().await?;

    if !tx.lock_user(user_id).await? {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }
    if !tx.section_exists(section_id).await? {
        return Err(AppError::NotFound(format!("Section {} not found", section_id)));
    }

    let removed = tx.delete_section_answers(user_id, section_id).await?;

    // Deterministic order keeps error reporting stable for the same payload.
    let mut pairs: Vec<(i64, i64)> = answers.iter().map(|(q, a)| (*q, *a)).collect();
    pairs.sort_unstable();

    for (question_id, answer_id) in &pairs {
        let question = tx
            .question(*question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", question_id)))?;

        if question.section_id != section_id {
            tracing::warn!(
                "User {} submitted question {} which is not part of section {}",
                user_id,
                question_id,
                section_id
            );
            return Err(AppError::Validation(format!(
                "Question {} does not belong to section {}",
                question_id, section_id
            )));
        }

        let answer = tx
            .answer(*answer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Answer {} not found", answer_id)))?;

        if answer.question_id != *question_id {
            tracing::warn!(
                "User {} submitted answer {} for question {}, but it belongs to question {}",
                user_id,
                answer_id,
                question_id,
                answer.question_id
            );
            return Err(AppError::Validation(format!(
                "Answer {} is not valid for question {}",
                answer_id, question_id
            )));
        }

        tx.insert_answer(user_id, *question_id, *answer_id).await?;
    }

    tx.commit().await?;

    tracing::info!(
        "User {} submitted {} answers for section {} (replaced {})",
        user_id,
        pairs.len(),
        section_id,
        removed
    );

    Ok(pairs.len())
}

/// Percentage of the section's current questions the user answered correctly.
pub async fn section_score(
    store: &dyn QuizStore,
    user_id: i64,
    section_id: i64,
) -> Result<f64, AppError> {
    if store.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }
    if store.get_section(section_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Section {} not found", section_id)));
    }
    score_for(store, user_id, section_id).await
}

async fn score_for(store: &dyn QuizStore, user_id: i64, section_id: i64) -> Result<f64, AppError> {
    let total = store.count_questions(section_id).await?;
    let correct = store.count_correct_answers(user_id, section_id).await?;
    Ok(percentage(correct, total))
}

/// Scores of the user for every section of every course.
/// Courses come in id order, sections by their number.
pub async fn all_scores(store: &dyn QuizStore, user_id: i64) -> Result<Vec<CourseScores>, AppError> {
    if store.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let mut scores = Vec::new();
    for course in store.list_courses().await? {
        let mut sections = Vec::new();
        for section in store.sections_for_course(course.id).await? {
            let score = score_for(store, user_id, section.id).await?;
            sections.push(SectionScore { section, score });
        }
        scores.push(CourseScores { course, sections });
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::question::{AnswerInput, QuestionDetail},
        repository::MemoryStore,
    };

    #[test]
    fn test_percentage_perfect() {
        assert_eq!(percentage(4, 4), 100.0);
    }

    #[test]
    fn test_percentage_partial() {
        assert_eq!(percentage(3, 4), 75.0);
        assert_eq!(percentage(1, 2), 50.0);
    }

    #[test]
    fn test_percentage_no_questions() {
        assert_eq!(percentage(0, 0), 0.0);
    }

    /// A section of `count` questions, each with one correct answer (index 0)
    /// and one wrong answer (index 1).
    async fn seed(store: &MemoryStore, count: usize) -> (i64, i64, Vec<QuestionDetail>) {
        let user = store.create_user("student", "hash", "user").await.unwrap();
        let course = store.create_course("Course", "").await.unwrap();
        let section = store.create_section(course.id, 1, "Section").await.unwrap();
        let mut questions = Vec::new();
        for i in 0..count {
            questions.push(add_question(store, section.id, &format!("Question {}", i)).await);
        }
        (user.id, section.id, questions)
    }

    async fn add_question(store: &MemoryStore, section_id: i64, text: &str) -> QuestionDetail {
        store
            .create_question(
                section_id,
                text,
                &[
                    AnswerInput { text: "right".to_string(), correct: true },
                    AnswerInput { text: "wrong".to_string(), correct: false },
                ],
            )
            .await
            .unwrap()
    }

    /// Picks the correct answer for every question except those in `wrong`.
    fn choose(questions: &[QuestionDetail], wrong: &[usize]) -> HashMap<i64, i64> {
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let pick = if wrong.contains(&i) { 1 } else { 0 };
                (q.question.id, q.answers[pick].id)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_then_one_wrong() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 4).await;

        submit_answers(&store, user, section, &choose(&questions, &[])).await.unwrap();
        assert_eq!(section_score(&store, user, section).await.unwrap(), 100.0);

        submit_answers(&store, user, section, &choose(&questions, &[2])).await.unwrap();
        assert_eq!(section_score(&store, user, section).await.unwrap(), 75.0);
    }

    #[tokio::test]
    async fn test_resubmission_replaces_rows() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 3).await;
        let answers = choose(&questions, &[0]);

        submit_answers(&store, user, section, &answers).await.unwrap();
        submit_answers(&store, user, section, &answers).await.unwrap();

        let rows = store.user_answers(user, section).await.unwrap();
        assert_eq!(rows.len(), 3);
        let mut question_ids: Vec<i64> = rows.iter().map(|r| r.question_id).collect();
        question_ids.dedup();
        assert_eq!(question_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_partial_submission_drops_unlisted_answers() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 4).await;

        submit_answers(&store, user, section, &choose(&questions, &[])).await.unwrap();

        let mut only_first = HashMap::new();
        only_first.insert(questions[0].question.id, questions[0].answers[0].id);
        submit_answers(&store, user, section, &only_first).await.unwrap();

        assert_eq!(store.user_answers(user, section).await.unwrap().len(), 1);
        assert_eq!(section_score(&store, user, section).await.unwrap(), 25.0);
    }

    #[tokio::test]
    async fn test_answer_from_other_question_is_rejected() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 4).await;

        submit_answers(&store, user, section, &choose(&questions, &[1])).await.unwrap();
        let before = store.user_answers(user, section).await.unwrap();

        let mut bad = choose(&questions, &[]);
        // Answer of question 3 offered for question 0.
        bad.insert(questions[0].question.id, questions[3].answers[0].id);
        let result = submit_answers(&store, user, section, &bad).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let after = store.user_answers(user, section).await.unwrap();
        let pairs = |rows: &[crate::models::user_answer::UserAnswer]| {
            rows.iter().map(|r| (r.question_id, r.answer_id)).collect::<Vec<_>>()
        };
        assert_eq!(pairs(&before), pairs(&after));
        assert_eq!(section_score(&store, user, section).await.unwrap(), 75.0);
    }

    #[tokio::test]
    async fn test_unknown_answer_rolls_back() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 2).await;
        submit_answers(&store, user, section, &choose(&questions, &[])).await.unwrap();

        // The last pair in question order is the broken one, so every other
        // pair has already been inserted when the failure is detected.
        let mut bad = choose(&questions, &[]);
        bad.insert(questions[1].question.id, 999_999);
        let result = submit_answers(&store, user, section, &bad).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        assert_eq!(store.user_answers(user, section).await.unwrap().len(), 2);
        assert_eq!(section_score(&store, user, section).await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_unknown_question_is_not_found() {
        let store = MemoryStore::new();
        let (user, section, _) = seed(&store, 1).await;
        let mut bad = HashMap::new();
        bad.insert(424_242, 1);
        let result = submit_answers(&store, user, section, &bad).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_question_from_other_section_is_rejected() {
        let store = MemoryStore::new();
        let (user, section, _) = seed(&store, 1).await;
        let course = store.create_course("Other", "").await.unwrap();
        let other_section = store.create_section(course.id, 1, "Elsewhere").await.unwrap();
        let foreign = add_question(&store, other_section.id, "Foreign").await;

        let mut bad = HashMap::new();
        bad.insert(foreign.question.id, foreign.answers[0].id);
        let result = submit_answers(&store, user, section, &bad).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.user_answers(user, other_section.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_section_or_user() {
        let store = MemoryStore::new();
        let (user, section, _) = seed(&store, 1).await;

        let result = submit_answers(&store, user, 777_777, &HashMap::new()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        let result = submit_answers(&store, 888_888, section, &HashMap::new()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        let result = section_score(&store, user, 777_777).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_correcting_an_answer_raises_score() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 5).await;

        submit_answers(&store, user, section, &choose(&questions, &[0, 3])).await.unwrap();
        let before = section_score(&store, user, section).await.unwrap();

        submit_answers(&store, user, section, &choose(&questions, &[0])).await.unwrap();
        let after = section_score(&store, user, section).await.unwrap();

        assert!(after > before);
        assert!((0.0..=100.0).contains(&before));
        assert!((0.0..=100.0).contains(&after));
    }

    #[tokio::test]
    async fn test_empty_section_scores_zero() {
        let store = MemoryStore::new();
        let (user, section, _) = seed(&store, 0).await;

        submit_answers(&store, user, section, &HashMap::new()).await.unwrap();
        assert_eq!(section_score(&store, user, section).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_score_uses_current_question_count() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 2).await;
        submit_answers(&store, user, section, &choose(&questions, &[])).await.unwrap();
        assert_eq!(section_score(&store, user, section).await.unwrap(), 100.0);

        add_question(&store, section, "Added later").await;
        add_question(&store, section, "Added later too").await;
        assert_eq!(section_score(&store, user, section).await.unwrap(), 50.0);
    }

    #[tokio::test]
    async fn test_users_do_not_share_answers() {
        let store = MemoryStore::new();
        let (alice, section, questions) = seed(&store, 2).await;
        let bob = store.create_user("bob", "hash", "user").await.unwrap().id;

        submit_answers(&store, alice, section, &choose(&questions, &[])).await.unwrap();
        submit_answers(&store, bob, section, &choose(&questions, &[0, 1])).await.unwrap();

        assert_eq!(section_score(&store, alice, section).await.unwrap(), 100.0);
        assert_eq!(section_score(&store, bob, section).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_all_scores_orders_sections_by_number() {
        let store = MemoryStore::new();
        let user = store.create_user("carol", "hash", "user").await.unwrap().id;
        let first = store.create_course("First", "").await.unwrap();
        let second = store.create_course("Second", "").await.unwrap();
        let late = store.create_section(first.id, 2, "Two").await.unwrap();
        let early = store.create_section(first.id, 1, "One").await.unwrap();
        let q = add_question(&store, early.id, "Q").await;
        add_question(&store, late.id, "Q2").await;

        let mut answers = HashMap::new();
        answers.insert(q.question.id, q.answers[0].id);
        submit_answers(&store, user, early.id, &answers).await.unwrap();

        let scores = all_scores(&store, user).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].course.id, first.id);
        assert_eq!(scores[1].course.id, second.id);
        assert!(scores[1].sections.is_empty());

        let sections: Vec<(i32, f64)> = scores[0]
            .sections
            .iter()
            .map(|s| (s.section.number, s.score))
            .collect();
        assert_eq!(sections, vec![(1, 100.0), (2, 0.0)]);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_leave_one_row_per_question() {
        let store = MemoryStore::new();
        let (user, section, questions) = seed(&store, 3).await;
        let right = choose(&questions, &[]);
        let wrong = choose(&questions, &[0, 1, 2]);

        let (a, b) = tokio::join!(
            submit_answers(&store, user, section, &right),
            submit_answers(&store, user, section, &wrong)
        );
        a.unwrap();
        b.unwrap();

        let rows = store.user_answers(user, section).await.unwrap();
        assert_eq!(rows.len(), 3);
        let score = section_score(&store, user, section).await.unwrap();
        assert!(score == 0.0 || score == 100.0);
    }
}
