// tests/pg_store_tests.rs
//
// Runs the submission engine against PostgreSQL.
// Requires DATABASE_URL; every test returns early when it is not set.

use std::collections::HashMap;

use course_quiz::{
    error::AppError,
    models::question::{AnswerInput, QuestionDetail},
    repository::{PgStore, QuizStore},
    scoring::{section_score, submit_answers},
};
use sqlx::postgres::PgPoolOptions;

/// Connects and migrates, or returns `None` when no database is configured.
async fn pg_store() -> Option<PgStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(PgStore::new(pool))
}

/// A fresh user plus a fresh section of `count` questions, each with a
/// correct answer (index 0) and a wrong one (index 1).
async fn seed(store: &PgStore, count: usize) -> (i64, i64, Vec<QuestionDetail>) {
    let username = format!("pg_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let user = store.create_user(&username, "hash", "user").await.unwrap();
    let course = store.create_course("Postgres course", "").await.unwrap();
    let section = store.create_section(course.id, 1, "Section").await.unwrap();

    let mut questions = Vec::new();
    for i in 0..count {
        let question = store
            .create_question(
                section.id,
                &format!("Question {}", i),
                &[
                    AnswerInput { text: "right".to_string(), correct: true },
                    AnswerInput { text: "wrong".to_string(), correct: false },
                ],
            )
            .await
            .unwrap();
        questions.push(question);
    }

    (user.id, section.id, questions)
}

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

fn pairs(store_rows: &[course_quiz::models::user_answer::UserAnswer]) -> Vec<(i64, i64)> {
    store_rows.iter().map(|r| (r.question_id, r.answer_id)).collect()
}

#[tokio::test]
async fn pg_full_then_one_wrong() {
    let Some(store) = pg_store().await else { return };
    let (user, section, questions) = seed(&store, 4).await;

    submit_answers(&store, user, section, &choose(&questions, &[])).await.unwrap();
    assert_eq!(section_score(&store, user, section).await.unwrap(), 100.0);

    submit_answers(&store, user, section, &choose(&questions, &[2])).await.unwrap();
    assert_eq!(section_score(&store, user, section).await.unwrap(), 75.0);
}

#[tokio::test]
async fn pg_resubmission_keeps_one_row_per_question() {
    let Some(store) = pg_store().await else { return };
    let (user, section, questions) = seed(&store, 4).await;
    let answers = choose(&questions, &[1]);

    submit_answers(&store, user, section, &answers).await.unwrap();
    submit_answers(&store, user, section, &answers).await.unwrap();

    let rows = store.user_answers(user, section).await.unwrap();
    assert_eq!(rows.len(), 4);
    let mut question_ids: Vec<i64> = rows.iter().map(|r| r.question_id).collect();
    question_ids.dedup();
    assert_eq!(question_ids.len(), 4);
}

#[tokio::test]
async fn pg_invalid_pair_keeps_previous_rows() {
    let Some(store) = pg_store().await else { return };
    let (user, section, questions) = seed(&store, 4).await;

    submit_answers(&store, user, section, &choose(&questions, &[1])).await.unwrap();
    let before = store.user_answers(user, section).await.unwrap();

    // Answer of the last question offered for the first one.
    let mut mismatched = choose(&questions, &[]);
    mismatched.insert(questions[0].question.id, questions[3].answers[0].id);
    let result = submit_answers(&store, user, section, &mismatched).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Unknown answer on the last pair, after earlier pairs were inserted.
    let mut unknown = choose(&questions, &[]);
    unknown.insert(questions[3].question.id, i64::MAX);
    let result = submit_answers(&store, user, section, &unknown).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let after = store.user_answers(user, section).await.unwrap();
    assert_eq!(pairs(&before), pairs(&after));
    assert_eq!(section_score(&store, user, section).await.unwrap(), 75.0);
}

#[tokio::test]
async fn pg_dropped_transaction_rolls_back() {
    let Some(store) = pg_store().await else { return };
    let (user, section, questions) = seed(&store, 2).await;
    submit_answers(&store, user, section, &choose(&questions, &[])).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.lock_user(user).await.unwrap());
    assert_eq!(tx.delete_section_answers(user, section).await.unwrap(), 2);
    drop(tx);

    assert_eq!(store.user_answers(user, section).await.unwrap().len(), 2);
}

#[tokio::test]
async fn pg_concurrent_submissions_serialise() {
    let Some(store) = pg_store().await else { return };
    let (user, section, questions) = seed(&store, 4).await;
    let right = choose(&questions, &[]);
    let wrong = choose(&questions, &[0, 1, 2, 3]);

    let (a, b) = tokio::join!(
        submit_answers(&store, user, section, &right),
        submit_answers(&store, user, section, &wrong)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(store.user_answers(user, section).await.unwrap().len(), 4);
    let score = section_score(&store, user, section).await.unwrap();
    assert!(score == 0.0 || score == 100.0);
}

#[tokio::test]
async fn pg_empty_section_scores_zero() {
    let Some(store) = pg_store().await else { return };
    let (user, section, _) = seed(&store, 0).await;

    submit_answers(&store, user, section, &HashMap::new()).await.unwrap();
    assert_eq!(section_score(&store, user, section).await.unwrap(), 0.0);
}
