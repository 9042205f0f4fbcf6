#![allow(dead_code)]

use std::path::PathBuf;
use std::str::FromStr;

use assessment_reset_backend::{
    config::{Config, LogFormat},
    database::pool::{create_pool, run_migrations},
    middleware::auth::Claims,
    services::reset_service::{ResetPolicy, ResetService},
};
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub const JWT_SECRET: &str = "test_secret_key";
pub const START_TIME: &str = "2025-01-10 09:00:00";

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        log_format: LogFormat::Pretty,
        max_resets_per_student: 5,
        default_duration_minutes: 60,
        attempt_list_limit: 100,
    }
}

pub async fn setup_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("sqlite options")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}

/// Database file with a multi-connection pool, for tests that need real concurrency.
pub async fn setup_file_pool(name: &str) -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!(
        "{}-{}-{}.db",
        name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let pool = create_pool(&format!("sqlite://{}", path.display()))
        .await
        .expect("file pool");
    run_migrations(&pool).await.expect("migrations");
    (pool, path)
}

pub async fn remove_file_pool(pool: SqlitePool, path: PathBuf) {
    pool.close().await;
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

pub fn reset_service(pool: &SqlitePool) -> ResetService {
    ResetService::new(pool.clone(), ResetPolicy::default())
}

pub fn admin_token(admin_id: i64) -> String {
    token_with_role(admin_id, "admin")
}

pub fn token_with_role(user_id: i64, role: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        role: Some(role.to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub async fn seed_class(pool: &SqlitePool, program: &str, class_name: &str) -> i64 {
    let program_id: i64 =
        sqlx::query_scalar("INSERT INTO programs (program_name) VALUES (?) RETURNING id")
            .bind(program)
            .fetch_one(pool)
            .await
            .expect("seed program");
    sqlx::query_scalar("INSERT INTO classes (class_name, program_id) VALUES (?, ?) RETURNING id")
        .bind(class_name)
        .bind(program_id)
        .fetch_one(pool)
        .await
        .expect("seed class")
}

pub async fn seed_user(
    pool: &SqlitePool,
    username: &str,
    role: &str,
    class_id: Option<i64>,
) -> i64 {
    let (first, last) = username.split_once('.').unwrap_or((username, ""));
    sqlx::query_scalar(
        r#"INSERT INTO users (username, first_name, last_name, role, class_id)
           VALUES (?, ?, ?, ?, ?) RETURNING id"#,
    )
    .bind(username)
    .bind(first)
    .bind(last)
    .bind(role)
    .bind(class_id)
    .fetch_one(pool)
    .await
    .expect("seed user")
}

pub async fn seed_assessment(pool: &SqlitePool, title: &str, duration: Option<i64>) -> i64 {
    sqlx::query_scalar("INSERT INTO assessments (title, duration) VALUES (?, ?) RETURNING id")
        .bind(title)
        .bind(duration)
        .fetch_one(pool)
        .await
        .expect("seed assessment")
}

pub async fn seed_questions(pool: &SqlitePool, assessment_id: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO questions (assessment_id, question_text) VALUES (?, ?) RETURNING id",
        )
        .bind(assessment_id)
        .bind(format!("Question {}", n + 1))
        .fetch_one(pool)
        .await
        .expect("seed question");
        ids.push(id);
    }
    ids
}

pub async fn seed_attempt(
    pool: &SqlitePool,
    assessment_id: i64,
    student_id: i64,
    start_time: Option<&str>,
    status: &str,
) -> i64 {
    let end_time = if status == "in_progress" {
        None
    } else {
        Some("2025-01-10 09:50:00")
    };
    sqlx::query_scalar(
        r#"INSERT INTO assessment_attempts (assessment_id, user_id, start_time, end_time, status)
           VALUES (?, ?, ?, ?, ?) RETURNING id"#,
    )
    .bind(assessment_id)
    .bind(student_id)
    .bind(start_time)
    .bind(end_time)
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("seed attempt")
}

pub async fn seed_answers(pool: &SqlitePool, assessment_id: i64, student_id: i64, questions: &[i64]) {
    for question_id in questions {
        sqlx::query(
            r#"INSERT INTO student_answers (assessment_id, user_id, question_id, answer_text)
               VALUES (?, ?, ?, 'B')"#,
        )
        .bind(assessment_id)
        .bind(student_id)
        .bind(question_id)
        .execute(pool)
        .await
        .expect("seed answer");
    }
}

pub async fn seed_result(pool: &SqlitePool, assessment_id: i64, student_id: i64) {
    sqlx::query("INSERT INTO results (assessment_id, user_id, score) VALUES (?, ?, 72.5)")
        .bind(assessment_id)
        .bind(student_id)
        .execute(pool)
        .await
        .expect("seed result");
}

pub async fn seed_prior_resets(
    pool: &SqlitePool,
    assessment_id: i64,
    student_id: i64,
    admin_id: i64,
    count: usize,
) {
    for _ in 0..count {
        sqlx::query(
            r#"INSERT INTO assessment_resets (
                   assessment_id, user_id, reset_by, reset_type, reason,
                   previous_status, previous_answers_count, reset_at)
               VALUES (?, ?, ?, 'partial', 'earlier reset', 'completed', 0, '2025-01-09 12:00:00')"#,
        )
        .bind(assessment_id)
        .bind(student_id)
        .bind(admin_id)
        .execute(pool)
        .await
        .expect("seed reset");
    }
}

pub async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.expect(sql)
}

pub async fn count_for_pair(pool: &SqlitePool, table: &str, assessment_id: i64, student_id: i64) -> i64 {
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE assessment_id = ? AND user_id = ?",
        table
    ))
    .bind(assessment_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
    .expect("count rows")
}

pub async fn attempt_metadata(pool: &SqlitePool, attempt_id: i64) -> serde_json::Value {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT answer_metadata FROM assessment_attempts WHERE id = ?")
            .bind(attempt_id)
            .fetch_one(pool)
            .await
            .expect("attempt metadata");
    serde_json::from_str(&raw.expect("metadata written")).expect("metadata json")
}

/// One student with a completed 60 minute attempt: 3 of 4 questions answered and a result.
pub struct Fixture {
    pub pool: SqlitePool,
    pub class_id: i64,
    pub admin_id: i64,
    pub student_id: i64,
    pub assessment_id: i64,
    pub attempt_id: i64,
    pub question_ids: Vec<i64>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_duration(Some(60)).await
    }

    pub async fn with_duration(duration: Option<i64>) -> Self {
        Self::seed(setup_pool().await, duration).await
    }

    pub async fn seed(pool: SqlitePool, duration: Option<i64>) -> Self {
        let class_id = seed_class(&pool, "Science", "Form 4A").await;
        let admin_id = seed_user(&pool, "ada.admin", "admin", None).await;
        let student_id = seed_user(&pool, "sam.student", "student", Some(class_id)).await;
        let assessment_id = seed_assessment(&pool, "Chemistry Midterm", duration).await;
        let question_ids = seed_questions(&pool, assessment_id, 4).await;
        let attempt_id =
            seed_attempt(&pool, assessment_id, student_id, Some(START_TIME), "completed").await;
        seed_answers(&pool, assessment_id, student_id, &question_ids[..3]).await;
        seed_result(&pool, assessment_id, student_id).await;

        Self {
            pool,
            class_id,
            admin_id,
            student_id,
            assessment_id,
            attempt_id,
            question_ids,
        }
    }

    pub fn token(&self) -> String {
        format!("{}-{}-{}", self.attempt_id, self.assessment_id, self.student_id)
    }
}
