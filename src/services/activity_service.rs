use crate::error::Result;
use crate::models::activity_log::ActivityLog;
use crate::utils::time::now;
use serde_json::Value as JsonValue;
use sqlx::SqliteConnection;

/// Writes a system activity entry through the caller's connection, so the entry commits
/// or rolls back together with the change it describes.
pub async fn log(
    conn: &mut SqliteConnection,
    user_id: Option<i64>,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    details: Option<JsonValue>,
) -> Result<ActivityLog> {
    let details = details.map(|d| d.to_string());
    let row = sqlx::query_as::<_, ActivityLog>(
        r#"
        INSERT INTO activity_logs (user_id, action, entity_type, entity_id, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, user_id, action, entity_type, entity_id, details, created_at
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(details)
    .bind(now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}
