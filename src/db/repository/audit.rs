//! Audit Log Repository

use super::RepoResult;
use chrono::Utc;
use sqlx::SqliteConnection;

pub async fn record(
    conn: &mut SqliteConnection,
    actor: &str,
    action: &str,
    entity: &str,
    entity_id: &str,
    detail: Option<&str>,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO audit_log (actor, action, entity, entity_id, detail, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(actor)
    .bind(action)
    .bind(entity)
    .bind(entity_id)
    .bind(detail)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}
