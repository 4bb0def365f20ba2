//! Forward-only migration runner.
//!
//! Modules contribute [`Migration`]s; each one is applied at most once, in its
//! own transaction, and recorded in `schema_migrations`.

use crate::{Database, DbError};

const BOOKKEEPING_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT        NOT NULL,
        id         TEXT        NOT NULL,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (module, id)
    )
"#;

/// Migration definition for modules
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Apply every migration not yet recorded, in the order given.
///
/// Returns how many were applied by this call.
pub async fn apply_migrations(
    db: &Database,
    migrations: &[(String, Migration)],
) -> Result<usize, DbError> {
    sqlx::raw_sql(BOOKKEEPING_TABLE)
        .execute(db.pool())
        .await
        .map_err(DbError::from)?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already_applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE module = $1 AND id = $2)",
        )
        .bind(module)
        .bind(migration.id)
        .fetch_one(db.pool())
        .await
        .map_err(DbError::from)?;

        if already_applied {
            tracing::debug!(module = %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = db.begin().await?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|source| DbError::Migration {
                module: module.clone(),
                id: migration.id.to_string(),
                source,
            })?;
        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES ($1, $2)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        tx.commit().await.map_err(DbError::from)?;

        tracing::info!(module = %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
