//! Forward-only schema migrations for the SQLite store
//!
//! Migrations are applied exactly once and in order; each one runs in its own
//! transaction together with its `schema_migrations` bookkeeping row.

use clover_core::{Error, Migration, Result, schema::latest_version};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

/// All migrations in order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create channels table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS channels (
                id TEXT NOT NULL PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                keywords TEXT NOT NULL DEFAULT '[]',
                interchange_id TEXT NOT NULL
                    REFERENCES interchanges(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED
            )
        "#,
    },
    Migration {
        version: 2,
        description: "Create interchanges table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS interchanges (
                id TEXT NOT NULL PRIMARY KEY,
                name TEXT NOT NULL,
                country TEXT NOT NULL,
                scheme TEXT NOT NULL,
                default_channel_id TEXT NOT NULL
                    REFERENCES channels(id) DEFERRABLE INITIALLY DEFERRED
            )
        "#,
    },
    Migration {
        version: 3,
        description: "Create channels interchange index",
        up_sql: r#"
            CREATE INDEX IF NOT EXISTS idx_channels_interchange
            ON channels(interchange_id)
        "#,
    },
    Migration {
        version: 4,
        description: "Create mappings table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS mappings (
                urn TEXT NOT NULL,
                interchange_id TEXT NOT NULL REFERENCES interchanges(id) ON DELETE CASCADE,
                channel_id TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE
            )
        "#,
    },
    Migration {
        version: 5,
        description: "Create mappings unique index",
        up_sql: r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_mappings_urn_interchange
            ON mappings(urn, interchange_id)
        "#,
    },
];

/// Run all pending migrations, returning the resulting schema version
pub async fn run_migrations(pool: &SqlitePool) -> Result<i64> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("Failed to create schema_migrations table: {}", e)))?;

    let current = get_current_version(pool).await?.unwrap_or(0);
    let latest = latest_version(MIGRATIONS);

    info!("Database at migration version {}", current);

    if current > latest {
        error!(
            "Database version {} is newer than the latest known migration {}",
            current, latest
        );
        return Ok(current);
    }

    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(
                "Skipping migration {}: {} (already applied)",
                migration.version, migration.description
            );
            continue;
        }

        info!(
            "Applying migration {}: {}",
            migration.version, migration.description
        );

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to start transaction: {}", e)))?;

        sqlx::query(migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(format!(
                    "Failed to apply migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?1, ?2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit().await.map_err(|e| {
            Error::Database(format!(
                "Failed to commit migration {}: {}",
                migration.version, e
            ))
        })?;
    }

    Ok(latest)
}

/// Get the current schema version, `None` if no migration was ever applied
pub async fn get_current_version(pool: &SqlitePool) -> Result<Option<i64>> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to check for schema_migrations table: {}",
            e
        ))
    })?;

    if table_exists == 0 {
        return Ok(None);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get current schema version: {}", e)))?;

    Ok(version)
}
