//! Database migration system for the PostgreSQL store
//!
//! Provides versioned schema migrations with tracking to ensure migrations
//! are applied exactly once and in the correct order.

use clover_core::{Error, Migration, Result, schema::latest_version};
use sqlx::PgPool;
use tracing::{debug, error, info};

/// All migrations in order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create interchanges table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS interchanges (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                country TEXT NOT NULL,
                scheme TEXT NOT NULL,
                default_channel_id UUID NOT NULL
            )
        "#,
    },
    Migration {
        version: 2,
        description: "Create channels table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS channels (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                keywords TEXT[] NOT NULL DEFAULT '{}',
                interchange_id UUID NOT NULL
                    REFERENCES interchanges(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED
            )
        "#,
    },
    Migration {
        version: 3,
        description: "Add default channel foreign key",
        up_sql: r#"
            ALTER TABLE interchanges
            ADD CONSTRAINT fk_interchanges_default_channel
            FOREIGN KEY (default_channel_id) REFERENCES channels(id)
            DEFERRABLE INITIALLY DEFERRED
        "#,
    },
    Migration {
        version: 4,
        description: "Create channels interchange index",
        up_sql: r#"
            CREATE INDEX IF NOT EXISTS idx_channels_interchange
            ON channels(interchange_id)
        "#,
    },
    Migration {
        version: 5,
        description: "Create mappings table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS mappings (
                urn TEXT NOT NULL,
                interchange_id UUID NOT NULL REFERENCES interchanges(id) ON DELETE CASCADE,
                channel_id UUID NOT NULL REFERENCES channels(id) ON DELETE CASCADE
            )
        "#,
    },
    Migration {
        version: 6,
        description: "Create mappings unique index",
        up_sql: r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_mappings_urn_interchange
            ON mappings(urn, interchange_id)
        "#,
    },
];

/// Run all pending migrations, returning the resulting schema version
pub async fn run_migrations(pool: &PgPool) -> Result<i64> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
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

        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES ($1, $2)")
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
pub async fn get_current_version(pool: &PgPool) -> Result<Option<i64>> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = 'schema_migrations'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to check for schema_migrations table: {}",
            e
        ))
    })?;

    if !table_exists {
        return Ok(None);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get current schema version: {}", e)))?;

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_sequential() {
        let mut expected_version = 1;
        for migration in MIGRATIONS {
            assert_eq!(
                migration.version, expected_version,
                "Migration versions must be sequential"
            );
            expected_version += 1;
        }
    }

    #[test]
    fn test_migrations_have_descriptions() {
        for migration in MIGRATIONS {
            assert!(
                !migration.description.is_empty(),
                "Migration {} must have a description",
                migration.version
            );
        }
    }

    #[test]
    fn test_default_channel_constraint_follows_channels_table() {
        let channels = MIGRATIONS
            .iter()
            .position(|m| m.up_sql.contains("CREATE TABLE IF NOT EXISTS channels"))
            .unwrap();
        let constraint = MIGRATIONS
            .iter()
            .position(|m| m.up_sql.contains("fk_interchanges_default_channel"))
            .unwrap();
        assert!(constraint > channels);
    }
}
