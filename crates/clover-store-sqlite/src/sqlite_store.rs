//! SQLite-backed config and mapping store

use async_trait::async_trait;
use clover_core::{
    Channel, ChannelId, ConfigStore, Error, Interchange, InterchangeId, MappingStore, Result,
    SchemaManager, Urn,
};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::migrations;

/// SQLite implementation of the Clover stores
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url`
    ///
    /// The schema is not touched; call [`SchemaManager::ensure_latest`].
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Config(format!("Invalid SQLite URL '{}': {}", database_url, e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to SQLite: {}", e)))?;

        info!("Connected to SQLite database at {}", database_url);

        Ok(Self { pool })
    }

    /// Private in-memory database with the schema already applied
    ///
    /// Pinned to a single connection that never expires, otherwise the
    /// database would vanish with the connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::Config(format!("Invalid SQLite URL: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to open in-memory SQLite: {}", e)))?;

        let store = Self { pool };
        store.ensure_latest().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Database(format!("Invalid {} '{}': {}", column, value, e)))
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| Error::Database(format!("Failed to read column {}: {}", name, e)))
}

fn channel_from_row(row: &SqliteRow) -> Result<Channel> {
    let id: String = column(row, "id")?;
    let interchange_id: String = column(row, "interchange_id")?;
    let keywords: String = column(row, "keywords")?;

    Ok(Channel {
        id: ChannelId::from_uuid(parse_uuid(&id, "channel id")?),
        name: column(row, "name")?,
        url: column(row, "url")?,
        keywords: serde_json::from_str(&keywords)?,
        interchange_id: Some(InterchangeId::from_uuid(parse_uuid(
            &interchange_id,
            "interchange id",
        )?)),
    })
}

fn assemble(row: &SqliteRow, mut channels: Vec<Channel>) -> Result<Interchange> {
    let id: String = column(row, "id")?;
    let id = InterchangeId::from_uuid(parse_uuid(&id, "interchange id")?);
    let default_channel_id: String = column(row, "default_channel_id")?;
    let default_channel_id = ChannelId::from_uuid(parse_uuid(&default_channel_id, "channel id")?);

    if !Interchange::order_channels(&mut channels, default_channel_id) {
        error!(
            interchange_id = %id,
            default_channel_id = %default_channel_id,
            "Default channel does not resolve for interchange"
        );
        return Err(Error::Integrity(format!(
            "unable to find default channel: {} for interchange: {}",
            default_channel_id, id
        )));
    }

    Ok(Interchange {
        id,
        name: column(row, "name")?,
        country: column(row, "country")?,
        scheme: column(row, "scheme")?,
        channels,
    })
}

fn id_list<T: ToString>(ids: impl Iterator<Item = T>) -> Result<String> {
    let ids: Vec<String> = ids.map(|id| id.to_string()).collect();
    Ok(serde_json::to_string(&ids)?)
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn apply_config(&self, interchanges: &[Interchange]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to start transaction: {}", e)))?;

        for interchange in interchanges {
            let default = interchange.default_channel().ok_or_else(|| {
                Error::Integrity(format!("interchange {} has no channels", interchange.id))
            })?;

            sqlx::query(
                r#"
                INSERT INTO interchanges (id, name, country, scheme, default_channel_id)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    country = excluded.country,
                    scheme = excluded.scheme,
                    default_channel_id = excluded.default_channel_id
                "#,
            )
            .bind(interchange.id.to_string())
            .bind(&interchange.name)
            .bind(&interchange.country)
            .bind(&interchange.scheme)
            .bind(default.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(format!(
                    "Failed to upsert interchange {}: {}",
                    interchange.id, e
                ))
            })?;

            for channel in &interchange.channels {
                sqlx::query(
                    r#"
                    INSERT INTO channels (id, name, url, keywords, interchange_id)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT (id) DO UPDATE SET
                        name = excluded.name,
                        url = excluded.url,
                        keywords = excluded.keywords,
                        interchange_id = excluded.interchange_id
                    "#,
                )
                .bind(channel.id.to_string())
                .bind(&channel.name)
                .bind(&channel.url)
                .bind(serde_json::to_string(&channel.keywords)?)
                .bind(interchange.id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(format!("Failed to upsert channel {}: {}", channel.id, e))
                })?;
            }
        }

        let interchange_ids = id_list(interchanges.iter().map(|i| i.id))?;
        let channel_ids = id_list(
            interchanges
                .iter()
                .flat_map(|i| i.channels.iter().map(|c| c.id)),
        )?;

        let removed = sqlx::query(
            "DELETE FROM interchanges WHERE id NOT IN (SELECT value FROM json_each(?1))",
        )
        .bind(&interchange_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to delete stale interchanges: {}", e)))?;

        sqlx::query("DELETE FROM channels WHERE id NOT IN (SELECT value FROM json_each(?1))")
            .bind(&channel_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete stale channels: {}", e)))?;

        // channels that moved to another interchange take their mappings with them
        sqlx::query(
            r#"
            DELETE FROM mappings WHERE EXISTS (
                SELECT 1 FROM channels c
                WHERE c.id = mappings.channel_id AND c.interchange_id <> mappings.interchange_id
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to delete orphaned mappings: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit configuration: {}", e)))?;

        debug!(
            "Applied configuration: {} interchanges, {} stale removed",
            interchanges.len(),
            removed.rows_affected()
        );

        Ok(())
    }

    async fn get(&self, id: InterchangeId) -> Result<Option<Interchange>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to start transaction: {}", e)))?;

        let row = sqlx::query(
            "SELECT id, name, country, scheme, default_channel_id FROM interchanges WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to load interchange {}: {}", id, e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let channels = sqlx::query(
            "SELECT id, name, url, keywords, interchange_id FROM channels WHERE interchange_id = ?1",
        )
        .bind(id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to load channels for {}: {}", id, e)))?
        .iter()
        .map(channel_from_row)
        .collect::<Result<Vec<_>>>()?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to finish read: {}", e)))?;

        assemble(&row, channels).map(Some)
    }

    async fn get_all(&self) -> Result<Vec<Interchange>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to start transaction: {}", e)))?;

        let rows = sqlx::query(
            "SELECT id, name, country, scheme, default_channel_id FROM interchanges ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to load interchanges: {}", e)))?;

        let channel_rows = sqlx::query("SELECT id, name, url, keywords, interchange_id FROM channels")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to load channels: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to finish read: {}", e)))?;

        let mut by_interchange: HashMap<InterchangeId, Vec<Channel>> = HashMap::new();
        for row in &channel_rows {
            let channel = channel_from_row(row)?;
            if let Some(owner) = channel.interchange_id {
                by_interchange.entry(owner).or_default().push(channel);
            }
        }

        rows.iter()
            .map(|row| {
                let id: String = column(row, "id")?;
                let id = InterchangeId::from_uuid(parse_uuid(&id, "interchange id")?);
                assemble(row, by_interchange.remove(&id).unwrap_or_default())
            })
            .collect()
    }
}

#[async_trait]
impl MappingStore for SqliteStore {
    async fn upsert_mapping(
        &self,
        interchange: &Interchange,
        channel: &Channel,
        urn: &Urn,
    ) -> Result<()> {
        // the channel must still belong to the interchange when the row is written
        let written = sqlx::query(
            r#"
            INSERT INTO mappings (urn, interchange_id, channel_id)
            SELECT ?1, ?2, id FROM channels WHERE id = ?3 AND interchange_id = ?2
            ON CONFLICT (urn, interchange_id) DO UPDATE SET channel_id = excluded.channel_id
            "#,
        )
        .bind(urn.as_str())
        .bind(interchange.id.to_string())
        .bind(channel.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to set mapping for {}: {}", urn, e)))?;

        if written.rows_affected() == 0 {
            return Err(Error::OwnershipMismatch {
                channel: channel.id,
                interchange: interchange.id,
            });
        }

        Ok(())
    }

    async fn clear_mapping(&self, interchange: InterchangeId, urn: &Urn) -> Result<()> {
        sqlx::query("DELETE FROM mappings WHERE interchange_id = ?1 AND urn = ?2")
            .bind(interchange.to_string())
            .bind(urn.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to clear mapping for {}: {}", urn, e)))?;

        Ok(())
    }

    async fn get_mapping(&self, interchange: &Interchange, urn: &Urn) -> Result<Option<Channel>> {
        let row = sqlx::query(
            r#"
            SELECT c.id, c.name, c.url, c.keywords, c.interchange_id
            FROM mappings m
            JOIN channels c ON c.id = m.channel_id AND c.interchange_id = m.interchange_id
            WHERE m.interchange_id = ?1 AND m.urn = ?2
            "#,
        )
        .bind(interchange.id.to_string())
        .bind(urn.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to load mapping for {}: {}", urn, e)))?;

        row.as_ref().map(channel_from_row).transpose()
    }
}

#[async_trait]
impl SchemaManager for SqliteStore {
    async fn ensure_latest(&self) -> Result<i64> {
        migrations::run_migrations(&self.pool).await
    }

    async fn current_version(&self) -> Result<Option<i64>> {
        migrations::get_current_version(&self.pool).await
    }
}
