//! PostgreSQL-backed config and mapping store

use async_trait::async_trait;
use clover_core::{
    Channel, ChannelId, ConfigStore, Error, Interchange, InterchangeId, MappingStore, Result,
    SchemaManager, Urn,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::migrations;

/// PostgreSQL implementation of the Clover stores
#[derive(Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    /// Connect to PostgreSQL
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Errors
    /// - `Error::Database` if the connection fails
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Create from an existing pool (useful for testing)
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn column<T>(row: &PgRow, name: &str) -> Result<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| Error::Database(format!("Failed to read column {}: {}", name, e)))
}

fn channel_from_row(row: &PgRow) -> Result<Channel> {
    Ok(Channel {
        id: ChannelId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        url: column(row, "url")?,
        keywords: column(row, "keywords")?,
        interchange_id: Some(InterchangeId::from_uuid(column(row, "interchange_id")?)),
    })
}

fn assemble(row: &PgRow, mut channels: Vec<Channel>) -> Result<Interchange> {
    let id = InterchangeId::from_uuid(column(row, "id")?);
    let default_channel_id = ChannelId::from_uuid(column(row, "default_channel_id")?);

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

#[async_trait]
impl ConfigStore for PostgresStore {
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
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    country = EXCLUDED.country,
                    scheme = EXCLUDED.scheme,
                    default_channel_id = EXCLUDED.default_channel_id
                "#,
            )
            .bind(*interchange.id.as_uuid())
            .bind(&interchange.name)
            .bind(&interchange.country)
            .bind(&interchange.scheme)
            .bind(*default.id.as_uuid())
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
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE SET
                        name = EXCLUDED.name,
                        url = EXCLUDED.url,
                        keywords = EXCLUDED.keywords,
                        interchange_id = EXCLUDED.interchange_id
                    "#,
                )
                .bind(*channel.id.as_uuid())
                .bind(&channel.name)
                .bind(&channel.url)
                .bind(channel.keywords.clone())
                .bind(*interchange.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(format!("Failed to upsert channel {}: {}", channel.id, e))
                })?;
            }
        }

        let interchange_ids: Vec<Uuid> = interchanges.iter().map(|i| *i.id.as_uuid()).collect();
        let channel_ids: Vec<Uuid> = interchanges
            .iter()
            .flat_map(|i| i.channels.iter().map(|c| *c.id.as_uuid()))
            .collect();

        let removed = sqlx::query("DELETE FROM interchanges WHERE NOT (id = ANY($1))")
            .bind(&interchange_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete stale interchanges: {}", e)))?;

        sqlx::query("DELETE FROM channels WHERE NOT (id = ANY($1))")
            .bind(&channel_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete stale channels: {}", e)))?;

        // channels that moved to another interchange take their mappings with them
        sqlx::query(
            r#"
            DELETE FROM mappings m
            USING channels c
            WHERE c.id = m.channel_id AND c.interchange_id <> m.interchange_id
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
            "SELECT id, name, country, scheme, default_channel_id FROM interchanges WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to load interchange {}: {}", id, e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let channels = sqlx::query(
            "SELECT id, name, url, keywords, interchange_id FROM channels WHERE interchange_id = $1",
        )
        .bind(*id.as_uuid())
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

        let channel_rows =
            sqlx::query("SELECT id, name, url, keywords, interchange_id FROM channels")
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
                let id = InterchangeId::from_uuid(column(row, "id")?);
                assemble(row, by_interchange.remove(&id).unwrap_or_default())
            })
            .collect()
    }
}

#[async_trait]
impl MappingStore for PostgresStore {
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
            SELECT $1, $2, id FROM channels WHERE id = $3 AND interchange_id = $2
            ON CONFLICT (urn, interchange_id) DO UPDATE SET channel_id = EXCLUDED.channel_id
            "#,
        )
        .bind(urn.as_str())
        .bind(*interchange.id.as_uuid())
        .bind(*channel.id.as_uuid())
        .execute(self.pool.as_ref())
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
        sqlx::query("DELETE FROM mappings WHERE interchange_id = $1 AND urn = $2")
            .bind(*interchange.as_uuid())
            .bind(urn.as_str())
            .execute(self.pool.as_ref())
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
            WHERE m.interchange_id = $1 AND m.urn = $2
            "#,
        )
        .bind(*interchange.id.as_uuid())
        .bind(urn.as_str())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| Error::Database(format!("Failed to load mapping for {}: {}", urn, e)))?;

        row.as_ref().map(channel_from_row).transpose()
    }
}

#[async_trait]
impl SchemaManager for PostgresStore {
    async fn ensure_latest(&self) -> Result<i64> {
        migrations::run_migrations(&self.pool).await
    }

    async fn current_version(&self) -> Result<Option<i64>> {
        migrations::get_current_version(&self.pool).await
    }
}
