use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool, Postgres, QueryBuilder,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::database_ops::swapi::models::Character;
use crate::errors::IngestError;

const CREATE_CHARACTERS: &str = "CREATE TABLE IF NOT EXISTS characters (
    id SERIAL PRIMARY KEY,
    birth_year VARCHAR,
    eye_color VARCHAR,
    films VARCHAR,
    gender VARCHAR,
    hair_color VARCHAR,
    height VARCHAR,
    homeworld VARCHAR,
    mass VARCHAR,
    name VARCHAR,
    skin_color VARCHAR,
    species VARCHAR,
    starships VARCHAR,
    vehicles VARCHAR
)";

/// Storage side of the ingest. Every `persist_batch` call is its own
/// transaction; concurrent callers never share one.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Idempotently ensures the target table exists.
    async fn initialize_storage(&self) -> Result<(), IngestError>;
    /// Appends the whole batch atomically and returns the number of rows written.
    async fn persist_batch(&self, batch: &[Character]) -> Result<u64, IngestError>;
    /// Releases pooled connections.
    async fn shutdown_storage(&self);
}

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, IngestError> {
        let connect_options = PgConnectOptions::from_str(database_url)?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");
        Ok(Self { pool })
    }
}

#[async_trait]
impl CharacterStore for Db {
    async fn initialize_storage(&self) -> Result<(), IngestError> {
        // raw_sql keeps DDL off the prepared-statement path
        sqlx::raw_sql(CREATE_CHARACTERS).execute(&self.pool).await?;
        info!("characters table ready");
        Ok(())
    }

    async fn persist_batch(&self, batch: &[Character]) -> Result<u64, IngestError> {
        if batch.is_empty() {
            return Ok(0);
        }
        // Dropping `tx` on any early return rolls the batch back.
        let mut tx = self.pool.begin().await?;
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO characters (birth_year, eye_color, films, gender, hair_color, height, \
             homeworld, mass, name, skin_color, species, starships, vehicles) ",
        );
        qb.push_values(batch, |mut row, c| {
            row.push_bind(c.birth_year.as_str())
                .push_bind(c.eye_color.as_str())
                .push_bind(c.films.as_str())
                .push_bind(c.gender.as_str())
                .push_bind(c.hair_color.as_str())
                .push_bind(c.height.as_str())
                .push_bind(c.homeworld.as_str())
                .push_bind(c.mass.as_str())
                .push_bind(c.name.as_str())
                .push_bind(c.skin_color.as_str())
                .push_bind(c.species.as_str())
                .push_bind(c.starships.as_str())
                .push_bind(c.vehicles.as_str());
        });
        let done = qb.build().persistent(false).execute(&mut *tx).await?;
        tx.commit().await?;
        debug!(rows = done.rows_affected(), "characters batch committed");
        Ok(done.rows_affected())
    }

    async fn shutdown_storage(&self) {
        self.pool.close().await;
        info!("db pool closed");
    }
}
