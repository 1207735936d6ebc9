use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::backend::BackendError;

pub async fn init(database_url: &str) -> anyhow::Result<SqlitePool> {
	let options = database_url
		.parse::<SqliteConnectOptions>()
		.context("invalid DATABASE_URL")?
		.create_if_missing(true)
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(10)
		.min_connections(1)
		.acquire_timeout(Duration::from_secs(10))
		.connect_with(options)
		.await
		.context("failed to connect to database")?;

	migrate(&pool).await?;

	Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
	sqlx::migrate!()
		.run(pool)
		.await
		.context("failed to run migrations")
}

/// Ids are stored as hyphenated text.
pub fn parse_id(raw: &str) -> Result<Uuid, BackendError> {
	Uuid::parse_str(raw.trim()).map_err(|err| BackendError::service(format!("invalid id {raw:?}: {err}")))
}
