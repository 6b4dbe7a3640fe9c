use anyhow::Context as _;
use sea_orm::{Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migrations;

pub async fn establish_connection() -> anyhow::Result<DatabaseConnection> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let mut opt = sea_orm::ConnectOptions::new(database_url);
    opt.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Info);

    info!("Connecting to database...");
    let db = Database::connect(opt).await?;
    info!("Database connection established");

    Ok(db)
}

#[cfg(test)]
pub async fn connect_in_memory() -> DatabaseConnection {
    use sea_orm_migration::MigratorTrait;

    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    migrations::Migrator::up(&db, None)
        .await
        .expect("migrations apply on sqlite");
    db
}
