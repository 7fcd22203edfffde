use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

pub async fn create_db_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new().connect(database_url).await?;

    // Run migrations
    sqlx::migrate!().run(&pool).await?;

    info!("Database ready");
    Ok(pool)
}
