use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

static SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Build the connection pool and apply the embedded schema.
/// The schema is written to be idempotent so startup is safe on every boot.
pub async fn init_pool(database_url: &str) -> Result<Pool, crate::error::AppError> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e| crate::error::AppError::Config(format!("DATABASE_URL: {e}")))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    let pool = Pool::builder(manager)
        .max_size(16)
        .build()
        .map_err(|e| crate::error::AppError::StartServer(format!("db pool: {e}")))?;

    let client = pool
        .get()
        .await
        .map_err(|e| crate::error::AppError::StartServer(format!("db connect: {e}")))?;
    client
        .batch_execute(SCHEMA)
        .await
        .map_err(|e| crate::error::AppError::StartServer(format!("apply schema: {e}")))?;

    Ok(pool)
}
