pub mod channels;
pub mod deal_store;
pub mod models;
pub mod queue_store;

/// Single-connection in-memory database with the embedded migrations
/// applied. A pool with more than one connection would hand each connection
/// its own empty `:memory:` database.
#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    pool
}
