use std::time::Duration;

use anyhow::Result;
use diesel::{
    Connection, PgConnection, RunQueryDsl,
    connection::CacheSize,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};

/// Applied to every pooled connection so no store call can hang a request indefinitely.
#[derive(Debug)]
struct BoundedConnection {
    statement_timeout: Duration,
}

impl CustomizeConnection<PgConnection, R2d2Error> for BoundedConnection {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), R2d2Error> {
        // Transaction-mode poolers reject server-side prepared statements.
        conn.set_prepared_statement_cache_size(CacheSize::Disabled);
        diesel::sql_query(format!(
            "SET statement_timeout = {}",
            self.statement_timeout.as_millis()
        ))
        .execute(conn)
        .map_err(R2d2Error::QueryError)?;
        Ok(())
    }
}

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_size: u32,
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(10),
        }
    }
}

pub fn establish_connection(database_url: &str) -> Result<PgPoolSquad> {
    establish_connection_with(database_url, PoolSettings::default())
}

pub fn establish_connection_with(database_url: &str, settings: PoolSettings) -> Result<PgPoolSquad> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(settings.max_size)
        .connection_timeout(settings.acquire_timeout)
        .connection_customizer(Box::new(BoundedConnection {
            statement_timeout: settings.statement_timeout,
        }))
        .build(manager)?;
    Ok(pool)
}
