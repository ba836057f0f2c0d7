pub mod billing_repo;
pub mod domain_repo;
pub mod event_repo;

use sqlx::PgPool;

/// Postgres implementation of every store seam. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
