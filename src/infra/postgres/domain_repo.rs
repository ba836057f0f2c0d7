use {
    super::PgStore,
    crate::domain::{
        error::PipelineError,
        repository::{DomainStore, StoreFuture},
        site_domain::{DomainRecord, DomainStatus, NewDomainRecord, SyncUpdate},
    },
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct DomainRow {
    id: Uuid,
    domain: String,
    user_id: Option<String>,
    status: String,
    netlify_verified: bool,
    netlify_site_id: Option<String>,
    dns_verified: bool,
    ssl_enabled: bool,
    is_custom_domain: bool,
}

impl From<DomainRow> for DomainRecord {
    fn from(row: DomainRow) -> Self {
        Self {
            id: row.id,
            name: row.domain,
            status: DomainStatus::from_stored(&row.status),
            remote_verified: row.netlify_verified,
            remote_site_id: row.netlify_site_id,
            owner_id: row.user_id,
            dns_verified: row.dns_verified,
            ssl_enabled: row.ssl_enabled,
            is_custom_domain: row.is_custom_domain,
        }
    }
}

impl PgStore {
    async fn list_domains_inner(&self, owner: Option<&str>) -> Result<Vec<DomainRecord>, PipelineError> {
        let rows: Vec<DomainRow> = sqlx::query_as(
            r#"
            SELECT id, domain, user_id, status, netlify_verified, netlify_site_id,
                   dns_verified, ssl_enabled, is_custom_domain
            FROM domains
            WHERE $1::text IS NULL OR user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DomainRecord::from).collect())
    }

    async fn insert_domain_inner(&self, record: &NewDomainRecord) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO domains
                (id, domain, user_id, status, netlify_verified, netlify_site_id,
                 dns_verified, ssl_enabled, is_custom_domain)
            VALUES ($1, $2, $3, 'verified', true, $4, true, true, $5)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.owner_id.as_deref())
        .bind(&record.site_id)
        .bind(record.is_custom_domain)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_synced_inner(&self, update: &SyncUpdate) -> Result<(), PipelineError> {
        let result = sqlx::query(
            r#"
            UPDATE domains
            SET status = 'verified',
                netlify_verified = true,
                netlify_site_id = $2,
                is_custom_domain = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(update.id)
        .bind(&update.site_id)
        .bind(update.is_custom_domain)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::Store(format!("domain row {} vanished", update.name)));
        }
        Ok(())
    }

    async fn delete_domain_inner(&self, id: Uuid) -> Result<bool, PipelineError> {
        let result = sqlx::query("DELETE FROM domains WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl DomainStore for PgStore {
    fn list_domains<'a>(&'a self, owner: Option<&'a str>) -> StoreFuture<'a, Vec<DomainRecord>> {
        Box::pin(self.list_domains_inner(owner))
    }

    fn insert_domain<'a>(&'a self, record: &'a NewDomainRecord) -> StoreFuture<'a, ()> {
        Box::pin(self.insert_domain_inner(record))
    }

    fn mark_synced<'a>(&'a self, update: &'a SyncUpdate) -> StoreFuture<'a, ()> {
        Box::pin(self.mark_synced_inner(update))
    }

    fn delete_domain<'a>(&'a self, id: Uuid) -> StoreFuture<'a, bool> {
        Box::pin(self.delete_domain_inner(id))
    }
}
