use {
    super::PgStore,
    crate::domain::{
        error::PipelineError,
        event::PaymentEvent,
        fulfillment::{EventClaim, EventStatus, FulfillmentStep},
        id::EventId,
        repository::{EventLog, StoreFuture},
    },
    chrono::{DateTime, Utc},
};

impl PgStore {
    /// Insert the event as `processing`, or take over a row that is
    /// `partial`, `failed`, or a `processing` lease older than 2 minutes.
    async fn claim_inner(&self, event: &PaymentEvent) -> Result<EventClaim, PipelineError> {
        let claimed: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO webhook_events (event_id, event_type, payload, status, attempts)
            VALUES ($1, $2, $3, 'processing', 1)
            ON CONFLICT (event_id) DO UPDATE
            SET status = 'processing',
                attempts = webhook_events.attempts + 1,
                updated_at = now()
            WHERE webhook_events.status IN ('partial', 'failed')
               OR (webhook_events.status = 'processing'
                   AND webhook_events.updated_at < now() - interval '2 minutes')
            RETURNING attempts
            "#,
        )
        .bind(event.id.as_str())
        .bind(&event.event_type)
        .bind(&event.payload)
        .fetch_optional(&self.pool)
        .await?;

        let Some(attempt) = claimed else {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM webhook_events WHERE event_id = $1")
                    .bind(event.id.as_str())
                    .fetch_optional(&self.pool)
                    .await?;

            return Ok(match status.as_deref() {
                Some("completed") => EventClaim::AlreadyCompleted,
                _ => EventClaim::InFlight,
            });
        };

        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT step FROM webhook_event_steps WHERE event_id = $1 AND completed_at IS NOT NULL",
        )
        .bind(event.id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let completed_steps = rows
            .iter()
            .map(|s| FulfillmentStep::try_from(s.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EventClaim::Claimed {
            completed_steps,
            attempt: u32::try_from(attempt).unwrap_or(u32::MAX),
        })
    }

    async fn complete_step_inner(
        &self,
        event_id: &EventId,
        step: FulfillmentStep,
    ) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_event_steps (event_id, step, completed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (event_id, step) DO UPDATE
            SET completed_at = now(), last_error = NULL
            "#,
        )
        .bind(event_id.as_str())
        .bind(step.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_step_failure_inner(
        &self,
        event_id: &EventId,
        step: FulfillmentStep,
        error: &str,
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO webhook_event_steps (event_id, step, last_error)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, step) DO UPDATE SET last_error = EXCLUDED.last_error
            "#,
        )
        .bind(event_id.as_str())
        .bind(step.as_str())
        .bind(error)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE webhook_events SET last_error = $2, updated_at = now() WHERE event_id = $1")
            .bind(event_id.as_str())
            .bind(format!("{step}: {error}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn finish_inner(&self, event_id: &EventId, status: EventStatus) -> Result<(), PipelineError> {
        sqlx::query("UPDATE webhook_events SET status = $2, updated_at = now() WHERE event_id = $1")
            .bind(event_id.as_str())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn repairable_inner(&self, limit: i64) -> Result<Vec<PaymentEvent>, PipelineError> {
        let rows: Vec<(String, serde_json::Value)> = sqlx::query_as(
            r#"
            SELECT event_id, payload FROM webhook_events
            WHERE (status = 'partial'
                   AND updated_at < now() - make_interval(secs => power(2, LEAST(attempts, 16))::int))
               OR (status = 'processing' AND updated_at < now() - interval '2 minutes')
            ORDER BY updated_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for (event_id, payload) in rows {
            match PaymentEvent::from_payload(payload) {
                Ok(event) => events.push(event),
                Err(e) => tracing::error!(%event_id, error = %e, "stored payload is not an event"),
            }
        }
        Ok(events)
    }

    async fn purge_completed_inner(&self, older_than: DateTime<Utc>) -> Result<u64, PipelineError> {
        let result = sqlx::query(
            "DELETE FROM webhook_events WHERE status = 'completed' AND updated_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl EventLog for PgStore {
    fn claim<'a>(&'a self, event: &'a PaymentEvent) -> StoreFuture<'a, EventClaim> {
        Box::pin(self.claim_inner(event))
    }

    fn complete_step<'a>(
        &'a self,
        event_id: &'a EventId,
        step: FulfillmentStep,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.complete_step_inner(event_id, step))
    }

    fn record_step_failure<'a>(
        &'a self,
        event_id: &'a EventId,
        step: FulfillmentStep,
        error: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.record_step_failure_inner(event_id, step, error))
    }

    fn finish<'a>(&'a self, event_id: &'a EventId, status: EventStatus) -> StoreFuture<'a, ()> {
        Box::pin(self.finish_inner(event_id, status))
    }

    fn repairable<'a>(&'a self, limit: i64) -> StoreFuture<'a, Vec<PaymentEvent>> {
        Box::pin(self.repairable_inner(limit))
    }

    fn purge_completed<'a>(&'a self, older_than: DateTime<Utc>) -> StoreFuture<'a, u64> {
        Box::pin(self.purge_completed_inner(older_than))
    }
}
