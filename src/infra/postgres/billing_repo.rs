use {
    super::PgStore,
    crate::domain::{
        error::PipelineError,
        id::{AccountId, Email, SubscriptionId},
        ledger::{CreditGrant, GrantOutcome},
        order::NewOrder,
        repository::{BillingStore, StoreFuture},
        subscription::{AccountTier, PremiumFlag, SubscriberUpsert},
    },
    uuid::Uuid,
};

impl PgStore {
    async fn insert_order_inner(&self, order: &NewOrder) -> Result<bool, PipelineError> {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO orders
                (id, stripe_session_id, email, user_id, amount, currency,
                 status, credits, guest_checkout, product_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (stripe_session_id) DO NOTHING
            RETURNING true
            "#,
        )
        .bind(order.id)
        .bind(order.session_id.as_str())
        .bind(order.email.as_str())
        .bind(order.account.map(|a| a.as_uuid()))
        .bind(order.money.amount().minor_units())
        .bind(order.money.currency().as_str())
        .bind(order.status.as_str())
        .bind(order.credits)
        .bind(order.guest)
        .bind(&order.product_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    async fn find_account_by_email_inner(&self, email: &Email) -> Result<Option<AccountId>, PipelineError> {
        let id: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM profiles WHERE lower(email) = $1")
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(AccountId::new))
    }

    /// Ledger row and balance increment in one transaction, serialized per account.
    /// The ledger row's unique `source_event_id` makes a replayed grant a no-op.
    async fn add_credits_inner(&self, grant: &CreditGrant) -> Result<GrantOutcome, PipelineError> {
        let account = grant.account().as_uuid();
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET LOCAL lock_timeout = '5s'")
            .execute(&mut *tx)
            .await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(account.to_string())
            .execute(&mut *tx)
            .await?;

        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO credit_transactions
                (id, user_id, amount, type, description, order_ref, source_event_id)
            VALUES ($1, $2, $3, 'purchase', $4, $5, $6)
            ON CONFLICT (source_event_id) DO NOTHING
            RETURNING true
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(account)
        .bind(grant.delta())
        .bind(grant.description())
        .bind(grant.order_ref())
        .bind(grant.source_event().as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.commit().await?;
            return Ok(GrantOutcome::AlreadyApplied);
        }

        let balance: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO credits (user_id, amount, total_purchased)
            VALUES ($1, $2, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET amount = credits.amount + EXCLUDED.amount,
                total_purchased = credits.total_purchased + EXCLUDED.amount,
                updated_at = now()
            RETURNING amount
            "#,
        )
        .bind(account)
        .bind(grant.delta())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(GrantOutcome::Applied { balance })
    }

    async fn credit_balance_inner(&self, account: AccountId) -> Result<i64, PipelineError> {
        let balance: Option<i64> = sqlx::query_scalar("SELECT amount FROM credits WHERE user_id = $1")
            .bind(account.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance.unwrap_or(0))
    }

    async fn upsert_subscriber_inner(&self, s: &SubscriberUpsert) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers
                (id, email, user_id, stripe_customer_id, stripe_subscription_id, status,
                 subscribed, subscription_tier, subscription_start, subscription_end, guest_checkout)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (email) DO UPDATE
            SET user_id = COALESCE(EXCLUDED.user_id, subscribers.user_id),
                stripe_customer_id = COALESCE(EXCLUDED.stripe_customer_id, subscribers.stripe_customer_id),
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                status = EXCLUDED.status,
                subscribed = EXCLUDED.subscribed,
                subscription_tier = EXCLUDED.subscription_tier,
                subscription_start = EXCLUDED.subscription_start,
                subscription_end = EXCLUDED.subscription_end,
                guest_checkout = EXCLUDED.guest_checkout,
                updated_at = now()
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(s.email.as_str())
        .bind(s.account.map(|a| a.as_uuid()))
        .bind(s.customer_id.as_deref())
        .bind(s.subscription_id.as_str())
        .bind(s.status.as_str())
        .bind(s.status.grants_premium())
        .bind(&s.tier)
        .bind(s.period_start)
        .bind(s.period_end)
        .bind(s.guest)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn subscriber_email_inner(&self, id: &SubscriptionId) -> Result<Option<Email>, PipelineError> {
        let email: Option<String> = sqlx::query_scalar(
            "SELECT email FROM subscribers WHERE stripe_subscription_id = $1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        email.as_deref().map(Email::new).transpose()
    }

    async fn cancel_subscription_inner(&self, id: &SubscriptionId) -> Result<bool, PipelineError> {
        let result = sqlx::query(
            r#"
            UPDATE subscribers
            SET status = 'canceled', subscribed = false, updated_at = now()
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_account_tier_inner(&self, account: AccountId, tier: &AccountTier) -> Result<(), PipelineError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET role = $2, subscription_tier = $3, subscription_status = $4, updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(account.as_uuid())
        .bind(tier.role())
        .bind(tier.tier())
        .bind(tier.status())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::Store(format!("no profile for account {account}")));
        }
        Ok(())
    }

    async fn set_premium_flag_inner(&self, flag: &PremiumFlag) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO premium_subscriptions
                (user_id, status, plan_type, stripe_subscription_id,
                 current_period_start, current_period_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET status = EXCLUDED.status,
                plan_type = CASE WHEN EXCLUDED.status = 'active'
                                 THEN EXCLUDED.plan_type
                                 ELSE premium_subscriptions.plan_type END,
                stripe_subscription_id = COALESCE(EXCLUDED.stripe_subscription_id,
                                                  premium_subscriptions.stripe_subscription_id),
                current_period_start = COALESCE(EXCLUDED.current_period_start,
                                                premium_subscriptions.current_period_start),
                current_period_end = COALESCE(EXCLUDED.current_period_end,
                                              premium_subscriptions.current_period_end),
                updated_at = now()
            "#,
        )
        .bind(flag.account.as_uuid())
        .bind(if flag.active { "active" } else { "canceled" })
        .bind(&flag.plan)
        .bind(flag.subscription_id.as_ref().map(SubscriptionId::as_str))
        .bind(flag.period_start)
        .bind(flag.period_end)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl BillingStore for PgStore {
    fn insert_order<'a>(&'a self, order: &'a NewOrder) -> StoreFuture<'a, bool> {
        Box::pin(self.insert_order_inner(order))
    }

    fn find_account_by_email<'a>(&'a self, email: &'a Email) -> StoreFuture<'a, Option<AccountId>> {
        Box::pin(self.find_account_by_email_inner(email))
    }

    fn add_credits<'a>(&'a self, grant: &'a CreditGrant) -> StoreFuture<'a, GrantOutcome> {
        Box::pin(self.add_credits_inner(grant))
    }

    fn credit_balance<'a>(&'a self, account: AccountId) -> StoreFuture<'a, i64> {
        Box::pin(self.credit_balance_inner(account))
    }

    fn upsert_subscriber<'a>(&'a self, subscriber: &'a SubscriberUpsert) -> StoreFuture<'a, ()> {
        Box::pin(self.upsert_subscriber_inner(subscriber))
    }

    fn subscriber_email<'a>(
        &'a self,
        subscription_id: &'a SubscriptionId,
    ) -> StoreFuture<'a, Option<Email>> {
        Box::pin(self.subscriber_email_inner(subscription_id))
    }

    fn cancel_subscription<'a>(
        &'a self,
        subscription_id: &'a SubscriptionId,
    ) -> StoreFuture<'a, bool> {
        Box::pin(self.cancel_subscription_inner(subscription_id))
    }

    fn set_account_tier<'a>(
        &'a self,
        account: AccountId,
        tier: &'a AccountTier,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.set_account_tier_inner(account, tier))
    }

    fn set_premium_flag<'a>(&'a self, flag: &'a PremiumFlag) -> StoreFuture<'a, ()> {
        Box::pin(self.set_premium_flag_inner(flag))
    }
}
