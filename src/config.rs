use {
    crate::domain::error::PipelineError,
    std::{env, time::Duration},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub environment: Environment,
    /// `None` runs the webhook in unsigned development mode.
    pub stripe_webhook_secret: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub netlify_site_id: Option<String>,
    pub netlify_access_token: Option<String>,
    pub http_timeout: Duration,
    pub repair_interval: Duration,
    pub reconcile_interval: Option<Duration>,
    pub event_retention: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|&k| get(k));

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| PipelineError::MissingConfig("DATABASE_URL must be set".into()))?;

        let environment = match get("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        let stripe_webhook_secret = get("STRIPE_WEBHOOK_SECRET");
        if stripe_webhook_secret.is_none() && environment == Environment::Production {
            return Err(PipelineError::MissingConfig(
                "STRIPE_WEBHOOK_SECRET must be set when APP_ENV=production".into(),
            ));
        }

        let secs = |key: &str, default: Option<u64>| -> Result<Option<Duration>, PipelineError> {
            match get(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(|n| Some(Duration::from_secs(n)))
                    .ok_or_else(|| {
                        PipelineError::Validation(format!("{key} must be a positive integer, got: {raw}"))
                    }),
                None => Ok(default.map(Duration::from_secs)),
            }
        };

        let retention_days = match get("EVENT_RETENTION_DAYS") {
            Some(raw) => raw.parse::<i64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                PipelineError::Validation(format!(
                    "EVENT_RETENTION_DAYS must be a positive integer, got: {raw}"
                ))
            })?,
            None => 30,
        };

        Ok(Self {
            database_url,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            environment,
            stripe_webhook_secret,
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            netlify_site_id: first(&["NETLIFY_SITE_ID", "VITE_NETLIFY_SITE_ID"]),
            netlify_access_token: first(&[
                "NETLIFY_ACCESS_TOKEN",
                "NETLIFY_API_TOKEN",
                "VITE_NETLIFY_ACCESS_TOKEN",
            ]),
            http_timeout: secs("HTTP_TIMEOUT_SECS", Some(15))?.unwrap_or(Duration::from_secs(15)),
            repair_interval: secs("REPAIR_INTERVAL_SECS", Some(60))?
                .unwrap_or(Duration::from_secs(60)),
            reconcile_interval: secs("RECONCILE_INTERVAL_SECS", None)?,
            event_retention: chrono::Duration::days(retention_days),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
