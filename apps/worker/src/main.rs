//! Grantflow invitation sweep worker.
//!
//! Expires overdue invitations and sends reminders on a fixed cadence.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use grantflow_application::{InvitationPolicy, InvitationService, InvitationServicePorts};
use grantflow_core::{AppError, AppResult};
use grantflow_infrastructure::{ConsoleInvitationNotifier, PostgresInvitationStore};

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

static MIGRATOR: Migrator = sqlx::migrate!("../../crates/infrastructure/migrations");

#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkerConfig {
    database_url: String,
    database_max_connections: u32,
    accept_url_base: String,
    sweep_interval_seconds: u64,
    sweep_batch_limit: usize,
    reminder_min_age: chrono::Duration,
    reminder_max_count: u32,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(&config).await?;
    let invitations = build_invitation_service(pool, &config)?;

    info!(
        sweep_interval_seconds = config.sweep_interval_seconds,
        sweep_batch_limit = config.sweep_batch_limit,
        reminder_min_age_hours = config.reminder_min_age.num_hours(),
        reminder_max_count = config.reminder_max_count,
        "grantflow-worker started"
    );

    loop {
        run_sweeps(&invitations, config.sweep_batch_limit).await;
        tokio::time::sleep(Duration::from_secs(config.sweep_interval_seconds)).await;
    }
}

async fn run_sweeps(invitations: &InvitationService, limit: usize) {
    if let Err(error) = invitations.expire_overdue(limit).await {
        warn!(error = %error, "expiry sweep failed");
    }

    if let Err(error) = invitations.send_reminders(limit).await {
        warn!(error = %error, "reminder sweep failed");
    }
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_invitation_service(
    pool: PgPool,
    config: &WorkerConfig,
) -> AppResult<InvitationService> {
    let store = Arc::new(PostgresInvitationStore::new(pool));
    let policy = InvitationPolicy {
        reminder_min_age: config.reminder_min_age,
        max_reminders: config.reminder_max_count,
        ..InvitationPolicy::default()
    };
    policy.validate()?;

    Ok(InvitationService::new(
        InvitationServicePorts {
            invitations: store.clone(),
            bulk_results: store.clone(),
            activity: store,
            notifier: Arc::new(ConsoleInvitationNotifier::new(
                config.accept_url_base.as_str(),
            )),
        },
        policy,
    ))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = required_env(&lookup, "DATABASE_URL")?;
        let database_max_connections = parse_env(&lookup, "DATABASE_MAX_CONNECTIONS", 5_u32)?;
        let accept_url_base = lookup("INVITATION_ACCEPT_URL_BASE")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "http://localhost:3000/invitations".to_owned());
        let sweep_interval_seconds = parse_env(&lookup, "SWEEP_INTERVAL_SECONDS", 300_u64)?;
        let sweep_batch_limit = parse_env(&lookup, "SWEEP_BATCH_LIMIT", 100_usize)?;
        let reminder_min_age_hours = parse_env(&lookup, "REMINDER_MIN_AGE_HOURS", 48_i64)?;
        let reminder_max_count = parse_env(&lookup, "REMINDER_MAX_COUNT", 3_u32)?;

        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if sweep_interval_seconds == 0 {
            return Err(AppError::Validation(
                "SWEEP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if sweep_batch_limit == 0 {
            return Err(AppError::Validation(
                "SWEEP_BATCH_LIMIT must be greater than zero".to_owned(),
            ));
        }

        if reminder_min_age_hours <= 0 {
            return Err(AppError::Validation(
                "REMINDER_MIN_AGE_HOURS must be greater than zero".to_owned(),
            ));
        }
        let reminder_min_age = chrono::Duration::try_hours(reminder_min_age_hours)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "REMINDER_MIN_AGE_HOURS value '{reminder_min_age_hours}' is out of range"
                ))
            })?;

        if reminder_max_count == 0 {
            return Err(AppError::Validation(
                "REMINDER_MAX_COUNT must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            accept_url_base,
            sweep_interval_seconds,
            sweep_batch_limit,
            reminder_min_age,
            reminder_max_count,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> AppResult<String> {
    lookup(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
