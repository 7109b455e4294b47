use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use uuid::Uuid;

use coachbase::cache::{CacheInvalidationManager, MemoryCache};
use coachbase::events::{EventBus, HistoryFilter};
use coachbase::repository::{ChallengeRepository, FocusAreaRepository};
use coachbase::storage::{InMemoryStorage, StorageOp};
use coachbase::transaction::TransactionCoordinator;
use coachbase::{telemetry, Config};
use coachbase_core::cache::Cache;
use coachbase_core::coaching::{self, events};
use coachbase_core::storage::StorageErrorKind;

/// Coachbase - Runs a scripted coaching session against the in-memory backend
#[derive(Parser, Debug)]
#[command(name = "coachbase")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Transient insert failures to inject before the first write
    #[arg(long, default_value = "0")]
    inject_failures: u32,

    /// Total attempts per storage operation
    #[arg(long, env = "RETRY_MAX_ATTEMPTS")]
    retry_max_attempts: Option<u32>,

    /// Backoff after the first failed attempt, in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS")]
    retry_base_delay_ms: Option<u64>,

    /// Per-attempt transaction bound, in milliseconds
    #[arg(long, env = "TRANSACTION_TIMEOUT_MS")]
    transaction_timeout_ms: Option<u64>,

    /// Per-handler bound, in milliseconds
    #[arg(long, env = "EVENT_HANDLER_TIMEOUT_MS")]
    event_handler_timeout_ms: Option<u64>,

    /// Use the Redis cache at REDIS_URL instead of the in-memory cache
    #[cfg(feature = "redis")]
    #[arg(long)]
    redis: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(attempts) = self.retry_max_attempts {
            config.retry_max_attempts = attempts;
        }
        if let Some(delay) = self.retry_base_delay_ms {
            config.retry_base_delay_ms = delay;
        }
        config.transaction_timeout_ms = self.transaction_timeout_ms.or(config.transaction_timeout_ms);
        config.event_handler_timeout_ms = self
            .event_handler_timeout_ms
            .or(config.event_handler_timeout_ms);
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs)?;

    let config = cli.config();
    config.validate()?;
    tracing::debug!(?config, "Loaded configuration");

    let cache = init_cache(&cli, &config).await?;
    let invalidation =
        Arc::new(CacheInvalidationManager::new(cache.clone()).with_rules(coaching::invalidation_rules()));

    let mut bus = EventBus::new(config.event_history_max_size);
    if let Some(timeout) = config.handler_timeout() {
        bus = bus.with_handler_timeout(timeout);
    }
    let points = register_handlers(&bus, invalidation.clone());

    let storage = InMemoryStorage::new();
    if cli.inject_failures > 0 {
        tracing::info!(count = cli.inject_failures, "Injecting transient insert failures");
        storage.fail_next(StorageOp::Insert, StorageErrorKind::Connection, cli.inject_failures);
    }

    let mut coordinator = TransactionCoordinator::new(
        Arc::new(storage.clone()),
        Arc::new(bus.clone()),
        invalidation.clone(),
    )
    .with_retry_policy(config.retry_policy());
    if let Some(timeout) = config.transaction_timeout() {
        coordinator = coordinator.with_timeout(timeout);
    }
    let coordinator = Arc::new(coordinator);

    let focus_areas = FocusAreaRepository::new(coordinator.clone())
        .with_read_cache(cache.clone(), Some(config.cache_ttl()));
    let challenges =
        ChallengeRepository::new(coordinator.clone()).with_read_cache(cache, Some(config.cache_ttl()));

    let user_id = Uuid::new_v4().to_string();
    let focus_area = focus_areas
        .create(&user_id, "Deep work", Some("Two focused blocks a day"))
        .await?;
    let focus_area_id = id_of(focus_area.id)?;
    focus_areas.rename(&focus_area_id, "Deep focus").await?;

    let walk = challenges
        .create(&user_id, &focus_area_id, "90 minutes without notifications", 30)
        .await?;
    challenges.complete(&id_of(walk.id)?).await?;

    let read = challenges
        .create(&user_id, &focus_area_id, "Four blocks before noon", 80)
        .await?;
    let read_id = id_of(read.id)?;
    challenges.abandon(&read_id).await?;
    challenges.delete(&read_id).await?;

    focus_areas.archive(&focus_area_id).await?;
    let remaining = challenges.find_by_focus_area(&focus_area_id).await?;

    let summary = json!({
        "user_id": user_id,
        "challenges_remaining": remaining.len(),
        "points_awarded": points.load(Ordering::Relaxed),
        "storage_inserts_attempted": storage.call_count(StorageOp::Insert),
        "events_in_history": bus.history(&HistoryFilter::default()).len(),
        "bus": bus.metrics(),
        "hooks": coordinator.metrics(),
        "invalidation": invalidation.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

#[cfg(feature = "redis")]
async fn init_cache(cli: &Cli, config: &Config) -> Result<Arc<dyn Cache>> {
    if cli.redis {
        tracing::info!(url = %config.redis_url, "Using Redis cache");
        let cache = coachbase::cache::RedisCache::new(&config.redis_url).await?;
        return Ok(Arc::new(cache));
    }
    Ok(Arc::new(MemoryCache::new(config.cache_max_entries)))
}

#[cfg(not(feature = "redis"))]
async fn init_cache(_cli: &Cli, config: &Config) -> Result<Arc<dyn Cache>> {
    Ok(Arc::new(MemoryCache::new(config.cache_max_entries)))
}

/// Wires the demo's event reactions and returns the running points total.
fn register_handlers(bus: &EventBus, invalidation: Arc<CacheInvalidationManager>) -> Arc<AtomicU64> {
    let points = Arc::new(AtomicU64::new(0));

    let total = points.clone();
    bus.register_fn(events::CHALLENGE_COMPLETED, "points-ledger", move |event| {
        let total = total.clone();
        let invalidation = invalidation.clone();
        async move {
            let awarded = event
                .payload_field("points")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| anyhow::anyhow!("completion event {} has no points", event.id))?;
            total.fetch_add(awarded, Ordering::Relaxed);
            invalidation.invalidate_leaderboards().await;
            Ok(())
        }
    });

    for event_type in [
        events::FOCUS_AREA_CREATED,
        events::FOCUS_AREA_UPDATED,
        events::FOCUS_AREA_ARCHIVED,
        events::CHALLENGE_CREATED,
        events::CHALLENGE_ABANDONED,
        events::CHALLENGE_DELETED,
    ] {
        bus.register_fn(event_type, "audit-log", |event| async move {
            tracing::info!(
                event_type = %event.event_type,
                entity_id = ?event.source_entity_id,
                payload = %event.payload,
                "Audit"
            );
            Ok(())
        });
    }

    points
}

fn id_of(id: Option<Uuid>) -> Result<String> {
    id.map(|id| id.to_string())
        .ok_or_else(|| anyhow::anyhow!("saved entity has no id"))
}
