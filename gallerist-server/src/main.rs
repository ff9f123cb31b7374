//! # Gallerist Server
//!
//! Process entrypoint for the gallerist media-library ingestion daemon.
//! Wires the catalog gateway, navigation index, message bus, stage
//! consumers, job monitor and scheduler together, then exposes a minimal
//! `/healthz`/`/readyz` surface — there is no public REST/streaming API
//! here, that surface is explicitly out of scope.

mod consumer_loop;
mod db;
mod errors;
mod health;

use std::sync::Arc;

use clap::Parser;
use gallerist_config::{Cli, ConfigLoader};
use gallerist_core::bus::{MessageBus, RedisStreamsBus};
use gallerist_core::catalog::{CatalogGateway, PostgresCatalog};
use gallerist_core::consumers::{CacheConsumer, CollectionScanConsumer, StandardImageCodec, ThumbnailConsumer};
use gallerist_core::index::{NavigationIndex, RedisNavigationIndex};
use gallerist_core::jobs::Monitor;
use gallerist_core::orchestrator::ScanOrchestrator;
use gallerist_core::scheduler::Scheduler;
use gallerist_model::Envelope;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let config = ConfigLoader::load()?;
    if cli.print_config {
        println!("{config:#?}");
        return Ok(());
    }

    db::validate_database_url(&config.database.url)?;

    let postgres = PostgresCatalog::connect(&config.database.url, config.database.max_connections).await?;
    postgres.run_migrations().await?;
    let catalog: Arc<dyn CatalogGateway> = Arc::new(postgres);

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis_client.get_connection_manager().await?;
    let bus: Arc<dyn MessageBus> = Arc::new(RedisStreamsBus::new(redis_conn.clone()));
    let index = RedisNavigationIndex::new(redis_conn);

    if !index.is_valid().await? {
        info!("navigation index stale or absent, rebuilding from catalog");
        index
            .rebuild(catalog.as_ref(), config.index.rebuild_batch_size as i64)
            .await?;
    }

    let codec = Arc::new(StandardImageCodec);

    let orchestrator = Arc::new(ScanOrchestrator::new(catalog.clone(), bus.clone()));
    let collection_scan = Arc::new(CollectionScanConsumer::with_archive_config(
        catalog.clone(),
        bus.clone(),
        codec.clone(),
        config.archive.clone(),
    ));
    let thumbnail = Arc::new(ThumbnailConsumer::new(
        catalog.clone(),
        codec.clone(),
        config.storage.thumbnail_root.clone(),
    ));
    let cache = Arc::new(CacheConsumer::new(
        catalog.clone(),
        codec.clone(),
        config.storage.cache_folder_soft_cap_bytes,
    ));

    let monitor = Arc::new(Monitor::new(catalog.clone(), config.job_tracker.clone()));
    let scheduler = Arc::new(Scheduler::new(catalog.clone(), bus.clone(), config.scheduler.clone()));

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(consumer_loop::run(
        bus.clone(),
        config.queue.clone(),
        "library_scan_queue",
        move |envelope| {
            let orchestrator = orchestrator.clone();
            async move {
                let Envelope::LibraryScan { body, .. } = envelope else {
                    return Err(gallerist_core::error::CoreError::Configuration(
                        "library_scan_queue received a non-LibraryScan envelope".into(),
                    ));
                };
                orchestrator.handle_library_scan(body).await
            }
        },
    )));

    tasks.push(tokio::spawn(consumer_loop::run(
        bus.clone(),
        config.queue.clone(),
        "collection_scan_queue",
        move |envelope| {
            let collection_scan = collection_scan.clone();
            async move {
                let Envelope::CollectionScan { body, .. } = envelope else {
                    return Err(gallerist_core::error::CoreError::Configuration(
                        "collection_scan_queue received a non-CollectionScan envelope".into(),
                    ));
                };
                collection_scan.handle(body).await
            }
        },
    )));

    tasks.push(tokio::spawn(consumer_loop::run(
        bus.clone(),
        config.queue.clone(),
        "thumbnail_generation_queue",
        move |envelope| {
            let thumbnail = thumbnail.clone();
            async move {
                let Envelope::ThumbnailGen { body, .. } = envelope else {
                    return Err(gallerist_core::error::CoreError::Configuration(
                        "thumbnail_generation_queue received a non-ThumbnailGen envelope".into(),
                    ));
                };
                thumbnail.handle(body).await
            }
        },
    )));

    tasks.push(tokio::spawn(consumer_loop::run(
        bus.clone(),
        config.queue.clone(),
        "cache_generation_queue",
        move |envelope| {
            let cache = cache.clone();
            async move {
                let Envelope::CacheGen { body, .. } = envelope else {
                    return Err(gallerist_core::error::CoreError::Configuration(
                        "cache_generation_queue received a non-CacheGen envelope".into(),
                    ));
                };
                cache.handle(body).await
            }
        },
    )));

    tasks.push(tokio::spawn(async move {
        monitor.run().await;
    }));
    tasks.push(tokio::spawn(async move {
        scheduler.run().await;
    }));

    let health_task = tokio::spawn(health::serve(config.health.clone(), catalog.clone()));

    tokio::select! {
        _ = health_task => {
            error!("health server exited unexpectedly");
        }
        _ = futures::future::select_all(tasks) => {
            error!("a worker task exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing(override_filter: Option<&str>) {
    let filter = override_filter
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info,gallerist_core=debug,gallerist_server=debug".to_string());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
