// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use migration::{Migrator, MigratorTrait};
use techscan::config::settings::Settings;
use techscan::domain::services::cancellation::CancellationRegistry;
use techscan::engines::chromium_engine::ChromiumEngine;
use techscan::engines::detector::ProcessDetector;
use techscan::engines::validators::{SsrfGuard, SystemResolver};
use techscan::infrastructure::cache::cancellation_registry::{
    LocalCancellationRegistry, RedisCancellationRegistry,
};
use techscan::infrastructure::cache::redis_client::RedisClient;
use techscan::infrastructure::database::connection;
use techscan::infrastructure::observability::metrics;
use techscan::infrastructure::observability::resource_monitor::SystemResourceMonitor;
use techscan::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use techscan::infrastructure::repositories::known_header_repo_impl::KnownHeaderRepositoryImpl;
use techscan::infrastructure::repositories::plan_repo_impl::PlanRepositoryImpl;
use techscan::queue::job_queue::RedisJobQueue;
use techscan::utils::telemetry;
use techscan::workers::manager::WorkerManager;
use techscan::workers::scan_worker::{ScanDependencies, ScanWorker};

/// 主函数
///
/// 加载配置，初始化数据库、Redis 与浏览器，启动扫描工作器并等待关闭信号
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(settings.logging.json);
    info!("Starting techscan...");
    metrics::init_metrics(&settings.metrics)?;

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    if settings.database.run_migrations {
        info!("Running database migrations...");
        Migrator::up(db.as_ref(), None).await?;
        info!("Database migrations applied");
    }

    // 4. Initialize Redis client
    let redis = RedisClient::new(&settings.redis.url)?;
    redis.ping().await.context("Redis is unreachable")?;
    info!("Redis client initialized");

    // 5. Initialize components
    let registry: Arc<dyn CancellationRegistry> = match settings.cancellation.backend.as_str() {
        "local" => Arc::new(LocalCancellationRegistry::new()),
        "redis" => Arc::new(RedisCancellationRegistry::new(
            redis.clone(),
            settings.cancellation.key.clone(),
        )),
        other => anyhow::bail!("Unsupported cancellation backend: {}", other),
    };

    let queue = Arc::new(RedisJobQueue::new(
        redis.clone(),
        &settings.queue.name,
        &settings.queue.consumer,
    ));
    let guard = Arc::new(SsrfGuard::new(&settings.ssrf, Arc::new(SystemResolver)));

    let deps = ScanDependencies {
        queue,
        jobs: Arc::new(JobRepositoryImpl::new(db.clone())),
        known_headers: Arc::new(KnownHeaderRepositoryImpl::new(db.clone())),
        plans: Arc::new(PlanRepositoryImpl::new(db.clone())),
        registry,
        detector: Arc::new(ProcessDetector::from_settings(&settings.detector)),
        guard,
        browser: Arc::new(ChromiumEngine::new(settings.browser.clone())),
        monitor: Arc::new(SystemResourceMonitor::new()),
    };

    // 6. Start worker
    let shutdown = CancellationToken::new();
    let worker = ScanWorker::new(
        deps,
        settings.engine.clone(),
        settings.queue.poll_interval(),
        shutdown.child_token(),
    );

    let mut manager = WorkerManager::new(shutdown);
    manager.spawn(worker);
    info!(queue = %settings.queue.name, "Scan worker running");

    // 7. Wait for shutdown
    manager.wait_for_shutdown().await;
    info!("techscan stopped");
    Ok(())
}
