// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod fakes;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use techscan::config::settings::{EngineSettings, SsrfSettings};
use techscan::domain::models::job::Job;
use techscan::engines::validators::SsrfGuard;
use techscan::infrastructure::cache::cancellation_registry::LocalCancellationRegistry;
use techscan::queue::job_queue::{Delivery, JobMessage, JobQueue};
use techscan::workers::scan_worker::{ScanDependencies, ScanWorker};

use fakes::{
    FakeDetector, FixedMonitor, InMemoryJobQueue, InMemoryJobRepository, ScriptedBrowser,
    StaticKnownHeaders, StaticPlans, StaticResolver,
};

/// 构造扫描工作器测试环境的参数
pub struct HarnessConfig {
    pub memory: f64,
    pub max_concurrency: usize,
    pub detector_retry_limit: u32,
    pub crawl_timeout_secs: u64,
    pub requeue_delay_ms: u64,
    pub screenshot_allowed: bool,
    pub detector: FakeDetector,
    pub browser: ScriptedBrowser,
    pub resolver: StaticResolver,
    pub registry: Arc<LocalCancellationRegistry>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            memory: 0.5,
            max_concurrency: 10,
            detector_retry_limit: 1,
            crawl_timeout_secs: 30,
            requeue_delay_ms: 0,
            screenshot_allowed: false,
            detector: FakeDetector::nginx(),
            browser: ScriptedBrowser::new(vec![]),
            resolver: StaticResolver::public(),
            registry: Arc::new(LocalCancellationRegistry::new()),
        }
    }
}

/// 使用内存协作者组装的扫描工作器
pub struct Harness {
    pub queue: Arc<InMemoryJobQueue>,
    pub jobs: Arc<InMemoryJobRepository>,
    pub registry: Arc<LocalCancellationRegistry>,
    pub detector: Arc<FakeDetector>,
    pub browser: Arc<ScriptedBrowser>,
    pub shutdown: CancellationToken,
    pub worker: ScanWorker,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        let queue = Arc::new(InMemoryJobQueue::default());
        let jobs = Arc::new(InMemoryJobRepository::default());
        let detector = Arc::new(config.detector);
        let browser = Arc::new(config.browser);
        let guard = Arc::new(SsrfGuard::new(
            &SsrfSettings {
                enabled: true,
                denylist: vec!["g2hq.live".to_string()],
            },
            Arc::new(config.resolver),
        ));

        let deps = ScanDependencies {
            queue: queue.clone(),
            jobs: jobs.clone(),
            known_headers: Arc::new(StaticKnownHeaders::standard()),
            plans: Arc::new(StaticPlans {
                screenshot: config.screenshot_allowed,
            }),
            registry: config.registry.clone(),
            detector: detector.clone(),
            guard,
            browser: browser.clone(),
            monitor: Arc::new(FixedMonitor(config.memory)),
        };

        let settings = EngineSettings {
            max_concurrency: config.max_concurrency,
            memory_threshold: 0.8,
            crawl_timeout_secs: config.crawl_timeout_secs,
            detector_retry_limit: config.detector_retry_limit,
            requeue_delay_ms: config.requeue_delay_ms,
        };

        let shutdown = CancellationToken::new();
        let worker = ScanWorker::new(
            deps,
            settings,
            Duration::from_millis(10),
            shutdown.clone(),
        );

        Self {
            queue,
            jobs,
            registry: config.registry,
            detector,
            browser,
            shutdown,
            worker,
        }
    }

    /// 以 Waiting 状态保存任务并发布对应消息
    pub async fn submit(&self, url: &str) -> Job {
        let mut job = Job::new(url.to_string(), 7);
        job.id = self.next_id();
        self.jobs.insert(job.clone());
        self.queue
            .enqueue(&JobMessage::from(&job))
            .await
            .unwrap();
        job
    }

    /// 从队列取出下一条消息
    pub async fn next_delivery(&self) -> Delivery {
        self.queue.receive().await.unwrap().expect("queue is empty")
    }

    fn next_id(&self) -> i64 {
        (1..)
            .find(|id| self.jobs.get(*id).is_none())
            .unwrap_or_default()
    }
}
