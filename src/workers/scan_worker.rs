// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::EngineSettings;
use crate::domain::models::site::ScanOutput;
use crate::domain::models::job::JobStatus;
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::domain::repositories::known_header_repository::KnownHeaderRepository;
use crate::domain::repositories::plan_repository::PlanRepository;
use crate::domain::services::cancellation::CancellationRegistry;
use crate::domain::services::header_filter::KnownHeaderFilter;
use crate::engines::crawl_session::{CrawlOutcome, CrawlRequest, CrawlSession};
use crate::engines::detector::TechnologyDetector;
use crate::engines::traits::BrowserEngine;
use crate::engines::validators::SsrfGuard;
use crate::infrastructure::observability::resource_monitor::ResourceMonitor;
use crate::queue::job_queue::{subscribe, Delivery, DeliveryHandler, JobMessage, JobQueue};
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::worker::Worker;

/// 扫描执行引擎依赖的全部协作者
#[derive(Clone)]
pub struct ScanDependencies {
    pub queue: Arc<dyn JobQueue>,
    pub jobs: Arc<dyn JobRepository>,
    pub known_headers: Arc<dyn KnownHeaderRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub registry: Arc<dyn CancellationRegistry>,
    pub detector: Arc<dyn TechnologyDetector>,
    pub guard: Arc<SsrfGuard>,
    pub browser: Arc<dyn BrowserEngine>,
    pub monitor: Arc<dyn ResourceMonitor>,
}

/// 一次处理的结局
#[derive(Debug, Clone, PartialEq)]
enum Disposition {
    /// 任务不存在、已删除或已处于终态
    Skipped,
    Complete,
    Failed,
    Cancelled,
    /// 以新的负载重新入队
    Retry(String),
}

/// 扫描任务工作器
///
/// 订阅任务队列，对每条消息依次执行：
/// 1. 准入检查：内存使用率达到阈值时立即原样推回队列
/// 2. 获取并发许可，在独立任务中处理，订阅循环继续接收消息
/// 3. 加载任务、技术检测与域名解析、爬取会话
/// 4. 写入终态并确认消息，许可在处理结束时释放
/// 5. 检测失败需要重试时，释放许可后再延迟推回队列
pub struct ScanWorker {
    processor: Arc<JobProcessor>,
    monitor: Arc<dyn ResourceMonitor>,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    max_concurrency: usize,
    memory_threshold: f64,
    poll_interval: Duration,
    shutdown: CancellationToken,
    worker_id: Uuid,
}

impl ScanWorker {
    /// 创建新的扫描工作器实例
    ///
    /// # 参数
    ///
    /// * `deps` - 协作者
    /// * `settings` - 执行引擎配置
    /// * `poll_interval` - 队列为空时的轮询间隔
    /// * `shutdown` - 停机信号
    pub fn new(
        deps: ScanDependencies,
        settings: EngineSettings,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let max_concurrency = settings.max_concurrency.max(1);
        let session = CrawlSession::new(
            deps.browser.clone(),
            deps.guard.clone(),
            deps.registry.clone(),
            settings.crawl_timeout(),
        );

        Self {
            processor: Arc::new(JobProcessor {
                queue: deps.queue,
                jobs: deps.jobs,
                known_headers: deps.known_headers,
                plans: deps.plans,
                registry: deps.registry,
                detector: deps.detector,
                guard: deps.guard,
                session,
                detector_retry_limit: settings.detector_retry_limit,
                requeue_delay: settings.requeue_delay(),
                requeue_policy: RetryPolicy::default(),
            }),
            monitor: deps.monitor,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            tasks: TaskTracker::new(),
            max_concurrency,
            memory_threshold: settings.memory_threshold,
            poll_interval,
            shutdown,
            worker_id: Uuid::new_v4(),
        }
    }

    /// 当前空闲的并发许可数
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// 等待所有处理中的任务结束，包括尚未推回队列的延迟重试
    pub async fn wait_for_in_flight(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
        debug!(worker_id = %self.worker_id, "No crawls in flight");
    }
}

#[async_trait]
impl DeliveryHandler for ScanWorker {
    async fn handle(&self, delivery: Delivery) {
        counter!("jobs_dequeued_total").increment(1);

        let utilization = self.monitor.memory_utilization();
        if utilization >= self.memory_threshold {
            warn!(
                job_id = delivery.message.id,
                utilization,
                threshold = self.memory_threshold,
                "Memory pressure, requeueing job"
            );
            self.processor.push_back(&delivery).await;
            return;
        }

        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!(
                        job_id = delivery.message.id,
                        error = %e,
                        "Concurrency limiter closed"
                    );
                    return;
                }
            },
            _ = self.shutdown.cancelled() => {
                // 未确认的消息会在下次启动时恢复
                info!(
                    job_id = delivery.message.id,
                    "Shutdown requested, leaving job for redelivery"
                );
                return;
            }
        };

        let processor = self.processor.clone();
        self.tasks.spawn(async move {
            let retry = processor.process(&delivery).await;
            drop(permit);

            if let Some(payload) = retry {
                processor.requeue_later(&delivery, &payload).await;
            }
        });
    }
}

#[async_trait]
impl Worker for ScanWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        info!(
            worker_id = %self.worker_id,
            max_concurrency = self.max_concurrency,
            "Scan worker started"
        );

        let recovered = self.processor.queue.recover().await?;
        if recovered > 0 {
            info!(recovered, "Recovered unacknowledged job messages");
        }

        subscribe(
            self.processor.queue.as_ref(),
            self,
            self.poll_interval,
            self.shutdown.clone(),
        )
        .await;

        info!(worker_id = %self.worker_id, "Waiting for in-flight crawls");
        self.wait_for_in_flight().await;
        info!(worker_id = %self.worker_id, "Scan worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "scan_worker"
    }
}

/// 单个任务的处理流程
struct JobProcessor {
    queue: Arc<dyn JobQueue>,
    jobs: Arc<dyn JobRepository>,
    known_headers: Arc<dyn KnownHeaderRepository>,
    plans: Arc<dyn PlanRepository>,
    registry: Arc<dyn CancellationRegistry>,
    detector: Arc<dyn TechnologyDetector>,
    guard: Arc<SsrfGuard>,
    session: CrawlSession,
    detector_retry_limit: u32,
    requeue_delay: Duration,
    requeue_policy: RetryPolicy,
}

impl JobProcessor {
    /// 处理一条投递，返回需要延迟推回队列的负载
    #[instrument(
        skip(self, delivery),
        fields(
            job_id = delivery.message.id,
            url = %delivery.message.url,
            attempt = delivery.message.attempt
        )
    )]
    async fn process(&self, delivery: &Delivery) -> Option<String> {
        let job_id = delivery.message.id;
        let started = Instant::now();
        gauge!("engine_active_crawls").increment(1.0);

        let disposition = match self.execute(&delivery.message).await {
            Ok(disposition) => disposition,
            // 取消流程抢先写入了终态，保留已存储的结果
            Err(WorkerError::Repository(RepositoryError::Finalized(status))) => {
                info!(%status, "Job finalized concurrently, keeping stored status");
                match status {
                    JobStatus::Cancelled => Disposition::Cancelled,
                    _ => Disposition::Skipped,
                }
            }
            Err(e) => {
                error!(error = %e, "Job execution failed");
                self.finalize_failed(job_id).await;
                Disposition::Failed
            }
        };

        gauge!("engine_active_crawls").decrement(1.0);
        histogram!("crawl_duration_seconds").record(started.elapsed().as_secs_f64());

        match disposition {
            Disposition::Retry(payload) => return Some(payload),
            Disposition::Complete => counter!("jobs_completed_total").increment(1),
            Disposition::Failed => counter!("jobs_failed_total").increment(1),
            Disposition::Cancelled => counter!("jobs_cancelled_total").increment(1),
            Disposition::Skipped => {}
        }

        // 回收从未被爬取过程观察到的取消标记
        if let Err(e) = self.registry.acknowledge(job_id).await {
            warn!(error = %e, "Failed to clear cancellation marker");
        }
        self.ack(delivery).await;
        None
    }

    async fn execute(&self, message: &JobMessage) -> Result<Disposition, WorkerError> {
        let Some(job) = self.jobs.find_by_id(message.id).await? else {
            info!("Job not found, skipping");
            return Ok(Disposition::Skipped);
        };
        if !job.is_runnable() {
            info!(
                status = %job.status,
                deleted = job.is_deleted,
                "Job is not runnable, skipping"
            );
            return Ok(Disposition::Skipped);
        }

        if self.cancellation_requested(job.id).await {
            self.jobs.update(&job.cancel()?).await?;
            return Ok(Disposition::Cancelled);
        }

        if let Err(violation) = self.guard.check(&job.url).await {
            warn!(reason = %violation, "Rejected unsafe target");
            counter!("ssrf_blocked_requests_total").increment(1);
            self.jobs.update(&job.fail()?).await?;
            return Ok(Disposition::Failed);
        }

        let job = self.jobs.update(&job.start()?).await?;
        let headers = KnownHeaderFilter::new(&self.known_headers.find_active().await?);

        let (ip_addresses, detection) = tokio::join!(
            self.guard.resolve_to_ips(&job.url),
            self.detector.detect(&job.url)
        );
        let technology = match detection {
            Ok(result) => result.summaries(),
            Err(e) if message.attempt < self.detector_retry_limit => {
                warn!(error = %e, "Technology detection failed, requeueing");
                return Ok(Disposition::Retry(message.next_attempt().to_payload()?));
            }
            Err(e) => return Err(e.into()),
        };

        let screenshot = self.screenshot_allowed(job.user_id).await;
        let outcome = self
            .session
            .run(CrawlRequest {
                job_id: job.id,
                url: job.url.clone(),
                screenshot,
                headers,
            })
            .await?;

        let report = match outcome {
            CrawlOutcome::Finished(report) => report,
            CrawlOutcome::Cancelled => {
                self.finalize_cancelled(job.id).await?;
                return Ok(Disposition::Cancelled);
            }
        };

        // 取消请求可能在最后一个网络事件之后才到达
        if self.cancellation_requested(job.id).await {
            self.finalize_cancelled(job.id).await?;
            return Ok(Disposition::Cancelled);
        }

        let output = serde_json::to_string(&ScanOutput {
            sites: report.sites,
            technology,
            ip_addresses,
        })?;
        self.jobs
            .update(&job.complete(output, report.screenshot)?)
            .await?;

        info!("Job complete");
        Ok(Disposition::Complete)
    }

    /// 查询并消费取消标记
    async fn cancellation_requested(&self, job_id: i64) -> bool {
        match self.registry.is_requested(job_id).await {
            Ok(false) => false,
            Ok(true) => {
                if let Err(e) = self.registry.acknowledge(job_id).await {
                    warn!(error = %e, "Failed to acknowledge cancellation");
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Cancellation registry unavailable");
                false
            }
        }
    }

    async fn screenshot_allowed(&self, user_id: i64) -> bool {
        match self.plans.screenshot_allowed(user_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load plan entitlement, skipping screenshot");
                false
            }
        }
    }

    /// 重新加载任务后写入 Cancelled，取消流程可能已经写过终态
    async fn finalize_cancelled(&self, job_id: i64) -> Result<(), WorkerError> {
        if let Some(job) = self.jobs.find_by_id(job_id).await? {
            if !job.status.is_terminal() {
                self.jobs.update(&job.cancel()?).await?;
            }
        }
        info!("Job cancelled");
        Ok(())
    }

    /// 重新加载任务后写入 Failed
    async fn finalize_failed(&self, job_id: i64) {
        if let Err(e) = self.mark_failed(job_id).await {
            error!(error = %e, "Failed to persist failed status");
        }
    }

    async fn mark_failed(&self, job_id: i64) -> Result<(), WorkerError> {
        match self.jobs.find_by_id(job_id).await? {
            Some(job) if !job.status.is_terminal() => {
                self.jobs.update(&job.fail()?).await?;
            }
            _ => debug!("Job already finalized"),
        }
        Ok(())
    }

    /// 内存压力下立即原样推回队列，不等待也不重试
    ///
    /// 推回失败时不确认，消息留在处理中列表等待恢复
    async fn push_back(&self, delivery: &Delivery) {
        match self.queue.publish(&delivery.payload).await {
            Ok(()) => self.requeued(delivery, "memory").await,
            Err(e) => {
                error!(job_id = delivery.message.id, error = %e, "Failed to requeue job");
            }
        }
    }

    /// 延迟后将重试负载推回队列，推回失败按重试策略退避
    async fn requeue_later(&self, delivery: &Delivery, payload: &str) {
        tokio::time::sleep(self.requeue_delay).await;

        let queue = &self.queue;
        let result = self
            .requeue_policy
            .execute("requeue job", move || queue.publish(payload))
            .await;

        match result {
            Ok(()) => self.requeued(delivery, "detector").await,
            Err(e) => {
                error!(job_id = delivery.message.id, error = %e, "Failed to requeue job");
            }
        }
    }

    async fn requeued(&self, delivery: &Delivery, reason: &'static str) {
        counter!("jobs_requeued_total", "reason" => reason).increment(1);
        debug!(job_id = delivery.message.id, reason, "Job requeued");
        self.ack(delivery).await;
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.queue.ack(delivery).await {
            error!(job_id = delivery.message.id, error = %e, "Failed to acknowledge job message");
        }
    }
}
