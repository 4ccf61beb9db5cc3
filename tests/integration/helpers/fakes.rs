// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use techscan::domain::models::job::{Job, JobStatus};
use techscan::domain::models::known_header::KnownHeader;
use techscan::domain::models::technology::TechnologyResult;
use techscan::domain::repositories::job_repository::{JobRepository, RepositoryError};
use techscan::domain::repositories::known_header_repository::KnownHeaderRepository;
use techscan::domain::repositories::plan_repository::PlanRepository;
use techscan::domain::services::cancellation::CancellationRegistry;
use techscan::engines::detector::{DetectorError, TechnologyDetector};
use techscan::engines::traits::{
    BrowserEngine, BrowserPage, BrowserSession, EngineError, InterceptedRequest,
    InterceptedResponse, NetworkEvent, RequestGate,
};
use techscan::engines::validators::HostResolver;
use techscan::infrastructure::observability::resource_monitor::ResourceMonitor;
use techscan::queue::job_queue::{Delivery, JobMessage, JobQueue, QueueError};

/// 内存任务队列，行为与 Redis 实现一致：取出的消息在确认前保留在处理中列表
#[derive(Default)]
pub struct InMemoryJobQueue {
    pending: Mutex<VecDeque<String>>,
    processing: Mutex<Vec<String>>,
    acked: Mutex<Vec<String>>,
}

impl InMemoryJobQueue {
    pub fn pending(&self) -> Vec<String> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn processing(&self) -> Vec<String> {
        self.processing.lock().clone()
    }

    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().clone()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        self.pending.lock().push_back(payload.to_string());
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let Some(payload) = self.pending.lock().pop_front() else {
            return Ok(None);
        };
        let message = JobMessage::from_payload(&payload)?;
        self.processing.lock().push(payload.clone());
        Ok(Some(Delivery { message, payload }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut processing = self.processing.lock();
        if let Some(index) = processing.iter().position(|p| p == &delivery.payload) {
            processing.remove(index);
        }
        self.acked.lock().push(delivery.payload.clone());
        Ok(())
    }

    async fn recover(&self) -> Result<u64, QueueError> {
        let recovered: Vec<String> = self.processing.lock().drain(..).collect();
        let count = recovered.len() as u64;
        self.pending.lock().extend(recovered);
        Ok(count)
    }
}

/// 内存任务仓库
type Interleave = Box<dyn Fn(&mut Job) + Send + Sync>;

/// 内存任务库，与数据库实现一样拒绝覆盖终态
pub struct InMemoryJobRepository {
    jobs: Mutex<HashMap<i64, Job>>,
    next_id: AtomicI64,
    updates: AtomicUsize,
    interleave: Mutex<Option<(JobStatus, Interleave)>>,
}

impl Default for InMemoryJobRepository {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            updates: AtomicUsize::new(0),
            interleave: Mutex::new(None),
        }
    }
}

impl InMemoryJobRepository {
    pub fn get(&self, id: i64) -> Option<Job> {
        self.jobs.lock().get(&id).cloned()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// 在下一次写入 `status` 之前修改已存储的任务，模拟并发写入
    pub fn interleave_before<F>(&self, status: JobStatus, change: F)
    where
        F: Fn(&mut Job) + Send + Sync + 'static,
    {
        *self.interleave.lock() = Some((status, Box::new(change)));
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError> {
        let mut created = job.clone();
        created.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Job>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn update(&self, job: &Job) -> Result<Job, RepositoryError> {
        let interleave = {
            let mut slot = self.interleave.lock();
            match slot.as_ref() {
                Some((status, _)) if *status == job.status => slot.take(),
                _ => None,
            }
        };

        let mut jobs = self.jobs.lock();
        let Some(stored) = jobs.get_mut(&job.id) else {
            return Err(RepositoryError::NotFound);
        };
        if let Some((_, change)) = interleave {
            change(stored);
        }
        if stored.status.is_terminal() {
            return Err(RepositoryError::Finalized(stored.status));
        }

        *stored = job.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(job.clone())
    }
}

pub struct StaticKnownHeaders(pub Vec<KnownHeader>);

impl StaticKnownHeaders {
    pub fn standard() -> Self {
        Self(vec![
            KnownHeader::request("User-Agent"),
            KnownHeader::request("Accept"),
            KnownHeader::request("Content-Type"),
            KnownHeader::response("Content-Type"),
            KnownHeader::response("Server"),
            KnownHeader::response("Date"),
        ])
    }
}

#[async_trait]
impl KnownHeaderRepository for StaticKnownHeaders {
    async fn find_active(&self) -> Result<Vec<KnownHeader>, RepositoryError> {
        Ok(self.0.clone())
    }
}

pub struct StaticPlans {
    pub screenshot: bool,
}

#[async_trait]
impl PlanRepository for StaticPlans {
    async fn screenshot_allowed(&self, _user_id: i64) -> Result<bool, RepositoryError> {
        Ok(self.screenshot)
    }
}

/// 除显式登记外所有主机都解析到同一个公网地址
pub struct StaticResolver {
    overrides: HashMap<String, Vec<IpAddr>>,
}

pub const PUBLIC_IP: &str = "93.184.216.34";

impl StaticResolver {
    pub fn public() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    pub fn with(mut self, host: &str, ip: &str) -> Self {
        self.overrides
            .entry(host.to_string())
            .or_default()
            .push(ip.parse().unwrap());
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
        Ok(self
            .overrides
            .get(host)
            .cloned()
            .unwrap_or_else(|| vec![PUBLIC_IP.parse().unwrap()]))
    }
}

/// 固定返回结果的技术检测器
pub struct FakeDetector {
    result: Option<TechnologyResult>,
    calls: AtomicUsize,
}

impl FakeDetector {
    pub fn detecting(technologies: serde_json::Value) -> Self {
        let result = serde_json::from_value(serde_json::json!({
            "urls": {},
            "technologies": technologies,
        }))
        .unwrap();
        Self {
            result: Some(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn nginx() -> Self {
        Self::detecting(serde_json::json!([
            {"slug": "nginx", "name": "nginx", "confidence": 100, "version": null, "categories": []}
        ]))
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TechnologyDetector for FakeDetector {
    async fn detect(&self, _url: &str) -> Result<TechnologyResult, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .ok_or_else(|| DetectorError::Stderr("detector crashed".to_string()))
    }
}

pub struct FixedMonitor(pub f64);

impl ResourceMonitor for FixedMonitor {
    fn memory_utilization(&self) -> f64 {
        self.0
    }
}

/// 脚本化页面在导航过程中执行的步骤
#[derive(Clone)]
pub enum Step {
    Event(NetworkEvent),
    Pause(Duration),
    /// 在取消登记中标记任务
    Cancel(Arc<dyn CancellationRegistry>, i64),
}

pub fn request(url: &str, headers: &[(&str, &str)]) -> Step {
    Step::Event(NetworkEvent::Request(InterceptedRequest {
        url: url.to_string(),
        method: "GET".to_string(),
        headers: pairs(headers),
        post_data: None,
    }))
}

pub fn post(url: &str, body: &str) -> Step {
    Step::Event(NetworkEvent::Request(InterceptedRequest {
        url: url.to_string(),
        method: "POST".to_string(),
        headers: pairs(&[("Content-Type", "application/json")]),
        post_data: Some(body.to_string()),
    }))
}

pub fn response(url: &str, headers: &[(&str, &str)]) -> Step {
    Step::Event(NetworkEvent::Response(InterceptedResponse {
        url: url.to_string(),
        status: 200,
        headers: pairs(headers),
    }))
}

fn pairs(headers: &[(&str, &str)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 浏览器调用统计
#[derive(Default)]
pub struct BrowserStats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub screenshots: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub aborted: Mutex<Vec<String>>,
}

/// 按脚本产生网络事件的浏览器
pub struct ScriptedBrowser {
    steps: Vec<Step>,
    navigation_delay: Duration,
    navigation_error: Option<String>,
    screenshot: Vec<u8>,
    pub stats: Arc<BrowserStats>,
}

impl ScriptedBrowser {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            navigation_delay: Duration::ZERO,
            navigation_error: None,
            screenshot: b"\x89PNG fake".to_vec(),
            stats: Arc::new(BrowserStats::default()),
        }
    }

    pub fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    pub fn failing_navigation(mut self, reason: &str) -> Self {
        self.navigation_error = Some(reason.to_string());
        self
    }

    pub fn screenshot_bytes(&self) -> &[u8] {
        &self.screenshot
    }
}

#[async_trait]
impl BrowserEngine for ScriptedBrowser {
    async fn open(&self, gate: Arc<dyn RequestGate>) -> Result<BrowserSession, EngineError> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let (tx, events) = mpsc::unbounded_channel();
        Ok(BrowserSession {
            page: Box::new(ScriptedPage {
                steps: self.steps.clone(),
                gate,
                tx: Mutex::new(Some(tx)),
                navigation_delay: self.navigation_delay,
                navigation_error: self.navigation_error.clone(),
                screenshot: self.screenshot.clone(),
                stats: self.stats.clone(),
            }),
            events,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedPage {
    steps: Vec<Step>,
    gate: Arc<dyn RequestGate>,
    tx: Mutex<Option<mpsc::UnboundedSender<NetworkEvent>>>,
    navigation_delay: Duration,
    navigation_error: Option<String>,
    screenshot: Vec<u8>,
    stats: Arc<BrowserStats>,
}

impl ScriptedPage {
    fn send(&self, event: NetworkEvent) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn navigate(&self, _url: &str) -> Result<(), EngineError> {
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);

        for step in &self.steps {
            match step {
                Step::Event(event) => {
                    if let NetworkEvent::Request(request) = event {
                        if !self.gate.allow(&request.url).await {
                            self.stats.aborted.lock().push(request.url.clone());
                        }
                    }
                    self.send(event.clone());
                }
                Step::Pause(duration) => tokio::time::sleep(*duration).await,
                Step::Cancel(registry, job_id) => {
                    registry.request(*job_id).await.unwrap();
                }
            }
        }

        tokio::time::sleep(self.navigation_delay).await;
        self.stats.active.fetch_sub(1, Ordering::SeqCst);

        match &self.navigation_error {
            Some(reason) => Err(EngineError::Navigation(reason.clone())),
            None => Ok(()),
        }
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>, EngineError> {
        self.stats.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(self.screenshot.clone())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.tx.lock().take();
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
