// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::models::known_header::HeaderDirection;
use crate::domain::models::site::Site;
use crate::domain::services::cancellation::CancellationRegistry;
use crate::domain::services::header_filter::KnownHeaderFilter;
use crate::engines::traits::{
    BrowserEngine, BrowserPage, EngineError, InterceptedRequest, InterceptedResponse,
    NetworkEvent, RequestGate,
};
use crate::engines::validators::SsrfGuard;

/// 会话级的请求放行判断
///
/// 按主机缓存 SSRF 检查结果，同一页面内对同一主机的重复请求不再解析 DNS
pub struct SessionGate {
    guard: Arc<SsrfGuard>,
    verdicts: DashMap<String, bool>,
}

impl SessionGate {
    pub fn new(guard: Arc<SsrfGuard>) -> Self {
        Self {
            guard,
            verdicts: DashMap::new(),
        }
    }
}

#[async_trait]
impl RequestGate for SessionGate {
    async fn allow(&self, url: &str) -> bool {
        let host = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                match parsed.host_str() {
                    Some(host) => host.to_ascii_lowercase(),
                    None => return false,
                }
            }
            _ => return self.guard.is_url_safe(url).await,
        };

        if let Some(verdict) = self.verdicts.get(&host) {
            return *verdict;
        }

        let verdict = self.guard.is_url_safe(url).await;
        self.verdicts.insert(host, verdict);
        verdict
    }
}

/// 流量记录器
///
/// 消费页面的网络事件，按URL（不区分大小写）聚合为 [`Site`] 列表。
/// 每个事件处理前先查询取消登记，观察到取消后不再记录任何内容。
pub struct TrafficRecorder {
    job_id: i64,
    headers: KnownHeaderFilter,
    gate: Arc<dyn RequestGate>,
    registry: Arc<dyn CancellationRegistry>,
    cancelled: CancellationToken,
    sites: Mutex<Vec<Site>>,
}

impl TrafficRecorder {
    pub fn new(
        job_id: i64,
        headers: KnownHeaderFilter,
        gate: Arc<dyn RequestGate>,
        registry: Arc<dyn CancellationRegistry>,
        cancelled: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            headers,
            gate,
            registry,
            cancelled,
            sites: Mutex::new(Vec::new()),
        }
    }

    /// 处理一个网络事件
    ///
    /// # 返回值
    ///
    /// 事件被记录时返回 `true`
    pub async fn observe(&self, event: NetworkEvent) -> bool {
        if self.cancelled.is_cancelled() {
            return false;
        }

        if self.cancellation_requested().await {
            return false;
        }

        if !self.gate.allow(event.url()).await {
            return false;
        }

        // 检查期间可能已被其他事件取消
        if self.cancelled.is_cancelled() {
            return false;
        }

        match event {
            NetworkEvent::Request(request) => self.record_request(&request),
            NetworkEvent::Response(response) => self.record_response(&response),
        }
        true
    }

    /// 持续消费事件直到事件流结束
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<NetworkEvent>) {
        while let Some(event) = events.recv().await {
            self.observe(event).await;
        }
    }

    /// 是否已观察到取消
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// 当前已记录的站点快照
    pub fn sites(&self) -> Vec<Site> {
        self.sites.lock().clone()
    }

    async fn cancellation_requested(&self) -> bool {
        match self.registry.is_requested(self.job_id).await {
            Ok(false) => false,
            Ok(true) => {
                info!(job_id = self.job_id, "Cancellation observed during crawl");
                if let Err(e) = self.registry.acknowledge(self.job_id).await {
                    warn!(job_id = self.job_id, error = %e, "Failed to acknowledge cancellation");
                }
                self.cancelled.cancel();
                true
            }
            Err(e) => {
                warn!(job_id = self.job_id, error = %e, "Cancellation registry unavailable");
                false
            }
        }
    }

    fn record_request(&self, request: &InterceptedRequest) {
        let mut sites = self.sites.lock();
        let site = find_or_create(&mut sites, &request.url);

        for (name, value) in self.headers.unknown(
            HeaderDirection::Request,
            request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ) {
            site.add_request_header(name, value);
        }

        if let Ok(parsed) = Url::parse(&request.url) {
            for (key, value) in parsed.query_pairs() {
                site.add_get_param(&key, &value);
            }
        }

        if request.method.eq_ignore_ascii_case("POST") {
            if let Some(body) = &request.post_data {
                site.add_post_body(body.as_str());
            }
        }
    }

    fn record_response(&self, response: &InterceptedResponse) {
        let mut sites = self.sites.lock();
        let site = find_or_create(&mut sites, &response.url);

        for (name, value) in self.headers.unknown(
            HeaderDirection::Response,
            response.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ) {
            site.add_response_header(name, value);
        }
    }
}

fn find_or_create<'a>(sites: &'a mut Vec<Site>, url: &str) -> &'a mut Site {
    let index = match sites.iter().position(|s| s.url.eq_ignore_ascii_case(url)) {
        Some(index) => index,
        None => {
            sites.push(Site::new(url));
            sites.len() - 1
        }
    };
    &mut sites[index]
}

/// 一次爬取的输入
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub job_id: i64,
    pub url: String,
    /// 用户套餐是否允许截图
    pub screenshot: bool,
    pub headers: KnownHeaderFilter,
}

/// 正常结束的爬取结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub sites: Vec<Site>,
    /// Base64 编码的 PNG
    pub screenshot: Option<String>,
}

/// 爬取会话的结局
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Finished(CrawlReport),
    Cancelled,
}

/// 爬取会话
///
/// 一次无头浏览器访问：导航前检查目标地址，网络层拦截不安全的请求，
/// 记录流量，按需截图，最后关闭页面。
pub struct CrawlSession {
    browser: Arc<dyn BrowserEngine>,
    guard: Arc<SsrfGuard>,
    registry: Arc<dyn CancellationRegistry>,
    timeout: Duration,
}

impl CrawlSession {
    pub fn new(
        browser: Arc<dyn BrowserEngine>,
        guard: Arc<SsrfGuard>,
        registry: Arc<dyn CancellationRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            browser,
            guard,
            registry,
            timeout,
        }
    }

    /// 执行一次爬取
    ///
    /// # 参数
    ///
    /// * `request` - 爬取输入
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlOutcome::Finished)` - 正常结束
    /// * `Ok(CrawlOutcome::Cancelled)` - 爬取过程中观察到取消
    /// * `Err(EngineError)` - 目标不安全、浏览器错误、导航失败或超时
    pub async fn run(&self, request: CrawlRequest) -> Result<CrawlOutcome, EngineError> {
        self.guard.check(&request.url).await?;

        let gate: Arc<dyn RequestGate> = Arc::new(SessionGate::new(self.guard.clone()));
        let session = self.browser.open(gate.clone()).await?;
        let cancelled = CancellationToken::new();

        let recorder = Arc::new(TrafficRecorder::new(
            request.job_id,
            request.headers.clone(),
            gate,
            self.registry.clone(),
            cancelled.clone(),
        ));
        let recording = tokio::spawn({
            let recorder = recorder.clone();
            let events = session.events;
            async move { recorder.run(events).await }
        });

        let page = session.page;
        let visit = tokio::select! {
            _ = cancelled.cancelled() => Ok(None),
            result = tokio::time::timeout(self.timeout, self.visit(page.as_ref(), &request)) => {
                match result {
                    Ok(visit) => visit.map(Some),
                    Err(_) => Err(EngineError::Timeout),
                }
            }
        };

        if let Err(e) = page.close().await {
            debug!(job_id = request.job_id, error = %e, "Page close failed");
        }
        if let Err(e) = recording.await {
            warn!(job_id = request.job_id, error = %e, "Traffic recorder task failed");
        }

        if recorder.is_cancelled() {
            return Ok(CrawlOutcome::Cancelled);
        }

        let screenshot = visit?.flatten();
        Ok(CrawlOutcome::Finished(CrawlReport {
            sites: recorder.sites(),
            screenshot,
        }))
    }

    async fn visit(
        &self,
        page: &dyn BrowserPage,
        request: &CrawlRequest,
    ) -> Result<Option<String>, EngineError> {
        page.navigate(&request.url).await?;

        if !request.screenshot {
            return Ok(None);
        }

        let png = page.screenshot_full_page().await?;
        Ok(Some(BASE64.encode(png)))
    }
}
