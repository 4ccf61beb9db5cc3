// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, ErrorReason, EventResponseReceived, Headers, PostDataEntry,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::settings::BrowserSettings;
use crate::engines::traits::{
    BrowserEngine, BrowserPage, BrowserSession, EngineError, InterceptedRequest,
    InterceptedResponse, NetworkEvent, RequestGate,
};

/// 基于 chromiumoxide 的浏览器引擎
///
/// 进程内共享一个浏览器实例，首次打开页面时启动或连接。
/// 每次会话使用独立的页面，通过 CDP Fetch 域在网络层拦截请求。
pub struct ChromiumEngine {
    settings: BrowserSettings,
    browser: OnceCell<Browser>,
}

impl ChromiumEngine {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            browser: OnceCell::new(),
        }
    }

    async fn browser(&self) -> Result<&Browser, EngineError> {
        self.browser
            .get_or_try_init(|| async {
                let remote = self.settings.remote_debugging_url.as_ref();
                let (browser, mut handler) = if let Some(url) = remote {
                    info!("Connecting to remote Chrome instance at: {}", url);
                    Browser::connect(url).await.map_err(|e| {
                        EngineError::Browser(format!("Failed to connect to remote Chrome: {}", e))
                    })?
                } else {
                    let mut builder = BrowserConfig::builder()
                        .no_sandbox()
                        .request_timeout(self.settings.request_timeout())
                        .arg("--disable-gpu")
                        .arg("--disable-dev-shm-usage");
                    if !self.settings.headless {
                        builder = builder.with_head();
                    }

                    Browser::launch(builder.build().map_err(EngineError::Browser)?)
                        .await
                        .map_err(|e| EngineError::Browser(e.to_string()))?
                };

                // Spawn a handler to process browser events
                tokio::spawn(async move {
                    while let Some(h) = handler.next().await {
                        if h.is_err() {
                            break;
                        }
                    }
                });

                Ok(browser)
            })
            .await
    }
}

/// CDP 请求头对象转换为名称与值的列表，非字符串值按 JSON 文本保留
pub(crate) fn header_pairs(headers: &Headers) -> Vec<(String, String)> {
    headers
        .inner()
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(name, value)| {
                    let value = match value.as_str() {
                        Some(s) => s.to_string(),
                        None => value.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// 拼接请求体分段
///
/// CDP 以 base64 传输每个分段，无法解码的分段被跳过
pub(crate) fn post_body(entries: Option<&Vec<PostDataEntry>>) -> Option<String> {
    let entries = entries?;
    let mut body = Vec::new();

    for entry in entries {
        let Some(bytes) = entry.bytes.as_ref() else {
            continue;
        };
        let encoded = match serde_json::to_value(bytes) {
            Ok(serde_json::Value::String(encoded)) => encoded,
            _ => continue,
        };
        match BASE64.decode(encoded.as_bytes()) {
            Ok(decoded) => body.extend_from_slice(&decoded),
            Err(e) => debug!(error = %e, "Skipping undecodable post data entry"),
        }
    }

    if body.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&body).into_owned())
}

fn browser_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Browser(e.to_string())
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open(&self, gate: Arc<dyn RequestGate>) -> Result<BrowserSession, EngineError> {
        let browser = self.browser().await?;
        let page = browser.new_page("about:blank").await.map_err(browser_err)?;

        let setup = async {
            let paused = page.event_listener::<EventRequestPaused>().await?;
            let responses = page.event_listener::<EventResponseReceived>().await?;
            page.execute(network::EnableParams::default()).await?;
            page.execute(fetch::EnableParams::default()).await?;
            Ok::<_, CdpError>((paused, responses))
        };

        let (mut paused, mut responses) = match setup.await {
            Ok(streams) => streams,
            Err(e) => {
                // 页面已经创建，初始化失败时必须关闭
                if let Err(close_err) = page.clone().close().await {
                    warn!(error = %close_err, "Failed to close page after setup error");
                }
                return Err(browser_err(e));
            }
        };

        let (tx, events) = mpsc::unbounded_channel();

        let intercept_page = page.clone();
        let request_tx = tx.clone();
        let interceptor = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request = &event.request;
                let allowed = gate.allow(&request.url).await;

                let _ = request_tx.send(NetworkEvent::Request(InterceptedRequest {
                    url: request.url.clone(),
                    method: request.method.clone(),
                    headers: header_pairs(&request.headers),
                    post_data: post_body(request.post_data_entries.as_ref()),
                }));

                let result = if allowed {
                    intercept_page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                } else {
                    debug!(url = %request.url, "Aborting blocked request");
                    intercept_page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                };

                if let Err(e) = result {
                    debug!(url = %request.url, error = %e, "Failed to resolve paused request");
                }
            }
        });

        let response_tx = tx;
        let listener = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let response = &event.response;
                let _ = response_tx.send(NetworkEvent::Response(InterceptedResponse {
                    url: response.url.clone(),
                    status: response.status,
                    headers: header_pairs(&response.headers),
                }));
            }
        });

        Ok(BrowserSession {
            page: Box::new(ChromiumPage {
                page,
                tasks: Mutex::new(vec![interceptor, listener]),
            }),
            events,
        })
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// chromiumoxide 页面
struct ChromiumPage {
    page: Page,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>, EngineError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        self.page
            .screenshot(params)
            .await
            .map_err(|e| EngineError::Screenshot(e.to_string()))
    }

    async fn close(&self) -> Result<(), EngineError> {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        if let Err(e) = self.page.clone().close().await {
            warn!(error = %e, "Failed to close page");
            return Err(browser_err(e));
        }
        Ok(())
    }
}
