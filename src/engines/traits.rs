// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::validators::SsrfViolation;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 目标URL未通过 SSRF 检查，浏览器不会被打开
    #[error("Unsafe target: {0}")]
    UnsafeTarget(#[from] SsrfViolation),
    /// 浏览器启动、连接或页面创建失败
    #[error("Browser error: {0}")]
    Browser(String),
    /// 页面导航失败
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// 截图失败
    #[error("Screenshot failed: {0}")]
    Screenshot(String),
    /// 爬取会话超时
    #[error("Timeout")]
    Timeout,
}

/// 被拦截的请求
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub post_data: Option<String>,
}

/// 被拦截的响应
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptedResponse {
    pub url: String,
    pub status: i64,
    pub headers: Vec<(String, String)>,
}

/// 页面产生的网络事件
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Request(InterceptedRequest),
    Response(InterceptedResponse),
}

impl NetworkEvent {
    pub fn url(&self) -> &str {
        match self {
            NetworkEvent::Request(request) => &request.url,
            NetworkEvent::Response(response) => &response.url,
        }
    }
}

/// 网络层请求放行判断
///
/// 浏览器在请求发出前调用，返回 `false` 时请求在网络层被中止
#[async_trait]
pub trait RequestGate: Send + Sync {
    async fn allow(&self, url: &str) -> bool;
}

/// 浏览器页面
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// 导航到目标URL并等待加载完成
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;

    /// 整页截图，返回 PNG 字节
    async fn screenshot_full_page(&self) -> Result<Vec<u8>, EngineError>;

    /// 关闭页面并停止事件转发
    async fn close(&self) -> Result<(), EngineError>;
}

/// 一次浏览器会话
///
/// `events` 在页面关闭后结束
pub struct BrowserSession {
    pub page: Box<dyn BrowserPage>,
    pub events: mpsc::UnboundedReceiver<NetworkEvent>,
}

/// 无头浏览器引擎特质
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// 打开新的页面，所有请求先经过 `gate` 判断
    ///
    /// # 参数
    ///
    /// * `gate` - 请求放行判断
    ///
    /// # 返回值
    ///
    /// * `Ok(BrowserSession)` - 页面与网络事件流
    /// * `Err(EngineError)` - 浏览器不可用
    async fn open(&self, gate: Arc<dyn RequestGate>) -> Result<BrowserSession, EngineError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
