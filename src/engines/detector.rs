// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::settings::DetectorSettings;
use crate::domain::models::technology::TechnologyResult;

/// 技术检测错误
#[derive(Error, Debug)]
pub enum DetectorError {
    /// 无法启动检测进程
    #[error("Failed to spawn detector: {0}")]
    Spawn(#[source] std::io::Error),

    /// 等待进程输出时出错
    #[error("Detector io error: {0}")]
    Io(#[source] std::io::Error),

    /// 超过时限，进程已被终止
    #[error("Detector timed out after {0:?}")]
    Timeout(Duration),

    /// 进程向标准错误输出了内容
    #[error("Detector reported an error: {0}")]
    Stderr(String),

    /// 进程以非零状态退出
    #[error("Detector exited with status {0:?}")]
    ExitStatus(Option<i32>),

    /// 标准输出不是合法的检测结果
    #[error("Malformed detector output: {0}")]
    MalformedOutput(#[source] serde_json::Error),
}

/// 技术检测器特质
///
/// 检测算法本身是不透明的外部程序
#[async_trait]
pub trait TechnologyDetector: Send + Sync {
    /// 检测目标站点使用的技术
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    ///
    /// # 返回值
    ///
    /// * `Ok(TechnologyResult)` - 检测结果
    /// * `Err(DetectorError)` - 检测失败，是否重试由调用方决定
    async fn detect(&self, url: &str) -> Result<TechnologyResult, DetectorError>;
}

/// 以子进程方式运行的检测器
///
/// 执行 `{program} {script} {url}`，从标准输出读取 JSON 结果
#[derive(Debug, Clone)]
pub struct ProcessDetector {
    program: String,
    script: String,
    timeout: Duration,
}

impl ProcessDetector {
    pub fn new(program: impl Into<String>, script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &DetectorSettings) -> Self {
        Self::new(&settings.program, &settings.script, settings.timeout())
    }
}

#[async_trait]
impl TechnologyDetector for ProcessDetector {
    async fn detect(&self, url: &str) -> Result<TechnologyResult, DetectorError> {
        let child = Command::new(&self.program)
            .arg(&self.script)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DetectorError::Spawn)?;

        // 超时后 child 随 future 一起被丢弃，kill_on_drop 负责终止进程
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DetectorError::Timeout(self.timeout))?
            .map_err(DetectorError::Io)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(DetectorError::Stderr(stderr.trim().to_string()));
        }

        if !output.status.success() {
            return Err(DetectorError::ExitStatus(output.status.code()));
        }

        debug!(url = %url, bytes = output.stdout.len(), "Detector finished");
        serde_json::from_slice(&output.stdout).map_err(DetectorError::MalformedOutput)
    }
}
