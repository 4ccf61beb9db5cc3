// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::workers::worker::Worker;

/// 工作管理器
///
/// 启动工作器并在收到关闭信号后通过共享的 [`CancellationToken`] 通知它们停止
pub struct WorkerManager {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// 在独立任务中启动工作器
    pub fn spawn<W>(&mut self, worker: W)
    where
        W: Worker + 'static,
    {
        let handle = tokio::spawn(async move {
            let name = worker.name().to_string();
            info!(worker = %name, "Worker starting");
            match worker.run().await {
                Ok(()) => info!(worker = %name, "Worker finished"),
                Err(e) => error!(worker = %name, error = %e, "Worker exited with error"),
            }
        });
        self.handles.push(handle);
    }

    /// 正在运行的工作器数量
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        self.shutdown().await;
    }

    /// 通知所有工作器停止并等待它们退出
    pub async fn shutdown(&mut self) {
        info!("Shutting down workers...");
        self.shutdown.cancel();

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }

        info!("Workers shut down successfully");
    }
}
