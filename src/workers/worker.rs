// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use async_trait::async_trait;

/// 后台工作器特质
///
/// 由 [`WorkerManager`](super::manager::WorkerManager) 在独立任务中运行
#[async_trait]
pub trait Worker: Send + Sync {
    /// 运行工作器直到停机信号触发
    ///
    /// 返回前需要等待自己启动的处理任务全部结束
    async fn run(&self) -> Result<(), WorkerError>;

    /// 工作器名称，用于日志
    fn name(&self) -> &str;
}
