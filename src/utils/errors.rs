// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::models::job::DomainError;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::services::cancellation::CancellationError;
use crate::engines::detector::DetectorError;
use crate::engines::traits::EngineError;
use crate::queue::job_queue::QueueError;

/// Worker错误类型
///
/// 单个任务处理过程中的错误，全部在引擎内部记录并转为任务失败，
/// 不会传播到队列订阅循环
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),

    #[error("技术检测错误: {0}")]
    Detector(#[from] DetectorError),

    #[error("爬取错误: {0}")]
    Engine(#[from] EngineError),

    #[error("领域错误: {0}")]
    Domain(#[from] DomainError),

    #[error("取消登记错误: {0}")]
    Cancellation(#[from] CancellationError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}
