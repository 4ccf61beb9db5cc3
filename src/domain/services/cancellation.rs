// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 取消登记错误
#[derive(Error, Debug)]
pub enum CancellationError {
    /// 共享存储不可用
    #[error("Cancellation backend error: {0}")]
    Backend(String),
}

/// 取消登记特质
///
/// 一个按任务ID索引、可并发访问的集合。取消流程写入任务ID，
/// 执行引擎在爬取过程中查询该集合，观察到后将其移除。
#[async_trait]
pub trait CancellationRegistry: Send + Sync {
    /// 登记取消请求
    ///
    /// # 参数
    ///
    /// * `job_id` - 要取消的任务ID
    async fn request(&self, job_id: i64) -> Result<(), CancellationError>;

    /// 查询任务是否被要求取消
    async fn is_requested(&self, job_id: i64) -> Result<bool, CancellationError>;

    /// 移除取消标记
    ///
    /// 引擎观察到取消后调用；任务进入终态后也会调用以回收从未被观察到的标记。
    /// 对不存在的标记调用不会报错。
    async fn acknowledge(&self, job_id: i64) -> Result<(), CancellationError>;
}

#[async_trait]
impl<T: CancellationRegistry + ?Sized> CancellationRegistry for Arc<T> {
    async fn request(&self, job_id: i64) -> Result<(), CancellationError> {
        (**self).request(job_id).await
    }

    async fn is_requested(&self, job_id: i64) -> Result<bool, CancellationError> {
        (**self).is_requested(job_id).await
    }

    async fn acknowledge(&self, job_id: i64) -> Result<(), CancellationError> {
        (**self).acknowledge(job_id).await
    }
}
