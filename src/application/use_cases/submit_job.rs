// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use validator::Validate;

use crate::application::dto::submit_job_request::SubmitJobRequestDto;
use crate::domain::models::job::Job;
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::engines::validators::{SsrfGuard, SsrfViolation};
use crate::queue::job_queue::{JobMessage, JobQueue, QueueError};

#[derive(Error, Debug)]
pub enum SubmitJobError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Unsafe url: {0}")]
    UnsafeUrl(#[from] SsrfViolation),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// 提交扫描任务
///
/// 校验URL后以 Waiting 状态创建任务并写入任务队列
pub struct SubmitJobUseCase<JR, Q> {
    job_repo: Arc<JR>,
    queue: Arc<Q>,
    guard: Arc<SsrfGuard>,
}

impl<JR, Q> SubmitJobUseCase<JR, Q>
where
    JR: JobRepository + 'static,
    Q: JobQueue + 'static,
{
    pub fn new(job_repo: Arc<JR>, queue: Arc<Q>, guard: Arc<SsrfGuard>) -> Self {
        Self {
            job_repo,
            queue,
            guard,
        }
    }

    /// 提交任务
    ///
    /// # 参数
    ///
    /// * `user_id` - 提交者
    /// * `dto` - 提交请求
    ///
    /// # 返回值
    ///
    /// * `Ok(Job)` - 已入队的任务
    /// * `Err(SubmitJobError)` - 校验、存储或入队失败
    pub async fn execute(
        &self,
        user_id: i64,
        dto: SubmitJobRequestDto,
    ) -> Result<Job, SubmitJobError> {
        dto.validate()
            .map_err(|e| SubmitJobError::ValidationError(e.to_string()))?;

        let url = dto.url.trim().to_string();
        self.guard.check(&url).await?;

        let job = self.job_repo.create(&Job::new(url, user_id)).await?;
        self.queue.enqueue(&JobMessage::from(&job)).await?;

        info!(job_id = job.id, user_id = user_id, url = %job.url, "Job submitted");
        Ok(job)
    }
}
