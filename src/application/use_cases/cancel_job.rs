// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::models::job::{DomainError, Job, JobStatus};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::domain::services::cancellation::{CancellationError, CancellationRegistry};

#[derive(Error, Debug)]
pub enum CancelJobError {
    #[error("Job not found")]
    NotFound,
    #[error("Job already finished with status {0}")]
    AlreadyFinished(JobStatus),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Cancellation error: {0}")]
    Cancellation(#[from] CancellationError),
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// 取消扫描任务
///
/// 先在取消登记中写入任务ID，正在运行的爬取会在下一个网络事件时停止；
/// 随后把任务标记为 Cancelled。
pub struct CancelJobUseCase<JR, CR> {
    job_repo: Arc<JR>,
    registry: Arc<CR>,
}

impl<JR, CR> CancelJobUseCase<JR, CR>
where
    JR: JobRepository + 'static,
    CR: CancellationRegistry + 'static,
{
    pub fn new(job_repo: Arc<JR>, registry: Arc<CR>) -> Self {
        Self { job_repo, registry }
    }

    pub async fn execute(&self, user_id: i64, job_id: i64) -> Result<Job, CancelJobError> {
        let job = self
            .job_repo
            .find_by_id(job_id)
            .await?
            .filter(|job| job.user_id == user_id && !job.is_deleted)
            .ok_or(CancelJobError::NotFound)?;

        if job.status.is_terminal() {
            return Err(CancelJobError::AlreadyFinished(job.status));
        }

        self.registry.request(job.id).await?;
        let id = job.id;
        let cancelled = match self.job_repo.update(&job.cancel()?).await {
            Ok(cancelled) => cancelled,
            // 工作器在读取之后写入了终态，标记不会再被消费
            Err(RepositoryError::Finalized(status)) => {
                if let Err(e) = self.registry.acknowledge(id).await {
                    warn!(job_id = id, error = %e, "Failed to clear cancellation marker");
                }
                return Err(CancelJobError::AlreadyFinished(status));
            }
            Err(e) => return Err(e.into()),
        };

        info!(job_id = cancelled.id, user_id = user_id, "Job cancelled");
        Ok(cancelled)
    }
}
