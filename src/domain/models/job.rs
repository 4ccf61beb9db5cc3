// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 扫描任务实体
///
/// 表示用户提交的一次网站扫描。任务由提交流程以 `Waiting` 状态创建，
/// 之后从出队到终态的全部变更都由执行引擎完成。任务只做软删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// 任务ID，由数据库分配
    pub id: i64,
    /// 待扫描的目标URL
    pub url: String,
    /// 提交任务的用户ID
    pub user_id: i64,
    /// 当前状态
    pub status: JobStatus,
    /// 扫描结果 JSON 文本
    pub output: Option<String>,
    /// Base64 编码的整页截图
    pub screenshot: Option<String>,
    /// 软删除标记
    pub is_deleted: bool,
    pub created_at: DateTime<FixedOffset>,
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 仅在终态下存在
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Waiting → Running → Complete/Failed/Cancelled
///
/// `Waiting` 与 `Running` 都可能因取消或失败直接进入终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobStatus {
    /// 已入队，等待执行
    #[default]
    Waiting,
    /// 执行中
    Running,
    /// 扫描成功完成
    Complete,
    /// 扫描失败
    Failed,
    /// 用户取消
    Cancelled,
}

impl JobStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "Waiting"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Complete => write!(f, "Complete"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Waiting" => Ok(JobStatus::Waiting),
            "Running" => Ok(JobStatus::Running),
            "Complete" => Ok(JobStatus::Complete),
            "Failed" => Ok(JobStatus::Failed),
            "Cancelled" => Ok(JobStatus::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 当前状态不允许该转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },

    /// 存储中出现了无法识别的状态值
    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    /// 输入数据不符合领域规则
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Job {
    /// 创建一个等待执行的新任务
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `user_id` - 提交任务的用户ID
    ///
    /// # 返回值
    ///
    /// 返回 `id` 为 0 的任务，真实ID在持久化后获得
    pub fn new(url: String, user_id: i64) -> Self {
        Self {
            id: 0,
            url,
            user_id,
            status: JobStatus::Waiting,
            output: None,
            screenshot: None,
            is_deleted: false,
            created_at: Utc::now().into(),
            started_at: None,
            completed_at: None,
        }
    }

    /// 开始执行
    ///
    /// 将任务从 `Waiting` 变更为 `Running`。重新投递的 `Running` 任务
    /// 也允许再次开始，开始时间会被刷新。
    ///
    /// # 返回值
    ///
    /// * `Ok(Job)` - 进入执行中的任务
    /// * `Err(DomainError)` - 任务已处于终态
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Waiting | JobStatus::Running => {
                self.status = JobStatus::Running;
                self.started_at = Some(Utc::now().into());
                self.completed_at = None;
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Running,
            }),
        }
    }

    /// 完成任务并写入扫描结果
    ///
    /// # 参数
    ///
    /// * `output` - 序列化后的扫描结果
    /// * `screenshot` - 可选的 Base64 截图
    ///
    /// # 返回值
    ///
    /// * `Ok(Job)` - 已完成的任务
    /// * `Err(DomainError)` - 任务不在 `Running` 状态
    pub fn complete(
        mut self,
        output: String,
        screenshot: Option<String>,
    ) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Running => {
                self.status = JobStatus::Complete;
                self.output = Some(output);
                self.screenshot = screenshot;
                self.completed_at = Some(Utc::now().into());
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Complete,
            }),
        }
    }

    /// 标记任务失败
    ///
    /// 失败可以发生在开始之前，此时开始时间与完成时间相同。
    pub fn fail(mut self) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Waiting | JobStatus::Running => {
                let now: DateTime<FixedOffset> = Utc::now().into();
                self.status = JobStatus::Failed;
                self.started_at.get_or_insert(now);
                self.completed_at = Some(now);
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Failed,
            }),
        }
    }

    /// 取消任务
    pub fn cancel(mut self) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Waiting | JobStatus::Running => {
                self.status = JobStatus::Cancelled;
                self.completed_at = Some(Utc::now().into());
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Cancelled,
            }),
        }
    }

    /// 任务是否仍可被执行引擎处理
    pub fn is_runnable(&self) -> bool {
        !self.is_deleted && !self.status.is_terminal()
    }
}
