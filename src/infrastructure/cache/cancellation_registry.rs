// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use dashmap::DashSet;

use super::redis_client::RedisClient;
use crate::domain::services::cancellation::{CancellationError, CancellationRegistry};

/// 基于 Redis 集合的取消登记
///
/// 与提交取消请求的 API 进程共享同一个集合键（默认 `job:cancel`），
/// 成员为十进制任务ID。
#[derive(Clone)]
pub struct RedisCancellationRegistry {
    redis: RedisClient,
    key: String,
}

impl RedisCancellationRegistry {
    pub fn new(redis: RedisClient, key: impl Into<String>) -> Self {
        Self {
            redis,
            key: key.into(),
        }
    }
}

fn backend(e: anyhow::Error) -> CancellationError {
    CancellationError::Backend(format!("{:#}", e))
}

#[async_trait]
impl CancellationRegistry for RedisCancellationRegistry {
    async fn request(&self, job_id: i64) -> Result<(), CancellationError> {
        self.redis
            .sadd(&self.key, &job_id.to_string())
            .await
            .map_err(backend)
    }

    async fn is_requested(&self, job_id: i64) -> Result<bool, CancellationError> {
        self.redis
            .sismember(&self.key, &job_id.to_string())
            .await
            .map_err(backend)
    }

    async fn acknowledge(&self, job_id: i64) -> Result<(), CancellationError> {
        self.redis
            .srem(&self.key, &job_id.to_string())
            .await
            .map_err(backend)
    }
}

/// 进程内取消登记
///
/// 单进程部署或测试时使用
#[derive(Debug, Default)]
pub struct LocalCancellationRegistry {
    flagged: DashSet<i64>,
}

impl LocalCancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前登记的任务数量
    pub fn len(&self) -> usize {
        self.flagged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }
}

#[async_trait]
impl CancellationRegistry for LocalCancellationRegistry {
    async fn request(&self, job_id: i64) -> Result<(), CancellationError> {
        self.flagged.insert(job_id);
        Ok(())
    }

    async fn is_requested(&self, job_id: i64) -> Result<bool, CancellationError> {
        Ok(self.flagged.contains(&job_id))
    }

    async fn acknowledge(&self, job_id: i64) -> Result<(), CancellationError> {
        self.flagged.remove(&job_id);
        Ok(())
    }
}
