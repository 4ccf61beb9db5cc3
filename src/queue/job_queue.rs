// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::models::job::{Job, JobStatus};
use crate::infrastructure::cache::redis_client::RedisClient;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 与队列后端通信失败
    #[error("Queue transport error: {0}")]
    Transport(String),

    /// 消息序列化失败
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 收到无法解析的消息，消息已被丢弃
    #[error("Malformed message dropped: {source}")]
    Malformed {
        payload: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<anyhow::Error> for QueueError {
    fn from(e: anyhow::Error) -> Self {
        QueueError::Transport(format!("{:#}", e))
    }
}

/// 队列中的任务消息
///
/// 与提交流程共享的 JSON 结构，字段使用 camelCase。
/// `attempt` 记录技术检测失败后的重新入队次数，不写回任务记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub started_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub attempt: u32,
}

impl JobMessage {
    /// 序列化为队列负载
    pub fn to_payload(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    /// 从队列负载解析消息
    pub fn from_payload(payload: &str) -> Result<Self, QueueError> {
        serde_json::from_str(payload).map_err(|source| QueueError::Malformed {
            payload: payload.to_string(),
            source,
        })
    }

    /// 生成检测失败后重新入队的消息
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

impl From<&Job> for JobMessage {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            url: job.url.clone(),
            user_id: job.user_id,
            output: job.output.clone(),
            screenshot: job.screenshot.clone(),
            status: job.status,
            created_at: Some(job.created_at),
            started_at: job.started_at,
            completed_at: job.completed_at,
            attempt: 0,
        }
    }
}

/// 一次投递
///
/// 保留原始负载，重新入队时原样推回，确认时按负载匹配。
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: JobMessage,
    pub payload: String,
}

/// 任务队列特质
///
/// 至少一次投递：`receive` 取出的消息在 `ack` 之前仍由后端保留，
/// 进程崩溃后可通过 `recover` 重新投递。
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 推入原始负载
    async fn publish(&self, payload: &str) -> Result<(), QueueError>;

    /// 入队任务消息
    ///
    /// # 参数
    ///
    /// * `message` - 要入队的消息
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 已持久化
    /// * `Err(QueueError)` - 传输或序列化失败，由调用方重试
    async fn enqueue(&self, message: &JobMessage) -> Result<(), QueueError> {
        let payload = message.to_payload()?;
        self.publish(&payload).await
    }

    /// 取出下一条消息，队列为空时返回 `None`
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;

    /// 确认消息已处理完毕
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// 将未确认的消息放回队列，返回恢复的数量
    async fn recover(&self) -> Result<u64, QueueError>;
}

#[async_trait]
impl<T: JobQueue + ?Sized> JobQueue for Arc<T> {
    async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        (**self).publish(payload).await
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        (**self).receive().await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).ack(delivery).await
    }

    async fn recover(&self) -> Result<u64, QueueError> {
        (**self).recover().await
    }
}

/// 消息处理器特质
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// 处理一条投递，错误由处理器自行记录
    async fn handle(&self, delivery: Delivery);
}

/// 订阅队列直到收到停机信号
///
/// 每条消息调用一次处理器。后端错误与无法解析的消息只记录日志，
/// 不会终止订阅。
///
/// # 参数
///
/// * `queue` - 任务队列
/// * `handler` - 消息处理器
/// * `poll_interval` - 队列为空或后端出错时的等待间隔
/// * `shutdown` - 停机信号
pub async fn subscribe<Q, H>(
    queue: &Q,
    handler: &H,
    poll_interval: Duration,
    shutdown: CancellationToken,
) where
    Q: JobQueue + ?Sized,
    H: DeliveryHandler + ?Sized,
{
    info!("Subscribed to job queue");

    while !shutdown.is_cancelled() {
        let idle = match queue.receive().await {
            Ok(Some(delivery)) => {
                debug!(job_id = delivery.message.id, "Received job message");
                handler.handle(delivery).await;
                false
            }
            Ok(None) => true,
            Err(QueueError::Malformed { payload, source }) => {
                warn!(error = %source, payload = %payload, "Dropping malformed job message");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to receive job message");
                true
            }
        };

        if idle {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    info!("Job queue subscription stopped");
}

/// 基于 Redis 列表的任务队列
///
/// 生产者 `LPUSH` 到队列键，消费者用 `LMOVE` 从右端取出并放入
/// 自己的处理中列表 `{queue}:processing:{consumer}`，确认时从处理中列表删除。
#[derive(Clone)]
pub struct RedisJobQueue {
    redis: RedisClient,
    queue_key: String,
    processing_key: String,
}

impl RedisJobQueue {
    /// 创建新的 Redis 任务队列
    ///
    /// # 参数
    ///
    /// * `redis` - Redis客户端
    /// * `name` - 队列名称
    /// * `consumer` - 消费者名称
    pub fn new(redis: RedisClient, name: &str, consumer: &str) -> Self {
        Self {
            redis,
            queue_key: name.to_string(),
            processing_key: format!("{}:processing:{}", name, consumer),
        }
    }

    /// 当前排队中的消息数量
    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.redis.llen(&self.queue_key).await?)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        self.redis.lpush(&self.queue_key, payload).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let payload = self
            .redis
            .lmove(
                &self.queue_key,
                &self.processing_key,
                redis::Direction::Right,
                redis::Direction::Left,
            )
            .await?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match JobMessage::from_payload(&payload) {
            Ok(message) => Ok(Some(Delivery { message, payload })),
            Err(e) => {
                self.redis.lrem(&self.processing_key, &payload).await?;
                Err(e)
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.redis
            .lrem(&self.processing_key, &delivery.payload)
            .await?;
        Ok(())
    }

    async fn recover(&self) -> Result<u64, QueueError> {
        let mut recovered = 0;
        while self
            .redis
            .lmove(
                &self.processing_key,
                &self.queue_key,
                redis::Direction::Right,
                redis::Direction::Right,
            )
            .await?
            .is_some()
        {
            recovered += 1;
        }
        Ok(recovered)
    }
}
