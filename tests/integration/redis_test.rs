// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use testcontainers::core::WaitFor;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

use techscan::domain::models::job::Job;
use techscan::domain::services::cancellation::CancellationRegistry;
use techscan::infrastructure::cache::cancellation_registry::RedisCancellationRegistry;
use techscan::infrastructure::cache::redis_client::RedisClient;
use techscan::queue::job_queue::{JobMessage, JobQueue, RedisJobQueue};

async fn start_redis() -> (ContainerAsync<GenericImage>, RedisClient) {
    let node = GenericImage::new("redis", "7-alpine")
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start Redis");
    let port = node
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis port");

    let client = RedisClient::new(&format!("redis://127.0.0.1:{}", port)).unwrap();
    client.ping().await.unwrap();
    (node, client)
}

fn message(id: i64) -> JobMessage {
    let mut job = Job::new(format!("https://example.com/{}", id), 7);
    job.id = id;
    JobMessage::from(&job)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_queue_is_fifo_and_keeps_unacked_messages() {
    let (_node, redis) = start_redis().await;
    let queue = RedisJobQueue::new(redis.clone(), "jobs", "worker-a");

    queue.enqueue(&message(1)).await.unwrap();
    queue.enqueue(&message(2)).await.unwrap();
    assert_eq!(queue.len().await.unwrap(), 2);

    let first = queue.receive().await.unwrap().unwrap();
    assert_eq!(first.message.id, 1);
    queue.ack(&first).await.unwrap();

    let second = queue.receive().await.unwrap().unwrap();
    assert_eq!(second.message.id, 2);
    assert!(queue.receive().await.unwrap().is_none());

    // 未确认的消息在恢复后重新投递
    assert_eq!(queue.recover().await.unwrap(), 1);
    let again = queue.receive().await.unwrap().unwrap();
    assert_eq!(again, second);
    queue.ack(&again).await.unwrap();

    assert_eq!(queue.recover().await.unwrap(), 0);
    assert_eq!(redis.llen("jobs:processing:worker-a").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_malformed_message_is_dropped() {
    let (_node, redis) = start_redis().await;
    let queue = RedisJobQueue::new(redis.clone(), "jobs", "worker-a");

    queue.publish("not json").await.unwrap();
    assert!(queue.receive().await.is_err());
    assert_eq!(queue.len().await.unwrap(), 0);
    assert_eq!(queue.recover().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_cancellation_registry_round_trip() {
    let (_node, redis) = start_redis().await;
    let registry = RedisCancellationRegistry::new(redis, "job:cancel");

    assert!(!registry.is_requested(5).await.unwrap());
    registry.request(5).await.unwrap();
    registry.request(5).await.unwrap();
    assert!(registry.is_requested(5).await.unwrap());
    assert!(!registry.is_requested(6).await.unwrap());

    registry.acknowledge(5).await.unwrap();
    assert!(!registry.is_requested(5).await.unwrap());
    // 重复确认不报错
    registry.acknowledge(5).await.unwrap();
}
