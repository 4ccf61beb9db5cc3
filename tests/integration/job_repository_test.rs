// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tempfile::TempDir;

use migration::{Migrator, MigratorTrait};
use techscan::config::settings::DatabaseSettings;
use techscan::domain::models::job::{Job, JobStatus};
use techscan::domain::models::known_header::HeaderDirection;
use techscan::domain::repositories::job_repository::{JobRepository, RepositoryError};
use techscan::domain::repositories::known_header_repository::KnownHeaderRepository;
use techscan::domain::repositories::plan_repository::PlanRepository;
use techscan::domain::services::header_filter::KnownHeaderFilter;
use techscan::infrastructure::database::connection;
use techscan::infrastructure::database::entities::{known_header, plan, user};
use techscan::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use techscan::infrastructure::repositories::known_header_repo_impl::KnownHeaderRepositoryImpl;
use techscan::infrastructure::repositories::plan_repo_impl::PlanRepositoryImpl;

/// 基于临时 SQLite 文件的任务库，目录在测试结束时删除
async fn setup_db() -> (TempDir, Arc<DatabaseConnection>) {
    let dir = tempfile::tempdir().unwrap();
    let settings = DatabaseSettings {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("jobs.db").display()),
        max_connections: Some(1),
        min_connections: None,
        connect_timeout: Some(5),
        idle_timeout: None,
        run_migrations: true,
    };

    let db = connection::create_pool(&settings).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    (dir, Arc::new(db))
}

async fn insert_plan(db: &DatabaseConnection, id: i64, screenshot: bool) {
    plan::ActiveModel {
        id: Set(id),
        name: Set(format!("plan-{}", id)),
        screenshot: Set(screenshot),
        is_deleted: Set(false),
    }
    .insert(db)
    .await
    .unwrap();
}

async fn insert_user(db: &DatabaseConnection, id: i64, plan_id: i64, verified: bool) {
    user::ActiveModel {
        id: Set(id),
        plan_id: Set(plan_id),
        is_verified: Set(verified),
        is_disabled: Set(false),
        is_deleted: Set(false),
    }
    .insert(db)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_job_lifecycle_is_persisted() {
    let (_dir, db) = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    let created = repo
        .create(&Job::new("https://example.com".to_string(), 7))
        .await
        .unwrap();
    assert!(created.id > 0);
    assert_eq!(created.status, JobStatus::Waiting);

    let running = repo.update(&created.clone().start().unwrap()).await.unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert!(running.started_at.is_some());

    let output = r#"{"Sites":[],"Technology":[],"IPAddresses":[]}"#.to_string();
    repo.update(&running.complete(output.clone(), None).unwrap())
        .await
        .unwrap();

    let stored = repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Complete);
    assert_eq!(stored.output, Some(output));
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.user_id, 7);
}

#[tokio::test]
async fn test_find_missing_job_returns_none() {
    let (_dir, db) = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    assert!(repo.find_by_id(404).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_missing_job_is_not_found() {
    let (_dir, db) = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    let mut ghost = Job::new("https://example.com".to_string(), 7);
    ghost.id = 404;

    let result = repo.update(&ghost.fail().unwrap()).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn test_finalized_job_rejects_late_writes() {
    let (_dir, db) = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    let created = repo
        .create(&Job::new("https://example.com".to_string(), 7))
        .await
        .unwrap();
    let running = repo.update(&created.clone().start().unwrap()).await.unwrap();

    // 取消流程先写入终态，工作器随后基于旧快照写入完成结果
    repo.update(&running.clone().cancel().unwrap()).await.unwrap();
    let late = running.complete("{}".to_string(), None).unwrap();
    let result = repo.update(&late).await;
    assert!(matches!(
        result,
        Err(RepositoryError::Finalized(JobStatus::Cancelled))
    ));

    let stored = repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert!(stored.output.is_none());
}

#[tokio::test]
async fn test_seeded_known_headers_are_active() {
    let (_dir, db) = setup_db().await;
    let repo = KnownHeaderRepositoryImpl::new(db);

    let headers = repo.find_active().await.unwrap();
    assert!(headers
        .iter()
        .any(|h| h.name == "user-agent" && h.direction == HeaderDirection::Request));
    assert!(headers
        .iter()
        .any(|h| h.name == "content-type" && h.direction == HeaderDirection::Response));

    let filter = KnownHeaderFilter::new(&headers);
    assert!(filter.is_known(HeaderDirection::Request, "User-Agent"));
    assert!(!filter.is_known(HeaderDirection::Response, "X-Served-By"));
}

#[tokio::test]
async fn test_deleted_known_headers_are_ignored() {
    let (_dir, db) = setup_db().await;

    known_header::ActiveModel {
        name: Set("x-legacy".to_string()),
        direction: Set("response".to_string()),
        is_deleted: Set(true),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    }
    .insert(db.as_ref())
    .await
    .unwrap();

    let repo = KnownHeaderRepositoryImpl::new(db);
    let headers = repo.find_active().await.unwrap();
    assert!(!headers.iter().any(|h| h.name == "x-legacy"));
}

#[tokio::test]
async fn test_screenshot_entitlement_follows_plan() {
    let (_dir, db) = setup_db().await;
    insert_plan(&db, 1, true).await;
    insert_plan(&db, 2, false).await;
    insert_user(&db, 10, 1, true).await;
    insert_user(&db, 11, 2, true).await;
    insert_user(&db, 12, 1, false).await;

    let repo = PlanRepositoryImpl::new(db);
    assert!(repo.screenshot_allowed(10).await.unwrap());
    assert!(!repo.screenshot_allowed(11).await.unwrap());
    // 未验证的用户不享受套餐权益
    assert!(!repo.screenshot_allowed(12).await.unwrap());
    assert!(!repo.screenshot_allowed(99).await.unwrap());
}
