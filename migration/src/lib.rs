// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_scan_tables;
mod m20250301_000002_seed_known_headers;

/// 数据库迁移器
///
/// 按顺序创建扫描任务、已知请求头、套餐与用户表，并写入默认的已知请求头
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_scan_tables::Migration),
            Box::new(m20250301_000002_seed_known_headers::Migration),
        ]
    }
}
