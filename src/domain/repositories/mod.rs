// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 任务仓库（job_repository）：扫描任务的读取与事务性更新
/// - 已知请求头仓库（known_header_repository）：加载未删除的已知请求头
/// - 套餐仓库（plan_repository）：查询用户套餐是否允许截图
pub mod job_repository;
pub mod known_header_repository;
pub mod plan_repository;
