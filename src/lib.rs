// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 任务提交与取消用例
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// SSRF 防护、技术检测与无头浏览器爬取
pub mod engines;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、Redis 与指标导出
pub mod infrastructure;

/// 队列模块
///
/// 实现至少一次投递的任务队列
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 扫描任务执行引擎和工作器管理
pub mod workers;
