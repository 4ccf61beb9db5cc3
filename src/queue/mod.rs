// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供扫描任务消息的持久化队列与订阅循环
pub mod job_queue;
