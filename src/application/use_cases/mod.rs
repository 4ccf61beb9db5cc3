// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// - 提交扫描任务（submit_job）：校验、落库并入队
/// - 取消扫描任务（cancel_job）：登记取消并标记任务
pub mod cancel_job;
pub mod submit_job;
