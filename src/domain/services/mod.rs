// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 取消登记（cancellation）：按任务ID记录的取消请求集合
/// - 请求头过滤（header_filter）：按方向判断请求头是否为已知标准头
pub mod cancellation;
pub mod header_filter;
