// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 提供 Redis 客户端以及基于 Redis 集合的取消登记
pub mod cancellation_registry;
pub mod redis_client;
