// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含任务提交与取消两个用例，以及对应的请求 DTO
pub mod dto;
pub mod use_cases;
