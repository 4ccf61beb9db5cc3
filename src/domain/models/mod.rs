// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 扫描任务（job）：用户提交的一次扫描及其状态机
/// - 流量记录（site）：爬取过程中按URL聚合的请求头、参数与扫描结果
/// - 技术检测结果（technology）：外部检测器的输出
/// - 已知请求头（known_header）：按方向划分的标准请求头
pub mod job;
pub mod known_header;
pub mod site;
pub mod technology;
