// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 引擎模块
///
/// - 浏览器引擎（traits、chromium_engine）：页面导航、截图与网络拦截
/// - 爬取会话（crawl_session）：一次浏览器访问及流量记录
/// - 技术检测（detector）：调用外部检测程序
/// - SSRF 防护（validators）：判断目标地址是否可以访问
pub mod chromium_engine;
pub mod crawl_session;
pub mod detector;
pub mod traits;
pub mod validators;
