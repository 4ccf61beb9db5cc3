// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use crate::config::settings::MetricsSettings;

/// 初始化指标系统
///
/// 安装 Prometheus 记录器并在配置的地址上提供 HTTP 抓取端点，
/// 然后注册执行引擎使用的各类指标
///
/// # 参数
///
/// * `settings` - 指标导出配置
///
/// # 返回值
///
/// * `Ok(())` - 安装成功或导出被禁用
/// * `Err(anyhow::Error)` - 地址无效或端口被占用
pub fn init_metrics(settings: &MetricsSettings) -> anyhow::Result<()> {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("invalid metrics listen address {}", settings.listen_addr))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus recorder")?;
    info!("Metrics exporter listening on {}", addr);

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("jobs_dequeued_total", "Total number of job messages received");
    describe_counter!(
        "jobs_requeued_total",
        "Total number of job messages pushed back to the queue"
    );
    describe_counter!("jobs_completed_total", "Total number of jobs completed");
    describe_counter!("jobs_failed_total", "Total number of jobs failed");
    describe_counter!("jobs_cancelled_total", "Total number of jobs cancelled");
    describe_counter!(
        "ssrf_blocked_requests_total",
        "Total number of urls rejected by the SSRF guard"
    );
    describe_histogram!(
        "crawl_duration_seconds",
        Unit::Seconds,
        "Duration of browser crawl sessions in seconds"
    );
    describe_gauge!("engine_active_crawls", "Number of crawl sessions in flight");
    describe_gauge!(
        "system_memory_usage_ratio",
        "Current memory usage ratio (0.0 to 1.0)"
    );
}
