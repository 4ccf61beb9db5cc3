// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::gauge;
use parking_lot::Mutex;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

/// 资源监控特质
pub trait ResourceMonitor: Send + Sync {
    /// 当前内存使用率，取值范围 `[0, 1]`
    fn memory_utilization(&self) -> f64;
}

/// 基于 sysinfo 的系统资源监控
///
/// 使用率按 `(总内存 - 可用内存) / 总内存` 计算
pub struct SystemResourceMonitor {
    system: Mutex<System>,
}

impl SystemResourceMonitor {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMonitor for SystemResourceMonitor {
    fn memory_utilization(&self) -> f64 {
        let mut sys = self.system.lock();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            warn!("Total memory reported as zero");
            return 0.0;
        }

        let used = total.saturating_sub(sys.available_memory());
        let ratio = (used as f64 / total as f64).clamp(0.0, 1.0);
        gauge!("system_memory_usage_ratio").set(ratio);
        ratio
    }
}
