// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use metrics::counter;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::lookup_host;
use tracing::{debug, warn};
use url::{Host, Url};

use crate::config::settings::SsrfSettings;

/// 内部网络使用的域名后缀
const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".corp", ".intranet"];

/// SSRF 检查未通过的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SsrfViolation {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("scheme {0} is not allowed")]
    UnsupportedScheme(String),
    #[error("url has no host")]
    MissingHost,
    #[error("internal host {0} is not allowed")]
    InternalHost(String),
    #[error("host {0} is in denylist")]
    Denylisted(String),
    #[error("host {host} resolves to private address {ip}")]
    PrivateAddress { host: String, ip: IpAddr },
    #[error("failed to resolve {host}: {reason}")]
    Resolution { host: String, reason: String },
}

/// 域名解析特质
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// 解析主机名得到全部地址
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// 使用系统 DNS 的解析器
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// SSRF 防护
///
/// 只允许访问公网 http/https 地址。任何解析或检查错误都视为不安全。
#[derive(Clone)]
pub struct SsrfGuard {
    enabled: bool,
    denylist: Vec<String>,
    resolver: Arc<dyn HostResolver>,
}

impl SsrfGuard {
    /// 创建新的 SSRF 防护实例
    ///
    /// # 参数
    ///
    /// * `settings` - SSRF 配置
    /// * `resolver` - 域名解析器
    pub fn new(settings: &SsrfSettings, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            enabled: settings.enabled,
            denylist: settings
                .denylist
                .iter()
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            resolver,
        }
    }

    /// 检查 URL 是否可以访问
    ///
    /// # 参数
    ///
    /// * `url_str` - 待检查的URL
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 可以访问
    /// * `Err(SsrfViolation)` - 拒绝原因
    pub async fn check(&self, url_str: &str) -> Result<(), SsrfViolation> {
        let url = Url::parse(url_str).map_err(|e| SsrfViolation::InvalidUrl(e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SsrfViolation::UnsupportedScheme(url.scheme().to_string()));
        }

        if !self.enabled {
            return Ok(());
        }

        let host = url.host().ok_or(SsrfViolation::MissingHost)?;
        let ips = match host {
            Host::Ipv4(ip) => vec![IpAddr::V4(ip)],
            Host::Ipv6(ip) => vec![IpAddr::V6(ip)],
            Host::Domain(domain) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                if is_internal_host(&domain) {
                    return Err(SsrfViolation::InternalHost(domain));
                }
                if self.is_denylisted(&domain) {
                    return Err(SsrfViolation::Denylisted(domain));
                }

                let port = url.port_or_known_default().unwrap_or(80);
                let ips = self.resolver.resolve(&domain, port).await.map_err(|e| {
                    SsrfViolation::Resolution {
                        host: domain.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if ips.is_empty() {
                    return Err(SsrfViolation::Resolution {
                        host: domain,
                        reason: "no addresses".to_string(),
                    });
                }
                ips
            }
        };

        for ip in ips {
            if is_private_ip(ip) {
                return Err(SsrfViolation::PrivateAddress {
                    host: url.host_str().unwrap_or_default().to_string(),
                    ip,
                });
            }
        }

        Ok(())
    }

    /// 判断 URL 是否安全
    ///
    /// 拒绝时记录日志并累加 `ssrf_blocked_requests_total`
    pub async fn is_url_safe(&self, url: &str) -> bool {
        match self.check(url).await {
            Ok(()) => true,
            Err(violation) => {
                debug!(url = %url, reason = %violation, "Blocked unsafe url");
                counter!("ssrf_blocked_requests_total").increment(1);
                false
            }
        }
    }

    /// 将 URL 的主机解析为 IP 字符串列表
    ///
    /// 解析失败时返回空列表
    pub async fn resolve_to_ips(&self, url_str: &str) -> Vec<String> {
        let url = match Url::parse(url_str) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %url_str, error = %e, "Cannot resolve invalid url");
                return Vec::new();
            }
        };

        match url.host() {
            Some(Host::Ipv4(ip)) => vec![ip.to_string()],
            Some(Host::Ipv6(ip)) => vec![ip.to_string()],
            Some(Host::Domain(domain)) => {
                let port = url.port_or_known_default().unwrap_or(80);
                match self.resolver.resolve(domain, port).await {
                    Ok(ips) => {
                        let mut out: Vec<String> = Vec::with_capacity(ips.len());
                        for ip in ips {
                            let ip = ip.to_string();
                            if !out.contains(&ip) {
                                out.push(ip);
                            }
                        }
                        out
                    }
                    Err(e) => {
                        warn!(host = %domain, error = %e, "Failed to resolve host");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        }
    }

    fn is_denylisted(&self, host: &str) -> bool {
        self.denylist
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{}", domain)))
    }
}

fn is_internal_host(host: &str) -> bool {
    host == "localhost" || INTERNAL_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

/// 判断地址是否属于内网、环回、链路本地等不可访问范围
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            // 0.0.0.0/8
            if octets[0] == 0 {
                return true;
            }
            // 10.0.0.0/8
            if octets[0] == 10 {
                return true;
            }
            // 172.16.0.0/12
            if octets[0] == 172 && (16..=31).contains(&octets[1]) {
                return true;
            }
            // 192.168.0.0/16
            if octets[0] == 192 && octets[1] == 168 {
                return true;
            }
            // 127.0.0.0/8 (Loopback)
            if ipv4.is_loopback() {
                return true;
            }
            // 169.254.0.0/16 (Link-local)
            if ipv4.is_link_local() {
                return true;
            }
            // 224.0.0.0/4 (Multicast)
            if (224..=239).contains(&octets[0]) {
                return true;
            }
            false
        }
        IpAddr::V6(ipv6) => {
            // ::ffff:a.b.c.d
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(mapped));
            }
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            // Unique Local Address (fc00::/7)
            if (ipv6.segments()[0] & 0xfe00) == 0xfc00 {
                return true;
            }
            // Link-local (fe80::/10)
            if (ipv6.segments()[0] & 0xffc0) == 0xfe80 {
                return true;
            }
            // Multicast (ff00::/8)
            if (ipv6.segments()[0] & 0xff00) == 0xff00 {
                return true;
            }
            false
        }
    }
}
