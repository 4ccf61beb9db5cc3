// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use crate::domain::models::known_header::{HeaderDirection, KnownHeader};

/// 已知请求头过滤器
///
/// 每次任务执行时加载一次，爬取期间只读。名称比较不区分大小写。
#[derive(Debug, Clone, Default)]
pub struct KnownHeaderFilter {
    request: HashSet<String>,
    response: HashSet<String>,
}

impl KnownHeaderFilter {
    /// 根据已知请求头列表构建过滤器
    pub fn new(headers: &[KnownHeader]) -> Self {
        let mut filter = Self::default();
        for header in headers {
            let name = header.name.trim().to_ascii_lowercase();
            match header.direction {
                HeaderDirection::Request => filter.request.insert(name),
                HeaderDirection::Response => filter.response.insert(name),
            };
        }
        filter
    }

    /// 判断请求头是否为已知标准头
    pub fn is_known(&self, direction: HeaderDirection, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match direction {
            HeaderDirection::Request => self.request.contains(&name),
            HeaderDirection::Response => self.response.contains(&name),
        }
    }

    /// 返回未知的请求头，保持原有顺序
    pub fn unknown<'a, I>(&self, direction: HeaderDirection, headers: I) -> Vec<(&'a str, &'a str)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        headers
            .into_iter()
            .filter(|(name, _)| !self.is_known(direction, name))
            .collect()
    }
}
