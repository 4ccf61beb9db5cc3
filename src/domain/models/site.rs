// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 键值对，用于请求头与查询参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 原始 POST 请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostParam {
    pub value: String,
}

/// 单个URL的流量记录
///
/// 一次爬取中每个不同的URL（不区分大小写）对应一条记录，
/// 只保存不在已知列表中的请求头和响应头。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Site {
    pub url: String,
    pub request_headers: Vec<KeyValue>,
    pub response_headers: Vec<KeyValue>,
    pub get_params: Vec<KeyValue>,
    pub post_params: Vec<PostParam>,
}

impl Site {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 记录请求头，同名（不区分大小写）只保留第一次出现的值
    pub fn add_request_header(&mut self, key: &str, value: &str) {
        push_unique_header(&mut self.request_headers, key, value);
    }

    /// 记录响应头，同名（不区分大小写）只保留第一次出现的值
    pub fn add_response_header(&mut self, key: &str, value: &str) {
        push_unique_header(&mut self.response_headers, key, value);
    }

    /// 记录查询参数，完全相同的键值对只保留一份
    pub fn add_get_param(&mut self, key: &str, value: &str) {
        if !self
            .get_params
            .iter()
            .any(|p| p.key == key && p.value == value)
        {
            self.get_params.push(KeyValue::new(key, value));
        }
    }

    /// 追加 POST 请求体
    pub fn add_post_body(&mut self, body: impl Into<String>) {
        self.post_params.push(PostParam { value: body.into() });
    }
}

fn push_unique_header(headers: &mut Vec<KeyValue>, key: &str, value: &str) {
    if !headers.iter().any(|h| h.key.eq_ignore_ascii_case(key)) {
        headers.push(KeyValue::new(key, value));
    }
}

/// 写入任务结果的技术条目，只保留名称和版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Technology {
    pub name: String,
    pub version: Option<String>,
}

/// 任务结果
///
/// 序列化后写入任务的 `output` 字段，与下游消费方约定使用 PascalCase 键：
/// `{"Sites": [...], "Technology": [...], "IPAddresses": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    pub sites: Vec<Site>,
    pub technology: Vec<Technology>,
    #[serde(rename = "IPAddresses")]
    pub ip_addresses: Vec<String>,
}
