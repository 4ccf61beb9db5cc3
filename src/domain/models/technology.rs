// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::site::Technology;

/// 技术检测器的原始输出
///
/// 字段按检测器 CLI 的 JSON 结构定义，未知字段会被忽略，
/// 缺失的可选字段使用默认值。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnologyResult {
    #[serde(default)]
    pub urls: HashMap<String, UrlInfo>,
    #[serde(default)]
    pub technologies: Vec<DetectedTechnology>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlInfo {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub error: Option<String>,
}

/// 检测到的一项技术
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedTechnology {
    #[serde(default)]
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: i64,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub cpe: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub root_path: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

impl TechnologyResult {
    /// 提取写入任务结果的名称与版本
    ///
    /// 空字符串版本按无版本处理
    pub fn summaries(&self) -> Vec<Technology> {
        self.technologies
            .iter()
            .map(|t| Technology {
                name: t.name.clone(),
                version: t.version.clone().filter(|v| !v.is_empty()),
            })
            .collect()
    }
}
