// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::job::DomainError;

/// 请求头方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderDirection {
    Request,
    Response,
}

impl fmt::Display for HeaderDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeaderDirection::Request => write!(f, "request"),
            HeaderDirection::Response => write!(f, "response"),
        }
    }
}

impl FromStr for HeaderDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("request") {
            Ok(HeaderDirection::Request)
        } else if s.eq_ignore_ascii_case("response") {
            Ok(HeaderDirection::Response)
        } else {
            Err(DomainError::ValidationError(format!(
                "unknown header direction: {}",
                s
            )))
        }
    }
}

/// 已知的标准请求头
///
/// 命中已知列表的请求头不会被记录到扫描结果中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownHeader {
    pub name: String,
    pub direction: HeaderDirection,
}

impl KnownHeader {
    pub fn request(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: HeaderDirection::Request,
        }
    }

    pub fn response(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: HeaderDirection::Response,
        }
    }
}
