// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径模板匹配模块
//!
//! 路径模板由三类片段组成：
//! - 字面量片段，例如 `/users`；
//! - 以冒号开头的命名参数，例如 `/:id`，匹配恰好一个非空片段；
//! - 位于末尾的通配符 `*`，匹配剩余的全部片段（可以为空）。
//!
//! 参数名按从左到右的顺序排列，第 k 个参数名对应引擎按下标提供的第 k 个参数值。
//! 这一对应关系是 `Ctx::param` 正确性的基础。

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// 命名参数片段：整个片段必须是 `:` 加上标识符
    static ref PARAM_SEGMENT: Regex = Regex::new(r"^:([A-Za-z0-9_]+)$").unwrap();
}

/// 模板中的单个片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

impl Segment {
    /// 片段的具体程度，用于在多条模板同时命中时挑选最具体的一条
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 2,
            Segment::Param(_) => 1,
            Segment::Wildcard => 0,
        }
    }
}

/// 解析后的路径模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// 解析路径模板。任何字符串都是合法模板：无法识别为参数或通配符的片段按字面量处理，
    /// 非末尾位置的 `*` 同样按字面量处理。
    pub fn parse(source: &str) -> Self {
        let raw = split_segments(source);
        let last = raw.len().saturating_sub(1);
        let segments = raw
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                if *segment == "*" && index == last {
                    Segment::Wildcard
                } else if let Some(caps) = PARAM_SEGMENT.captures(segment) {
                    Segment::Param(caps[1].to_string())
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// 按出现顺序列出全部参数名
    pub fn param_names(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// 用模板匹配请求路径（不含查询串）。命中时按参数出现顺序返回参数值。
    pub fn matches(&self, path: &str) -> Option<Vec<String>> {
        let parts = split_segments(path);
        let mut params = Vec::new();
        let mut index = 0;
        for segment in &self.segments {
            match segment {
                Segment::Wildcard => return Some(params),
                Segment::Literal(lit) => {
                    if parts.get(index) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(_) => match parts.get(index) {
                    Some(value) if !value.is_empty() => params.push(value.to_string()),
                    _ => return None,
                },
            }
            index += 1;
        }
        if index == parts.len() {
            Some(params)
        } else {
            None
        }
    }

    /// 模板的具体程度，按片段逐一比较，字面量 > 参数 > 通配符
    pub fn specificity(&self) -> Vec<u8> {
        self.segments.iter().map(Segment::rank).collect()
    }
}

/// 从模板字符串中提取参数名，等价于 `Template::parse(source).param_names()`
pub fn param_names(source: &str) -> Vec<String> {
    Template::parse(source).param_names()
}

/// 去掉一个前导 `/` 后按 `/` 切分。`""` 与 `"/"` 都得到单个空片段。
fn split_segments(path: &str) -> Vec<&str> {
    path.strip_prefix('/').unwrap_or(path).split('/').collect()
}
