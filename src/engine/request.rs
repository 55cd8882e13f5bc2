// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求头解析模块
//!
//! 该模块供内置引擎使用，负责将 TCP 流中读取的请求头字节解析为 `RequestHead`：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询串、版本）。
//! 2. 全部头部字段的提取，保留原始大小写。
//! 3. 请求体长度（`Content-Length`）的识别。
//!
//! 请求体本身不在这里处理，由引擎按分片交给上下文层。

use crate::{exception::Exception, param::CRLF};
use log::error;

/// 头部与请求体之间的分隔符
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 一次请求的请求行与头部。
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// 请求方法，保留客户端发送的写法
    method: String,
    /// 请求路径（不含查询串）
    path: String,
    /// 原始查询串（不含 `?`）
    query: String,
    /// HTTP 协议版本，例如 `HTTP/1.1`
    version: String,
    /// 全部头部字段，按出现顺序
    headers: Vec<(String, String)>,
    /// 请求体长度，缺省为 0
    content_length: u64,
}

impl RequestHead {
    /// 从请求头字节（不含末尾的空行）尝试构建 `RequestHead`。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的请求头数据。
    /// * `id` - 连接 ID，用于在多任务环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 1. 将字节流转换为字符串，失败则判定为非法的 HTTP 请求
        let head = match std::str::from_utf8(buffer) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = head.split(CRLF);

        // 2. 解析请求行 (e.g., "GET /index.html?x=1 HTTP/1.1")
        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split(' ').filter(|s| !s.is_empty()).collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method = parts[0].to_string();
        if !method.bytes().all(|b| b.is_ascii_alphabetic()) {
            error!("[ID{}]非法的HTTP请求方法：{}", id, method);
            return Err(Exception::MalformedRequest);
        }

        let version = parts[2].to_uppercase();
        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            error!("[ID{}]不支持的HTTP协议版本：{}", id, version);
            return Err(Exception::UnsupportedHttpVersion);
        }

        let (path, query) = match parts[1].split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (parts[1].to_string(), String::new()),
        };

        // 3. 迭代各行解析 Headers
        let mut headers = Vec::new();
        let mut content_length = 0;
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (key, value) = match line.split_once(':') {
                Some((k, v)) if !k.trim().is_empty() => (k.trim(), v.trim()),
                _ => {
                    error!("[ID{}]HTTP头部格式不正确：{}", id, line);
                    return Err(Exception::MalformedRequest);
                }
            };
            if key.eq_ignore_ascii_case("content-length") {
                content_length = match value.parse::<u64>() {
                    Ok(len) => len,
                    Err(_) => {
                        error!("[ID{}]非法的Content-Length：{}", id, value);
                        return Err(Exception::MalformedRequest);
                    }
                };
            }
            headers.push((key.to_string(), value.to_string()));
        }

        Ok(Self {
            method,
            path,
            query,
            version,
            headers,
            content_length,
        })
    }
}

// --- Getter 访问器实现 ---

impl RequestHead {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

/// 查找请求头结束位置（空行之前的下标）
pub fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}
