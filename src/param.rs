// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义路由层与上下文层共用的 HTTP 协议常量和数据结构，包括：
//! - 标准状态码及其原因短语（Reason Phrase），供 `Ctx::write_status` 补全状态行。
//! - 路由记录使用的封闭方法枚举（含通配的 `ANY`）。
//! - 文件响应器可协商的内容编码枚举。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde_derive::{Deserialize, Serialize};

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "uroute";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 文件流式传输时单次读取的默认块大小
pub const DEFAULT_CHUNK_SIZE: usize = 65536; // 64KB

/// 请求头部允许的最大字节数，超出即视为畸形请求
pub const DEFAULT_MAX_HEAD_SIZE: usize = 16384; // 16KB

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 1xx: 信息响应 (Informational)
        map.insert(100, "Continue");
        map.insert(101, "Switching Protocols");
        map.insert(102, "Processing");
        map.insert(103, "Early Hints");

        // 2xx: 成功响应 (Successful)
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(203, "Non-Authoritative Information");
        map.insert(204, "No Content");
        map.insert(205, "Reset Content");
        map.insert(206, "Partial Content");
        map.insert(207, "Multi-Status");
        map.insert(208, "Already Reported");
        map.insert(226, "IM Used");

        // 3xx: 重定向 (Redirection)
        map.insert(300, "Multiple Choices");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(305, "Use Proxy");
        // 306 已弃用 (Reserved)
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx: 客户端错误 (Client Error)
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(402, "Payment Required");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(406, "Not Acceptable");
        map.insert(407, "Proxy Authentication Required");
        map.insert(408, "Request Timeout");
        map.insert(409, "Conflict");
        map.insert(410, "Gone");
        map.insert(411, "Length Required");
        map.insert(412, "Precondition Failed");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(416, "Range Not Satisfiable");
        map.insert(417, "Expectation Failed");
        map.insert(418, "I'm a teapot");
        map.insert(421, "Misdirected Request");
        map.insert(422, "Unprocessable Content");
        map.insert(423, "Locked");
        map.insert(424, "Failed Dependency");
        map.insert(425, "Too Early");
        map.insert(426, "Upgrade Required");
        map.insert(428, "Precondition Required");
        map.insert(429, "Too Many Requests");
        map.insert(431, "Request Header Fields Too Large");
        map.insert(451, "Unavailable For Legal Reasons");

        // 5xx: 服务端错误 (Server Error)
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(504, "Gateway Timeout");
        map.insert(505, "HTTP Version Not Supported");
        map.insert(506, "Variant Also Negotiates");
        map.insert(507, "Insufficient Storage");
        map.insert(508, "Loop Detected");
        map.insert(510, "Not Extended");
        map.insert(511, "Network Authentication Required");
        map
    };
}

/// 查询状态码对应的原因短语，未知状态码返回 `None`。
pub fn status_text(code: u16) -> Option<&'static str> {
    STATUS_CODES.get(&code).copied()
}

/// 路由记录可声明的 HTTP 方法。
///
/// 该集合是封闭的。`Any` 不对应任何真实请求方法，它交由引擎解释为“匹配全部方法”。
/// `Del` 沿用引擎侧的注册令牌命名，对应请求中的 `DELETE`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Any,
    Connect,
    Del,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl HttpMethod {
    /// 全部可注册的方法，顺序与引擎注册表一致。
    pub const ALL: [HttpMethod; 10] = [
        HttpMethod::Any,
        HttpMethod::Connect,
        HttpMethod::Del,
        HttpMethod::Get,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Patch,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Trace,
    ];

    /// 引擎注册入口使用的小写令牌，例如 `get`、`del`、`any`。
    pub fn engine_token(&self) -> &'static str {
        match *self {
            HttpMethod::Any => "any",
            HttpMethod::Connect => "connect",
            HttpMethod::Del => "del",
            HttpMethod::Get => "get",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
            HttpMethod::Patch => "patch",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Trace => "trace",
        }
    }

    /// 判断本方法是否接受请求行中出现的方法名（大小写不敏感）。
    pub fn accepts(&self, request_method: &str) -> bool {
        match *self {
            HttpMethod::Any => true,
            other => match request_method.parse::<HttpMethod>() {
                Ok(m) => m == other,
                Err(_) => false,
            },
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    /// 同时接受请求行写法（`DELETE`）与注册令牌写法（`del`）。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ANY" => Ok(HttpMethod::Any),
            "CONNECT" => Ok(HttpMethod::Connect),
            "DEL" | "DELETE" => Ok(HttpMethod::Del),
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "PATCH" => Ok(HttpMethod::Patch),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "TRACE" => Ok(HttpMethod::Trace),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpMethod {
    /// 将枚举格式化为大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpMethod::Any => write!(f, "ANY"),
            HttpMethod::Connect => write!(f, "CONNECT"),
            HttpMethod::Del => write!(f, "DEL"),
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Head => write!(f, "HEAD"),
            HttpMethod::Options => write!(f, "OPTIONS"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Trace => write!(f, "TRACE"),
        }
    }
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpEncoding {
    /// GNU zip 压缩
    Gzip,
    /// zlib 压缩
    Deflate,
    /// Brotli 压缩
    Br,
}

impl HttpEncoding {
    /// `Content-Encoding` / `Accept-Encoding` 中使用的标识符
    pub fn token(&self) -> &'static str {
        match *self {
            HttpEncoding::Gzip => "gzip",
            HttpEncoding::Deflate => "deflate",
            HttpEncoding::Br => "br",
        }
    }
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
