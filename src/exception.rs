// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了路由层、上下文层以及内置引擎在请求处理生命周期中可能返回的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、连接中断与启动期错误；文件错误由文件响应器就地转换为 500。
//! - **就地处理**：底层 `io::Error` 的细节在发现处写入日志，枚举本身保持 `Copy`。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志中。

use std::fmt;

/// 处理请求过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 客户端发送的请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行或头部字段格式不符合 HTTP/1.1 规范。
    MalformedRequest,
    /// 请求头部超过了引擎允许的最大长度。
    RequestHeadTooLarge,
    /// 客户端使用了引擎不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 对端在操作完成前断开了连接。
    Aborted,
    /// 请求体已被读取过，或引擎没有提供请求体通道。
    BodyUnavailable,
    /// 监听端口绑定失败。
    BindFailed,
    /// 配置文件无法读取。
    ConfigUnreadable,
}

use Exception::*;

impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed HTTP request (400)"),
            RequestHeadTooLarge => write!(f, "Request head too large (431)"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            Aborted => write!(f, "Connection aborted by peer"),
            BodyUnavailable => write!(f, "Request body already consumed or unavailable"),
            BindFailed => write!(f, "Couldn't bind listen socket"),
            ConfigUnreadable => write!(f, "Couldn't read configuration file"),
        }
    }
}

impl std::error::Error for Exception {}
