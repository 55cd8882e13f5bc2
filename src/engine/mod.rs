// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 引擎接口
//!
//! 路由层并不直接处理套接字。连接接收、HTTP 解析和底层读写由“引擎”完成，
//! 引擎通过本模块中的三个 trait 与路由层交互：
//!
//! - [`Engine`]：按方法注册路径模板，并负责监听端口；
//! - [`RawRequest`]：单次请求的原始只读访问器，只在处理函数被调用的那一刻有效；
//! - [`RawResponse`]：原始响应写入原语，以及请求体通道与中断通知。
//!
//! 写入顺序约定：状态行与头部必须在第一次 `write`/`end` 之前写出，引擎不会重排。
//!
//! `write` 本身不阻塞，数据先进入引擎的输出队列。持续写入大量数据的一方应在两次写入之间
//! 等待 [`RawResponse::drained`]，让积压量随对端的读取速度回落。
//!
//! 本 crate 自带一个基于 tokio 的实现 [`tcp::TcpEngine`]。

pub mod request;
pub mod tcp;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{abort::AbortSignal, exception::Exception, param::HttpMethod};

/// 处理函数返回的装箱 future
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 引擎在路由命中时调用的适配函数
pub type RawHandler = Arc<dyn Fn(&dyn RawRequest, Box<dyn RawResponse>) -> BoxFuture + Send + Sync>;

/// 请求体的一个分片。最后一个分片的 `is_last` 为 `true`，其数据可以为空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyChunk {
    pub data: Bytes,
    pub is_last: bool,
}

/// 原始请求访问器。
#[cfg_attr(test, mockall::automock)]
pub trait RawRequest {
    /// 请求方法，大小写由引擎决定
    fn method(&self) -> String;
    /// 请求路径，不含查询串
    fn url(&self) -> String;
    /// 原始查询串，不含 `?`
    fn query(&self) -> String;
    /// 全部请求头，保留原始大小写与顺序
    fn headers(&self) -> Vec<(String, String)>;
    /// 第 `index` 个路径参数（从 0 开始），按模板中参数出现的顺序编号
    fn parameter(&self, index: usize) -> Option<String>;
}

/// 原始响应写入原语。
pub trait RawResponse: Send + Sync {
    /// 写入状态行，例如 `"404 Not Found"`
    fn write_status(&mut self, status: &str);
    fn write_header(&mut self, key: &str, value: &str);
    /// 写入一段响应体。返回 `false` 表示连接已经不可写。
    fn write(&mut self, chunk: &[u8]) -> bool;
    /// 结束响应，`chunk` 可以为空
    fn end(&mut self, chunk: &[u8]);
    /// 等待输出队列中尚未发出的数据回落到引擎的阈值以内
    fn drained(&self) -> BoxFuture;
    /// 连接是否仍可写入（未结束且未中断）
    fn is_writable(&self) -> bool;
    fn remote_address(&self) -> Option<IpAddr>;
    /// 取走请求体通道。只能成功一次。
    fn take_body(&mut self) -> Option<UnboundedReceiver<BodyChunk>>;
    /// 登记中断信号。连接中断时引擎触发该信号，且至多触发一次；
    /// 若登记时连接已经中断，信号会被立即触发。
    fn on_aborted(&mut self, signal: AbortSignal);
}

/// 外部引擎。
pub trait Engine {
    /// `listen` 成功后返回的句柄，用于之后的优雅停机
    type Listener;

    /// 为单个方法注册路径模板。`HttpMethod::Any` 由引擎解释为匹配全部方法。
    fn register(&mut self, method: HttpMethod, template: &str, handler: RawHandler);

    /// 开始监听。绑定失败立即返回错误，不做重试。
    fn listen(
        &mut self,
        port: u16,
    ) -> impl Future<Output = Result<Self::Listener, Exception>> + Send;
}
