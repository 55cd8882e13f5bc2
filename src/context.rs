// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求上下文模块
//!
//! `Ctx` 是每个请求独享的门面对象，包装引擎提供的原始请求/响应句柄：
//! - 构造时一次性快照方法、路径、查询串与全部请求头（头部名统一转为小写）；
//! - 构造时按模板参数名的顺序，从引擎的下标参数中取出命名参数；
//! - 查询串在第一次访问时解析并缓存；
//! - 所有写操作先检查连接是否仍然存活，连接中断后写操作一律静默忽略。
//!
//! 写入顺序：`write_status` 与 `write_header` 必须在第一次 `write`/`end` 之前调用。
//! 这里不做缓冲与重排，顺序由调用方保证。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use log::{debug, warn};

use crate::{
    abort::AbortSignal,
    engine::{RawRequest, RawResponse},
    exception::Exception,
    param::status_text,
};

/// 可写入响应体的数据。
///
/// 文本与字节原样写出；`u16`/`u32` 数组按小端序展开为原始字节；
/// 有符号整数序列视为“数字序列”，每个元素截断为一个字节。
/// `None` 表示没有数据，写操作因此成为空操作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Absent,
    Text(String),
    Bytes(Bytes),
}

impl Payload {
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Payload::Absent => None,
            Payload::Text(s) => Some(Bytes::from(s)),
            Payload::Bytes(b) => Some(b),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&String> for Payload {
    fn from(s: &String) -> Self {
        Payload::Text(s.clone())
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for Payload {
    fn from(v: &[u8]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(v))
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(v: &[u8; N]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(v))
    }
}

impl<const N: usize> From<[u8; N]> for Payload {
    fn from(v: [u8; N]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(&v))
    }
}

impl From<&[u16]> for Payload {
    fn from(v: &[u16]) -> Self {
        Payload::Bytes(v.iter().flat_map(|n| n.to_le_bytes()).collect())
    }
}

impl From<Vec<u16>> for Payload {
    fn from(v: Vec<u16>) -> Self {
        Payload::from(v.as_slice())
    }
}

impl From<&[u32]> for Payload {
    fn from(v: &[u32]) -> Self {
        Payload::Bytes(v.iter().flat_map(|n| n.to_le_bytes()).collect())
    }
}

impl From<Vec<u32>> for Payload {
    fn from(v: Vec<u32>) -> Self {
        Payload::from(v.as_slice())
    }
}

impl From<&[i32]> for Payload {
    fn from(v: &[i32]) -> Self {
        Payload::Bytes(v.iter().map(|n| *n as u8).collect())
    }
}

impl From<Vec<i32>> for Payload {
    fn from(v: Vec<i32>) -> Self {
        Payload::from(v.as_slice())
    }
}

impl<const N: usize> From<[i32; N]> for Payload {
    fn from(v: [i32; N]) -> Self {
        Payload::from(&v[..])
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Payload::Absent,
        }
    }
}

/// 解析查询串：按 `&` 切分，每对按第一个 `=` 切分，`+` 视为空格并做百分号解码；
/// 没有 `=` 的键对应空字符串。重复的键以最后一次出现为准。
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// 单次请求的上下文。
pub struct Ctx {
    response: Box<dyn RawResponse>,
    method: String,
    url: String,
    raw_query: String,
    query: OnceLock<HashMap<String, String>>,
    params: HashMap<String, String>,
    headers: HashMap<String, String>,
    abort: AbortSignal,
}

impl Ctx {
    /// 由引擎句柄构造上下文。
    ///
    /// `param_names` 必须是注册到引擎时所用模板中的参数名，按出现顺序排列：
    /// 第 k 个名字取引擎的第 k 个下标参数。
    pub fn new(
        request: &dyn RawRequest,
        mut response: Box<dyn RawResponse>,
        param_names: &[String],
    ) -> Self {
        let abort = AbortSignal::new();
        response.on_aborted(abort.clone());

        let mut headers: HashMap<String, String> = HashMap::new();
        for (key, value) in request.headers() {
            headers
                .entry(key.to_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let params = param_names
            .iter()
            .enumerate()
            .filter_map(|(index, name)| request.parameter(index).map(|v| (name.clone(), v)))
            .collect();

        Self {
            response,
            method: request.method().to_uppercase(),
            url: request.url(),
            raw_query: request.query(),
            query: OnceLock::new(),
            params,
            headers,
            abort,
        }
    }

    // --- 请求信息 ---

    /// 大写的请求方法
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 全部请求头，键为小写
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// 大小写不敏感的头部查询
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    /// 解析后的查询参数，第一次调用时解析，之后返回同一个实例
    pub fn query(&self) -> &HashMap<String, String> {
        self.query.get_or_init(|| parse_query(&self.raw_query))
    }

    /// 路径模板中 `:name` 对应的参数值
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.response.remote_address()
    }

    /// 读取完整请求体。连接在最后一个分片到达前中断时返回 `Exception::Aborted`。
    pub async fn read_body(&mut self) -> Result<Bytes, Exception> {
        if self.abort.is_aborted() {
            return Err(Exception::Aborted);
        }
        let mut receiver = match self.response.take_body() {
            Some(r) => r,
            None => return Err(Exception::BodyUnavailable),
        };
        let abort = self.abort.clone();
        let mut buffer = BytesMut::new();
        loop {
            tokio::select! {
                _ = abort.aborted() => {
                    warn!("{} {} 读取请求体时连接中断，已接收{}字节", self.method, self.url, buffer.len());
                    return Err(Exception::Aborted);
                }
                chunk = receiver.recv() => match chunk {
                    Some(chunk) => {
                        buffer.extend_from_slice(&chunk.data);
                        if chunk.is_last {
                            debug!("{} {} 请求体读取完毕，共{}字节", self.method, self.url, buffer.len());
                            return Ok(buffer.freeze());
                        }
                    }
                    None => {
                        warn!("{} {} 引擎在请求体结束前关闭了通道", self.method, self.url);
                        return Err(Exception::Aborted);
                    }
                },
            }
        }
    }

    // --- 中断 ---

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// 注册连接中断时执行的一次性回调
    pub fn on_aborted<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.abort.on_abort(callback);
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// 连接既未中断也未结束
    fn is_writable(&self) -> bool {
        !self.abort.is_aborted() && self.response.is_writable()
    }

    // --- 响应写入 ---

    /// 写入状态行。未给出原因短语时从标准状态表中查找。
    pub fn write_status(&mut self, code: u16, message: Option<&str>) {
        if !self.is_writable() {
            return;
        }
        let message = message.or_else(|| status_text(code)).unwrap_or("");
        self.response.write_status(&format!("{} {}", code, message));
    }

    pub fn write_header(&mut self, key: &str, value: &str) {
        if !self.is_writable() {
            return;
        }
        self.response.write_header(key, value);
    }

    pub fn write_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in headers {
            self.write_header(key.as_ref(), value.as_ref());
        }
    }

    /// 写入一段响应体；连接已中断或数据为空（`None`）时什么也不做
    pub fn write<P: Into<Payload>>(&mut self, chunk: P) {
        if !self.is_writable() {
            return;
        }
        if let Some(bytes) = chunk.into().into_bytes() {
            self.response.write(&bytes);
        }
    }

    /// 等待引擎把积压的响应数据发送出去，连接不可写时立即返回。
    /// 连续写入大量数据时，在两次 `write` 之间等待它。
    pub async fn drained(&self) {
        if !self.is_writable() {
            return;
        }
        self.response.drained().await;
    }

    /// 结束响应
    pub fn end(&mut self) {
        self.end_with(Payload::Absent);
    }

    /// 写入最后一段数据并结束响应
    pub fn end_with<P: Into<Payload>>(&mut self, chunk: P) {
        if !self.is_writable() {
            return;
        }
        match chunk.into().into_bytes() {
            Some(bytes) => self.response.end(&bytes),
            None => self.response.end(&[]),
        }
    }

    /// 301 重定向
    pub fn redirect(&mut self, location: &str) {
        self.redirect_with_status(location, 301);
    }

    /// 以指定状态码重定向，写入 `Location` 头并以空响应体结束
    pub fn redirect_with_status(&mut self, location: &str, code: u16) {
        self.write_status(code, None);
        self.write_header("Location", location);
        self.end();
    }
}

impl std::fmt::Debug for Ctx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ctx")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("raw_query", &self.raw_query)
            .field("params", &self.params)
            .field("aborted", &self.abort.is_aborted())
            .finish()
    }
}
