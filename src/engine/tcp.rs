// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内置 TCP 引擎
//!
//! 基于 tokio 的最小 HTTP/1.1 引擎，每个连接只处理一次请求（`Connection: close`）。
//!
//! 单个连接的处理流程：
//! 1. 读取并解析请求头，超长返回 431，无法解析返回 400；
//! 2. 在已注册的绑定中挑选最具体的一条：精确方法优先于 `ANY`，
//!    同一方法下逐段比较，字面量优先于参数，参数优先于通配符；没有命中返回 404；
//! 3. 启动一个读取任务，按 `Content-Length` 把请求体切成 `BodyChunk` 交给上下文，
//!    之后继续读取以便发现对端断开，断开即触发中断信号；
//! 4. 在当前任务中执行处理函数发出的响应帧：状态行与头部在第一段数据或结束时写出。
//!    没有写过数据就结束的响应使用 `Content-Length`，否则使用分块传输。
//!    已入队但尚未写到套接字的字节数记在一个 watch 通道里，`drained` 据此等待。

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        watch, Notify,
    },
};

use super::{
    request::{find_head_end, RequestHead, HEAD_TERMINATOR},
    BodyChunk, BoxFuture, Engine, RawHandler, RawRequest, RawResponse,
};
use crate::{
    abort::AbortSignal,
    exception::Exception,
    matcher::Template,
    param::{HttpMethod, CRLF, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_HEAD_SIZE, SERVER_NAME},
    util::{format_http_date, HtmlBuilder},
};

/// 单次从套接字读取的字节数
const READ_BUFFER_SIZE: usize = 8192;

/// 输出队列中允许积压的字节数，超过后 `drained` 进入等待
const OUTPUT_HIGH_WATER: usize = 4 * DEFAULT_CHUNK_SIZE;

#[derive(Clone)]
struct Binding {
    method: HttpMethod,
    template: Template,
    handler: RawHandler,
}

pub struct TcpEngine {
    host: IpAddr,
    max_head_size: usize,
    bindings: Vec<Binding>,
}

impl TcpEngine {
    pub fn new(host: IpAddr) -> Self {
        Self {
            host,
            max_head_size: DEFAULT_MAX_HEAD_SIZE,
            bindings: Vec::new(),
        }
    }

    /// 只监听本地回环地址
    pub fn localhost() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn with_max_head_size(mut self, max_head_size: usize) -> Self {
        self.max_head_size = max_head_size;
        self
    }

}

impl Engine for TcpEngine {
    type Listener = TcpListenSocket;

    fn register(&mut self, method: HttpMethod, template: &str, handler: RawHandler) {
        debug!("引擎注册：{} {}", method.engine_token(), template);
        self.bindings.push(Binding {
            method,
            template: Template::parse(template),
            handler,
        });
    }

    fn listen(
        &mut self,
        port: u16,
    ) -> impl Future<Output = Result<TcpListenSocket, Exception>> + Send {
        let host = self.host;
        let max_head_size = self.max_head_size;
        let bindings: Arc<[Binding]> = self.bindings.clone().into();
        async move {
            let listener = match TcpListener::bind((host, port)).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("无法绑定{}:{}，错误：{}", host, port, e);
                    return Err(Exception::BindFailed);
                }
            };
            let local_addr = match listener.local_addr() {
                Ok(addr) => addr,
                Err(e) => {
                    error!("无法获取监听地址：{}", e);
                    return Err(Exception::BindFailed);
                }
            };
            info!("服务端在{}上监听Socket连接", local_addr);

            let shutdown = Arc::new(Notify::new());
            tokio::spawn(accept_loop(
                listener,
                bindings,
                max_head_size,
                Arc::clone(&shutdown),
            ));
            Ok(TcpListenSocket {
                local_addr,
                shutdown,
            })
        }
    }
}

/// `listen` 返回的监听句柄
#[derive(Debug, Clone)]
pub struct TcpListenSocket {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl TcpListenSocket {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// 停止接受新连接，已建立的连接继续处理完毕
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}

async fn accept_loop(
    listener: TcpListener,
    bindings: Arc<[Binding]>,
    max_head_size: usize,
    shutdown: Arc<Notify>,
) {
    let mut id: u128 = 0;
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("监听套接字{:?}已关闭", listener.local_addr().ok());
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("[ID{}]TCP连接已建立：{}", id, addr);
                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        id,
                        Arc::clone(&bindings),
                        max_head_size,
                    ));
                    id += 1;
                }
                Err(e) => error!("接受连接时出错：{}", e),
            },
        }
    }
}

/// 挑选最具体的绑定，并返回按下标排列的参数值
fn resolve<'a>(
    bindings: &'a [Binding],
    method: &str,
    path: &str,
) -> Option<(&'a Binding, Vec<String>)> {
    let mut best: Option<(&Binding, Vec<String>, (bool, Vec<u8>))> = None;
    for binding in bindings {
        if !binding.method.accepts(method) {
            continue;
        }
        let params = match binding.template.matches(path) {
            Some(p) => p,
            None => continue,
        };
        let rank = (
            binding.method != HttpMethod::Any,
            binding.template.specificity(),
        );
        if best.as_ref().map_or(true, |(_, _, current)| rank > *current) {
            best = Some((binding, params, rank));
        }
    }
    best.map(|(binding, params, _)| (binding, params))
}

/// 读取请求头，返回头部字节与已经读入的请求体前缀
async fn read_head<R>(
    stream: &mut R,
    max_head_size: usize,
) -> Result<Option<(Vec<u8>, Bytes)>, Exception>
where
    R: AsyncRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_BUFFER_SIZE];
    loop {
        if let Some(end) = find_head_end(&buffer) {
            if end > max_head_size {
                return Err(Exception::RequestHeadTooLarge);
            }
            let rest = Bytes::copy_from_slice(&buffer[end + HEAD_TERMINATOR.len()..]);
            buffer.truncate(end);
            return Ok(Some((buffer, rest)));
        }
        if buffer.len() > max_head_size {
            return Err(Exception::RequestHeadTooLarge);
        }
        match stream.read(&mut chunk).await {
            Ok(0) => return Ok(None),
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!("读取请求头时出错：{}", e);
                return Ok(None);
            }
        }
    }
}

/// 写出一个不经过处理函数的完整响应（400、404、431）
async fn write_simple<W>(out: &mut W, code: u16, id: u128)
where
    W: AsyncWrite + Unpin,
{
    let body = HtmlBuilder::from_status_code(code, None).build();
    let reason = crate::param::status_text(code).unwrap_or("");
    let head = format!(
        "HTTP/1.1 {} {}{crlf}Content-Type: text/html;charset=utf-8{crlf}Content-Length: {}{crlf}Date: {}{crlf}Server: {}{crlf}Connection: close{crlf}{crlf}",
        code,
        reason,
        body.len(),
        format_http_date(&Utc::now()),
        SERVER_NAME,
        crlf = CRLF,
    );
    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(body.as_bytes());
    if let Err(e) = out.write_all(&bytes).await {
        warn!("[ID{}]发送{}响应失败：{}", id, code, e);
    }
    let _ = out.shutdown().await;
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    id: u128,
    bindings: Arc<[Binding]>,
    max_head_size: usize,
) {
    let start_time = Instant::now();

    let (head_bytes, rest) = match read_head(&mut stream, max_head_size).await {
        Ok(Some(head)) => head,
        Ok(None) => {
            debug!("[ID{}]连接在请求头完整之前关闭", id);
            return;
        }
        Err(e) => {
            warn!("[ID{}]{}，返回431", id, e);
            write_simple(&mut stream, 431, id).await;
            return;
        }
    };

    let head = match RequestHead::try_from(&head_bytes, id) {
        Ok(head) => head,
        Err(e) => {
            warn!("[ID{}]{}，返回400", id, e);
            write_simple(&mut stream, 400, id).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求：{} {}", id, head.method(), head.path());

    let (handler, params) = match resolve(&bindings, head.method(), head.path()) {
        Some((binding, params)) => (Arc::clone(&binding.handler), params),
        None => {
            info!("[ID{}] {} {} 404 没有匹配的路由", id, head.method(), head.path());
            write_simple(&mut stream, 404, id).await;
            return;
        }
    };

    let abort = AbortSignal::new();
    let (frames_tx, mut frames_rx) = unbounded_channel();
    let (body_tx, body_rx) = unbounded_channel();
    let (pending, _) = watch::channel(0usize);
    let pending = Arc::new(pending);

    let is_head = head.method().eq_ignore_ascii_case("HEAD");
    let content_length = head.content_length();
    let request = TcpRequest { head, params };
    let response = TcpResponse {
        frames: frames_tx,
        pending: Arc::clone(&pending),
        ended: false,
        abort: abort.clone(),
        remote: addr,
        body: Mutex::new(Some(body_rx)),
    };
    tokio::spawn(handler(&request, Box::new(response)));

    let (reader, mut writer) = stream.into_split();
    let reader_task = tokio::spawn(read_request_body(
        reader,
        rest,
        content_length,
        body_tx,
        abort.clone(),
        id,
    ));

    let mut output = ResponseWriter::new(is_head);
    loop {
        tokio::select! {
            _ = abort.aborted() => {
                warn!("[ID{}]对端在响应完成前断开连接", id);
                break;
            }
            frame = frames_rx.recv() => match frame {
                Some(frame) => {
                    let queued = frame.queued_len();
                    let applied = output.apply(frame, &mut writer).await;
                    release(&pending, queued);
                    match applied {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => {
                            warn!("[ID{}]写入响应失败：{}", id, e);
                            abort.abort();
                            break;
                        }
                    }
                }
                None => {
                    warn!("[ID{}]处理函数未结束响应即退出", id);
                    break;
                }
            },
        }
    }
    reader_task.abort();
    pending.send_replace(0);
    let _ = writer.shutdown().await;

    info!(
        "[ID{}] {}, {}, {}, {}, {}ms",
        id,
        request.head.version(),
        request.head.method(),
        request.head.path(),
        output.status_code(),
        start_time.elapsed().as_millis()
    );
}

/// 把请求体转发给上下文，之后持续读取直到对端关闭
async fn read_request_body<R>(
    mut reader: R,
    rest: Bytes,
    content_length: u64,
    body_tx: UnboundedSender<BodyChunk>,
    abort: AbortSignal,
    id: u128,
) where
    R: AsyncRead + Unpin,
{
    let mut remaining = content_length;
    if remaining == 0 {
        let _ = body_tx.send(BodyChunk {
            data: Bytes::new(),
            is_last: true,
        });
    } else if !rest.is_empty() {
        forward_body(&body_tx, &rest, &mut remaining);
    }

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("[ID{}]对端关闭了连接", id);
                break;
            }
            Ok(n) => {
                if remaining > 0 {
                    forward_body(&body_tx, &buffer[..n], &mut remaining);
                }
            }
            Err(e) => {
                debug!("[ID{}]读取连接时出错：{}", id, e);
                break;
            }
        }
    }
    abort.abort();
}

fn forward_body(body_tx: &UnboundedSender<BodyChunk>, data: &[u8], remaining: &mut u64) {
    let take = (data.len() as u64).min(*remaining) as usize;
    *remaining -= take as u64;
    let _ = body_tx.send(BodyChunk {
        data: Bytes::copy_from_slice(&data[..take]),
        is_last: *remaining == 0,
    });
}

struct TcpRequest {
    head: RequestHead,
    params: Vec<String>,
}

impl RawRequest for TcpRequest {
    fn method(&self) -> String {
        self.head.method().to_string()
    }

    fn url(&self) -> String {
        self.head.path().to_string()
    }

    fn query(&self) -> String {
        self.head.query().to_string()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.head.headers().to_vec()
    }

    fn parameter(&self, index: usize) -> Option<String> {
        self.params.get(index).cloned()
    }
}

/// 处理函数发往连接任务的响应帧
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Status(String),
    Header(String, String),
    Data(Bytes),
    End(Bytes),
}

impl Frame {
    /// 计入输出积压的字节数
    fn queued_len(&self) -> usize {
        match self {
            Frame::Data(data) => data.len(),
            _ => 0,
        }
    }
}

/// 一帧写到套接字之后，从积压量中扣除
fn release(pending: &watch::Sender<usize>, bytes: usize) {
    if bytes > 0 {
        pending.send_modify(|queued| *queued = queued.saturating_sub(bytes));
    }
}

async fn wait_drained(mut pending: watch::Receiver<usize>) {
    loop {
        if *pending.borrow_and_update() <= OUTPUT_HIGH_WATER {
            return;
        }
        if pending.changed().await.is_err() {
            return;
        }
    }
}

struct TcpResponse {
    frames: UnboundedSender<Frame>,
    pending: Arc<watch::Sender<usize>>,
    ended: bool,
    abort: AbortSignal,
    remote: SocketAddr,
    body: Mutex<Option<UnboundedReceiver<BodyChunk>>>,
}

impl RawResponse for TcpResponse {
    fn write_status(&mut self, status: &str) {
        if self.is_writable() {
            let _ = self.frames.send(Frame::Status(status.to_string()));
        }
    }

    fn write_header(&mut self, key: &str, value: &str) {
        if self.is_writable() {
            let _ = self
                .frames
                .send(Frame::Header(key.to_string(), value.to_string()));
        }
    }

    fn write(&mut self, chunk: &[u8]) -> bool {
        if !self.is_writable() {
            return false;
        }
        self.pending.send_modify(|queued| *queued += chunk.len());
        self.frames
            .send(Frame::Data(Bytes::copy_from_slice(chunk)))
            .is_ok()
    }

    fn end(&mut self, chunk: &[u8]) {
        if self.ended {
            return;
        }
        self.ended = true;
        let _ = self.frames.send(Frame::End(Bytes::copy_from_slice(chunk)));
    }

    fn drained(&self) -> BoxFuture {
        Box::pin(wait_drained(self.pending.subscribe()))
    }

    fn is_writable(&self) -> bool {
        !self.ended && !self.abort.is_aborted() && !self.frames.is_closed()
    }

    fn remote_address(&self) -> Option<IpAddr> {
        Some(self.remote.ip())
    }

    fn take_body(&mut self) -> Option<UnboundedReceiver<BodyChunk>> {
        match self.body.get_mut() {
            Ok(body) => body.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn on_aborted(&mut self, signal: AbortSignal) {
        self.abort.on_abort(move || {
            signal.abort();
        });
    }
}

/// 把响应帧序列化为 HTTP/1.1 报文
struct ResponseWriter {
    status: String,
    headers: Vec<(String, String)>,
    head_request: bool,
    head_sent: bool,
    chunked: bool,
    bodyless: bool,
}

impl ResponseWriter {
    fn new(head_request: bool) -> Self {
        Self {
            status: "200 OK".to_string(),
            headers: Vec::new(),
            head_request,
            head_sent: false,
            chunked: false,
            bodyless: head_request,
        }
    }

    fn status_code(&self) -> u16 {
        self.status
            .split(' ')
            .next()
            .and_then(|code| code.parse().ok())
            .unwrap_or(200)
    }

    fn has_header(&self, key: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// 执行一帧，返回响应是否已经结束
    async fn apply<W>(&mut self, frame: Frame, out: &mut W) -> std::io::Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        match frame {
            Frame::Status(status) => {
                if !self.head_sent {
                    self.status = status;
                }
                Ok(false)
            }
            Frame::Header(key, value) => {
                if !self.head_sent {
                    self.headers.push((key, value));
                }
                Ok(false)
            }
            Frame::Data(data) => {
                if data.is_empty() {
                    return Ok(false);
                }
                if !self.head_sent {
                    self.send_head(out, None).await?;
                }
                self.send_body(out, &data).await?;
                Ok(false)
            }
            Frame::End(data) => {
                if !self.head_sent {
                    self.send_head(out, Some(data.len())).await?;
                }
                if !data.is_empty() {
                    self.send_body(out, &data).await?;
                }
                if self.chunked {
                    out.write_all(format!("0{crlf}{crlf}", crlf = CRLF).as_bytes())
                        .await?;
                }
                out.flush().await?;
                Ok(true)
            }
        }
    }

    async fn send_head<W>(&mut self, out: &mut W, known_length: Option<usize>) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let code = self.status_code();
        let no_body_status = code < 200 || code == 204 || code == 304;
        self.bodyless = self.head_request || no_body_status;

        let mut head = format!("HTTP/1.1 {}{}", self.status, CRLF);
        for (key, value) in &self.headers {
            if key.eq_ignore_ascii_case("connection") || key.eq_ignore_ascii_case("transfer-encoding") {
                continue;
            }
            head.push_str(&format!("{}: {}{}", key, value, CRLF));
        }
        if !self.has_header("date") {
            head.push_str(&format!("Date: {}{}", format_http_date(&Utc::now()), CRLF));
        }
        if !self.has_header("server") {
            head.push_str(&format!("Server: {}{}", SERVER_NAME, CRLF));
        }
        if !no_body_status && !self.has_header("content-length") {
            match known_length {
                Some(length) => head.push_str(&format!("Content-Length: {}{}", length, CRLF)),
                None if self.head_request => {}
                None => {
                    self.chunked = true;
                    head.push_str(&format!("Transfer-Encoding: chunked{}", CRLF));
                }
            }
        }
        head.push_str(&format!("Connection: close{}{}", CRLF, CRLF));

        out.write_all(head.as_bytes()).await?;
        self.head_sent = true;
        Ok(())
    }

    async fn send_body<W>(&mut self, out: &mut W, data: &[u8]) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if self.bodyless {
            return Ok(());
        }
        if self.chunked {
            out.write_all(format!("{:x}{}", data.len(), CRLF).as_bytes())
                .await?;
            out.write_all(data).await?;
            out.write_all(CRLF.as_bytes()).await
        } else {
            out.write_all(data).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn noop_handler() -> RawHandler {
        Arc::new(
            |_: &dyn RawRequest, _: Box<dyn RawResponse>| -> BoxFuture { Box::pin(async {}) },
        )
    }

    fn engine_with(routes: &[(HttpMethod, &str)]) -> TcpEngine {
        let mut engine = TcpEngine::localhost();
        for (method, template) in routes {
            engine.register(*method, template, noop_handler());
        }
        engine
    }

    fn resolved(engine: &TcpEngine, method: &str, path: &str) -> Option<String> {
        resolve(&engine.bindings, method, path)
            .map(|(b, _)| format!("{} {}", b.method, b.template.source()))
    }

    async fn render(frames: Vec<Frame>, head_request: bool) -> String {
        let mut writer = ResponseWriter::new(head_request);
        let mut out: Vec<u8> = Vec::new();
        for frame in frames {
            if writer.apply(frame, &mut out).await.unwrap() {
                break;
            }
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_exact_method_beats_any() {
        let engine = engine_with(&[(HttpMethod::Any, "/x"), (HttpMethod::Get, "/x")]);
        assert_eq!(resolved(&engine, "GET", "/x").as_deref(), Some("GET /x"));
        assert_eq!(resolved(&engine, "POST", "/x").as_deref(), Some("ANY /x"));
    }

    #[test]
    fn test_literal_beats_param_beats_wildcard() {
        let engine = engine_with(&[
            (HttpMethod::Get, "/*"),
            (HttpMethod::Get, "/ref/:a"),
            (HttpMethod::Get, "/ref/fixed"),
        ]);
        assert_eq!(resolved(&engine, "GET", "/ref/fixed").as_deref(), Some("GET /ref/fixed"));
        assert_eq!(resolved(&engine, "GET", "/ref/other").as_deref(), Some("GET /ref/:a"));
        assert_eq!(resolved(&engine, "GET", "/elsewhere").as_deref(), Some("GET /*"));
    }

    #[test]
    fn test_delete_matches_del() {
        let engine = engine_with(&[(HttpMethod::Del, "/item")]);
        assert_eq!(resolved(&engine, "DELETE", "/item").as_deref(), Some("DEL /item"));
        assert_eq!(resolved(&engine, "GET", "/item"), None);
    }

    #[test]
    fn test_first_registration_wins_ties() {
        let mut engine = TcpEngine::localhost();
        engine.register(HttpMethod::Get, "/:a", noop_handler());
        engine.register(HttpMethod::Get, "/:b", noop_handler());
        let (binding, params) = resolve(&engine.bindings, "GET", "/v").unwrap();
        assert_eq!(binding.template.source(), "/:a");
        assert_eq!(params, vec!["v".to_string()]);
    }

    #[tokio::test]
    async fn test_end_without_writes_uses_content_length() {
        let text = render(vec![Frame::End(Bytes::from_static(b"Get ok"))], false).await;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 6\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains(&format!("Server: {}\r\n", SERVER_NAME)));
        assert!(text.ends_with("\r\n\r\nGet ok"));
    }

    #[tokio::test]
    async fn test_writes_use_chunked_encoding() {
        let text = render(
            vec![
                Frame::Status("201 Created".to_string()),
                Frame::Header("X-Test".to_string(), "1".to_string()),
                Frame::Data(Bytes::from_static(b"Hello")),
                Frame::End(Bytes::from_static(b"!")),
            ],
            false,
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(text.contains("X-Test: 1\r\n"));
        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
        assert!(text.ends_with("\r\n\r\n5\r\nHello\r\n1\r\n!\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_user_content_length_is_respected() {
        let text = render(
            vec![
                Frame::Header("Content-Length".to_string(), "5".to_string()),
                Frame::Data(Bytes::from_static(b"Hello")),
                Frame::End(Bytes::new()),
            ],
            false,
        )
        .await;
        assert!(!text.contains("chunked"));
        assert!(text.ends_with("\r\n\r\nHello"));
    }

    #[tokio::test]
    async fn test_not_modified_has_no_body() {
        let text = render(
            vec![
                Frame::Status("304 Not Modified".to_string()),
                Frame::End(Bytes::new()),
            ],
            false,
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(!text.contains("Content-Length"));
        assert!(!text.contains("Transfer-Encoding"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_head_request_omits_body() {
        let text = render(vec![Frame::End(Bytes::from_static(b"Get ok"))], true).await;
        assert!(text.contains("Content-Length: 6\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_head_request_with_writes_has_no_framing() {
        let text = render(
            vec![
                Frame::Data(Bytes::from_static(b"Hello")),
                Frame::End(Bytes::new()),
            ],
            true,
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!text.contains("Transfer-Encoding"));
        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("Connection: close\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_headers_after_body_are_dropped() {
        let text = render(
            vec![
                Frame::Data(Bytes::from_static(b"a")),
                Frame::Header("Late".to_string(), "x".to_string()),
                Frame::End(Bytes::new()),
            ],
            false,
        )
        .await;
        assert!(!text.contains("Late"));
    }

    #[tokio::test]
    async fn test_drained_waits_for_queued_output() {
        let (frames_tx, mut frames_rx) = unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        let mut response = TcpResponse {
            frames: frames_tx,
            pending: Arc::clone(&pending),
            ended: false,
            abort: AbortSignal::new(),
            remote: SocketAddr::from(([127, 0, 0, 1], 7878)),
            body: Mutex::new(None),
        };

        assert!(response.write(&vec![b'a'; OUTPUT_HIGH_WATER]));
        assert!(timeout(Duration::from_millis(50), response.drained()).await.is_ok());

        // 没有人读取输出队列时一直等待
        assert!(response.write(b"b"));
        assert!(timeout(Duration::from_millis(50), response.drained()).await.is_err());
        assert_eq!(*pending.borrow(), OUTPUT_HIGH_WATER + 1);

        let frame = frames_rx.recv().await.unwrap();
        release(&pending, frame.queued_len());
        assert!(timeout(Duration::from_millis(50), response.drained()).await.is_ok());
        assert_eq!(*pending.borrow(), 1);
    }

    #[tokio::test]
    async fn test_read_head_splits_body_prefix() {
        let mut input: &[u8] = b"POST /readbody HTTP/1.1\r\nContent-Length: 5\r\n\r\nHello";
        let (head, rest) = read_head(&mut input, 1024).await.unwrap().unwrap();
        assert_eq!(head, b"POST /readbody HTTP/1.1\r\nContent-Length: 5".to_vec());
        assert_eq!(&rest[..], b"Hello");
    }

    #[tokio::test]
    async fn test_read_head_too_large() {
        let request = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(100));
        let mut input = request.as_bytes();
        assert_eq!(
            read_head(&mut input, 32).await.unwrap_err(),
            Exception::RequestHeadTooLarge
        );
    }

    #[tokio::test]
    async fn test_read_head_eof() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\n";
        assert!(read_head(&mut input, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_request_body_is_forwarded_in_chunks() {
        let (tx, mut rx) = unbounded_channel();
        let abort = AbortSignal::new();
        let reader: &[u8] = b"lo, world";
        read_request_body(reader, Bytes::from_static(b"Hel"), 5, tx, abort.clone(), 0).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(&first.data[..], b"Hel");
        assert!(!first.is_last);
        let second = rx.recv().await.unwrap();
        assert_eq!(&second.data[..], b"lo");
        assert!(second.is_last);
        assert!(abort.is_aborted());
    }

    #[tokio::test]
    async fn test_empty_body_sends_single_last_chunk() {
        let (tx, mut rx) = unbounded_channel();
        let reader: &[u8] = b"";
        read_request_body(reader, Bytes::new(), 0, tx, AbortSignal::new(), 0).await;
        let chunk = rx.recv().await.unwrap();
        assert!(chunk.data.is_empty());
        assert!(chunk.is_last);
        assert!(rx.recv().await.is_none());
    }
}
