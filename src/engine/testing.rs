// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 单元测试用的引擎替身：记录全部写入的 `RecordingResponse`，
//! 以及按固定数据应答的 `MockRawRequest` 构造器。

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    watch,
};

use super::{BodyChunk, BoxFuture, MockRawRequest, RawResponse};
use crate::abort::AbortSignal;

pub fn mock_request(
    method: &str,
    url: &str,
    query: &str,
    headers: &[(&str, &str)],
    params: &[&str],
) -> MockRawRequest {
    let headers: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();

    let mut request = MockRawRequest::new();
    request.expect_method().return_const(method.to_string());
    request.expect_url().return_const(url.to_string());
    request.expect_query().return_const(query.to_string());
    request.expect_headers().return_const(headers);
    request
        .expect_parameter()
        .returning(move |index| params.get(index).cloned());
    request
}

#[derive(Default)]
struct Recorded {
    status: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    ended: bool,
    aborted: bool,
    write_count: usize,
    end_count: usize,
    signal: Option<AbortSignal>,
}

/// 测试侧持有的观察句柄
#[derive(Clone)]
pub struct Recorder {
    state: Arc<Mutex<Recorded>>,
    body_tx: UnboundedSender<BodyChunk>,
    held: Arc<watch::Sender<bool>>,
}

pub struct RecordingResponse {
    state: Arc<Mutex<Recorded>>,
    body_rx: Option<UnboundedReceiver<BodyChunk>>,
    /// 为 `true` 时输出视为无人读取，`drained` 一直等待
    held: Arc<watch::Sender<bool>>,
}

fn lock(state: &Mutex<Recorded>) -> MutexGuard<'_, Recorded> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RecordingResponse {
    pub fn new() -> (Self, Recorder) {
        let state = Arc::new(Mutex::new(Recorded::default()));
        let (body_tx, body_rx) = unbounded_channel();
        let (held, _) = watch::channel(false);
        let held = Arc::new(held);
        (
            Self {
                state: Arc::clone(&state),
                body_rx: Some(body_rx),
                held: Arc::clone(&held),
            },
            Recorder {
                state,
                body_tx,
                held,
            },
        )
    }
}

impl RawResponse for RecordingResponse {
    fn write_status(&mut self, status: &str) {
        lock(&self.state).status = Some(status.to_string());
    }

    fn write_header(&mut self, key: &str, value: &str) {
        lock(&self.state)
            .headers
            .push((key.to_string(), value.to_string()));
    }

    fn write(&mut self, chunk: &[u8]) -> bool {
        let mut state = lock(&self.state);
        if state.ended || state.aborted {
            return false;
        }
        state.write_count += 1;
        state.body.extend_from_slice(chunk);
        true
    }

    fn end(&mut self, chunk: &[u8]) {
        let mut state = lock(&self.state);
        state.body.extend_from_slice(chunk);
        state.ended = true;
        state.end_count += 1;
    }

    fn drained(&self) -> BoxFuture {
        let mut held = self.held.subscribe();
        Box::pin(async move {
            while *held.borrow_and_update() {
                if held.changed().await.is_err() {
                    return;
                }
            }
        })
    }

    fn is_writable(&self) -> bool {
        let state = lock(&self.state);
        !state.ended && !state.aborted
    }

    fn remote_address(&self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn take_body(&mut self) -> Option<UnboundedReceiver<BodyChunk>> {
        self.body_rx.take()
    }

    fn on_aborted(&mut self, signal: AbortSignal) {
        let aborted = {
            let mut state = lock(&self.state);
            state.signal = Some(signal.clone());
            state.aborted
        };
        if aborted {
            signal.abort();
        }
    }
}

impl Recorder {
    /// 模拟对端断开
    pub fn abort(&self) {
        let signal = {
            let mut state = lock(&self.state);
            state.aborted = true;
            state.signal.clone()
        };
        if let Some(signal) = signal {
            signal.abort();
        }
    }

    /// 让输出停止排空，`drained` 将一直等待
    pub fn hold_output(&self) {
        self.held.send_replace(true);
    }

    pub fn release_output(&self) {
        self.held.send_replace(false);
    }

    pub fn send_body(&self, data: &str, is_last: bool) {
        let _ = self.body_tx.send(BodyChunk {
            data: Bytes::copy_from_slice(data.as_bytes()),
            is_last,
        });
    }

    pub fn status(&self) -> Option<String> {
        lock(&self.state).status.clone()
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        lock(&self.state).headers.clone()
    }

    /// 大小写不敏感，返回最后一次写入的值
    pub fn header(&self, key: &str) -> Option<String> {
        lock(&self.state)
            .headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    }

    pub fn body(&self) -> Vec<u8> {
        lock(&self.state).body.clone()
    }

    pub fn ended(&self) -> bool {
        lock(&self.state).ended
    }

    pub fn write_count(&self) -> usize {
        lock(&self.state).write_count
    }

    pub fn end_count(&self) -> usize {
        lock(&self.state).end_count
    }
}
