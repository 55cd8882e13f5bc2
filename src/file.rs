// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件响应模块
//!
//! 为 `Ctx` 提供 `send_file`，按以下顺序处理一次文件请求：
//! 1. 读取文件元数据，失败则返回 500；
//! 2. 条件请求：`If-Modified-Since` 不早于文件修改时间（秒级截断）时返回 304；
//! 3. 字节范围：解析 `Range` 头，越界的值被收敛到文件范围内，不会返回 416；
//! 4. 内容编码协商：仅在开启压缩且没有 `Range` 时进行；
//! 5. 流式发送：阻塞线程池中读取文件（必要时经过压缩器），按块写入响应。
//!    每写入一块都等待引擎排空输出，读取速度因此受对端的接收速度约束。
//!
//! 连接中断时，发送循环立即退出并丢弃通道接收端，读取线程随之停止并释放文件句柄。

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use flate2::{
    read::{GzEncoder, ZlibEncoder},
    Compression,
};
use lazy_static::lazy_static;
use log::{debug, error, warn};
use regex::Regex;
use tokio::sync::mpsc;

use crate::{
    context::Ctx,
    param::{HttpEncoding, DEFAULT_CHUNK_SIZE},
    util::{format_file_size, format_http_date, parse_http_date, truncate_to_seconds},
};

lazy_static! {
    /// `bytes=<start>-<end>`、`bytes=<start>`、`bytes=-<suffix>`，多段范围只取第一段
    static ref RANGE_SPEC: Regex = Regex::new(r"^\s*bytes\s*=\s*(\d*)\s*(-?)\s*(\d*)").unwrap();
}

/// brotli 压缩器的缓冲区大小、质量与窗口参数
const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LG_WINDOW: u32 = 22;

/// 读取线程与发送循环之间最多积压的块数
const PUMP_BACKLOG: usize = 4;

/// `send_file` 的选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFileOptions {
    /// 是否处理 `If-Modified-Since` 并写出 `Last-Modified`
    pub last_modified: bool,
    /// 是否按 `Accept-Encoding` 压缩响应体
    pub compress: bool,
    /// 可用编码的优先级，靠前者优先
    pub compress_priority: Vec<HttpEncoding>,
    /// 单次读取的字节数
    pub chunk_size: usize,
}

impl Default for SendFileOptions {
    fn default() -> Self {
        Self {
            last_modified: true,
            compress: false,
            compress_priority: vec![HttpEncoding::Gzip, HttpEncoding::Br, HttpEncoding::Deflate],
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// 闭区间字节范围。空文件的范围长度为 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub length: u64,
}

impl ByteRange {
    /// 整个文件
    pub fn full(size: u64) -> Self {
        match size {
            0 => Self { start: 0, end: 0, length: 0 },
            _ => Self { start: 0, end: size - 1, length: size },
        }
    }

    fn bounded(start: u64, end: u64) -> Self {
        Self { start, end, length: end - start + 1 }
    }

    /// 解析 `Range` 头的值。无法解析时返回整个文件；数值越界时收敛到文件范围内。
    pub fn resolve(value: &str, size: u64) -> Self {
        if size == 0 {
            return Self::full(0);
        }
        let last = size - 1;
        let caps = match RANGE_SPEC.captures(value) {
            Some(c) => c,
            None => {
                debug!("无法解析的Range：{}，按整个文件处理", value);
                return Self::full(size);
            }
        };
        // 超出 u64 的数字同样视为越界
        let number = |i: usize| {
            caps.get(i)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<u64>().unwrap_or(u64::MAX))
        };
        let has_dash = caps.get(2).map_or(false, |m| !m.as_str().is_empty());

        match (number(1), has_dash, number(3)) {
            (Some(start), _, end) => {
                let end = end.map_or(last, |e| e.min(last));
                let start = start.min(last).min(end);
                Self::bounded(start, end)
            }
            (None, true, Some(suffix)) => {
                let suffix = suffix.clamp(1, size);
                Self::bounded(size - suffix, last)
            }
            _ => Self::full(size),
        }
    }

    /// `Content-Range` 的值
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// 在客户端的 `Accept-Encoding` 中按优先级挑选编码，按子串匹配
pub fn negotiate_encoding(
    accept_encoding: Option<&str>,
    priority: &[HttpEncoding],
) -> Option<HttpEncoding> {
    let accept = accept_encoding?;
    priority
        .iter()
        .copied()
        .find(|encoding| accept.contains(encoding.token()))
}

/// 打开文件、定位到范围起点，并按需套上压缩器
fn open_source(
    path: &Path,
    range: ByteRange,
    encoding: Option<HttpEncoding>,
) -> io::Result<Box<dyn Read + Send>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(range.start))?;
    let raw = file.take(range.length);
    Ok(match encoding {
        None => Box::new(raw),
        Some(HttpEncoding::Gzip) => Box::new(GzEncoder::new(raw, Compression::default())),
        Some(HttpEncoding::Deflate) => Box::new(ZlibEncoder::new(raw, Compression::default())),
        Some(HttpEncoding::Br) => Box::new(brotli::CompressorReader::new(
            raw,
            BROTLI_BUFFER_SIZE,
            BROTLI_QUALITY,
            BROTLI_LG_WINDOW,
        )),
    })
}

/// 在阻塞线程池中读取文件，把数据块送入有界通道。
/// 通道接收端被丢弃后，线程在下一次发送时退出，文件随之关闭。
fn spawn_pump(
    path: PathBuf,
    range: ByteRange,
    encoding: Option<HttpEncoding>,
    chunk_size: usize,
) -> mpsc::Receiver<io::Result<Bytes>> {
    let (tx, rx) = mpsc::channel(PUMP_BACKLOG);
    tokio::task::spawn_blocking(move || {
        let mut source = match open_source(&path, range, encoding) {
            Ok(s) => s,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };
        let mut buffer = vec![0u8; chunk_size.max(1)];
        loop {
            match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buffer[..n]))).is_err() {
                        debug!("{} 发送端已关闭，停止读取", path.display());
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

impl Ctx {
    /// 以文件内容作为响应。所有错误都在内部转换为 500，调用方无需处理。
    pub async fn send_file(&mut self, path: impl AsRef<Path>, options: &SendFileOptions) {
        let path = path.as_ref();
        if self.is_aborted() {
            return;
        }

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                warn!("{} 不是普通文件", path.display());
                self.write_status(500, None);
                self.end();
                return;
            }
            Err(e) => {
                warn!("无法读取文件{}的元数据：{}", path.display(), e);
                self.write_status(500, None);
                self.end();
                return;
            }
        };
        let size = metadata.len();
        let modified = metadata.modified().ok().map(truncate_to_seconds);

        if options.last_modified {
            if let Some(mtime) = modified {
                let since = self.header("if-modified-since").and_then(parse_http_date);
                if since.map_or(false, |since| since >= mtime) {
                    debug!("{} 未修改，返回304", path.display());
                    self.write_status(304, None);
                    self.end();
                    return;
                }
            }
        }

        let range = self
            .header("range")
            .map(|value| ByteRange::resolve(value, size));
        let encoding = match (options.compress, range) {
            (true, None) => {
                negotiate_encoding(self.header("accept-encoding"), &options.compress_priority)
            }
            _ => None,
        };

        if range.is_some() {
            self.write_status(206, None);
        }
        if options.last_modified {
            if let Some(mtime) = modified {
                self.write_header("Last-Modified", &format_http_date(&mtime));
            }
        }
        if let Some(range) = range {
            debug!(
                "{} 范围请求：{}，共{}",
                path.display(),
                range.content_range(size),
                format_file_size(range.length)
            );
            self.write_header("Accept-Ranges", "bytes");
            self.write_header("Content-Range", &range.content_range(size));
        }
        if let Some(encoding) = encoding {
            debug!("{} 使用{}编码发送", path.display(), encoding);
            self.write_header("Content-Encoding", encoding.token());
        }

        let range = range.unwrap_or_else(|| ByteRange::full(size));
        let mut chunks = spawn_pump(path.to_path_buf(), range, encoding, options.chunk_size);
        let abort = self.abort_signal();
        loop {
            let chunk = tokio::select! {
                _ = abort.aborted() => {
                    debug!("{} 连接中断，停止发送", path.display());
                    return;
                }
                chunk = chunks.recv() => chunk,
            };
            match chunk {
                Some(Ok(data)) => self.write(data),
                Some(Err(e)) => {
                    error!("发送文件{}时出错：{}", path.display(), e);
                    self.write_status(500, None);
                    self.end();
                    return;
                }
                None => {
                    self.end();
                    return;
                }
            }
            // 输出积压时不再取下一块，读取线程随之阻塞在有界通道上
            tokio::select! {
                _ = abort.aborted() => {
                    debug!("{} 连接中断，停止发送", path.display());
                    return;
                }
                _ = self.drained() => {}
            }
        }
    }
}
