use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::{
    exception::Exception,
    file::SendFileOptions,
    param::{HttpEncoding, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_HEAD_SIZE},
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    www_root: String,
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_max_head_size")]
    max_head_size: usize,
    #[serde(default)]
    compress: bool,
    #[serde(default = "default_compress_priority")]
    compress_priority: Vec<HttpEncoding>,
    #[serde(default = "default_last_modified")]
    last_modified: bool,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_head_size() -> usize {
    DEFAULT_MAX_HEAD_SIZE
}

fn default_compress_priority() -> Vec<HttpEncoding> {
    vec![HttpEncoding::Gzip, HttpEncoding::Br, HttpEncoding::Deflate]
}

fn default_last_modified() -> bool {
    true
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: ".".to_string(),
            port: 7878,
            worker_threads: num_cpus::get(),
            local: true,
            chunk_size: default_chunk_size(),
            max_head_size: default_max_head_size(),
            compress: false,
            compress_priority: default_compress_priority(),
            last_modified: default_last_modified(),
        }
    }

    /// 从 TOML 文件读取配置。文件无法读取时返回错误；内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => {
                error!("无法打开配置文件{}：{}", filename, e);
                return Err(Exception::ConfigUnreadable);
            }
        };
        let mut str_val = String::new();
        if let Err(e) = file.read_to_string(&mut str_val) {
            error!("读取配置文件{}失败：{}", filename, e);
            return Err(Exception::ConfigUnreadable);
        }
        Ok(Self::from_toml_str(&str_val))
    }

    pub fn from_toml_str(content: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.chunk_size == 0 {
            warn!("chunk_size被设置为0，该值将被改为默认的{}。", DEFAULT_CHUNK_SIZE);
            raw_config.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        raw_config
    }

    /// 文件路由使用的发送选项
    pub fn send_file_options(&self) -> SendFileOptions {
        SendFileOptions {
            last_modified: self.last_modified,
            compress: self.compress,
            compress_priority: self.compress_priority.clone(),
            chunk_size: self.chunk_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_head_size(&self) -> usize {
        self.max_head_size
    }
}
