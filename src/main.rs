// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示服务器
//!
//! 使用内置 TCP 引擎启动一个演示服务：
//! - 若干演示路由（请求信息、路径参数、请求体回显、重定向）；
//! - 挂载在 `/api` 下的子路由表；
//! - `/static/*` 下的静态文件，支持条件请求、范围请求与压缩；
//! - 后台管理控制台（CLI 指令交互）。

use std::{
    net::{IpAddr, Ipv4Addr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use log::{error, info, warn};
use serde_json::json;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Builder,
};

use uroute::{
    Config, Ctx, HtmlBuilder, Router, Routes, SendFileOptions, Server, TcpEngine, TcpListenSocket,
};

fn main() {
    // 1. 初始化日志系统
    log4rs::init_file("config/log4rs.yaml", Default::default()).unwrap();

    // 2. 加载配置，配置文件不存在时使用默认配置
    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("配置文件已载入");
    info!("www root: {}", config.www_root());

    // 3. 按配置的工作线程数构建运行时
    let runtime = Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    let address = match config.local() {
        true => IpAddr::V4(Ipv4Addr::LOCALHOST),
        false => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };
    let engine = TcpEngine::new(address).with_max_head_size(config.max_head_size());
    let mut server = Server::new(engine);

    server
        .get("/", hello)
        .get("/info", info)
        .get("/ref/:a/:b", refs)
        .post("/readbody", read_body)
        .get("/redirect", |mut ctx: Ctx| async move { ctx.redirect("/") });

    let mut api = Router::new();
    api.get("/", |mut ctx: Ctx| async move { ctx.end_with("Router root") })
        .get("/echo/:word", echo);
    server.mount("/api", &api);

    let root = Arc::new(PathBuf::from(config.www_root()));
    let options = Arc::new(config.send_file_options());
    server.get("/static/*", move |ctx| {
        serve_static(ctx, Arc::clone(&root), Arc::clone(&options))
    });

    let mut listener: Option<TcpListenSocket> = None;
    server
        .listen(config.port(), |result| match result {
            Ok(socket) => listener = Some(socket),
            Err(e) => error!("无法启动服务：{}", e),
        })
        .await;
    let listener = match listener {
        Some(listener) => listener,
        None => return,
    };
    info!("服务已启动：http://{}", listener.local_addr());

    console(&listener, server.routes().len()).await;
}

/// 后台管理控制台，读取标准输入中的指令
async fn console(listener: &TcpListenSocket, route_count: usize) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => {
                // 标准输入关闭后保持运行
                std::future::pending::<()>().await;
            }
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                listener.close();
                println!("已停止监听，服务器即将退出...");
                break;
            }
            "help" => {
                println!("== uroute Help ==");
                println!("stop   - 停止监听并退出");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("=================");
            }
            "status" => {
                println!("== uroute 状态 ==");
                println!("监听地址: {}", listener.local_addr());
                println!("已注册路由: {}", route_count);
                println!("=================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

async fn hello(mut ctx: Ctx) {
    ctx.end_with("Get ok");
}

/// 以 JSON 返回请求信息
async fn info(mut ctx: Ctx) {
    let body = json!({
        "method": ctx.method(),
        "url": ctx.url(),
        "rawquery": ctx.raw_query(),
        "query": ctx.query(),
        "headers": ctx.headers(),
        "remote": ctx.remote_ip().map(|ip| ip.to_string()),
    });
    ctx.write_header("Content-Type", "application/json");
    ctx.end_with(body.to_string());
}

async fn refs(mut ctx: Ctx) {
    let body = format!(
        "{}{}",
        ctx.param("a").unwrap_or_default(),
        ctx.param("b").unwrap_or_default()
    );
    ctx.end_with(body);
}

async fn echo(mut ctx: Ctx) {
    let word = ctx.param("word").unwrap_or_default().to_string();
    ctx.end_with(word);
}

async fn read_body(mut ctx: Ctx) {
    match ctx.read_body().await {
        Ok(body) => ctx.end_with(body),
        Err(e) => warn!("读取请求体失败：{}", e),
    }
}

/// 把 URL 路径映射到 www_root 下，拒绝 `..` 与绝对路径
fn map_path(root: &Path, url_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(url_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(s) => path.push(s),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

async fn serve_static(mut ctx: Ctx, root: Arc<PathBuf>, options: Arc<SendFileOptions>) {
    let relative = ctx.url().trim_start_matches("/static").to_string();
    match map_path(&root, &relative) {
        Some(path) => ctx.send_file(path, &options).await,
        None => {
            warn!("非法的静态文件路径：{}", ctx.url());
            ctx.write_status(400, None);
            ctx.write_header("Content-Type", "text/html;charset=utf-8");
            ctx.end_with(HtmlBuilder::from_status_code(400, Some("非法的路径")).build());
        }
    }
}
