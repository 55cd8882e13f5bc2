// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务器模块
//!
//! `Server` 把路由记录逐条注册到引擎，并负责监听端口。
//! 所有注册必须在 `listen` 之前完成，运行期间路由表不再变化。

use log::{debug, error, info};

use crate::{
    engine::Engine,
    exception::Exception,
    router::{Route, Routes},
};

pub struct Server<E: Engine> {
    engine: E,
    routes: Vec<Route>,
}

impl<E: Engine> Server<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            routes: Vec::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 已注册到引擎的路由记录
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// 开始监听。绑定结果（监听句柄或错误）交给 `callback`，不做重试。
    pub async fn listen<F>(&mut self, port: u16, callback: F)
    where
        F: FnOnce(Result<E::Listener, Exception>),
    {
        info!("共注册{}条路由，开始监听{}端口", self.routes.len(), port);
        let result = self.engine.listen(port).await;
        match &result {
            Ok(_) => info!("端口{}监听成功", port),
            Err(e) => error!("端口{}监听失败：{}", port, e),
        }
        callback(result);
    }
}

impl<E: Engine> Routes for Server<E> {
    fn register_route(&mut self, route: Route) {
        debug!("注册路由：{} {}", route.method(), route.template());
        self.engine.register(
            route.method(),
            route.template(),
            route.clone().into_raw_handler(),
        );
        self.routes.push(route);
    }
}
