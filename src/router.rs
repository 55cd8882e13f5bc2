// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由表模块
//!
//! 路由记录 `Route` 由方法、路径模板和处理函数组成。模板中的参数名在注册时一次性提取，
//! 并随记录一起保存：引擎只按下标提供参数值，第 k 个参数名对应引擎的第 k 个参数。
//!
//! `mount` 以值拷贝的方式把子路由表合并进来，路径加上前缀，参数名按拼接后的模板重新提取。
//! 引擎注册的也是这份拼接后的模板，因此无论嵌套多少层，下标与参数名的对应关系始终正确。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::{
    context::Ctx,
    engine::{BoxFuture, RawHandler, RawRequest, RawResponse},
    matcher::param_names,
    param::HttpMethod,
};

/// 用户处理函数
pub type Handler = Arc<dyn Fn(Ctx) -> BoxFuture + Send + Sync>;

/// 一条路由记录
#[derive(Clone)]
pub struct Route {
    method: HttpMethod,
    template: String,
    params: Arc<[String]>,
    handler: Handler,
}

impl Route {
    pub fn new(method: HttpMethod, template: &str, handler: Handler) -> Self {
        Self {
            method,
            template: template.to_string(),
            params: param_names(template).into(),
            handler,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// 模板中的参数名，按出现顺序
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// 加上路径前缀后的新记录，原记录不受影响
    pub fn prefixed(&self, prefix: &str) -> Self {
        let template = format!("{}{}", prefix, self.template);
        Self {
            method: self.method,
            params: param_names(&template).into(),
            template,
            handler: Arc::clone(&self.handler),
        }
    }

    /// 用引擎句柄构造上下文并调用处理函数
    pub fn dispatch(&self, request: &dyn RawRequest, response: Box<dyn RawResponse>) -> BoxFuture {
        let ctx = Ctx::new(request, response, &self.params);
        (self.handler)(ctx)
    }

    /// 转换为交给引擎的适配函数
    pub fn into_raw_handler(self) -> RawHandler {
        Arc::new(
            move |request: &dyn RawRequest, response: Box<dyn RawResponse>| -> BoxFuture {
                self.dispatch(request, response)
            },
        )
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("params", &self.params)
            .finish()
    }
}

/// 可以注册路由的对象：`Router` 与 `Server`
pub trait Routes {
    fn register_route(&mut self, route: Route);

    fn http<F, Fut>(&mut self, method: HttpMethod, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let wrapped: Handler = Arc::new(move |ctx: Ctx| -> BoxFuture { Box::pin(handler(ctx)) });
        self.register_route(Route::new(method, template, wrapped));
        self
    }

    fn any<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Any, template, handler)
    }

    fn get<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Get, template, handler)
    }

    fn post<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Post, template, handler)
    }

    fn put<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Put, template, handler)
    }

    fn patch<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Patch, template, handler)
    }

    fn del<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Del, template, handler)
    }

    fn head<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Head, template, handler)
    }

    fn options<F, Fut>(&mut self, template: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.http(HttpMethod::Options, template, handler)
    }

    /// 把 `router` 中的全部路由加上 `prefix` 后注册到自身。
    /// 之后再修改 `router` 不会影响已经挂载的路由。
    fn mount(&mut self, prefix: &str, router: &Router) -> &mut Self
    where
        Self: Sized,
    {
        for route in router.routes() {
            self.register_route(route.prefixed(prefix));
        }
        self
    }
}

/// 独立的路由表，只收集路由记录，之后再挂载到服务器或其他路由表上
#[derive(Clone, Default, Debug)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 把自身挂载到 `target` 的 `prefix` 下
    pub fn register_in<R: Routes>(&self, prefix: &str, target: &mut R) {
        target.mount(prefix, self);
    }
}

impl Routes for Router {
    fn register_route(&mut self, route: Route) {
        self.routes.push(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{mock_request, RecordingResponse};

    async fn echo_params(mut ctx: Ctx) {
        let a = ctx.param("a").unwrap_or("-").to_string();
        let b = ctx.param("b").unwrap_or("-").to_string();
        ctx.end_with(format!("{}{}", a, b));
    }

    async fn run(route: &Route, params: &[&str]) -> Vec<u8> {
        let request = mock_request("GET", "/", "", &[], params);
        let (response, recorder) = RecordingResponse::new();
        route.dispatch(&request, Box::new(response)).await;
        recorder.body()
    }

    #[test]
    fn test_register_records_in_order() {
        let mut router = Router::new();
        router
            .get("/", echo_params)
            .post("/readbody", echo_params)
            .any("/*", echo_params);

        let routes: Vec<(HttpMethod, &str)> = router
            .routes()
            .iter()
            .map(|r| (r.method(), r.template()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (HttpMethod::Get, "/"),
                (HttpMethod::Post, "/readbody"),
                (HttpMethod::Any, "/*"),
            ]
        );
    }

    #[test]
    fn test_duplicate_routes_are_kept() {
        let mut router = Router::new();
        router.get("/", echo_params).get("/", echo_params);
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_param_names_extracted_once() {
        let mut router = Router::new();
        router.get("/ref/:a/:b", echo_params);
        assert_eq!(router.routes()[0].param_names(), ["a", "b"]);
    }

    #[test]
    fn test_mount_prefixes_templates() {
        let mut sub = Router::new();
        sub.get("/", echo_params).put("/x/:a", echo_params);

        let mut root = Router::new();
        root.mount("/api", &sub);

        let templates: Vec<&str> = root.routes().iter().map(Route::template).collect();
        assert_eq!(templates, vec!["/api/", "/api/x/:a"]);
        assert_eq!(root.routes()[1].method(), HttpMethod::Put);
    }

    #[test]
    fn test_mount_is_a_copy() {
        let mut sub = Router::new();
        sub.get("/one", echo_params);

        let mut root = Router::new();
        root.mount("/a", &sub).mount("/b", &sub);
        sub.get("/two", echo_params);

        let templates: Vec<&str> = root.routes().iter().map(Route::template).collect();
        assert_eq!(templates, vec!["/a/one", "/b/one"]);
        assert_eq!(sub.len(), 2);
    }

    #[test]
    fn test_register_in() {
        let mut sub = Router::new();
        sub.get("/status", echo_params);

        let mut root = Router::new();
        sub.register_in("/v1", &mut root);
        assert_eq!(root.routes()[0].template(), "/v1/status");
    }

    #[test]
    fn test_prefix_params_come_first() {
        let mut sub = Router::new();
        sub.get("/posts/:b", echo_params);
        let mut root = Router::new();
        root.mount("/users/:a", &sub);
        assert_eq!(root.routes()[0].param_names(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_prefix_without_separator_joins_segment() {
        let mut sub = Router::new();
        sub.get("x/:b", echo_params);
        let mut root = Router::new();
        root.mount("/u/:a", &sub);

        let route = &root.routes()[0];
        assert_eq!(route.template(), "/u/:ax/:b");
        assert_eq!(route.param_names(), ["ax", "b"]);
        assert_eq!(run(route, &["7", "42"]).await, b"-42".to_vec());
    }

    #[tokio::test]
    async fn test_dispatch_binds_params_by_index() {
        let mut router = Router::new();
        router.get("/ref/:a/:b", echo_params);
        assert_eq!(run(&router.routes()[0], &["ab", "cd"]).await, b"abcd".to_vec());
    }

    #[tokio::test]
    async fn test_params_survive_nested_mounts() {
        let mut inner = Router::new();
        inner.get("/:b", echo_params);
        let mut middle = Router::new();
        middle.mount("/inner", &inner);
        let mut outer = Router::new();
        outer.mount("/outer/:a", &middle);

        let route = &outer.routes()[0];
        assert_eq!(route.template(), "/outer/:a/inner/:b");
        assert_eq!(run(route, &["x", "y"]).await, b"xy".to_vec());
    }

    #[tokio::test]
    async fn test_raw_handler_dispatches() {
        let route = Route::new(
            HttpMethod::Get,
            "/:a",
            Arc::new(|ctx: Ctx| -> BoxFuture { Box::pin(echo_params(ctx)) }),
        );
        let raw = route.into_raw_handler();
        let request = mock_request("GET", "/z", "", &[], &["z"]);
        let (response, recorder) = RecordingResponse::new();
        raw(&request, Box::new(response)).await;
        assert_eq!(recorder.body(), b"z-".to_vec());
    }
}
